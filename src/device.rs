//! Device control: the UDP reliability engine, the device-state cache, and
//! the concurrent refresh orchestrator.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, timeout};

use crate::errors::Error;
use crate::matcher::response_matches;
use crate::message::{MessageKind, Request, Response, ResponsePayload};
use crate::products::{self, ProductFeatures};
use crate::transport::{self, BroadcastTargets, DEFAULT_PORT, Transport, UdpTransport};
use crate::types::{Hsbk, MacAddress, PowerLevel};
use crate::wire;

type Result<T> = std::result::Result<T, Error>;

/// Service id for the UDP service devices advertise.
pub const UDP_SERVICE: u8 = 1;

pub(crate) fn service_name(service: u8) -> &'static str {
    match service {
        UDP_SERVICE => "UDP",
        _ => "unknown",
    }
}

/// Derive a random client source id.
pub(crate) fn random_source_id() -> u32 {
    uuid::Uuid::new_v4().as_u128() as u32
}

/// Firmware build info for the host or wifi subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    /// Build timestamp in nanoseconds since the epoch
    pub build_timestamp: u64,
    pub version_major: u16,
    pub version_minor: u16,
}

impl FirmwareInfo {
    pub(crate) fn from_wire(build_timestamp: u64, version: u32) -> Self {
        Self {
            build_timestamp,
            version_major: (version >> 16) as u16,
            version_minor: (version & 0xff) as u16,
        }
    }
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.version_major, self.version_minor)
    }
}

/// Product identification as reported by StateVersion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
}

/// Radio diagnostics, fetched on demand and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WifiInfo {
    /// Signal strength in milliwatts
    pub signal: f32,
    /// Bytes transmitted
    pub tx: u32,
    /// Bytes received
    pub rx: u32,
}

/// Device clock info, fetched on demand and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeInfo {
    /// Current device time in nanoseconds since the epoch
    pub time: u64,
    /// Nanoseconds since last power-on
    pub uptime: u64,
    /// Duration of the last downtime in nanoseconds, accurate to ~5s
    pub downtime: u64,
}

/// Last-known values cached on the client.
///
/// Fields populate on the first explicit or lazily-triggered refresh and
/// stay at `None` until then.
#[serde_with::skip_serializing_none]
#[derive(Debug, Default, Clone, Serialize)]
pub struct DeviceState {
    /// Devices roam; the address is updated after every verified response.
    pub ip_addr: Option<Ipv4Addr>,
    pub label: Option<String>,
    pub location: Option<String>,
    pub group: Option<String>,
    pub power_level: Option<PowerLevel>,
    pub host_firmware: Option<FirmwareInfo>,
    pub wifi_firmware: Option<FirmwareInfo>,
    pub product: Option<ProductInfo>,
    /// Lights only
    pub color: Option<Hsbk>,
    /// Lights with infrared support only
    pub infrared_brightness: Option<u16>,
}

/// A single LIFX device on the local network.
///
/// A `Device` owns the request/response workflow for one physical device:
/// it addresses the device by mac (and, once learned, by IP), retries lost
/// datagrams, filters replies meant for other clients or devices, and
/// caches the more persistent state attributes so callers don't spam the
/// device with packets.
///
/// Cloning is cheap; clones share the same state cache.
///
/// # Example
///
/// ```no_run
/// use lifx_lan_rs::{Device, PowerLevel};
///
/// # async fn run() -> Result<(), lifx_lan_rs::Error> {
/// let device = Device::new("d0:73:d5:01:02:03".parse()?, None);
/// device.set_power(PowerLevel::On, false).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Device {
    mac_addr: MacAddress,
    source_id: u32,
    port: u16,
    service: u8,
    timeout: Duration,
    max_attempts: u32,
    broadcast: BroadcastTargets,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<DeviceState>>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("mac_addr", &self.mac_addr)
            .field("source_id", &self.source_id)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Per-attempt receive window.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(800);
    /// Send attempts before a request is declared unanswered.
    pub const DEFAULT_ATTEMPTS: u32 = 4;
    /// Worker pool capacity for a full refresh.
    pub const REFRESH_POOL_SIZE: usize = 12;

    /// Devices handle at most ~20 messages per second; beyond this many
    /// repeats, fire-and-forget paces itself.
    const MAX_UNTHROTTLED_REPEATS: u32 = 20;
    const THROTTLE_DELAY: Duration = Duration::from_millis(50);

    const RECV_BUF_LEN: usize = 1024;

    /// Create a device with a known mac and an optionally known IP.
    ///
    /// Until the IP is known, requests go to every configured broadcast
    /// address; the IP is learned from the first verified response.
    pub fn new(mac_addr: MacAddress, ip_addr: Option<Ipv4Addr>) -> Self {
        Device {
            mac_addr,
            source_id: random_source_id(),
            port: DEFAULT_PORT,
            service: UDP_SERVICE,
            timeout: Self::DEFAULT_TIMEOUT,
            max_attempts: Self::DEFAULT_ATTEMPTS,
            broadcast: BroadcastTargets::default(),
            transport: Arc::new(UdpTransport),
            state: Arc::new(Mutex::new(DeviceState {
                ip_addr,
                ..DeviceState::default()
            })),
        }
    }

    /// Override the client correlation id (fixed for the device's life).
    pub fn with_source_id(mut self, source_id: u32) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_broadcast_targets(mut self, targets: BroadcastTargets) -> Self {
        self.broadcast = targets;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn mac_addr(&self) -> MacAddress {
        self.mac_addr
    }

    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn service(&self) -> u8 {
        self.service
    }

    /// Last-known IP address, if any response has been verified yet.
    pub async fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.state.lock().await.ip_addr
    }

    /// Snapshot of the cached state.
    pub async fn state(&self) -> DeviceState {
        self.state.lock().await.clone()
    }

    /// Shared cache handle for the light subtype.
    pub(crate) fn state_handle(&self) -> &Mutex<DeviceState> {
        &self.state
    }

    // ======================================================================
    // Workflow: the three call patterns
    // ======================================================================

    /// Send the same message repeatedly without soliciting any reply.
    ///
    /// Completes after `num_repeats` sends no matter what the device does;
    /// only socket failures can make this return an error.
    pub async fn fire_and_forget(&self, request: Request, num_repeats: u32) -> Result<()> {
        let frame = wire::encode(&request, self.mac_addr, self.source_id, false, false);
        let socket = self
            .transport
            .open()
            .await
            .map_err(|e| Error::socket("open", e))?;
        let ip_addr = self.state.lock().await.ip_addr;
        let delay = if num_repeats > Self::MAX_UNTHROTTLED_REPEATS {
            Self::THROTTLE_DELAY
        } else {
            Duration::ZERO
        };

        debug!(
            "{}: fire_and_forget {} x{num_repeats}",
            self.mac_addr,
            request.kind()
        );
        for _ in 0..num_repeats {
            transport::send_frame(socket.as_ref(), &frame, ip_addr, self.port, &self.broadcast)
                .await?;
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
        Ok(())
    }

    /// Request/response expecting only an [`MessageKind::Acknowledgement`].
    pub async fn req_with_ack(&self, request: Request) -> Result<()> {
        self.req_with_resp(request, &[MessageKind::Acknowledgement])
            .await?;
        Ok(())
    }

    /// Send a request and wait for a matching reply.
    ///
    /// Each attempt sends the frame once (unicast when the IP is known,
    /// otherwise to every broadcast address) and then polls the socket for
    /// the rest of the attempt's timeout budget. Datagrams that fail the
    /// match predicate (wrong kind, another client's source id, another
    /// device's target) are discarded without resetting the deadline,
    /// since a broadcast invites replies this call must not accept.
    ///
    /// On a match the responder's IP is cached for subsequent calls. After
    /// `max_attempts` windows with no match the call fails with
    /// [`Error::NoResponse`].
    pub async fn req_with_resp(
        &self,
        request: Request,
        expected: &[MessageKind],
    ) -> Result<Response> {
        let ack_requested = expected == [MessageKind::Acknowledgement];
        let frame = wire::encode(
            &request,
            self.mac_addr,
            self.source_id,
            ack_requested,
            !ack_requested,
        );
        let socket = self
            .transport
            .open()
            .await
            .map_err(|e| Error::socket("open", e))?;
        let mut buf = [0u8; Self::RECV_BUF_LEN];

        for attempt in 1..=self.max_attempts {
            let ip_addr = self.state.lock().await.ip_addr;
            transport::send_frame(socket.as_ref(), &frame, ip_addr, self.port, &self.broadcast)
                .await?;
            debug!(
                "{}: sent {} (attempt {attempt}/{})",
                self.mac_addr,
                request.kind(),
                self.max_attempts
            );

            let deadline = Instant::now() + self.timeout;
            loop {
                let remaining = deadline - Instant::now();
                if remaining.is_zero() {
                    break;
                }
                let received = match timeout(remaining, socket.recv_from(&mut buf)).await {
                    Ok(Ok(received)) => received,
                    Ok(Err(e)) => return Err(Error::socket("recv_from", e)),
                    Err(_) => break, // attempt timed out, resend if attempts remain
                };
                let (len, addr) = received;
                let response = match wire::decode(&buf[..len]) {
                    Ok(response) => response,
                    Err(e) => {
                        debug!("{}: discarding datagram from {addr}: {e}", self.mac_addr);
                        continue;
                    }
                };
                if !response_matches(&response, expected, self.source_id, self.mac_addr) {
                    debug!(
                        "{}: discarding unmatched {} from {addr}",
                        self.mac_addr, response.kind
                    );
                    continue;
                }
                if let SocketAddr::V4(v4) = addr {
                    self.update_ip(*v4.ip()).await;
                }
                return Ok(response);
            }
        }

        warn!(
            "{}: no {expected:?} after {} attempts",
            self.mac_addr, self.max_attempts
        );
        Err(Error::no_response(request.kind(), self.mac_addr, expected))
    }

    async fn update_ip(&self, ip: Ipv4Addr) {
        let mut state = self.state.lock().await;
        if state.ip_addr != Some(ip) {
            info!("{}: now reachable at {ip}", self.mac_addr);
            state.ip_addr = Some(ip);
        }
    }

    /// Set messages either want an ack or are blasted rapidly.
    pub(crate) async fn send_set_message(&self, request: Request, rapid: bool) -> Result<()> {
        if rapid {
            self.fire_and_forget(request, 1).await
        } else {
            self.req_with_ack(request).await
        }
    }

    // ======================================================================
    // Setters
    // ======================================================================

    /// Set the device label, truncated to the 32 bytes the wire allows.
    pub async fn set_label(&self, label: &str) -> Result<()> {
        let label = truncate_label(label);
        self.state.lock().await.label = Some(label.clone());
        self.send_set_message(Request::SetLabel { label }, false).await
    }

    /// Turn the device on or off.
    ///
    /// When the requested level equals the cached one this is a no-op: no
    /// datagram is sent and no state changes. Otherwise the cache is set
    /// first and the message sent after (write-through), so a lost send
    /// leaves the cache ahead of reality until the next refresh.
    pub async fn set_power(&self, power: PowerLevel, rapid: bool) -> Result<()> {
        self.apply_power(power, rapid, Request::SetPower { level: power })
            .await
    }

    pub(crate) async fn apply_power(
        &self,
        power: PowerLevel,
        rapid: bool,
        request: Request,
    ) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.power_level == Some(power) {
                debug!("{}: power already {power:?}", self.mac_addr);
                return Ok(());
            }
            info!("{}: setting power to {power:?}", self.mac_addr);
            state.power_level = Some(power);
        }
        self.send_set_message(request, rapid).await
    }

    // ======================================================================
    // Refresh: grab data from the device and cache it
    // ======================================================================

    /// Refresh every cached field, running the per-field requests on a
    /// bounded worker pool and waiting for all of them.
    ///
    /// Returns `Ok(true)` when every field refreshed, `Ok(false)` when any
    /// field got no response; fields that did succeed keep their updates
    /// either way. Socket-level failures propagate as errors.
    pub async fn refresh(&self) -> Result<bool> {
        let results = join_all_bounded(self.refresh_ops(), Self::REFRESH_POOL_SIZE).await;
        self.finish_refresh(results)
    }

    /// The fixed set of per-field refresh operations.
    pub(crate) fn refresh_ops(&self) -> Vec<BoxFuture<'static, Result<()>>> {
        let ops: [BoxFuture<'static, Result<()>>; 7] = [
            {
                let device = self.clone();
                Box::pin(async move { device.refresh_label().await })
            },
            {
                let device = self.clone();
                Box::pin(async move { device.refresh_location().await })
            },
            {
                let device = self.clone();
                Box::pin(async move { device.refresh_group().await })
            },
            {
                let device = self.clone();
                Box::pin(async move { device.refresh_power().await })
            },
            {
                let device = self.clone();
                Box::pin(async move { device.refresh_host_firmware().await })
            },
            {
                let device = self.clone();
                Box::pin(async move { device.refresh_wifi_firmware().await })
            },
            {
                let device = self.clone();
                Box::pin(async move { device.refresh_version_info().await })
            },
        ];
        ops.into()
    }

    /// Fold per-field outcomes into the single refresh verdict. Only the
    /// first observed no-response is reported; partial updates stand.
    pub(crate) fn finish_refresh(&self, results: Vec<Result<()>>) -> Result<bool> {
        for result in results {
            match result {
                Ok(()) => {}
                Err(err @ Error::NoResponse { .. }) => {
                    warn!("{}: refresh incomplete: {err}", self.mac_addr);
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    pub(crate) async fn refresh_label(&self) -> Result<()> {
        let response = self
            .req_with_resp(Request::GetLabel, &[MessageKind::StateLabel])
            .await?;
        if let ResponsePayload::StateLabel { label } = response.payload {
            self.state.lock().await.label = Some(label);
        }
        Ok(())
    }

    pub(crate) async fn refresh_location(&self) -> Result<()> {
        let response = self
            .req_with_resp(Request::GetLocation, &[MessageKind::StateLocation])
            .await?;
        if let ResponsePayload::StateLocation { label, .. } = response.payload {
            self.state.lock().await.location = Some(label);
        }
        Ok(())
    }

    pub(crate) async fn refresh_group(&self) -> Result<()> {
        let response = self
            .req_with_resp(Request::GetGroup, &[MessageKind::StateGroup])
            .await?;
        if let ResponsePayload::StateGroup { label, .. } = response.payload {
            self.state.lock().await.group = Some(label);
        }
        Ok(())
    }

    pub(crate) async fn refresh_power(&self) -> Result<()> {
        let response = self
            .req_with_resp(Request::GetPower, &[MessageKind::StatePower])
            .await?;
        if let ResponsePayload::StatePower { level } = response.payload {
            self.state.lock().await.power_level = Some(PowerLevel::from_wire(level));
        }
        Ok(())
    }

    pub(crate) async fn refresh_host_firmware(&self) -> Result<()> {
        let response = self
            .req_with_resp(Request::GetHostFirmware, &[MessageKind::StateHostFirmware])
            .await?;
        if let ResponsePayload::StateHostFirmware {
            build_timestamp,
            version,
        } = response.payload
        {
            self.state.lock().await.host_firmware =
                Some(FirmwareInfo::from_wire(build_timestamp, version));
        }
        Ok(())
    }

    pub(crate) async fn refresh_wifi_firmware(&self) -> Result<()> {
        let response = self
            .req_with_resp(Request::GetWifiFirmware, &[MessageKind::StateWifiFirmware])
            .await?;
        if let ResponsePayload::StateWifiFirmware {
            build_timestamp,
            version,
        } = response.payload
        {
            self.state.lock().await.wifi_firmware =
                Some(FirmwareInfo::from_wire(build_timestamp, version));
        }
        Ok(())
    }

    pub(crate) async fn refresh_version_info(&self) -> Result<()> {
        let response = self
            .req_with_resp(Request::GetVersion, &[MessageKind::StateVersion])
            .await?;
        if let ResponsePayload::StateVersion {
            vendor,
            product,
            version,
        } = response.payload
        {
            self.state.lock().await.product = Some(ProductInfo {
                vendor,
                product,
                version,
            });
        }
        Ok(())
    }

    // ======================================================================
    // Product features, resolved lazily and at most once
    // ======================================================================

    /// Fetch version info only while the product id is still unresolved.
    async fn ensure_version_info(&self) -> Result<()> {
        if self.state.lock().await.product.is_none() {
            self.refresh_version_info().await?;
        }
        Ok(())
    }

    /// Capabilities of this device's product, resolving the product id over
    /// the network on first access and from cache afterwards.
    pub async fn features(&self) -> Result<ProductFeatures> {
        self.ensure_version_info().await?;
        let product = self.state.lock().await.product;
        Ok(product
            .map(|info| products::features(info.product))
            .unwrap_or(ProductFeatures::UNKNOWN))
    }

    pub async fn is_light(&self) -> Result<bool> {
        self.ensure_version_info().await?;
        let product = self.state.lock().await.product;
        Ok(product.is_some_and(|info| products::is_light(info.product)))
    }

    pub async fn supports_color(&self) -> Result<bool> {
        Ok(self.features().await?.color)
    }

    pub async fn supports_infrared(&self) -> Result<bool> {
        Ok(self.features().await?.infrared)
    }

    /// Whether the color temperature is adjustable at all.
    pub async fn supports_temperature(&self) -> Result<bool> {
        let features = self.features().await?;
        Ok(features.min_kelvin != features.max_kelvin)
    }

    pub async fn supports_multizone(&self) -> Result<bool> {
        Ok(self.features().await?.multizone)
    }

    pub async fn supports_chain(&self) -> Result<bool> {
        Ok(self.features().await?.chain)
    }

    // ======================================================================
    // Uncached getters
    // ======================================================================

    /// Radio state straight from the device, bypassing the cache.
    pub async fn wifi_info(&self) -> Result<WifiInfo> {
        let response = self
            .req_with_resp(Request::GetWifiInfo, &[MessageKind::StateWifiInfo])
            .await?;
        match response.payload {
            ResponsePayload::StateWifiInfo { signal, tx, rx } => Ok(WifiInfo { signal, tx, rx }),
            other => Err(Error::decode(format!("unexpected payload {other:?}"))),
        }
    }

    /// Device clock straight from the device, bypassing the cache.
    pub async fn time_info(&self) -> Result<TimeInfo> {
        let response = self
            .req_with_resp(Request::GetInfo, &[MessageKind::StateInfo])
            .await?;
        match response.payload {
            ResponsePayload::StateInfo {
                time,
                uptime,
                downtime,
            } => Ok(TimeInfo {
                time,
                uptime,
                downtime,
            }),
            other => Err(Error::decode(format!("unexpected payload {other:?}"))),
        }
    }

    // ======================================================================
    // Rendering
    // ======================================================================

    /// Diagnostics as JSON: identity plus the current cache snapshot.
    pub async fn diagnostics(&self) -> Value {
        let state = self.state().await;
        json!({
            "mac": self.mac_addr.to_string(),
            "source_id": self.source_id,
            "port": self.port,
            "service": service_name(self.service),
            "state": state,
        })
    }

    /// Human-readable summary of identity and cached state.
    pub async fn describe(&self) -> String {
        let state = self.state().await;
        let unknown = || "unknown".to_string();
        let mut s = format!("{}\n", state.label.clone().unwrap_or_else(unknown));
        s += &format!("  MAC Address: {}\n", self.mac_addr);
        s += &format!(
            "  IP Address: {}\n",
            state.ip_addr.map(|ip| ip.to_string()).unwrap_or_else(unknown)
        );
        s += &format!("  Port: {}\n", self.port);
        s += &format!("  Service: {}\n", service_name(self.service));
        s += &format!(
            "  Power: {}\n",
            state
                .power_level
                .map(|p| format!("{p:?}"))
                .unwrap_or_else(unknown)
        );
        s += &format!("  Location: {}\n", state.location.clone().unwrap_or_else(unknown));
        s += &format!("  Group: {}\n", state.group.clone().unwrap_or_else(unknown));
        if let Some(fw) = state.host_firmware {
            s += &format!("  Host Firmware: {fw} (built {})\n", fw.build_timestamp);
        }
        if let Some(fw) = state.wifi_firmware {
            s += &format!("  Wifi Firmware: {fw} (built {})\n", fw.build_timestamp);
        }
        if let Some(product) = state.product {
            s += &format!(
                "  Product: {} ({})\n",
                product.product,
                products::features(product.product).name
            );
            s += &format!("  Vendor: {}\n", products::vendor_name(product.vendor));
        }
        s
    }
}

/// Run operations on a bounded pool of spawned tasks and wait for all of
/// them, returning outcomes in completion order.
pub(crate) async fn join_all_bounded(
    ops: Vec<BoxFuture<'static, Result<()>>>,
    pool_size: usize,
) -> Vec<Result<()>> {
    let permits = Arc::new(Semaphore::new(pool_size));
    let mut tasks = JoinSet::new();
    for op in ops {
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            op.await
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {} // cancelled; nothing cancels these tasks
        }
    }
    results
}

/// Truncate to the 32-byte wire limit without splitting a character.
fn truncate_label(label: &str) -> String {
    let mut out = String::new();
    for ch in label.chars() {
        if out.len() + ch.len_utf8() > 32 {
            break;
        }
        out.push(ch);
    }
    out
}
