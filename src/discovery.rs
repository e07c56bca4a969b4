//! Device discovery via UDP broadcast.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::time::{Instant, timeout};

use crate::device::{Device, random_source_id};
use crate::errors::Error;
use crate::light::Light;
use crate::message::{Request, ResponsePayload};
use crate::transport::{self, BroadcastTargets, DEFAULT_PORT, Transport, UdpTransport};
use crate::types::MacAddress;
use crate::wire;

type Result<T> = std::result::Result<T, Error>;

/// A LIFX device that answered a discovery broadcast.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub mac_addr: MacAddress,
    pub ip_addr: Ipv4Addr,
    pub port: u16,
    pub service: u8,
}

impl DiscoveredDevice {
    /// Convert this discovered device into a [`Device`] instance.
    pub fn into_device(self) -> Device {
        Device::new(self.mac_addr, Some(self.ip_addr)).with_port(self.port)
    }

    /// Convert this discovered device into a [`Light`] instance.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let devices = discover_devices(Duration::from_secs(5)).await?;
    /// for found in devices {
    ///     let light = found.into_light();
    /// }
    /// ```
    pub fn into_light(self) -> Light {
        Light::from_device(self.into_device())
    }
}

/// Discover LIFX devices on the local network using UDP broadcast.
///
/// Sends a service discovery broadcast and collects responses from all
/// devices within the timeout period.
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
/// use lifx_lan_rs::discover_devices;
///
/// let devices = discover_devices(Duration::from_secs(5)).await?;
/// println!("Found {} devices", devices.len());
/// for found in devices {
///     println!("  {} - {}", found.mac_addr, found.ip_addr);
/// }
/// ```
pub async fn discover_devices(discovery_timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
    discover_with(
        Arc::new(UdpTransport),
        BroadcastTargets::default(),
        discovery_timeout,
    )
    .await
}

/// Discovery with an explicit transport and broadcast configuration.
pub async fn discover_with(
    transport: Arc<dyn Transport>,
    broadcast: BroadcastTargets,
    discovery_timeout: Duration,
) -> Result<Vec<DiscoveredDevice>> {
    let source_id = random_source_id();
    let frame = wire::encode(
        &Request::GetService,
        MacAddress::BROADCAST,
        source_id,
        false,
        true,
    );
    let socket = transport
        .open()
        .await
        .map_err(|e| Error::socket("open", e))?;
    transport::send_frame(socket.as_ref(), &frame, None, DEFAULT_PORT, &broadcast).await?;

    let mut discovered: HashMap<MacAddress, DiscoveredDevice> = HashMap::new();
    let deadline = Instant::now() + discovery_timeout;
    let mut buf = [0u8; 1024];

    loop {
        let remaining = deadline - Instant::now();
        if remaining.is_zero() {
            break;
        }
        let (len, addr) = match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => return Err(Error::socket("recv_from", e)),
            Err(_) => break,
        };
        let response = match wire::decode(&buf[..len]) {
            Ok(response) => response,
            Err(e) => {
                debug!("discovery: discarding datagram from {addr}: {e}");
                continue;
            }
        };
        // Replies to another client's concurrent discovery are not ours.
        if response.source_id != source_id {
            continue;
        }
        let ResponsePayload::StateService { service, port } = response.payload else {
            continue;
        };
        let SocketAddr::V4(v4) = addr else {
            continue;
        };
        debug!(
            "discovery: {} at {} (service {service}, port {port})",
            response.target,
            v4.ip()
        );
        discovered.insert(
            response.target,
            DiscoveredDevice {
                mac_addr: response.target,
                ip_addr: *v4.ip(),
                port: port as u16,
                service,
            },
        );
    }

    Ok(discovered.into_values().collect())
}
