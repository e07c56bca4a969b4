//! UDP transport primitives.
//!
//! The transport layer is a pure send/receive primitive: no retries, no
//! correlation. Each logical call opens its own short-lived socket so
//! concurrent operations never read each other's replies; the socket is
//! released when the box drops, on every exit path.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use log::trace;
use tokio::net::UdpSocket;

use crate::errors::Error;

/// Default LIFX LAN protocol port.
pub const DEFAULT_PORT: u16 = 56700;

/// The broadcast addresses used to reach devices whose IP is unknown.
///
/// Built once at startup and treated as immutable configuration from then
/// on. The default is the limited-broadcast address; callers on multi-homed
/// hosts can pass the subnet broadcast address of each non-loopback IPv4
/// interface instead (interface enumeration is left to the caller).
#[derive(Debug, Clone)]
pub struct BroadcastTargets {
    addrs: Arc<Vec<Ipv4Addr>>,
}

impl BroadcastTargets {
    pub fn new(addrs: Vec<Ipv4Addr>) -> Self {
        Self {
            addrs: Arc::new(addrs),
        }
    }

    pub fn addrs(&self) -> &[Ipv4Addr] {
        &self.addrs
    }
}

impl Default for BroadcastTargets {
    fn default() -> Self {
        Self::new(vec![Ipv4Addr::BROADCAST])
    }
}

/// One bound datagram socket.
#[async_trait]
pub trait Datagram: Send + Sync {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl Datagram for UdpSocket {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// Factory for per-call sockets.
///
/// The seam exists so the reliability engine can be driven by a scripted
/// fake in tests; production code uses [`UdpTransport`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a fresh socket for one logical call.
    async fn open(&self) -> io::Result<Box<dyn Datagram>>;
}

/// Real UDP transport: ephemeral local port, broadcast enabled.
#[derive(Debug, Default)]
pub struct UdpTransport;

#[async_trait]
impl Transport for UdpTransport {
    async fn open(&self) -> io::Result<Box<dyn Datagram>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;
        Ok(Box::new(socket))
    }
}

/// Send one frame: unicast when the device's IP is known, otherwise once
/// per configured broadcast address.
pub(crate) async fn send_frame(
    socket: &dyn Datagram,
    frame: &[u8],
    ip_addr: Option<Ipv4Addr>,
    port: u16,
    broadcast: &BroadcastTargets,
) -> Result<(), Error> {
    match ip_addr {
        Some(ip) => {
            trace!("send {} bytes to {ip}:{port}", frame.len());
            socket
                .send_to(frame, SocketAddr::from((ip, port)))
                .await
                .map_err(|e| Error::socket("send_to", e))?;
        }
        None => {
            for &ip in broadcast.addrs() {
                trace!("send {} bytes to broadcast {ip}:{port}", frame.len());
                socket
                    .send_to(frame, SocketAddr::from((ip, port)))
                    .await
                    .map_err(|e| Error::socket("send_to", e))?;
            }
        }
    }
    Ok(())
}

/// Scripted in-memory transport for engine tests.
///
/// Responders are keyed by request message code. Every `send_to` records
/// the outbound frame; when a responder is registered for the frame's
/// code, the scripted reply lands in the sending socket's own inbox, the
/// same isolation a real per-call UDP socket gives. A socket with an empty
/// inbox blocks forever on receive so the engine's timeout paths fire.
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, VecDeque};
    use std::io;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{DEFAULT_PORT, Datagram, Transport};
    use crate::message::{MessageKind, Response};
    use crate::wire;

    struct Template {
        response: Response,
        /// Patch the reply's source id to echo the request's, the way a
        /// real device does. Disabled to simulate another client's reply.
        echo_source: bool,
    }

    #[derive(Default)]
    struct FakeInner {
        responders: Mutex<HashMap<u16, Template>>,
        sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeTransport {
        inner: Arc<FakeInner>,
    }

    impl FakeTransport {
        /// Address every scripted reply appears to come from.
        pub(crate) const DEVICE_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn handle(&self) -> Arc<dyn Transport> {
            Arc::new(self.clone())
        }

        /// Reply to every request of the given kind, echoing its source id.
        pub(crate) fn respond_to(&self, request: MessageKind, response: Response) {
            self.insert(request, response, true);
        }

        /// Reply with the response exactly as given, source id included.
        pub(crate) fn respond_to_fixed(&self, request: MessageKind, response: Response) {
            self.insert(request, response, false);
        }

        fn insert(&self, request: MessageKind, response: Response, echo_source: bool) {
            self.inner.responders.lock().unwrap().insert(
                request.code(),
                Template {
                    response,
                    echo_source,
                },
            );
        }

        pub(crate) fn remove_responder(&self, request: MessageKind) {
            self.inner
                .responders
                .lock()
                .unwrap()
                .remove(&request.code());
        }

        pub(crate) fn sent_count(&self) -> usize {
            self.inner.sent.lock().unwrap().len()
        }

        pub(crate) fn sent_frames(&self) -> Vec<Vec<u8>> {
            self.inner
                .sent
                .lock()
                .unwrap()
                .iter()
                .map(|(frame, _)| frame.clone())
                .collect()
        }

        pub(crate) fn sent_addrs(&self) -> Vec<SocketAddr> {
            self.inner
                .sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, addr)| *addr)
                .collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn open(&self) -> io::Result<Box<dyn Datagram>> {
            Ok(Box::new(FakeDatagram {
                inner: Arc::clone(&self.inner),
                inbox: Mutex::new(VecDeque::new()),
            }))
        }
    }

    struct FakeDatagram {
        inner: Arc<FakeInner>,
        inbox: Mutex<VecDeque<Vec<u8>>>,
    }

    #[async_trait]
    impl Datagram for FakeDatagram {
        async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
            self.inner
                .sent
                .lock()
                .unwrap()
                .push((buf.to_vec(), addr));

            // request header: source id at 4..8, message code at 32..34
            if buf.len() >= wire::HEADER_SIZE {
                let source_id = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
                let code = u16::from_le_bytes([buf[32], buf[33]]);
                if let Some(template) = self.inner.responders.lock().unwrap().get(&code) {
                    let mut response = template.response.clone();
                    if template.echo_source {
                        response.source_id = source_id;
                    }
                    self.inbox
                        .lock()
                        .unwrap()
                        .push_back(wire::encode_response(&response));
                }
            }
            Ok(buf.len())
        }

        async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let next = self.inbox.lock().unwrap().pop_front();
            match next {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok((len, SocketAddr::from((FakeTransport::DEVICE_IP, DEFAULT_PORT))))
                }
                None => std::future::pending::<io::Result<(usize, SocketAddr)>>().await,
            }
        }
    }
}
