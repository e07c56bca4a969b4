//! # lifx_lan_rs
//!
//! An async Rust library for controlling LIFX smart lights over the LAN.
//!
//! This crate talks the LIFX binary UDP protocol directly to devices on
//! your local network, with no cloud account and no bridge. It turns unreliable,
//! unordered datagrams into request/response and fire-and-forget calls,
//! correlates replies among concurrently addressed devices, and caches the
//! more persistent device state so callers don't spam devices with packets.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use lifx_lan_rs::{Light, PowerLevel, colors, discover_devices};
//!
//! async fn turn_everything_blue() -> Result<(), lifx_lan_rs::Error> {
//!     for found in discover_devices(Duration::from_secs(5)).await? {
//!         let light = found.into_light();
//!         light.set_color(colors::BLUE, 500, false).await?;
//!         light.set_power(PowerLevel::On, 0, false).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Communication
//!
//! All communication happens over UDP on port 56700. A device is addressed
//! by mac; while its IP is unknown, requests go out to the configured
//! broadcast addresses and the IP is learned from the first verified
//! response. Requests are retried across attempt windows, and replies are
//! matched by message kind, client source id, and target address; the
//! protocol uses no sequence numbers.
//!
//! Lost replies surface as [`Error::NoResponse`]; a full
//! [`Device::refresh`] runs every per-field query concurrently on a
//! bounded pool and reports a single verdict while keeping whatever
//! partial updates succeeded.

mod device;
mod discovery;
mod errors;
mod light;
mod matcher;
mod message;
mod products;
mod transport;
mod types;
mod wire;

// Re-export public API
pub use device::{
    Device, DeviceState, FirmwareInfo, ProductInfo, TimeInfo, UDP_SERVICE, WifiInfo,
};
pub use discovery::{DiscoveredDevice, discover_devices, discover_with};
pub use errors::Error;
pub use light::Light;
pub use matcher::response_matches;
pub use message::{MessageKind, Request, Response, ResponsePayload, Waveform};
pub use products::{ProductFeatures, features as product_features, vendor_name};
pub use transport::{BroadcastTargets, DEFAULT_PORT, Datagram, Transport, UdpTransport};
pub use types::{ColorPower, DEFAULT_KELVIN, Hsbk, MacAddress, PowerLevel, colors};
pub use wire::{HEADER_SIZE, PROTOCOL_NUMBER, decode, encode};
