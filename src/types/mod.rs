//! Value types shared across the device API.

mod color;
mod mac;
mod power;

pub use color::{ColorPower, DEFAULT_KELVIN, Hsbk, colors};
pub use mac::MacAddress;
pub use power::PowerLevel;
