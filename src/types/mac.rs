//! Device hardware addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// A device mac address, normalized to lowercase colon-delimited form.
///
/// Parsing accepts any hex case; the bytes are normalized at construction,
/// so equality and hashing are case-insensitive.
///
/// # Example
///
/// ```
/// use lifx_lan_rs::MacAddress;
///
/// let a: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
/// let b: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "aa:bb:cc:dd:ee:ff");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The wildcard target a device may echo back when answering a
    /// broadcast-addressed request.
    pub const BROADCAST: MacAddress = MacAddress([0; 6]);

    /// Create a mac address from raw octets.
    pub const fn from_octets(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    /// The raw octets of this address.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Whether this is the broadcast sentinel address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts
                .next()
                .ok_or_else(|| Error::InvalidMacAddress(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| Error::InvalidMacAddress(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(Error::InvalidMacAddress(s.to_string()));
        }
        Ok(MacAddress(octets))
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Error> {
        s.parse()
    }
}
