//! Power level for device control.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Power state for a device.
///
/// Devices report power as a `u16`, but the meaningful domain is binary.
/// Several historical synonyms are accepted when setting power: `0`, `1`,
/// `65535`, the strings `"on"`/`"off"`/`"true"`/`"false"`, and `bool`.
/// Anything else is rejected before any network I/O happens.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PowerLevel {
    /// Device is powered on
    On,
    /// Device is powered off
    Off,
}

impl PowerLevel {
    /// Wire representation: full-scale for on, zero for off.
    pub const fn to_wire(self) -> u16 {
        match self {
            PowerLevel::On => u16::MAX,
            PowerLevel::Off => 0,
        }
    }

    /// Interpret a reported power value. Devices mid-transition may report
    /// intermediate levels; any non-zero value counts as on.
    pub const fn from_wire(raw: u16) -> Self {
        if raw == 0 {
            PowerLevel::Off
        } else {
            PowerLevel::On
        }
    }
}

impl From<bool> for PowerLevel {
    fn from(on: bool) -> Self {
        if on { PowerLevel::On } else { PowerLevel::Off }
    }
}

impl TryFrom<u16> for PowerLevel {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Error> {
        match value {
            0 => Ok(PowerLevel::Off),
            1 | u16::MAX => Ok(PowerLevel::On),
            other => Err(Error::InvalidPowerValue(other.to_string())),
        }
    }
}

impl FromStr for PowerLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "65535" => Ok(PowerLevel::On),
            "off" | "false" | "0" => Ok(PowerLevel::Off),
            other => Err(Error::InvalidPowerValue(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_synonyms() {
        assert_eq!(PowerLevel::try_from(0u16).unwrap(), PowerLevel::Off);
        assert_eq!(PowerLevel::try_from(1u16).unwrap(), PowerLevel::On);
        assert_eq!(PowerLevel::try_from(65535u16).unwrap(), PowerLevel::On);
        assert!(PowerLevel::try_from(2u16).is_err());
        assert!(PowerLevel::try_from(30000u16).is_err());
    }

    #[test]
    fn test_string_synonyms() {
        assert_eq!("on".parse::<PowerLevel>().unwrap(), PowerLevel::On);
        assert_eq!("OFF".parse::<PowerLevel>().unwrap(), PowerLevel::Off);
        assert_eq!("true".parse::<PowerLevel>().unwrap(), PowerLevel::On);
        assert_eq!("65535".parse::<PowerLevel>().unwrap(), PowerLevel::On);
        assert!("dim".parse::<PowerLevel>().is_err());
    }

    #[test]
    fn test_wire_round_trip() {
        assert_eq!(PowerLevel::On.to_wire(), 65535);
        assert_eq!(PowerLevel::Off.to_wire(), 0);
        assert_eq!(PowerLevel::from_wire(65535), PowerLevel::On);
        // A light dimming its relay mid-transition still reads as on.
        assert_eq!(PowerLevel::from_wire(1), PowerLevel::On);
        assert_eq!(PowerLevel::from_wire(0), PowerLevel::Off);
    }
}
