use std::io;

use crate::message::MessageKind;
use crate::types::MacAddress;

/// All error types that can occur when interacting with LIFX devices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No matching reply arrived after exhausting every attempt's timeout
    /// budget. Recoverable; the device may simply be offline or lossy.
    #[error("no {expected:?} from {mac_addr} in response to {request}")]
    NoResponse {
        request: MessageKind,
        mac_addr: MacAddress,
        expected: Vec<MessageKind>,
    },

    /// A network socket operation failed while communicating with a device.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: io::Error },

    /// The requested power value is not one of the accepted on/off synonyms.
    #[error("invalid power value: {0}")]
    InvalidPowerValue(String),

    /// An inbound datagram carried a message type this client does not know.
    #[error("unknown message type {0}")]
    UnknownMessageType(u16),

    /// An inbound datagram could not be decoded as a LIFX frame.
    #[error("failed to decode frame: {0}")]
    Decode(String),

    /// A mac address string could not be parsed.
    #[error("invalid mac address: {0}")]
    InvalidMacAddress(String),

    /// Discovery finished without hearing from any device.
    #[error("no devices discovered on the local network")]
    NoDevices,
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Error::Decode(reason.into())
    }

    /// Create a new no-response error
    pub fn no_response(request: MessageKind, mac_addr: MacAddress, expected: &[MessageKind]) -> Self {
        Error::NoResponse {
            request,
            mac_addr,
            expected: expected.to_vec(),
        }
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
