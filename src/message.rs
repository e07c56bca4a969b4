//! Typed protocol messages.
//!
//! Every message the client sends or receives is represented by a dedicated
//! variant carrying its strongly-typed payload; the numeric wire codes live
//! in [`MessageKind`]. Binary framing is handled separately in [`crate::wire`].

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::types::{Hsbk, MacAddress, PowerLevel};

/// Wire codes for every message type the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, Serialize, Deserialize)]
pub enum MessageKind {
    GetService = 2,
    StateService = 3,
    GetHostFirmware = 14,
    StateHostFirmware = 15,
    GetWifiInfo = 16,
    StateWifiInfo = 17,
    GetWifiFirmware = 18,
    StateWifiFirmware = 19,
    GetPower = 20,
    SetPower = 21,
    StatePower = 22,
    GetLabel = 23,
    SetLabel = 24,
    StateLabel = 25,
    GetVersion = 32,
    StateVersion = 33,
    GetInfo = 34,
    StateInfo = 35,
    Acknowledgement = 45,
    GetLocation = 48,
    StateLocation = 50,
    GetGroup = 51,
    StateGroup = 53,
    LightGet = 101,
    LightSetColor = 102,
    LightSetWaveform = 103,
    LightState = 107,
    LightGetPower = 116,
    LightSetPower = 117,
    LightStatePower = 118,
    LightGetInfrared = 120,
    LightStateInfrared = 121,
    LightSetInfrared = 122,
}

impl MessageKind {
    /// Resolve a numeric wire code to a kind.
    pub fn from_code(code: u16) -> Option<Self> {
        MessageKind::iter().find(|kind| kind.code() == code)
    }

    pub fn code(&self) -> u16 {
        *self as u16
    }
}

/// Waveform shapes understood by [`Request::LightSetWaveform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Saw = 0,
    Sine = 1,
    HalfSine = 2,
    Triangle = 3,
    Pulse = 4,
}

/// An outbound message, one variant per kind, each with its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetService,
    GetHostFirmware,
    GetWifiInfo,
    GetWifiFirmware,
    GetPower,
    SetPower {
        level: PowerLevel,
    },
    GetLabel,
    SetLabel {
        label: String,
    },
    GetVersion,
    GetInfo,
    GetLocation,
    GetGroup,
    LightGet,
    LightSetColor {
        color: Hsbk,
        duration_ms: u32,
    },
    LightSetWaveform {
        transient: bool,
        color: Hsbk,
        period_ms: u32,
        cycles: f32,
        duty_cycle: i16,
        waveform: Waveform,
    },
    LightGetPower,
    LightSetPower {
        level: PowerLevel,
        duration_ms: u32,
    },
    LightGetInfrared,
    LightSetInfrared {
        brightness: u16,
    },
}

impl Request {
    pub fn kind(&self) -> MessageKind {
        match self {
            Request::GetService => MessageKind::GetService,
            Request::GetHostFirmware => MessageKind::GetHostFirmware,
            Request::GetWifiInfo => MessageKind::GetWifiInfo,
            Request::GetWifiFirmware => MessageKind::GetWifiFirmware,
            Request::GetPower => MessageKind::GetPower,
            Request::SetPower { .. } => MessageKind::SetPower,
            Request::GetLabel => MessageKind::GetLabel,
            Request::SetLabel { .. } => MessageKind::SetLabel,
            Request::GetVersion => MessageKind::GetVersion,
            Request::GetInfo => MessageKind::GetInfo,
            Request::GetLocation => MessageKind::GetLocation,
            Request::GetGroup => MessageKind::GetGroup,
            Request::LightGet => MessageKind::LightGet,
            Request::LightSetColor { .. } => MessageKind::LightSetColor,
            Request::LightSetWaveform { .. } => MessageKind::LightSetWaveform,
            Request::LightGetPower => MessageKind::LightGetPower,
            Request::LightSetPower { .. } => MessageKind::LightSetPower,
            Request::LightGetInfrared => MessageKind::LightGetInfrared,
            Request::LightSetInfrared { .. } => MessageKind::LightSetInfrared,
        }
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub kind: MessageKind,
    /// Correlation id echoed from the request.
    pub source_id: u32,
    /// The device the reply claims to come from; all-zero when the device
    /// answers a broadcast-addressed request with the wildcard target.
    pub target: MacAddress,
    pub payload: ResponsePayload,
}

/// Typed payloads for inbound messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Acknowledgement,
    StateService {
        service: u8,
        port: u32,
    },
    StateHostFirmware {
        build_timestamp: u64,
        version: u32,
    },
    StateWifiInfo {
        signal: f32,
        tx: u32,
        rx: u32,
    },
    StateWifiFirmware {
        build_timestamp: u64,
        version: u32,
    },
    StatePower {
        level: u16,
    },
    StateLabel {
        label: String,
    },
    StateVersion {
        vendor: u32,
        product: u32,
        version: u32,
    },
    StateInfo {
        time: u64,
        uptime: u64,
        downtime: u64,
    },
    StateLocation {
        location: [u8; 16],
        label: String,
        updated_at: u64,
    },
    StateGroup {
        group: [u8; 16],
        label: String,
        updated_at: u64,
    },
    LightState {
        color: Hsbk,
        power: u16,
        label: String,
    },
    LightStatePower {
        level: u16,
    },
    LightStateInfrared {
        brightness: u16,
    },
}
