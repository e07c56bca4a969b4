//! Binary framing for the LIFX LAN protocol.
//!
//! # Frame layout
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┬─────────────────────┬─────────┐
//! │        Frame         │      Frame address       │   Protocol header   │ Payload │
//! │ size u16 · flags u16 │ target 8B · reserved 6B  │ reserved u64        │         │
//! │ source u32           │ flags u8 · sequence u8   │ type u16 · res. u16 │ N bytes │
//! └──────────────────────┴──────────────────────────┴─────────────────────┴─────────┘
//! ```
//!
//! All multi-byte values are little-endian. The frame flags pack the
//! protocol number (1024) in the low 12 bits plus the `addressable` and
//! `tagged` bits. The sequence byte is always zero: replies are correlated
//! by message kind, source id, and target address alone.

use bytes::{Buf, BufMut, BytesMut};

use crate::errors::Error;
use crate::message::{MessageKind, Request, Response, ResponsePayload};
use crate::types::{Hsbk, MacAddress};

type Result<T> = std::result::Result<T, Error>;

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 36;

/// Protocol number carried in the low 12 bits of the frame flags
pub const PROTOCOL_NUMBER: u16 = 1024;

const ADDRESSABLE: u16 = 1 << 12;
const TAGGED: u16 = 1 << 13;

const RESPONSE_REQUIRED: u8 = 1;
const ACK_REQUIRED: u8 = 1 << 1;

/// Length of fixed-size label fields, NUL-padded on the wire.
const LABEL_LEN: usize = 32;

/// Encode an outbound request into a complete frame.
///
/// The sequence number is always zero. `tagged` is set when targeting the
/// broadcast sentinel so that every device on the segment processes the
/// frame.
pub fn encode(
    request: &Request,
    target: MacAddress,
    source_id: u32,
    ack_requested: bool,
    response_requested: bool,
) -> BytesMut {
    let payload = encode_request_payload(request);
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());

    // Frame
    buf.put_u16_le((HEADER_SIZE + payload.len()) as u16);
    let mut frame_flags = PROTOCOL_NUMBER | ADDRESSABLE;
    if target.is_broadcast() {
        frame_flags |= TAGGED;
    }
    buf.put_u16_le(frame_flags);
    buf.put_u32_le(source_id);

    // Frame address
    buf.put_slice(&target.octets());
    buf.put_slice(&[0u8; 2]);
    buf.put_slice(&[0u8; 6]);
    let mut addr_flags = 0u8;
    if response_requested {
        addr_flags |= RESPONSE_REQUIRED;
    }
    if ack_requested {
        addr_flags |= ACK_REQUIRED;
    }
    buf.put_u8(addr_flags);
    buf.put_u8(0); // sequence

    // Protocol header
    buf.put_u64_le(0);
    buf.put_u16_le(request.kind().code());
    buf.put_u16_le(0);

    buf.put_slice(&payload);
    buf
}

fn encode_request_payload(request: &Request) -> BytesMut {
    let mut buf = BytesMut::new();
    match request {
        Request::SetPower { level } => {
            buf.put_u16_le(level.to_wire());
        }
        Request::SetLabel { label } => {
            put_label(&mut buf, label);
        }
        Request::LightSetColor { color, duration_ms } => {
            buf.put_u8(0);
            put_hsbk(&mut buf, color);
            buf.put_u32_le(*duration_ms);
        }
        Request::LightSetWaveform {
            transient,
            color,
            period_ms,
            cycles,
            duty_cycle,
            waveform,
        } => {
            buf.put_u8(0);
            buf.put_u8(*transient as u8);
            put_hsbk(&mut buf, color);
            buf.put_u32_le(*period_ms);
            buf.put_f32_le(*cycles);
            buf.put_i16_le(*duty_cycle);
            buf.put_u8(*waveform as u8);
        }
        Request::LightSetPower { level, duration_ms } => {
            buf.put_u16_le(level.to_wire());
            buf.put_u32_le(*duration_ms);
        }
        Request::LightSetInfrared { brightness } => {
            buf.put_u16_le(*brightness);
        }
        // Get messages carry no payload.
        Request::GetService
        | Request::GetHostFirmware
        | Request::GetWifiInfo
        | Request::GetWifiFirmware
        | Request::GetPower
        | Request::GetLabel
        | Request::GetVersion
        | Request::GetInfo
        | Request::GetLocation
        | Request::GetGroup
        | Request::LightGet
        | Request::LightGetPower
        | Request::LightGetInfrared => {}
    }
    buf
}

/// Decode an inbound datagram into a typed [`Response`].
///
/// Truncated frames, wrong protocol numbers, unknown message kinds, and
/// client-bound kinds (a `Get`/`Set` can never arrive here) are all decode
/// errors; the reliability engine discards such datagrams.
pub fn decode(data: &[u8]) -> Result<Response> {
    if data.len() < HEADER_SIZE {
        return Err(Error::decode(format!("frame too short: {} bytes", data.len())));
    }

    let mut buf = data;

    // Frame
    let size = buf.get_u16_le() as usize;
    if size > data.len() {
        return Err(Error::decode(format!(
            "declared size {size} exceeds datagram length {}",
            data.len()
        )));
    }
    let frame_flags = buf.get_u16_le();
    if frame_flags & 0x0fff != PROTOCOL_NUMBER {
        return Err(Error::decode(format!(
            "unexpected protocol number {}",
            frame_flags & 0x0fff
        )));
    }
    let source_id = buf.get_u32_le();

    // Frame address
    let mut target_bytes = [0u8; 6];
    buf.copy_to_slice(&mut target_bytes);
    buf.advance(2 + 6 + 1 + 1); // target padding, reserved, flags, sequence
    let target = MacAddress::from_octets(target_bytes);

    // Protocol header
    buf.advance(8);
    let code = buf.get_u16_le();
    buf.advance(2);

    let kind = MessageKind::from_code(code).ok_or(Error::UnknownMessageType(code))?;
    let payload = decode_response_payload(kind, &mut buf)?;

    Ok(Response {
        kind,
        source_id,
        target,
        payload,
    })
}

fn decode_response_payload(kind: MessageKind, buf: &mut &[u8]) -> Result<ResponsePayload> {
    let payload = match kind {
        MessageKind::Acknowledgement => ResponsePayload::Acknowledgement,
        MessageKind::StateService => {
            ensure_remaining(buf, 5, kind)?;
            ResponsePayload::StateService {
                service: buf.get_u8(),
                port: buf.get_u32_le(),
            }
        }
        MessageKind::StateHostFirmware | MessageKind::StateWifiFirmware => {
            ensure_remaining(buf, 20, kind)?;
            let build_timestamp = buf.get_u64_le();
            buf.advance(8); // reserved
            let version = buf.get_u32_le();
            if kind == MessageKind::StateHostFirmware {
                ResponsePayload::StateHostFirmware {
                    build_timestamp,
                    version,
                }
            } else {
                ResponsePayload::StateWifiFirmware {
                    build_timestamp,
                    version,
                }
            }
        }
        MessageKind::StateWifiInfo => {
            ensure_remaining(buf, 12, kind)?;
            ResponsePayload::StateWifiInfo {
                signal: buf.get_f32_le(),
                tx: buf.get_u32_le(),
                rx: buf.get_u32_le(),
            }
        }
        MessageKind::StatePower => {
            ensure_remaining(buf, 2, kind)?;
            ResponsePayload::StatePower {
                level: buf.get_u16_le(),
            }
        }
        MessageKind::StateLabel => {
            ensure_remaining(buf, LABEL_LEN, kind)?;
            ResponsePayload::StateLabel {
                label: get_label(buf),
            }
        }
        MessageKind::StateVersion => {
            ensure_remaining(buf, 12, kind)?;
            ResponsePayload::StateVersion {
                vendor: buf.get_u32_le(),
                product: buf.get_u32_le(),
                version: buf.get_u32_le(),
            }
        }
        MessageKind::StateInfo => {
            ensure_remaining(buf, 24, kind)?;
            ResponsePayload::StateInfo {
                time: buf.get_u64_le(),
                uptime: buf.get_u64_le(),
                downtime: buf.get_u64_le(),
            }
        }
        MessageKind::StateLocation | MessageKind::StateGroup => {
            ensure_remaining(buf, 16 + LABEL_LEN + 8, kind)?;
            let mut id = [0u8; 16];
            buf.copy_to_slice(&mut id);
            let label = get_label(buf);
            let updated_at = buf.get_u64_le();
            if kind == MessageKind::StateLocation {
                ResponsePayload::StateLocation {
                    location: id,
                    label,
                    updated_at,
                }
            } else {
                ResponsePayload::StateGroup {
                    group: id,
                    label,
                    updated_at,
                }
            }
        }
        MessageKind::LightState => {
            ensure_remaining(buf, 8 + 2 + 2 + LABEL_LEN + 8, kind)?;
            let color = get_hsbk(buf);
            buf.advance(2); // reserved
            let power = buf.get_u16_le();
            let label = get_label(buf);
            buf.advance(8); // reserved
            ResponsePayload::LightState {
                color,
                power,
                label,
            }
        }
        MessageKind::LightStatePower => {
            ensure_remaining(buf, 2, kind)?;
            ResponsePayload::LightStatePower {
                level: buf.get_u16_le(),
            }
        }
        MessageKind::LightStateInfrared => {
            ensure_remaining(buf, 2, kind)?;
            ResponsePayload::LightStateInfrared {
                brightness: buf.get_u16_le(),
            }
        }
        other => {
            return Err(Error::decode(format!(
                "{other} is not a device response"
            )));
        }
    };
    Ok(payload)
}

fn ensure_remaining(buf: &[u8], needed: usize, kind: MessageKind) -> Result<()> {
    if buf.len() < needed {
        return Err(Error::decode(format!(
            "truncated {kind} payload: {} of {needed} bytes",
            buf.len()
        )));
    }
    Ok(())
}

fn put_hsbk(buf: &mut BytesMut, color: &Hsbk) {
    buf.put_u16_le(color.hue);
    buf.put_u16_le(color.saturation);
    buf.put_u16_le(color.brightness);
    buf.put_u16_le(color.kelvin);
}

fn get_hsbk(buf: &mut &[u8]) -> Hsbk {
    Hsbk {
        hue: buf.get_u16_le(),
        saturation: buf.get_u16_le(),
        brightness: buf.get_u16_le(),
        kelvin: buf.get_u16_le(),
    }
}

fn put_label(buf: &mut BytesMut, label: &str) {
    let bytes = label.as_bytes();
    let len = bytes.len().min(LABEL_LEN);
    buf.put_slice(&bytes[..len]);
    buf.put_bytes(0, LABEL_LEN - len);
}

fn get_label(buf: &mut &[u8]) -> String {
    let mut raw = [0u8; LABEL_LEN];
    buf.copy_to_slice(&mut raw);
    let end = raw.iter().position(|&b| b == 0).unwrap_or(LABEL_LEN);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Frame fabrication for tests: builds the device-side encoding of a
/// [`Response`] so engine tests can script inbound datagrams.
#[cfg(test)]
pub(crate) fn encode_response(response: &Response) -> Vec<u8> {
    let mut payload = BytesMut::new();
    match &response.payload {
        ResponsePayload::Acknowledgement => {}
        ResponsePayload::StateService { service, port } => {
            payload.put_u8(*service);
            payload.put_u32_le(*port);
        }
        ResponsePayload::StateHostFirmware {
            build_timestamp,
            version,
        }
        | ResponsePayload::StateWifiFirmware {
            build_timestamp,
            version,
        } => {
            payload.put_u64_le(*build_timestamp);
            payload.put_u64_le(0);
            payload.put_u32_le(*version);
        }
        ResponsePayload::StateWifiInfo { signal, tx, rx } => {
            payload.put_f32_le(*signal);
            payload.put_u32_le(*tx);
            payload.put_u32_le(*rx);
        }
        ResponsePayload::StatePower { level } | ResponsePayload::LightStatePower { level } => {
            payload.put_u16_le(*level);
        }
        ResponsePayload::StateLabel { label } => {
            put_label(&mut payload, label);
        }
        ResponsePayload::StateVersion {
            vendor,
            product,
            version,
        } => {
            payload.put_u32_le(*vendor);
            payload.put_u32_le(*product);
            payload.put_u32_le(*version);
        }
        ResponsePayload::StateInfo {
            time,
            uptime,
            downtime,
        } => {
            payload.put_u64_le(*time);
            payload.put_u64_le(*uptime);
            payload.put_u64_le(*downtime);
        }
        ResponsePayload::StateLocation {
            location: id,
            label,
            updated_at,
        }
        | ResponsePayload::StateGroup {
            group: id,
            label,
            updated_at,
        } => {
            payload.put_slice(id);
            put_label(&mut payload, label);
            payload.put_u64_le(*updated_at);
        }
        ResponsePayload::LightState {
            color,
            power,
            label,
        } => {
            put_hsbk(&mut payload, color);
            payload.put_i16_le(0);
            payload.put_u16_le(*power);
            put_label(&mut payload, label);
            payload.put_u64_le(0);
        }
        ResponsePayload::LightStateInfrared { brightness } => {
            payload.put_u16_le(*brightness);
        }
    }

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_u16_le((HEADER_SIZE + payload.len()) as u16);
    buf.put_u16_le(PROTOCOL_NUMBER | ADDRESSABLE);
    buf.put_u32_le(response.source_id);
    buf.put_slice(&response.target.octets());
    buf.put_slice(&[0u8; 2]);
    buf.put_slice(&[0u8; 6]);
    buf.put_u8(0);
    buf.put_u8(0);
    buf.put_u64_le(0);
    buf.put_u16_le(response.kind.code());
    buf.put_u16_le(0);
    buf.put_slice(&payload);
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PowerLevel;

    fn mac() -> MacAddress {
        "d0:73:d5:01:02:03".parse().unwrap()
    }

    #[test]
    fn test_encoded_header_fields() {
        let frame = encode(&Request::GetLabel, mac(), 0xdeadbeef, false, true);
        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(u16::from_le_bytes([frame[0], frame[1]]), HEADER_SIZE as u16);
        // protocol 1024 + addressable, not tagged for a unicast target
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 0x1400);
        assert_eq!(
            u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]),
            0xdeadbeef
        );
        assert_eq!(&frame[8..14], &mac().octets());
        // sequence is always zero
        assert_eq!(frame[23], 0);
        assert_eq!(
            u16::from_le_bytes([frame[32], frame[33]]),
            MessageKind::GetLabel.code()
        );
    }

    #[test]
    fn test_broadcast_target_sets_tagged() {
        let frame = encode(&Request::GetService, MacAddress::BROADCAST, 7, false, true);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 0x3400);
    }

    #[test]
    fn test_ack_and_response_flags() {
        let ack = encode(
            &Request::SetPower {
                level: PowerLevel::On,
            },
            mac(),
            1,
            true,
            false,
        );
        assert_eq!(ack[22], 0b10);

        let resp = encode(&Request::GetPower, mac(), 1, false, true);
        assert_eq!(resp[22], 0b01);
    }

    #[test]
    fn test_set_power_payload() {
        let frame = encode(
            &Request::SetPower {
                level: PowerLevel::On,
            },
            mac(),
            1,
            true,
            false,
        );
        assert_eq!(frame.len(), HEADER_SIZE + 2);
        assert_eq!(u16::from_le_bytes([frame[36], frame[37]]), 65535);
    }

    #[test]
    fn test_decode_round_trip() {
        let original = Response {
            kind: MessageKind::StateLabel,
            source_id: 42,
            target: mac(),
            payload: ResponsePayload::StateLabel {
                label: "Kitchen".to_string(),
            },
        };
        let decoded = decode(&encode_response(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_light_state_round_trip() {
        let original = Response {
            kind: MessageKind::LightState,
            source_id: 9,
            target: mac(),
            payload: ResponsePayload::LightState {
                color: Hsbk::new(1000, 2000, 3000, 3500),
                power: 65535,
                label: "Lamp".to_string(),
            },
        };
        let decoded = decode(&encode_response(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_short_frames() {
        assert!(decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let mut frame = encode_response(&Response {
            kind: MessageKind::Acknowledgement,
            source_id: 1,
            target: mac(),
            payload: ResponsePayload::Acknowledgement,
        });
        // overwrite the type field with an unassigned code
        frame[32] = 0xff;
        frame[33] = 0x7f;
        assert!(matches!(
            decode(&frame),
            Err(Error::UnknownMessageType(0x7fff))
        ));
    }

    #[test]
    fn test_decode_rejects_client_bound_kind() {
        let frame = encode(&Request::GetLabel, mac(), 1, false, true);
        assert!(matches!(decode(&frame), Err(Error::Decode(_))));
    }

    #[test]
    fn test_label_truncation_on_encode() {
        let long = "x".repeat(48);
        let frame = encode(&Request::SetLabel { label: long }, mac(), 1, true, false);
        assert_eq!(frame.len(), HEADER_SIZE + 32);
    }
}
