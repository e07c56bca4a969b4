//! Response correlation.

use crate::message::{MessageKind, Response};
use crate::types::MacAddress;

/// Decide whether an inbound response answers an outstanding request.
///
/// A match requires all three of:
/// - the decoded kind is one of the expected kinds,
/// - the echoed source id is this client's source id,
/// - the target is this device's mac, or the broadcast sentinel a device
///   may echo when replying to a broadcast-addressed request.
///
/// Everything else on the socket fails the predicate and is discarded by
/// the caller, such as replies meant for another client or replies from
/// other devices answering the same broadcast.
pub fn response_matches(
    response: &Response,
    expected: &[MessageKind],
    source_id: u32,
    mac_addr: MacAddress,
) -> bool {
    expected.contains(&response.kind)
        && response.source_id == source_id
        && (response.target == mac_addr || response.target.is_broadcast())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ResponsePayload;

    const SOURCE: u32 = 0x1234;

    fn mac() -> MacAddress {
        "d0:73:d5:aa:bb:cc".parse().unwrap()
    }

    fn state_power(source_id: u32, target: MacAddress) -> Response {
        Response {
            kind: MessageKind::StatePower,
            source_id,
            target,
            payload: ResponsePayload::StatePower { level: 65535 },
        }
    }

    #[test]
    fn test_accepts_exact_match() {
        let resp = state_power(SOURCE, mac());
        assert!(response_matches(
            &resp,
            &[MessageKind::StatePower],
            SOURCE,
            mac()
        ));
    }

    #[test]
    fn test_accepts_broadcast_sentinel_target() {
        let resp = state_power(SOURCE, MacAddress::BROADCAST);
        assert!(response_matches(
            &resp,
            &[MessageKind::StatePower],
            SOURCE,
            mac()
        ));
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let resp = state_power(SOURCE, mac());
        assert!(!response_matches(
            &resp,
            &[MessageKind::StateLabel],
            SOURCE,
            mac()
        ));
    }

    #[test]
    fn test_rejects_foreign_source_id() {
        // another client's concurrent request echoes its own source id
        let resp = state_power(SOURCE + 1, mac());
        assert!(!response_matches(
            &resp,
            &[MessageKind::StatePower],
            SOURCE,
            mac()
        ));
    }

    #[test]
    fn test_rejects_other_device() {
        let other = "d0:73:d5:00:00:01".parse().unwrap();
        let resp = state_power(SOURCE, other);
        assert!(!response_matches(
            &resp,
            &[MessageKind::StatePower],
            SOURCE,
            mac()
        ));
    }

    #[test]
    fn test_accepts_any_expected_kind() {
        let resp = state_power(SOURCE, mac());
        assert!(response_matches(
            &resp,
            &[MessageKind::Acknowledgement, MessageKind::StatePower],
            SOURCE,
            mac()
        ));
    }
}
