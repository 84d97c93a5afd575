fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use segstore_engine::{SegmentMessage, checksum_bytes};
    use segstore_protocol::messages::{InfoResponse, StoreSegmentRequest, StoreSegmentResponse};
    use segstore_protocol::{Message, MessageType, StoreResult, encode_frame, parse_frame};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Reads a fixture file as text.
    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        // Parse from text: envelope payloads are `RawValue`, which cannot be
        // deserialized from a `Value`.
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    // --- Segment request headers ---

    #[test]
    fn fixture_store_segment_first() {
        let req: StoreSegmentRequest = roundtrip_test("store_segment_first.json");
        let msg = SegmentMessage::from_request(&req).unwrap();
        assert_eq!(msg, SegmentMessage::first("a.txt"));
    }

    #[test]
    fn fixture_store_segment_final() {
        let req: StoreSegmentRequest = roundtrip_test("store_segment_final.json");
        let msg = SegmentMessage::from_request(&req).unwrap();
        assert_eq!(msg.segment_number, Some(2));
        assert_eq!(msg.result, Some(StoreResult::Store));
        assert_eq!(msg.size, Some(4));
        assert_eq!(msg.hash_sha256.as_deref(), Some(checksum_bytes(b"ABCD").as_str()));
    }

    #[test]
    fn fixture_store_segment_string_fields() {
        // Decimal strings survive a roundtrip unchanged and parse like numbers.
        let req: StoreSegmentRequest = roundtrip_test("store_segment_string_fields.json");
        let numeric: StoreSegmentRequest =
            serde_json::from_value(load_fixture("store_segment_final.json")).unwrap();
        let a = SegmentMessage::from_request(&req).unwrap();
        let b = SegmentMessage::from_request(&numeric).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fixture_store_segment_cancel() {
        let req: StoreSegmentRequest = roundtrip_test("store_segment_cancel.json");
        assert_eq!(req.result, Some(StoreResult::Cancel));
        assert!(req.size.is_none());
        assert!(req.hash_sha256.is_none());
    }

    // --- Responses ---

    #[test]
    fn fixture_store_segment_response() {
        let msg: Message = roundtrip_test("store_segment_response.json");
        assert_eq!(msg.msg_type, MessageType::StoreSegmentResponse);
        let resp: StoreSegmentResponse = msg.parse_payload().unwrap().unwrap();
        assert_eq!(resp.segments_received, 1);
        assert_eq!(resp.result, None);
    }

    #[test]
    fn fixture_store_segment_response_stored() {
        let msg: Message = roundtrip_test("store_segment_response_stored.json");
        let resp: StoreSegmentResponse = msg.parse_payload().unwrap().unwrap();
        assert_eq!(resp.segments_received, 2);
        assert_eq!(resp.result, Some(StoreResult::Store));
    }

    #[test]
    fn fixture_error_envelope() {
        let msg: Message = roundtrip_test("error_envelope.json");
        assert_eq!(msg.msg_type, MessageType::Error);
        let err = msg.error.unwrap();
        assert_eq!(err.code, 409);
        assert_eq!(err.kind, "out_of_order_segment");
    }

    #[test]
    fn fixture_info_response() {
        let info: InfoResponse = roundtrip_test("info_response.json");
        assert_eq!(info.active_transfers, 3);
    }

    // --- Binary frame ---

    #[test]
    fn frame_layout_matches_wire_format() {
        let header: StoreSegmentRequest =
            serde_json::from_value(load_fixture("store_segment_first.json")).unwrap();
        let frame = encode_frame(&header, b"AB").unwrap();

        let header_json = serde_json::to_vec(&header).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, header_json.len());
        assert_eq!(&frame[4..4 + len], header_json.as_slice());
        assert_eq!(&frame[4 + len..], b"AB");

        let decoded = parse_frame(&frame).unwrap();
        assert_eq!(decoded.header, header);
        assert_eq!(decoded.payload, b"AB");
    }

    #[test]
    fn frame_from_untyped_header() {
        // Clients that build the header by hand interoperate.
        let header = load_fixture("store_segment_string_fields.json");
        let frame = encode_frame(&header, b"CD").unwrap();
        let decoded = parse_frame(&frame).unwrap();
        assert_eq!(decoded.header.msg_type, MessageType::StoreSegment);
        assert_eq!(
            decoded.header.file_id.as_deref(),
            Some("0b7a4c1e-52d4-4c8e-b3f6-3f1d2a9e8c77")
        );
    }
}
