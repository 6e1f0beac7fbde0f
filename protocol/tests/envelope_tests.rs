//! Wire envelope tests
//!
//! Verifies the JSON framing both directions of the protocol rely on:
//! parse strictness, payload passthrough, and the error-string payload.

use parley_protocol::{events, Envelope};
use serde_json::{json, Value};

#[test]
fn test_roundtrip_offer() {
    let envelope = Envelope::new(
        events::EVENT_OFFER,
        json!({
            "targetClientId": "8f14e45f-ce95-4e21-a3b4-91f5c2b7d960",
            "offer": { "type": "offer", "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1\r\n" },
        }),
    );

    let text = envelope.to_text().expect("Failed to serialize");
    let decoded = Envelope::parse(&text).expect("Failed to parse");

    assert_eq!(decoded, envelope);
    assert_eq!(decoded.event, "offer");
    assert_eq!(
        decoded.data["offer"]["sdp"].as_str().unwrap(),
        "v=0\r\no=- 46117 2 IN IP4 127.0.0.1\r\n"
    );
}

#[test]
fn test_parse_join_room_with_optional_fields() {
    // Both fields present
    let envelope =
        Envelope::parse(r#"{"event":"join-room","data":{"roomId":"r1","roomName":"demo"}}"#)
            .expect("Failed to parse");
    assert_eq!(envelope.event, events::EVENT_JOIN_ROOM);
    assert_eq!(envelope.data["roomId"].as_str(), Some("r1"));
    assert_eq!(envelope.data["roomName"].as_str(), Some("demo"));

    // Neither present — still a valid join
    let bare = Envelope::parse(r#"{"event":"join-room","data":null}"#).expect("Failed to parse");
    assert_eq!(bare.data, Value::Null);
    assert!(bare.data.get("roomId").is_none());
}

#[test]
fn test_malformed_frames_rejected() {
    assert!(Envelope::parse("").is_err());
    assert!(Envelope::parse("not json").is_err());
    assert!(Envelope::parse("[1,2,3]").is_err());
    assert!(Envelope::parse(r#"{"data":{"roomId":"r1"}}"#).is_err());
    assert!(Envelope::parse(r#"{"event":""}"#).is_err());
}

#[test]
fn test_error_payload_is_plain_string() {
    let envelope = Envelope::new(
        events::EVENT_ERROR,
        Value::String("Room is full (max 6 participants)".to_string()),
    );
    let text = envelope.to_text().expect("Failed to serialize");
    assert_eq!(
        text,
        r#"{"event":"error","data":"Room is full (max 6 participants)"}"#
    );

    // The reason is a string, not an object and not double-serialized
    let decoded = Envelope::parse(&text).expect("Failed to parse");
    assert_eq!(
        decoded.data.as_str(),
        Some("Room is full (max 6 participants)")
    );
}

#[test]
fn test_payload_passthrough_is_verbatim() {
    // Deeply nested, mixed-type payloads must survive untouched
    let candidate = json!({
        "candidate": "candidate:842163049 1 udp 1677729535 203.0.113.7 46158 typ srflx",
        "sdpMid": "0",
        "sdpMLineIndex": 0,
        "usernameFragment": null,
        "nested": { "list": [1, 2.5, "three", false, { "deep": {} }] },
    });
    let envelope = Envelope::new(events::EVENT_ICE_CANDIDATE, json!({ "candidate": candidate }));

    let text = envelope.to_text().expect("Failed to serialize");
    let decoded = Envelope::parse(&text).expect("Failed to parse");
    assert_eq!(decoded.data["candidate"], candidate);
}

#[test]
fn test_unknown_events_still_parse() {
    // The codec does not police the vocabulary; the dispatcher does
    let envelope =
        Envelope::parse(r#"{"event":"made-up","data":{"x":1}}"#).expect("Failed to parse");
    assert_eq!(envelope.event, "made-up");
}
