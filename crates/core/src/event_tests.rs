// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn classifies_session_data() {
    let frame = br#"{"event":"session","session_id":"s-1","data":{"type":"stream","data":{"x":1}}}"#;
    match parse_universal_event(frame).unwrap() {
        UniversalEvent::SessionData { session_id, data } => {
            assert_eq!(session_id, "s-1");
            assert_eq!(data["type"], "stream");
        }
        other => panic!("expected session data, got {other:?}"),
    }
}

#[test]
fn classifies_heartbeat() {
    let frame = br#"{"event":"heartbeat"}"#;
    assert_eq!(parse_universal_event(frame).unwrap(), UniversalEvent::Heartbeat);
}

#[test]
fn classifies_error_log() {
    let frame = br#"{"event":"error","data":{"message":"boom"}}"#;
    assert_eq!(
        parse_universal_event(frame).unwrap(),
        UniversalEvent::ErrorLog { message: "boom".into() }
    );
}

#[test]
fn classifies_plain_log() {
    let frame = br#"{"event":"log","data":{"message":"hello"}}"#;
    assert_eq!(
        parse_universal_event(frame).unwrap(),
        UniversalEvent::PlainLog { message: "hello".into() }
    );
}

#[test]
fn session_event_without_id_is_malformed() {
    let frame = br#"{"event":"session","data":{}}"#;
    assert!(parse_universal_event(frame).is_err());
}

#[test]
fn unknown_event_type_is_malformed() {
    let frame = br#"{"event":"telemetry"}"#;
    assert!(parse_universal_event(frame).is_err());
}

#[test]
fn non_json_frame_is_malformed() {
    assert!(parse_universal_event(b"not json").is_err());
}
