// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Universal event classification.
//!
//! Every frame a plugin emits — over subprocess stdio or a debugging
//! socket — is one of four events. Ordering within a session id is
//! preserved by the single pump that feeds this parser; ordering across
//! session ids is not guaranteed.

use serde::Deserialize;

use crate::error::ProtocolError;

/// One classified frame from a plugin.
#[derive(Debug, Clone, PartialEq)]
pub enum UniversalEvent {
    /// A reply chunk for one host request.
    SessionData { session_id: String, data: serde_json::Value },
    /// Liveness marker; the first one also means "ready to serve".
    Heartbeat,
    /// Error text for the stderr bookkeeping and the error-log notifiers.
    ErrorLog { message: String },
    /// Plain diagnostic output.
    PlainLog { message: String },
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct RawLogPayload {
    #[serde(default)]
    message: String,
}

/// Parse one frame into exactly one event.
pub fn parse_universal_event(frame: &[u8]) -> Result<UniversalEvent, ProtocolError> {
    let raw: RawEvent = serde_json::from_slice(frame)
        .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;

    match raw.event.as_str() {
        "session" => {
            let session_id = raw
                .session_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ProtocolError::MalformedFrame("session event without session_id".into()))?;
            Ok(UniversalEvent::SessionData { session_id, data: raw.data })
        }
        "heartbeat" => Ok(UniversalEvent::Heartbeat),
        "error" => {
            let payload: RawLogPayload = serde_json::from_value(raw.data).unwrap_or(RawLogPayload {
                message: String::new(),
            });
            Ok(UniversalEvent::ErrorLog { message: payload.message })
        }
        "log" => {
            let payload: RawLogPayload = serde_json::from_value(raw.data).unwrap_or(RawLogPayload {
                message: String::new(),
            });
            Ok(UniversalEvent::PlainLog { message: payload.message })
        }
        other => Err(ProtocolError::MalformedFrame(format!("unknown event type: {other}"))),
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
