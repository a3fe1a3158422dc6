// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session messages exchanged between host and plugin.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMessageType {
    Stream,
    End,
    Error,
    Invoke,
}

/// One chunk of a host request ↔ plugin reply conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    #[serde(rename = "type")]
    pub kind: SessionMessageType,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SessionMessage {
    /// Error message delivered when the transport underneath a session
    /// dies before the plugin replies.
    pub fn connection_closed() -> Self {
        Self {
            kind: SessionMessageType::Error,
            data: serde_json::to_value(ErrorResponse {
                error_type: "PluginConnectionClosedError".to_string(),
                message: "Connection closed unexpectedly".to_string(),
                args: serde_json::Map::new(),
            })
            .unwrap_or(serde_json::Value::Null),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_message_round_trips() {
        let msg = SessionMessage { kind: SessionMessageType::Stream, data: serde_json::json!({"n": 1}) };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"stream\""));
        let back: SessionMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, SessionMessageType::Stream);
        assert_eq!(back.data["n"], 1);
    }

    #[test]
    fn connection_closed_is_an_error_message() {
        let msg = SessionMessage::connection_closed();
        assert_eq!(msg.kind, SessionMessageType::Error);
        assert_eq!(msg.data["error_type"], "PluginConnectionClosedError");
    }
}
