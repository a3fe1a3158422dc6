// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debugging-registration envelope.
//!
//! A debugging connection opens with a sequence of these payloads; after
//! `END` every frame is session data instead.

use base64::Engine;
use serde::{Deserialize, Serialize};

use warden_core::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterEventType {
    #[serde(rename = "HAND_SHAKE")]
    HandShake,
    #[serde(rename = "MANIFEST_DECLARATION")]
    ManifestDeclaration,
    #[serde(rename = "TOOL_DECLARATION")]
    ToolDeclaration,
    #[serde(rename = "MODEL_DECLARATION")]
    ModelDeclaration,
    #[serde(rename = "ENDPOINT_DECLARATION")]
    EndpointDeclaration,
    #[serde(rename = "AGENT_STRATEGY_DECLARATION")]
    AgentStrategyDeclaration,
    #[serde(rename = "DATASOURCE_DECLARATION")]
    DatasourceDeclaration,
    #[serde(rename = "TRIGGER_DECLARATION")]
    TriggerDeclaration,
    #[serde(rename = "ASSET_CHUNK")]
    AssetChunk,
    #[serde(rename = "END")]
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayload {
    #[serde(rename = "type")]
    pub kind: RegisterEventType,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// `HAND_SHAKE` body: the one-time key handed out by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub key: String,
}

/// `ASSET_CHUNK` body: one base64 slice of a named asset file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetChunkPayload {
    pub filename: String,
    pub data: String,
    #[serde(default)]
    pub end: bool,
}

impl AssetChunkPayload {
    /// Decode the chunk's base64 body.
    pub fn decode(&self) -> Result<Vec<u8>, ProtocolError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| ProtocolError::MalformedFrame(format!("assets decode failed, error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_payload_parses_screaming_case_types() {
        let payload: RegisterPayload =
            serde_json::from_str(r#"{"type":"HAND_SHAKE","data":{"key":"k-1"}}"#).unwrap();
        assert_eq!(payload.kind, RegisterEventType::HandShake);
        let handshake: HandshakePayload = serde_json::from_value(payload.data).unwrap();
        assert_eq!(handshake.key, "k-1");
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let result = serde_json::from_str::<RegisterPayload>(r#"{"type":"BOGUS"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn asset_chunk_decodes_base64() {
        let chunk: AssetChunkPayload =
            serde_json::from_str(r#"{"filename":"x.svg","data":"AAAA","end":true}"#).unwrap();
        assert_eq!(chunk.decode().unwrap(), vec![0, 0, 0]);
        assert!(chunk.end);
    }

    #[test]
    fn asset_chunk_rejects_bad_base64() {
        let chunk = AssetChunkPayload { filename: "x".into(), data: "!!".into(), end: false };
        assert!(chunk.decode().is_err());
    }
}
