// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debugging key resolution for the standalone binary.
//!
//! In a full deployment the handshake key comes from the host's shared
//! cache. The standalone daemon reads a fixed table from
//! `PLUGIN_DEBUGGING_KEYS` (`key=tenant` pairs, comma separated) instead.

use async_trait::async_trait;

use warden_core::error::ProtocolError;
use warden_daemon::{ConnectionInfo, ConnectionKeyResolver};

pub struct EnvKeyResolver {
    keys: std::collections::HashMap<String, String>,
}

impl EnvKeyResolver {
    pub fn from_env() -> Self {
        let mut keys = std::collections::HashMap::new();
        if let Ok(raw) = std::env::var("PLUGIN_DEBUGGING_KEYS") {
            for pair in raw.split(',') {
                if let Some((key, tenant)) = pair.split_once('=') {
                    keys.insert(key.trim().to_string(), tenant.trim().to_string());
                }
            }
        }
        Self { keys }
    }
}

#[async_trait]
impl ConnectionKeyResolver for EnvKeyResolver {
    async fn resolve(&self, key: &str) -> Result<ConnectionInfo, ProtocolError> {
        self.keys
            .get(key)
            .map(|tenant_id| ConnectionInfo { tenant_id: tenant_id.clone() })
            .ok_or(ProtocolError::InvalidKey)
    }
}
