// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debugging server: a framed TCP endpoint that accepts externally
//! running plugins during development.
//!
//! A connection starts as a registration stream (handshake, declaration
//! transfer, asset reassembly), and after `END` becomes a session
//! transport feeding the same listener machinery as subprocess stdio.

mod handlers;
mod runtime;
mod server;

use async_trait::async_trait;

use warden_core::error::ProtocolError;

pub use runtime::RemotePluginRuntime;
pub use server::DebuggingServer;

/// What a one-time debugging key resolves to.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub tenant_id: String,
}

/// Resolves handshake keys against the host's key cache. The cache
/// itself is an external collaborator.
#[async_trait]
pub trait ConnectionKeyResolver: Send + Sync {
    async fn resolve(&self, key: &str) -> Result<ConnectionInfo, ProtocolError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerShutdownReason {
    Exit,
    Error,
}

/// Observer of debugging-server lifecycle.
pub trait DebuggingNotifier: Send + Sync {
    fn on_runtime_connected(&self, _runtime: &std::sync::Arc<RemotePluginRuntime>) {}
    fn on_runtime_disconnected(&self, _runtime: &std::sync::Arc<RemotePluginRuntime>) {}
    fn on_server_shutdown(&self, _reason: ServerShutdownReason) {}
}

/// Fixed key table for tests and single-tenant development setups.
#[cfg(any(test, feature = "test-support"))]
pub struct StaticKeyResolver {
    keys: std::collections::HashMap<String, String>,
}

#[cfg(any(test, feature = "test-support"))]
impl StaticKeyResolver {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { keys: entries.into_iter().collect() }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ConnectionKeyResolver for StaticKeyResolver {
    async fn resolve(&self, key: &str) -> Result<ConnectionInfo, ProtocolError> {
        self.keys
            .get(key)
            .map(|tenant_id| ConnectionInfo { tenant_id: tenant_id.clone() })
            .ok_or(ProtocolError::InvalidKey)
    }
}
