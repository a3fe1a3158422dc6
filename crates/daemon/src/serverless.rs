// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serverless deployment path.
//!
//! On serverless platforms the "runtime" is a remote function URL rather
//! than a subprocess. The external connector compiles and publishes the
//! package; the supervisor keeps the resulting records in a TTL cache so
//! repeated installs of the same identifier are idempotent.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use warden_core::identifier::PluginUniqueIdentifier;

/// Where a published plugin is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerlessRuntimeRecord {
    pub function_name: String,
    pub function_url: String,
}

/// Compiles and publishes a package, returning its function record.
#[async_trait]
pub trait ServerlessConnector: Send + Sync {
    async fn launch(
        &self,
        id: &PluginUniqueIdentifier,
        package: &[u8],
    ) -> Result<ServerlessRuntimeRecord, String>;
}

const INSTALL_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Identifier → published record, expiring after 30 minutes.
pub struct ServerlessInstallCache {
    entries: Mutex<HashMap<PluginUniqueIdentifier, (ServerlessRuntimeRecord, Instant)>>,
    ttl: Duration,
}

impl Default for ServerlessInstallCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerlessInstallCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl: INSTALL_CACHE_TTL }
    }

    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    pub fn get(&self, id: &PluginUniqueIdentifier) -> Option<ServerlessRuntimeRecord> {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some((record, stored_at)) if stored_at.elapsed() < self.ttl => Some(record.clone()),
            Some(_) => {
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, id: PluginUniqueIdentifier, record: ServerlessRuntimeRecord) {
        self.entries.lock().insert(id, (record, Instant::now()));
    }

    pub fn remove(&self, id: &PluginUniqueIdentifier) {
        self.entries.lock().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> PluginUniqueIdentifier {
        PluginUniqueIdentifier::parse("acme/demo:1.0.0@abc").unwrap()
    }

    fn record() -> ServerlessRuntimeRecord {
        ServerlessRuntimeRecord {
            function_name: "acme-demo".to_string(),
            function_url: "https://functions.example/acme-demo".to_string(),
        }
    }

    #[test]
    fn cache_returns_fresh_records() {
        let cache = ServerlessInstallCache::new();
        assert!(cache.get(&id()).is_none());
        cache.insert(id(), record());
        assert_eq!(cache.get(&id()), Some(record()));
    }

    #[test]
    fn cache_expires_after_ttl() {
        let cache = ServerlessInstallCache::with_ttl(Duration::from_millis(0));
        cache.insert(id(), record());
        assert!(cache.get(&id()).is_none());
    }

    #[test]
    fn remove_drops_the_record() {
        let cache = ServerlessInstallCache::new();
        cache.insert(id(), record());
        cache.remove(&id());
        assert!(cache.get(&id()).is_none());
    }
}
