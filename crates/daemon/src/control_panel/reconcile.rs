// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Installation reconciliation.
//!
//! Installed markers live in a shared bucket, so any node may install or
//! uninstall a plugin at any time. Two loops keep this node converged:
//! *ingest* launches runtimes for markers that appeared, *evict* drains
//! runtimes whose marker disappeared.

use std::sync::Arc;
use std::time::{Duration, Instant};

use warden_core::config::Platform;
use warden_core::error::LaunchError;
use warden_core::identifier::PluginUniqueIdentifier;

use super::{ControlPanel, FailureRecord};
use crate::debugging::ConnectionKeyResolver;

const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// After this many consecutive failures, the reconciler stops retrying.
pub const MAX_RETRY_COUNT: u32 = 15;

/// Step table for retry backoff: the wait is the largest entry whose
/// threshold is at or below the failure count.
const RETRY_WAIT_STEPS: &[(u32, u64)] = &[(0, 0), (3, 30), (8, 60), (MAX_RETRY_COUNT, 240)];

pub fn calculate_wait_time(retry_count: u32) -> Duration {
    let mut wait = 0;
    for (threshold, seconds) in RETRY_WAIT_STEPS {
        if retry_count >= *threshold && *seconds >= wait {
            wait = *seconds;
        }
    }
    Duration::from_secs(wait)
}

impl ControlPanel {
    /// Start the reconcile loops, and the debugging server when enabled.
    pub fn start_watch_dog(&self, key_resolver: Arc<dyn ConnectionKeyResolver>) {
        let Some(panel) = self.strong_self() else { return };
        if self.config.platform == Platform::Local {
            tokio::spawn(Arc::clone(&panel).local_monitor_loop());
            tokio::spawn(panel.remove_unused_local_plugins());
        }

        if self.config.plugin_remote_installing_enabled {
            let server = self.setup_debugging_server(key_resolver);
            tokio::spawn(async move {
                if let Err(e) = server.launch().await {
                    tracing::error!(error = %e, "start remote plugin server failed");
                }
            });
        }
    }

    async fn local_monitor_loop(self: Arc<Self>) {
        tracing::info!(
            installed_path = %self.config.plugin_installed_path.display(),
            concurrency = self.config.plugin_local_launching_concurrent,
            "start to handle new plugins"
        );

        self.handle_new_local_plugins().await;
        let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }
            self.handle_new_local_plugins().await;
        }
    }

    /// One ingest pass plus one evict pass, immediately. Embedders use
    /// this to converge without waiting for a tick.
    pub async fn reconcile_once(&self) {
        self.handle_new_local_plugins().await;
        self.evict_uninstalled_plugins().await;
    }

    /// One ingest pass: launch every installed plugin this node does not
    /// serve yet, respecting the ignore list and the retry backoff.
    pub(crate) async fn handle_new_local_plugins(&self) {
        let plugins = match self.installed_bucket.list().await {
            Ok(plugins) => plugins,
            Err(e) => {
                tracing::error!(error = %e, "list installed plugins failed");
                return;
            }
        };

        let mut launches = tokio::task::JoinSet::new();
        for id in plugins {
            if self.auto_launch_ignore.read().contains(&id) {
                continue;
            }
            if self.local_runtimes.read().contains_key(&id) {
                continue;
            }

            let record = self.fails.lock().get(&id).copied();
            let retry_count = record.map(|r| r.retry_count).unwrap_or(0);
            if retry_count >= MAX_RETRY_COUNT {
                continue;
            }
            let wait = calculate_wait_time(retry_count);
            if let Some(record) = record {
                if !wait.is_zero() && record.last_tried_at.elapsed() < wait {
                    continue;
                }
            }

            let Some(panel) = self.strong_self() else { return };
            launches.spawn(async move {
                match panel.launch_local_plugin(&id).await {
                    Err(LaunchError::AlreadyLaunched) => {}
                    Err(error) => {
                        tracing::error!(
                            plugin = %id,
                            error = %error,
                            retry_in_secs = wait.as_secs(),
                            "launch local plugin failed"
                        );
                        panel.record_failure(&id);
                    }
                    Ok((_runtime, result_rx)) => match result_rx.await {
                        Ok(Ok(())) => {
                            panel.fails.lock().remove(&id);
                        }
                        Ok(Err(_)) | Err(_) => panel.record_failure(&id),
                    },
                }
            });
        }

        // bounded wait: one reconcile pass finishes before the next starts
        while launches.join_next().await.is_some() {}
    }

    fn record_failure(&self, id: &PluginUniqueIdentifier) {
        let mut fails = self.fails.lock();
        let record = fails
            .entry(id.clone())
            .or_insert(FailureRecord { retry_count: 0, last_tried_at: Instant::now() });
        record.retry_count += 1;
        record.last_tried_at = Instant::now();
    }

    /// One evict pass per tick: gracefully drain runtimes whose installed
    /// marker is gone. Another node may have uninstalled the plugin.
    async fn remove_unused_local_plugins(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }
            self.evict_uninstalled_plugins().await;
        }
    }

    pub(crate) async fn evict_uninstalled_plugins(&self) {
        let ids: Vec<PluginUniqueIdentifier> =
            self.local_runtimes.read().keys().cloned().collect();
        for id in ids {
            match self.installed_bucket.exists(&id).await {
                Err(e) => {
                    tracing::error!(plugin = %id, error = %e, "check if plugin is installed failed");
                }
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) = self.shutdown_local_plugin_gracefully(&id) {
                        tracing::error!(plugin = %id, error = %e, "shutdown local plugin failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
