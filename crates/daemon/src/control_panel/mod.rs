// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-node control panel.
//!
//! Owns the live-runtime maps, admits launches through the per-identifier
//! installation lock and the global launch semaphore, and drives the
//! reconcile loops that converge this node's runtimes on the cluster's
//! installed set.

mod debugging_hook;
mod installer;
mod launcher;
mod notifier;
mod reconcile;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;

use warden_core::config::Config;
use warden_core::error::NotFoundError;
use warden_core::identifier::PluginUniqueIdentifier;
use warden_core::lock::GranularLock;
use warden_core::routine::TaskPool;
use warden_runtime::LocalPluginRuntime;

use crate::bucket::{InstalledBucket, PackageBucket};
use crate::debugging::{DebuggingServer, RemotePluginRuntime};
use crate::package::DecoderFactory;

pub use installer::InstallError;
pub use notifier::{ControlPanelNotifier, LoggingNotifier};
pub use reconcile::{calculate_wait_time, MAX_RETRY_COUNT};

/// How often a plugin failed to launch, for reconciler backoff.
#[derive(Debug, Clone, Copy)]
pub struct FailureRecord {
    pub retry_count: u32,
    pub last_tried_at: Instant,
}

pub struct ControlPanel {
    /// Self-reference for handing weak back-pointers to notifiers and
    /// spawned loops. Set once at construction.
    weak_self: Weak<ControlPanel>,

    pub(crate) config: Arc<Config>,
    pub(crate) package_bucket: Arc<dyn PackageBucket>,
    pub(crate) installed_bucket: Arc<dyn InstalledBucket>,
    pub(crate) decoder_factory: Arc<dyn DecoderFactory>,

    notifiers: Mutex<Vec<Arc<dyn ControlPanelNotifier>>>,

    /// identifier → live local runtime. A runtime is published on its
    /// first heartbeat and removed when its schedule stops — instances
    /// may still be draining after removal.
    pub(crate) local_runtimes: RwLock<HashMap<PluginUniqueIdentifier, Arc<LocalPluginRuntime>>>,
    /// identifier → connected debugging runtime.
    pub(crate) debugging_runtimes: RwLock<HashMap<PluginUniqueIdentifier, Arc<RemotePluginRuntime>>>,

    /// Bounds concurrent first-launches across all plugins.
    pub(crate) launch_semaphore: Arc<Semaphore>,
    /// Serialises the install → construct → schedule critical section per
    /// identifier.
    pub(crate) installation_lock: GranularLock,

    pub(crate) fails: Mutex<HashMap<PluginUniqueIdentifier, FailureRecord>>,
    /// Identifiers the reconciler must not auto-launch.
    pub(crate) auto_launch_ignore: RwLock<HashSet<PluginUniqueIdentifier>>,

    pub(crate) debugging_server: Mutex<Option<Arc<DebuggingServer>>>,

    pub(crate) task_pool: TaskPool,
    pub(crate) shutdown: CancellationToken,
}

impl ControlPanel {
    pub fn new(
        config: Arc<Config>,
        package_bucket: Arc<dyn PackageBucket>,
        installed_bucket: Arc<dyn InstalledBucket>,
        decoder_factory: Arc<dyn DecoderFactory>,
    ) -> Arc<Self> {
        let launch_concurrency = config.plugin_local_launching_concurrent;
        let task_pool = TaskPool::new(config.routine_pool_size);
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            config,
            package_bucket,
            installed_bucket,
            decoder_factory,
            notifiers: Mutex::new(Vec::new()),
            local_runtimes: RwLock::new(HashMap::new()),
            debugging_runtimes: RwLock::new(HashMap::new()),
            launch_semaphore: Arc::new(Semaphore::new(launch_concurrency)),
            installation_lock: GranularLock::new(),
            fails: Mutex::new(HashMap::new()),
            auto_launch_ignore: RwLock::new(HashSet::new()),
            debugging_server: Mutex::new(None),
            task_pool,
            shutdown: CancellationToken::new(),
        })
    }

    pub(crate) fn weak_self(&self) -> Weak<ControlPanel> {
        self.weak_self.clone()
    }

    pub(crate) fn strong_self(&self) -> Option<Arc<ControlPanel>> {
        self.weak_self.upgrade()
    }

    pub fn add_notifier(&self, notifier: Arc<dyn ControlPanelNotifier>) {
        self.notifiers.lock().push(notifier);
    }

    /// Snapshot the observer list under the lock, then invoke lock-free.
    pub fn walk_notifiers(&self, f: impl Fn(&dyn ControlPanelNotifier)) {
        let notifiers = self.notifiers.lock().clone();
        for notifier in &notifiers {
            f(notifier.as_ref());
        }
    }

    /// Look up the live local runtime for `id`.
    pub fn get_local_runtime(
        &self,
        id: &PluginUniqueIdentifier,
    ) -> Result<Arc<LocalPluginRuntime>, NotFoundError> {
        self.local_runtimes.read().get(id).cloned().ok_or(NotFoundError::PluginRuntime)
    }

    /// Look up a connected debugging runtime for `id`.
    pub fn get_debugging_runtime(
        &self,
        id: &PluginUniqueIdentifier,
    ) -> Result<Arc<RemotePluginRuntime>, NotFoundError> {
        self.debugging_runtimes.read().get(id).cloned().ok_or(NotFoundError::PluginRuntime)
    }

    pub fn failure_record(&self, id: &PluginUniqueIdentifier) -> Option<FailureRecord> {
        self.fails.lock().get(id).copied()
    }

    /// Identifiers of runtimes currently published in the active map.
    pub fn local_runtime_identifiers(&self) -> Vec<PluginUniqueIdentifier> {
        self.local_runtimes.read().keys().cloned().collect()
    }

    /// Identifiers of currently connected debugging runtimes.
    pub fn debugging_runtime_identifiers(&self) -> Vec<PluginUniqueIdentifier> {
        self.debugging_runtimes.read().keys().cloned().collect()
    }

    /// Exclude `id` from reconciler auto-launch. All plugins auto-launch
    /// by default.
    pub fn disable_auto_launch(&self, id: &PluginUniqueIdentifier) {
        self.auto_launch_ignore.write().insert(id.clone());
    }

    pub fn enable_auto_launch(&self, id: &PluginUniqueIdentifier) {
        self.auto_launch_ignore.write().remove(id);
    }

    /// Kill a runtime's instances immediately. The returned channel fires
    /// once every instance has gone.
    pub fn shutdown_local_plugin_forcefully(
        &self,
        id: &PluginUniqueIdentifier,
    ) -> Result<oneshot::Receiver<()>, NotFoundError> {
        let runtime = self
            .local_runtimes
            .read()
            .get(id)
            .cloned()
            .ok_or(NotFoundError::LocalPluginRuntime)?;

        let (tx, rx) = oneshot::channel();
        let pool = self.task_pool.clone();
        tokio::spawn(async move {
            let _ = pool
                .submit("control_panel", "shutdown_local_plugin_forcefully", async move {
                    runtime.stop(true).await;
                    let _ = tx.send(());
                })
                .await;
        });
        Ok(rx)
    }

    /// Drain a runtime's instances, waiting for in-flight sessions up to
    /// the execution deadline. The returned channel fires once every
    /// instance has gone.
    pub fn shutdown_local_plugin_gracefully(
        &self,
        id: &PluginUniqueIdentifier,
    ) -> Result<oneshot::Receiver<()>, NotFoundError> {
        let runtime = self
            .local_runtimes
            .read()
            .get(id)
            .cloned()
            .ok_or(NotFoundError::LocalPluginRuntime)?;

        let (tx, rx) = oneshot::channel();
        let pool = self.task_pool.clone();
        tokio::spawn(async move {
            let _ = pool
                .submit("control_panel", "shutdown_local_plugin_gracefully", async move {
                    runtime.graceful_stop(true).await;
                    let _ = tx.send(());
                })
                .await;
        });
        Ok(rx)
    }

    /// Stop the reconcile loops and the debugging server.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(server) = self.debugging_server.lock().as_ref() {
            server.stop();
        }
    }
}

#[cfg(test)]
#[path = "panel_tests.rs"]
mod tests;
