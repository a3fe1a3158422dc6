// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local launch admission and wiring.
//!
//! A launch holds the per-identifier installation lock and one slot of
//! the global semaphore from admission until the first instance reports
//! ready or failed. Both are released exactly once, inside the
//! once-guarded ready/failed handler — or on the synchronous error paths
//! before the handler is armed.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, OwnedSemaphorePermit};

use warden_core::decoder::PluginDecoder;
use warden_core::error::LaunchError;
use warden_core::identifier::PluginUniqueIdentifier;
use warden_core::lock::GranularGuard;
use warden_runtime::{LocalPluginRuntime, RuntimeNotifierTemplate};

use super::ControlPanel;

/// Everything released exactly once per launch attempt.
struct LaunchRelease {
    _guard: GranularGuard,
    _permit: OwnedSemaphorePermit,
    result_tx: oneshot::Sender<Result<(), String>>,
}

impl ControlPanel {
    /// Launch the local runtime for `id`.
    ///
    /// Synchronous up to environment preparation; the returned channel
    /// resolves when the first instance is ready or the launch failed.
    /// `AlreadyLaunched` is benign — the caller reuses the existing
    /// runtime.
    pub async fn launch_local_plugin(
        &self,
        id: &PluginUniqueIdentifier,
    ) -> Result<(Arc<LocalPluginRuntime>, oneshot::Receiver<Result<(), String>>), LaunchError>
    {
        let guard = self.installation_lock.lock(id.as_str()).await;

        if self.local_runtimes.read().contains_key(id) {
            return Err(LaunchError::AlreadyLaunched);
        }

        // blocks while the node is at its launch-concurrency limit
        let permit = Arc::clone(&self.launch_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| LaunchError::Environment("launch admission closed".into()))?;

        self.walk_notifiers(|n| n.on_local_runtime_starting(id));

        let (runtime, decoder) = match self.build_local_plugin_runtime(id).await {
            Ok(built) => built,
            Err(error) => {
                let message = error.to_string();
                self.walk_notifiers(|n| n.on_local_runtime_start_failed(id, &message));
                return Err(error);
            }
        };

        if let Err(error) = runtime.init_environment(decoder.as_ref()).await {
            let message = error.to_string();
            self.walk_notifiers(|n| n.on_local_runtime_start_failed(id, &message));
            return Err(error);
        }

        let (result_tx, result_rx) = oneshot::channel();
        let release = Arc::new(Mutex::new(Some(LaunchRelease {
            _guard: guard,
            _permit: permit,
            result_tx,
        })));

        let weak_panel = self.weak_self();
        let weak_runtime = Arc::downgrade(&runtime);

        runtime.add_notifier(Arc::new(RuntimeNotifierTemplate {
            // only the first ready fires this arm
            on_instance_ready: Some(Box::new({
                let weak_panel = weak_panel.clone();
                let weak_runtime = weak_runtime.clone();
                let release = Arc::clone(&release);
                let id = id.clone();
                move |_instance| {
                    let Some(panel) = weak_panel.upgrade() else { return };
                    let Some(runtime) = weak_runtime.upgrade() else { return };
                    if let Some(state) = release.lock().take() {
                        panel.local_runtimes.write().insert(id.clone(), Arc::clone(&runtime));
                        panel.walk_notifiers(|n| n.on_local_runtime_ready(&runtime));
                        let _ = state.result_tx.send(Ok(()));
                    }
                }
            })),
            // only the first failure fires this arm
            on_instance_launch_failed: Some(Box::new({
                let weak_panel = weak_panel.clone();
                let release = Arc::clone(&release);
                let id = id.clone();
                move |_instance, error| {
                    let Some(panel) = weak_panel.upgrade() else { return };
                    if let Some(state) = release.lock().take() {
                        let message = error.to_string();
                        panel.walk_notifiers(|n| n.on_local_runtime_start_failed(&id, &message));
                        let _ = state.result_tx.send(Err(message));
                    }
                }
            })),
            on_instance_scale_up: Some(Box::new({
                let weak_panel = weak_panel.clone();
                let weak_runtime = weak_runtime.clone();
                move |replicas| {
                    let Some(panel) = weak_panel.upgrade() else { return };
                    let Some(runtime) = weak_runtime.upgrade() else { return };
                    panel.walk_notifiers(|n| n.on_local_runtime_scale_up(&runtime, replicas));
                }
            })),
            on_instance_scale_down: Some(Box::new({
                let weak_panel = weak_panel.clone();
                let weak_runtime = weak_runtime.clone();
                move |replicas| {
                    let Some(panel) = weak_panel.upgrade() else { return };
                    let Some(runtime) = weak_runtime.upgrade() else { return };
                    panel.walk_notifiers(|n| n.on_local_runtime_scale_down(&runtime, replicas));
                }
            })),
            // once a runtime stops scheduling, new requests must fail
            // fast, so it leaves the map before its instances drain
            on_runtime_stop_schedule: Some(Box::new({
                let weak_panel = weak_panel.clone();
                let weak_runtime = weak_runtime.clone();
                let id = id.clone();
                move || {
                    let Some(panel) = weak_panel.upgrade() else { return };
                    panel.local_runtimes.write().remove(&id);
                    if let Some(runtime) = weak_runtime.upgrade() {
                        panel.walk_notifiers(|n| n.on_local_runtime_stop(&runtime));
                    }
                }
            })),
            on_runtime_close: Some(Box::new({
                let weak_panel = weak_panel.clone();
                let weak_runtime = weak_runtime.clone();
                move || {
                    let Some(panel) = weak_panel.upgrade() else { return };
                    let Some(runtime) = weak_runtime.upgrade() else { return };
                    panel.walk_notifiers(|n| n.on_local_runtime_stopped(&runtime));
                }
            })),
        }));

        // at least one instance must run
        runtime.scale_up();

        if let Err(error) = runtime.schedule() {
            let message = error.to_string();
            self.walk_notifiers(|n| n.on_local_runtime_start_failed(id, &message));
            release.lock().take();
            return Err(error);
        }

        Ok((runtime, result_rx))
    }

    async fn build_local_plugin_runtime(
        &self,
        id: &PluginUniqueIdentifier,
    ) -> Result<(Arc<LocalPluginRuntime>, Arc<dyn PluginDecoder>), LaunchError> {
        let package = self
            .package_bucket
            .get(id.as_str())
            .await
            .map_err(|e| LaunchError::Environment(format!("get plugin package error: {e}")))?;
        let decoder = self.decoder_factory.decode(&package)?;
        let runtime = LocalPluginRuntime::construct(Arc::clone(&self.config), decoder.as_ref())?;
        Ok((runtime, decoder))
    }
}
