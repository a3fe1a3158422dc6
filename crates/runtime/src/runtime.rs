// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime construction, the schedule loop and stop semantics.
//!
//! The schedule loop is the only writer of the instance list besides the
//! shutdown notifier. It keeps `instances.len()` converged on the replica
//! target; the 5 s tick is deliberate damping — there is no fast path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use warden_core::config::Config;
use warden_core::declaration::{PluginDeclaration, RunnerLanguage};
use warden_core::decoder::PluginDecoder;
use warden_core::error::{ConfigurationError, LaunchError, NotFoundError};
use warden_core::identifier::PluginUniqueIdentifier;
use warden_core::state::{PluginRuntimeState, PluginRuntimeStatus};

use crate::instance::{PluginInstance, MAX_HEARTBEAT_INTERVAL};
use crate::notifier::{InstanceNotifierTemplate, RuntimeNotifier};

pub const SCHEDULE_LOOP_INTERVAL: Duration = Duration::from_secs(5);

const SCHEDULE_STOPPED: i32 = 0;
const SCHEDULE_RUNNING: i32 = 1;

pub struct LocalPluginRuntime {
    /// Self-reference for handing weak back-pointers to notifiers and
    /// spawned tasks. Set once at construction.
    weak_self: Weak<LocalPluginRuntime>,

    pub(crate) config: Arc<Config>,
    pub(crate) declaration: PluginDeclaration,
    pub(crate) checksum: String,
    /// `author/name:version@checksum`, precomputed for hot paths.
    pub(crate) identity_string: String,
    pub(crate) state: RwLock<PluginRuntimeState>,

    /// Replica target (K8s-style desired count).
    target_replicas: AtomicI32,
    pub(crate) instances: RwLock<Vec<Arc<PluginInstance>>>,
    round_robin_index: AtomicI64,
    schedule_status: AtomicI32,

    pub(crate) session_to_instance: RwLock<HashMap<String, Arc<PluginInstance>>>,

    notifiers: Mutex<Vec<Arc<dyn RuntimeNotifier>>>,

    /// Cached uv binary location once discovered.
    pub(crate) uv_path: Mutex<Option<PathBuf>>,
}

impl LocalPluginRuntime {
    /// Build a runtime from a decoded package. Nothing is spawned yet;
    /// call `init_environment` then `schedule`.
    pub fn construct(
        config: Arc<Config>,
        decoder: &dyn PluginDecoder,
    ) -> Result<Arc<Self>, LaunchError> {
        let declaration = decoder.manifest()?;
        declaration.validate()?;
        let checksum = decoder.checksum()?;

        let working_path = config.plugin_working_path.join(format!(
            "{}@{}",
            declaration.identity().replace(':', "-"),
            checksum
        ));
        let identity_string = format!("{}@{}", declaration.identity(), checksum);
        let verified = declaration.verified;

        Ok(Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            config,
            declaration,
            checksum,
            identity_string,
            state: RwLock::new(PluginRuntimeState::new(working_path, verified)),
            target_replicas: AtomicI32::new(0),
            instances: RwLock::new(Vec::new()),
            round_robin_index: AtomicI64::new(0),
            schedule_status: AtomicI32::new(SCHEDULE_STOPPED),
            session_to_instance: RwLock::new(HashMap::new()),
            notifiers: Mutex::new(Vec::new()),
            uv_path: Mutex::new(None),
        }))
    }

    pub(crate) fn weak_self(&self) -> Weak<LocalPluginRuntime> {
        self.weak_self.clone()
    }

    fn strong_self(&self) -> Option<Arc<LocalPluginRuntime>> {
        self.weak_self.upgrade()
    }

    pub fn identity(&self) -> Result<PluginUniqueIdentifier, ConfigurationError> {
        PluginUniqueIdentifier::from_identity(&self.declaration.identity(), &self.checksum)
    }

    pub fn declaration(&self) -> &PluginDeclaration {
        &self.declaration
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn runtime_state(&self) -> PluginRuntimeState {
        self.state.read().clone()
    }

    pub fn working_path(&self) -> PathBuf {
        self.state.read().working_path.clone()
    }

    pub fn add_notifier(&self, notifier: Arc<dyn RuntimeNotifier>) {
        self.notifiers.lock().push(notifier);
    }

    /// Snapshot the observer list under the lock, then invoke lock-free.
    pub fn walk_notifiers(&self, f: impl Fn(&dyn RuntimeNotifier)) {
        let notifiers = self.notifiers.lock().clone();
        for notifier in &notifiers {
            f(notifier.as_ref());
        }
    }

    pub fn target_replicas(&self) -> i32 {
        self.target_replicas.load(Ordering::Acquire)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    /// Raise the replica target; the loop converges on its next tick.
    pub fn scale_up(&self) {
        let replicas = self.target_replicas.fetch_add(1, Ordering::AcqRel) + 1;
        self.walk_notifiers(|n| n.on_instance_scale_up(replicas));
    }

    /// Lower the replica target; the loop converges on its next tick.
    pub fn scale_down(&self) {
        let replicas = self.target_replicas.fetch_sub(1, Ordering::AcqRel) - 1;
        self.walk_notifiers(|n| n.on_instance_scale_down(replicas));
    }

    /// Start the schedule loop. Returns `AlreadyScheduled` if it is
    /// already running.
    pub fn schedule(&self) -> Result<(), LaunchError> {
        if self
            .schedule_status
            .compare_exchange(SCHEDULE_STOPPED, SCHEDULE_RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LaunchError::AlreadyScheduled);
        }
        self.state.write().set_launching();
        let Some(runtime) = self.strong_self() else {
            return Err(LaunchError::AlreadyScheduled);
        };
        tokio::spawn(runtime.schedule_loop());
        Ok(())
    }

    fn stop_schedule(&self) {
        let _ = self.schedule_status.compare_exchange(
            SCHEDULE_RUNNING,
            SCHEDULE_STOPPED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn is_scheduling(&self) -> bool {
        self.schedule_status.load(Ordering::Acquire) == SCHEDULE_RUNNING
    }

    async fn schedule_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(SCHEDULE_LOOP_INTERVAL);
        ticker.tick().await;

        while self.schedule_status.load(Ordering::Acquire) == SCHEDULE_RUNNING {
            let current = self.instances.read().len() as i32;
            let target = self.target_replicas.load(Ordering::Acquire);

            if current < target {
                if let Err(error) = self.start_new_instance().await {
                    self.walk_notifiers(|n| n.on_instance_launch_failed(None, &error));
                }
            } else if current > target {
                if let Err(error) = self.gracefully_stop_lowest_load_instance().await {
                    self.walk_notifiers(|n| n.on_instance_scale_down_failed(&error));
                }
            }

            ticker.tick().await;
        }

        self.walk_notifiers(|n| n.on_runtime_stop_schedule());
        self.wait_for_all_instances_shutdown().await;
        self.walk_notifiers(|n| n.on_runtime_close());
    }

    /// Spawn one subprocess and block until its first heartbeat, its
    /// early death, or the heartbeat deadline.
    async fn start_new_instance(&self) -> Result<(), LaunchError> {
        self.walk_notifiers(|n| n.on_instance_starting());
        {
            let mut state = self.state.write();
            if state.status == PluginRuntimeStatus::Active {
                state.set_restarting();
            }
        }

        let mut cmd = self.instance_command()?;
        let mut child = cmd.spawn().map_err(LaunchError::Spawn)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LaunchError::Spawn(std::io::Error::other("stdin pipe missing")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LaunchError::Spawn(std::io::Error::other("stdout pipe missing")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| LaunchError::Spawn(std::io::Error::other("stderr pipe missing")))?;

        let instance = PluginInstance::new(
            self.identity_string.clone(),
            child,
            stdin,
            self.config.plugin_runtime_max_buffer_size,
        );

        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), LaunchError>>();
        let ready_slot = Arc::new(Mutex::new(Some(ready_tx)));

        let weak_runtime = self.weak_self();
        let weak_instance = Arc::downgrade(&instance);

        instance.add_notifier(Arc::new(InstanceNotifierTemplate {
            on_ready: Some(Box::new({
                let weak_runtime = weak_runtime.clone();
                let ready_slot = Arc::clone(&ready_slot);
                move |_| {
                    let Some(runtime) = weak_runtime.upgrade() else { return };
                    let Some(instance) = weak_instance.upgrade() else { return };
                    runtime.instances.write().push(Arc::clone(&instance));
                    runtime.state.write().set_active();
                    runtime.walk_notifiers(|n| n.on_instance_ready(&instance));
                    if let Some(tx) = ready_slot.lock().take() {
                        let _ = tx.send(Ok(()));
                    }
                }
            })),
            on_shutdown: Some(Box::new({
                let ready_slot = Arc::clone(&ready_slot);
                move |instance| {
                    let Some(runtime) = weak_runtime.upgrade() else { return };
                    runtime
                        .instances
                        .write()
                        .retain(|other| other.instance_id() != instance.instance_id());
                    if !instance.is_started() {
                        let error = LaunchError::InstanceShutdownBeforeReady {
                            stderr: instance.error().unwrap_or_default(),
                        };
                        runtime.walk_notifiers(|n| {
                            n.on_instance_launch_failed(Some(instance), &error)
                        });
                        if let Some(tx) = ready_slot.lock().take() {
                            let _ = tx.send(Err(LaunchError::InstanceShutdownBeforeReady {
                                stderr: instance.error().unwrap_or_default(),
                            }));
                        }
                    }
                }
            })),
            ..Default::default()
        }));
        instance.add_notifier(Arc::new(crate::notifier::LoggerNotifier));

        tokio::spawn(Arc::clone(&instance).run_stdout_pump(stdout));
        tokio::spawn(Arc::clone(&instance).run_stderr_pump(stderr));

        match tokio::time::timeout(MAX_HEARTBEAT_INTERVAL, ready_rx).await {
            Ok(Ok(Ok(()))) => {
                let monitored = Arc::clone(&instance);
                tokio::spawn(async move {
                    let reporter = Arc::clone(&monitored);
                    if let Err(error) = monitored.run_monitor().await {
                        tracing::warn!(
                            plugin = %reporter.plugin_identity(),
                            instance = %reporter.short_id(),
                            error = %error,
                            "instance monitor terminated"
                        );
                    }
                });
                Ok(())
            }
            Ok(Ok(Err(error))) => Err(error),
            Ok(Err(_)) | Err(_) => {
                instance.stop();
                Err(LaunchError::NoHeartbeat)
            }
        }
    }

    async fn gracefully_stop_lowest_load_instance(&self) -> Result<(), NotFoundError> {
        let instance = self.pick_lowest_load_instance()?;
        instance.graceful_stop(self.config.graceful_drain_deadline()).await;
        Ok(())
    }

    /// Round-robin pick over the current instance list.
    pub(crate) fn pick_lowest_load_instance(&self) -> Result<Arc<PluginInstance>, NotFoundError> {
        let instances = self.instances.read();
        if instances.is_empty() {
            return Err(NotFoundError::NoProperInstance);
        }
        let idx = self.round_robin_index.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::clone(&instances[idx as usize % instances.len()]))
    }

    /// Forceful stop: halt the loop, kill every instance. With
    /// `wait = false` the instance teardown runs detached.
    pub async fn stop(&self, wait: bool) {
        self.state.write().set_stopped();
        self.stop_schedule();

        let Some(runtime) = self.strong_self() else { return };
        let teardown = async move {
            loop {
                let instance = runtime.instances.read().first().cloned();
                let Some(instance) = instance else { break };
                instance.stop();
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        };
        if wait {
            teardown.await;
        } else {
            tokio::spawn(teardown);
        }
    }

    /// Graceful stop: halt the loop, drain every instance up to the
    /// execution deadline.
    pub async fn graceful_stop(&self, wait: bool) {
        self.state.write().set_stopped();
        self.stop_schedule();

        let Some(runtime) = self.strong_self() else { return };
        let teardown = async move {
            loop {
                let instance = runtime.instances.read().first().cloned();
                let Some(instance) = instance else { break };
                instance.graceful_stop(runtime.config.graceful_drain_deadline()).await;
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        };
        if wait {
            teardown.await;
        } else {
            tokio::spawn(teardown);
        }
    }

    async fn wait_for_all_instances_shutdown(&self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        while !self.instances.read().is_empty() {
            ticker.tick().await;
        }
    }

    fn instance_command(&self) -> Result<tokio::process::Command, LaunchError> {
        match self.declaration.meta.runner.language {
            RunnerLanguage::Python => {
                let python = self.virtual_environment_python_path()?;
                let mut cmd = tokio::process::Command::new(python);
                cmd.arg("-m").arg(&self.declaration.meta.runner.entrypoint);
                if !self.config.https_proxy.is_empty() {
                    cmd.env("HTTPS_PROXY", &self.config.https_proxy);
                }
                if !self.config.http_proxy.is_empty() {
                    cmd.env("HTTP_PROXY", &self.config.http_proxy);
                }
                if !self.config.no_proxy.is_empty() {
                    cmd.env("NO_PROXY", &self.config.no_proxy);
                }
                cmd.env("INSTALL_METHOD", "local")
                    .env("PATH", std::env::var("PATH").unwrap_or_default())
                    .current_dir(self.working_path())
                    .stdin(std::process::Stdio::piped())
                    .stdout(std::process::Stdio::piped())
                    .stderr(std::process::Stdio::piped())
                    .kill_on_drop(true);
                Ok(cmd)
            }
            RunnerLanguage::Unknown => Err(ConfigurationError::UnsupportedLanguage.into()),
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
