// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle observers for instances and runtimes.
//!
//! Observers implement a trait whose methods all default to no-ops, so a
//! concrete observer overrides only what it cares about. For call sites
//! that want closures instead of a type (the launcher's once-guarded
//! ready/failed wiring), the `*Template` structs hold optional boxed
//! closures and forward to them.
//!
//! Fan-out is snapshot-then-iterate: the owning component copies its
//! observer list under the lock and invokes callbacks lock-free.

use warden_core::error::{LaunchError, NotFoundError};

use crate::instance::PluginInstance;

/// Observer of one subprocess instance.
pub trait InstanceNotifier: Send + Sync {
    fn on_instance_ready(&self, _instance: &PluginInstance) {}
    fn on_instance_launch_failed(&self, _instance: &PluginInstance, _error: &LaunchError) {}
    fn on_instance_shutdown(&self, _instance: &PluginInstance) {}
    fn on_instance_heartbeat(&self, _instance: &PluginInstance) {}
    fn on_instance_log(&self, _instance: &PluginInstance, _message: &str) {}
    fn on_instance_error_log(&self, _instance: &PluginInstance, _message: &str) {}
    fn on_instance_warning_log(&self, _instance: &PluginInstance, _message: &str) {}
    fn on_instance_stdout(&self, _instance: &PluginInstance, _data: &[u8]) {}
    fn on_instance_stderr(&self, _instance: &PluginInstance, _data: &[u8]) {}
}

/// Observer of one runtime's schedule lifecycle.
pub trait RuntimeNotifier: Send + Sync {
    fn on_instance_starting(&self) {}
    fn on_instance_ready(&self, _instance: &PluginInstance) {}
    fn on_instance_launch_failed(&self, _instance: Option<&PluginInstance>, _error: &LaunchError) {}
    fn on_instance_scale_up(&self, _replicas: i32) {}
    fn on_instance_scale_down(&self, _replicas: i32) {}
    fn on_instance_scale_down_failed(&self, _error: &NotFoundError) {}
    fn on_runtime_stop_schedule(&self) {}
    fn on_runtime_close(&self) {}
}

type InstanceFn = Box<dyn Fn(&PluginInstance) + Send + Sync>;
type InstanceErrFn = Box<dyn Fn(&PluginInstance, &LaunchError) + Send + Sync>;
type OptInstanceErrFn = Box<dyn Fn(Option<&PluginInstance>, &LaunchError) + Send + Sync>;
type ReplicasFn = Box<dyn Fn(i32) + Send + Sync>;
type UnitFn = Box<dyn Fn() + Send + Sync>;

/// Closure-backed [`InstanceNotifier`]; unset fields are no-ops.
#[derive(Default)]
pub struct InstanceNotifierTemplate {
    pub on_ready: Option<InstanceFn>,
    pub on_launch_failed: Option<InstanceErrFn>,
    pub on_shutdown: Option<InstanceFn>,
    pub on_heartbeat: Option<InstanceFn>,
}

impl InstanceNotifier for InstanceNotifierTemplate {
    fn on_instance_ready(&self, instance: &PluginInstance) {
        if let Some(f) = &self.on_ready {
            f(instance);
        }
    }

    fn on_instance_launch_failed(&self, instance: &PluginInstance, error: &LaunchError) {
        if let Some(f) = &self.on_launch_failed {
            f(instance, error);
        }
    }

    fn on_instance_shutdown(&self, instance: &PluginInstance) {
        if let Some(f) = &self.on_shutdown {
            f(instance);
        }
    }

    fn on_instance_heartbeat(&self, instance: &PluginInstance) {
        if let Some(f) = &self.on_heartbeat {
            f(instance);
        }
    }
}

/// Closure-backed [`RuntimeNotifier`]; unset fields are no-ops.
#[derive(Default)]
pub struct RuntimeNotifierTemplate {
    pub on_instance_ready: Option<InstanceFn>,
    pub on_instance_launch_failed: Option<OptInstanceErrFn>,
    pub on_instance_scale_up: Option<ReplicasFn>,
    pub on_instance_scale_down: Option<ReplicasFn>,
    pub on_runtime_stop_schedule: Option<UnitFn>,
    pub on_runtime_close: Option<UnitFn>,
}

impl RuntimeNotifier for RuntimeNotifierTemplate {
    fn on_instance_ready(&self, instance: &PluginInstance) {
        if let Some(f) = &self.on_instance_ready {
            f(instance);
        }
    }

    fn on_instance_launch_failed(&self, instance: Option<&PluginInstance>, error: &LaunchError) {
        if let Some(f) = &self.on_instance_launch_failed {
            f(instance, error);
        }
    }

    fn on_instance_scale_up(&self, replicas: i32) {
        if let Some(f) = &self.on_instance_scale_up {
            f(replicas);
        }
    }

    fn on_instance_scale_down(&self, replicas: i32) {
        if let Some(f) = &self.on_instance_scale_down {
            f(replicas);
        }
    }

    fn on_runtime_stop_schedule(&self) {
        if let Some(f) = &self.on_runtime_stop_schedule {
            f();
        }
    }

    fn on_runtime_close(&self) {
        if let Some(f) = &self.on_runtime_close {
            f();
        }
    }
}

/// Observer that mirrors instance lifecycle into the log stream.
pub struct LoggerNotifier;

impl InstanceNotifier for LoggerNotifier {
    fn on_instance_ready(&self, instance: &PluginInstance) {
        tracing::info!(
            plugin = %instance.plugin_identity(),
            instance = %instance.short_id(),
            "plugin instance ready"
        );
    }

    fn on_instance_launch_failed(&self, instance: &PluginInstance, error: &LaunchError) {
        tracing::error!(
            plugin = %instance.plugin_identity(),
            instance = %instance.short_id(),
            error = %error,
            "plugin instance failed"
        );
    }

    fn on_instance_shutdown(&self, instance: &PluginInstance) {
        tracing::warn!(
            plugin = %instance.plugin_identity(),
            instance = %instance.short_id(),
            "plugin instance has been shutdown"
        );
    }

    fn on_instance_log(&self, instance: &PluginInstance, message: &str) {
        tracing::info!(
            plugin = %instance.plugin_identity(),
            instance = %instance.short_id(),
            message,
            "plugin log"
        );
    }

    fn on_instance_error_log(&self, instance: &PluginInstance, message: &str) {
        tracing::error!(
            plugin = %instance.plugin_identity(),
            instance = %instance.short_id(),
            message,
            "plugin error log"
        );
    }

    fn on_instance_warning_log(&self, instance: &PluginInstance, message: &str) {
        tracing::warn!(
            plugin = %instance.plugin_identity(),
            instance = %instance.short_id(),
            message,
            "plugin warning"
        );
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
