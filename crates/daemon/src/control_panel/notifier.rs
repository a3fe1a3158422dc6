// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-panel lifecycle observers.

use std::sync::Arc;

use warden_core::identifier::PluginUniqueIdentifier;
use warden_runtime::LocalPluginRuntime;

use crate::debugging::RemotePluginRuntime;

pub trait ControlPanelNotifier: Send + Sync {
    fn on_local_runtime_starting(&self, _id: &PluginUniqueIdentifier) {}
    fn on_local_runtime_ready(&self, _runtime: &Arc<LocalPluginRuntime>) {}
    fn on_local_runtime_start_failed(&self, _id: &PluginUniqueIdentifier, _error: &str) {}
    /// The runtime's schedule stopped; instances may still be draining.
    fn on_local_runtime_stop(&self, _runtime: &Arc<LocalPluginRuntime>) {}
    /// Every instance is gone.
    fn on_local_runtime_stopped(&self, _runtime: &Arc<LocalPluginRuntime>) {}
    fn on_local_runtime_scale_up(&self, _runtime: &Arc<LocalPluginRuntime>, _replicas: i32) {}
    fn on_local_runtime_scale_down(&self, _runtime: &Arc<LocalPluginRuntime>, _replicas: i32) {}

    fn on_debugging_runtime_connected(&self, _runtime: &Arc<RemotePluginRuntime>) {}
    fn on_debugging_runtime_disconnected(&self, _runtime: &Arc<RemotePluginRuntime>) {}
}

/// Mirrors panel lifecycle into the log stream.
pub struct LoggingNotifier;

impl ControlPanelNotifier for LoggingNotifier {
    fn on_local_runtime_starting(&self, id: &PluginUniqueIdentifier) {
        tracing::info!(plugin = %id, "local runtime starting");
    }

    fn on_local_runtime_ready(&self, runtime: &Arc<LocalPluginRuntime>) {
        tracing::info!(plugin = %runtime.declaration().identity(), "local runtime ready");
    }

    fn on_local_runtime_start_failed(&self, id: &PluginUniqueIdentifier, error: &str) {
        tracing::error!(plugin = %id, error, "local runtime failed to start");
    }

    fn on_local_runtime_stop(&self, runtime: &Arc<LocalPluginRuntime>) {
        tracing::info!(plugin = %runtime.declaration().identity(), "local runtime stopping");
    }

    fn on_local_runtime_stopped(&self, runtime: &Arc<LocalPluginRuntime>) {
        tracing::info!(plugin = %runtime.declaration().identity(), "local runtime stopped");
    }

    fn on_debugging_runtime_connected(&self, runtime: &Arc<RemotePluginRuntime>) {
        tracing::info!(tenant = %runtime.tenant_id(), "debugging runtime connected");
    }

    fn on_debugging_runtime_disconnected(&self, runtime: &Arc<RemotePluginRuntime>) {
        tracing::info!(tenant = %runtime.tenant_id(), "debugging runtime disconnected");
    }
}
