// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the debugging server into the control panel.
//!
//! Connected debugging runtimes live in their own map, keyed by their
//! remote-like identity, fully separate from local runtimes.

use std::sync::{Arc, Weak};

use crate::debugging::{ConnectionKeyResolver, DebuggingNotifier, DebuggingServer, RemotePluginRuntime};

use super::ControlPanel;

struct DebuggingSignal {
    panel: Weak<ControlPanel>,
}

impl DebuggingNotifier for DebuggingSignal {
    fn on_runtime_connected(&self, runtime: &Arc<RemotePluginRuntime>) {
        let Some(panel) = self.panel.upgrade() else { return };
        match runtime.identity() {
            Ok(id) => {
                panel.debugging_runtimes.write().insert(id, Arc::clone(runtime));
                panel.walk_notifiers(|n| n.on_debugging_runtime_connected(runtime));
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "failed to get plugin identity, check if your declaration is invalid"
                );
            }
        }
    }

    fn on_runtime_disconnected(&self, runtime: &Arc<RemotePluginRuntime>) {
        let Some(panel) = self.panel.upgrade() else { return };
        match runtime.identity() {
            Ok(id) => {
                panel.debugging_runtimes.write().remove(&id);
                panel.walk_notifiers(|n| n.on_debugging_runtime_disconnected(runtime));
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "failed to get plugin identity, check if your declaration is invalid"
                );
            }
        }
    }
}

impl ControlPanel {
    /// Construct the debugging server once and register the panel's
    /// connection hooks.
    pub fn setup_debugging_server(
        &self,
        key_resolver: Arc<dyn ConnectionKeyResolver>,
    ) -> Arc<DebuggingServer> {
        let mut slot = self.debugging_server.lock();
        if let Some(server) = slot.as_ref() {
            return Arc::clone(server);
        }

        let server = DebuggingServer::new(Arc::clone(&self.config), key_resolver);
        server.add_notifier(Arc::new(DebuggingSignal { panel: self.weak_self() }));
        *slot = Some(Arc::clone(&server));
        server
    }
}
