// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection state for one debugging plugin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tokio::net::tcp::OwnedWriteHalf;
use tokio_util::sync::CancellationToken;

use warden_core::broadcast::{self, Subscription, SESSION_QUEUE_DEPTH};
use warden_core::declaration::PluginDeclaration;
use warden_core::error::{ConfigurationError, ProtocolError};
use warden_core::event::{parse_universal_event, UniversalEvent};
use warden_core::identifier::PluginUniqueIdentifier;
use warden_core::state::PluginRuntimeState;
use warden_wire::SessionMessage;

const IDLE_DEADLINE: Duration = Duration::from_secs(60);
const HEARTBEAT_MONITOR_TICK: Duration = Duration::from_secs(60);

type SessionCloser = Arc<dyn Fn() + Send + Sync>;

/// Registration progress for one connection.
#[derive(Default)]
pub(crate) struct RegistrationFlags {
    pub handshake: bool,
    pub handshake_failed: bool,
    pub initialized: bool,
    pub manifest: bool,
    pub tools: bool,
    pub models: bool,
    pub endpoints: bool,
    pub agent_strategies: bool,
    pub datasources: bool,
    pub triggers: bool,
    pub assets_transferred: bool,
}

impl RegistrationFlags {
    /// `END` is only legal once at least one capability family arrived.
    pub fn any_registration_transferred(&self) -> bool {
        self.tools
            || self.models
            || self.endpoints
            || self.agent_strategies
            || self.datasources
            || self.triggers
    }
}

/// Capability declarations received before `END`, merged into the
/// manifest at initialization so transfer order does not matter.
#[derive(Default)]
pub(crate) struct CapabilitySlots {
    pub tool: Option<warden_core::declaration::CapabilityRef>,
    pub model: Option<warden_core::declaration::CapabilityRef>,
    pub endpoint: Option<warden_core::declaration::CapabilityRef>,
    pub agent_strategy: Option<warden_core::declaration::CapabilityRef>,
    pub datasource: Option<warden_core::declaration::CapabilityRef>,
    pub trigger: Option<warden_core::declaration::CapabilityRef>,
}

pub struct RemotePluginRuntime {
    weak_self: std::sync::Weak<RemotePluginRuntime>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,

    closed: AtomicBool,
    alive: AtomicBool,
    /// Whether this connection was counted against the capacity limit.
    pub(crate) counted: AtomicBool,
    cancel: CancellationToken,

    pub(crate) flags: Mutex<RegistrationFlags>,
    pub(crate) capabilities: Mutex<CapabilitySlots>,
    pub(crate) declaration: RwLock<Option<PluginDeclaration>>,
    pub(crate) tenant_id: RwLock<String>,
    pub(crate) checksum: RwLock<String>,
    state: RwLock<Option<PluginRuntimeState>>,

    /// Reassembly buffers keyed by asset filename.
    pub(crate) assets: Mutex<HashMap<String, Vec<u8>>>,
    pub(crate) assets_bytes: Mutex<usize>,

    callbacks: RwLock<HashMap<String, Vec<broadcast::Broadcast<SessionMessage>>>>,
    closers: RwLock<HashMap<String, Vec<SessionCloser>>>,

    last_active_at: Mutex<Instant>,
}

impl RemotePluginRuntime {
    pub(crate) fn new(writer: OwnedWriteHalf) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            writer: tokio::sync::Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            counted: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            flags: Mutex::new(RegistrationFlags::default()),
            capabilities: Mutex::new(CapabilitySlots::default()),
            declaration: RwLock::new(None),
            tenant_id: RwLock::new(String::new()),
            checksum: RwLock::new(String::new()),
            state: RwLock::new(None),
            assets: Mutex::new(HashMap::new()),
            assets_bytes: Mutex::new(0),
            callbacks: RwLock::new(HashMap::new()),
            closers: RwLock::new(HashMap::new()),
            last_active_at: Mutex::new(Instant::now()),
        })
    }

    pub fn tenant_id(&self) -> String {
        self.tenant_id.read().clone()
    }

    pub fn checksum(&self) -> String {
        self.checksum.read().clone()
    }

    pub fn declaration(&self) -> Option<PluginDeclaration> {
        self.declaration.read().clone()
    }

    pub fn runtime_state(&self) -> Option<PluginRuntimeState> {
        self.state.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.flags.lock().initialized
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn handshake_done(&self) -> bool {
        self.flags.lock().handshake
    }

    pub(crate) fn touch(&self) {
        *self.last_active_at.lock() = Instant::now();
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_active_at.lock().elapsed()
    }

    /// Debugging identity: the tenant substitutes for the author, marking
    /// the runtime as remote-like.
    pub fn identity(&self) -> Result<PluginUniqueIdentifier, ConfigurationError> {
        let declaration = self.declaration.read();
        let declaration = declaration
            .as_ref()
            .ok_or_else(|| ConfigurationError::InvalidManifest("declaration not transferred".into()))?;
        PluginUniqueIdentifier::remote_like(
            &self.tenant_id.read(),
            &declaration.name,
            &declaration.version,
            &self.checksum.read(),
        )
    }

    /// Deterministic digest of the assembled artifacts: the merged
    /// declaration plus every asset, ordered by filename.
    pub(crate) fn calculate_checksum(&self) -> String {
        let mut hasher = Sha256::new();
        if let Some(declaration) = self.declaration.read().as_ref() {
            if let Ok(bytes) = serde_json::to_vec(declaration) {
                hasher.update(&bytes);
            }
        }
        let assets = self.assets.lock();
        let mut names: Vec<_> = assets.keys().cloned().collect();
        names.sort();
        for name in names {
            hasher.update(name.as_bytes());
            if let Some(bytes) = assets.get(&name) {
                hasher.update(bytes);
            }
        }
        format!("{:x}", hasher.finalize())
    }

    pub(crate) fn init_state(&self) {
        let mut state = PluginRuntimeState::new(std::path::PathBuf::new(), false);
        state.set_active();
        *self.state.write() = Some(state);
    }

    /// Subscribe to replies for `session_id`. A connection death delivers
    /// a final error message into the subscription.
    pub fn listen(&self, session_id: &str) -> Subscription<SessionMessage> {
        let (sender, subscription) = broadcast::channel(SESSION_QUEUE_DEPTH);

        let weak = self.weak_self.clone();
        let close_session_id = session_id.to_string();
        subscription.on_close(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.remove_message_callbacks(&close_session_id);
                runtime.remove_session_closers(&close_session_id);
            }
        });

        let closer_sender = sender.clone();
        self.add_session_closer(
            session_id,
            Arc::new(move || {
                let _ = closer_sender.try_send(SessionMessage::connection_closed());
            }),
        );

        self.callbacks.write().entry(session_id.to_string()).or_default().push(sender);
        subscription
    }

    /// Write one request frame to the plugin over the socket.
    pub async fn write(&self, data: &[u8]) -> std::io::Result<()> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection not established",
            ));
        };
        warden_wire::write_frame(writer, data).await
    }

    fn add_session_closer(&self, session_id: &str, closer: SessionCloser) {
        // a late registration after close is a no-op
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.closers.write().entry(session_id.to_string()).or_default().push(closer);
    }

    fn remove_message_callbacks(&self, session_id: &str) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.callbacks.write().remove(session_id);
    }

    fn remove_session_closers(&self, session_id: &str) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.closers.write().remove(session_id);
    }

    /// Dispatch one post-initialization frame through the universal event
    /// parser.
    pub(crate) async fn dispatch_frame(&self, frame: &[u8]) {
        match parse_universal_event(frame) {
            Ok(UniversalEvent::SessionData { session_id, data }) => {
                let listeners = self.callbacks.read().get(&session_id).cloned().unwrap_or_default();
                match serde_json::from_value::<SessionMessage>(data) {
                    Ok(message) => {
                        for listener in &listeners {
                            let _ = listener.send(message.clone()).await;
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            tenant = %self.tenant_id(),
                            session_id,
                            error = %e,
                            "failed to parse session message"
                        );
                    }
                }
            }
            Ok(UniversalEvent::Heartbeat) => self.touch(),
            Ok(UniversalEvent::ErrorLog { message }) => {
                tracing::error!(tenant = %self.tenant_id(), message, "debugging plugin error");
            }
            Ok(UniversalEvent::PlainLog { message }) => {
                tracing::info!(tenant = %self.tenant_id(), message, "debugging plugin log");
            }
            Err(e) => {
                tracing::warn!(
                    tenant = %self.tenant_id(),
                    error = %e,
                    "dropping unclassifiable frame"
                );
            }
        }
    }

    /// Send an error line and close the connection. First caller wins.
    pub(crate) async fn close_with_error(&self, error: &ProtocolError) {
        self.close_with_error_line(&error.to_string()).await;
    }

    pub(crate) async fn close_with_error_line(&self, message: &str) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let line = format!("{message}\n");
        let mut guard = self.writer.lock().await;
        if let Some(writer) = guard.as_mut() {
            use tokio::io::AsyncWriteExt;
            let _ = writer.write_all(line.as_bytes()).await;
            let _ = writer.shutdown().await;
        }
        guard.take();
        drop(guard);
        self.alive.store(false, Ordering::Release);
        self.cancel.cancel();
    }

    /// Tear the connection down without an error line.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Release);
        self.cancel.cancel();
    }

    /// Run all session closers, then mark the runtime dead and clear the
    /// tables. A close that lands after the clear is a no-op.
    pub(crate) fn cleanup_resources(&self) {
        let closers: Vec<SessionCloser> =
            self.closers.read().values().flatten().cloned().collect();
        for closer in closers {
            closer();
        }

        self.alive.store(false, Ordering::Release);
        self.closed.store(true, Ordering::Release);
        self.cancel.cancel();

        self.callbacks.write().clear();
        self.closers.write().clear();
    }

    /// Close the connection if no frame arrived for the idle deadline.
    pub(crate) async fn heartbeat_monitor(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(HEARTBEAT_MONITOR_TICK);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if !self.is_alive() {
                return;
            }
            if self.idle_for() > IDLE_DEADLINE {
                tracing::warn!(
                    tenant = %self.tenant_id(),
                    "debugging connection idle, closing"
                );
                self.stop();
                return;
            }
        }
    }
}
