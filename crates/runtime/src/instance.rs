// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One subprocess instance of a plugin.
//!
//! The instance owns the child process and its three pipes. Two pumps and
//! a monitor run as tasks: the stdout pump parses framed events and feeds
//! session listeners, the stderr pump maintains the rolling error buffer,
//! and the monitor kills the instance when heartbeats stop. The instance
//! dies when either pump exits or `stop` is called, whichever comes first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use warden_core::broadcast::Broadcast;
use warden_core::error::LaunchError;
use warden_core::event::{parse_universal_event, UniversalEvent};
use warden_wire::{FrameReader, SessionMessage};

use crate::notifier::InstanceNotifier;

/// Rolling stderr buffer cap, bytes.
pub const MAX_ERR_MSG_LEN: usize = 1024;

/// An instance that goes this long without a heartbeat is killed.
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(120);

const MONITOR_TICK: Duration = Duration::from_secs(30);
const ERR_MSG_FRESHNESS: Duration = Duration::from_secs(60);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

struct ErrorBuffer {
    message: String,
    updated_at: Instant,
}

pub struct PluginInstance {
    instance_id: String,
    plugin_identity: String,

    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,

    /// session_id → producer half of the session channel.
    listeners: Mutex<HashMap<String, Broadcast<SessionMessage>>>,

    started: AtomicBool,
    shutdown: AtomicBool,
    cancel: CancellationToken,

    error_buf: Mutex<ErrorBuffer>,
    last_active_at: Mutex<Instant>,

    notifiers: Mutex<Vec<Arc<dyn InstanceNotifier>>>,

    max_frame_size: usize,
}

impl PluginInstance {
    pub(crate) fn new(
        plugin_identity: String,
        child: Child,
        stdin: ChildStdin,
        max_frame_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            instance_id: Uuid::new_v4().to_string(),
            plugin_identity,
            stdin: tokio::sync::Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            listeners: Mutex::new(HashMap::new()),
            started: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            error_buf: Mutex::new(ErrorBuffer {
                message: String::new(),
                updated_at: Instant::now(),
            }),
            last_active_at: Mutex::new(Instant::now()),
            notifiers: Mutex::new(Vec::new()),
            max_frame_size,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// First 8 characters of the instance id, for log lines.
    pub fn short_id(&self) -> &str {
        &self.instance_id[..8]
    }

    pub fn plugin_identity(&self) -> &str {
        &self.plugin_identity
    }

    /// Whether the first heartbeat has been observed.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn add_notifier(&self, notifier: Arc<dyn InstanceNotifier>) {
        self.notifiers.lock().push(notifier);
    }

    /// Snapshot the observer list under the lock, then invoke lock-free.
    pub fn walk_notifiers(&self, f: impl Fn(&dyn InstanceNotifier)) {
        let notifiers = self.notifiers.lock().clone();
        for notifier in &notifiers {
            f(notifier.as_ref());
        }
    }

    /// Route session-data frames for `session_id` into `sender` until
    /// detached or the instance dies.
    pub fn attach_listener(&self, session_id: &str, sender: Broadcast<SessionMessage>) {
        self.listeners.lock().insert(session_id.to_string(), sender);
    }

    /// Idempotent; no further deliveries for `session_id` afterwards.
    pub fn detach_listener(&self, session_id: &str) {
        self.listeners.lock().remove(session_id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Write one frame (delimiter included by the caller) to stdin. Writes
    /// are FIFO: the stdin mutex queues concurrent writers.
    pub async fn write(&self, data: &[u8]) -> std::io::Result<()> {
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed"));
        };
        stdin.write_all(data).await?;
        stdin.flush().await
    }

    /// Current stderr buffer if it was updated within the freshness
    /// window, else `None`.
    pub fn error(&self) -> Option<String> {
        let buf = self.error_buf.lock();
        if buf.updated_at.elapsed() < ERR_MSG_FRESHNESS && !buf.message.is_empty() {
            Some(buf.message.clone())
        } else {
            None
        }
    }

    /// Stop the instance: cancel the pumps, close stdin, kill the process.
    /// Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
        if let Ok(mut guard) = self.stdin.try_lock() {
            guard.take();
        }
        if let Some(child) = self.child.lock().as_mut() {
            let _ = child.start_kill();
        }
    }

    /// Wait until the listener table empties or `max_wait` elapses, then
    /// stop. Never blocks past the deadline.
    pub async fn graceful_stop(&self, max_wait: Duration) {
        let deadline = tokio::time::Instant::now() + max_wait;
        let mut ticker = tokio::time::interval(DRAIN_POLL_INTERVAL);
        ticker.tick().await;
        while self.listener_count() > 0 {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    self.stop();
                    return;
                }
                _ = ticker.tick() => {}
            }
        }
        self.stop();
    }

    pub(crate) fn touch(&self) {
        *self.last_active_at.lock() = Instant::now();
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_active_at.lock().elapsed()
    }

    /// Append to the rolling stderr buffer, trimming from the front to
    /// hold the cap.
    pub(crate) fn write_error(&self, msg: &str) {
        let msg = truncate_at_boundary(msg, MAX_ERR_MSG_LEN);
        let mut buf = self.error_buf.lock();
        let overflow = (msg.len() + buf.message.len()).saturating_sub(MAX_ERR_MSG_LEN);
        if overflow > 0 {
            if overflow >= buf.message.len() {
                buf.message.clear();
            } else {
                let mut cut = overflow;
                while cut < buf.message.len() && !buf.message.is_char_boundary(cut) {
                    cut += 1;
                }
                buf.message.drain(..cut);
            }
        }
        buf.message.push_str(msg);
        buf.updated_at = Instant::now();
    }

    /// Read framed events from stdout until EOF, cancellation or an
    /// oversized frame, then kill the process and announce shutdown.
    pub(crate) async fn run_stdout_pump(self: Arc<Self>, stdout: ChildStdout) {
        let mut reader = FrameReader::new(stdout, self.max_frame_size);
        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => break,
                frame = reader.next_frame() => frame,
            };
            let Some(frame) = frame else { break };
            match frame {
                Ok(line) => {
                    self.touch();
                    self.handle_frame(line.as_bytes()).await;
                    self.walk_notifiers(|n| n.on_instance_stdout(&self, line.as_bytes()));
                }
                Err(e) => {
                    let message =
                        format!("plugin {} has an error on stdout: {e}", self.plugin_identity);
                    self.walk_notifiers(|n| n.on_instance_error_log(&self, &message));
                    break;
                }
            }
        }

        // stdout gone: reap the subprocess before announcing shutdown
        let child = self.child.lock().take();
        if let Some(mut child) = child {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self.shutdown.store(true, Ordering::Release);
        self.walk_notifiers(|n| n.on_instance_shutdown(&self));
    }

    async fn handle_frame(&self, data: &[u8]) {
        match parse_universal_event(data) {
            Ok(UniversalEvent::SessionData { session_id, data }) => {
                // Copy the sender out before delivering: sending suspends,
                // and a listener callback may itself detach.
                let listener = self.listeners.lock().get(&session_id).cloned();
                let Some(listener) = listener else { return };
                match serde_json::from_value::<SessionMessage>(data) {
                    Ok(message) => {
                        let _ = listener.send(message).await;
                    }
                    Err(e) => {
                        tracing::error!(
                            plugin = %self.plugin_identity,
                            session_id,
                            error = %e,
                            "failed to parse session message"
                        );
                    }
                }
            }
            Ok(UniversalEvent::Heartbeat) => {
                self.walk_notifiers(|n| n.on_instance_heartbeat(self));
                if !self.started.swap(true, Ordering::AcqRel) {
                    self.walk_notifiers(|n| n.on_instance_ready(self));
                }
            }
            Ok(UniversalEvent::ErrorLog { message }) => {
                self.write_error(&format!("{message}\n"));
                self.walk_notifiers(|n| n.on_instance_error_log(self, &message));
            }
            Ok(UniversalEvent::PlainLog { message }) => {
                self.walk_notifiers(|n| n.on_instance_log(self, &message));
            }
            Err(e) => {
                tracing::warn!(
                    plugin = %self.plugin_identity,
                    error = %e,
                    "dropping unclassifiable frame"
                );
            }
        }
    }

    /// Read stderr in 1 KiB chunks into the rolling error buffer.
    pub(crate) async fn run_stderr_pump(self: Arc<Self>, mut stderr: ChildStderr) {
        let mut buf = [0u8; 1024];
        loop {
            let n = tokio::select! {
                _ = self.cancel.cancelled() => break,
                read = stderr.read(&mut buf) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                },
            };
            self.touch();
            let chunk = String::from_utf8_lossy(&buf[..n]);
            self.write_error(&format!("{chunk}\n"));
            self.walk_notifiers(|notifier| notifier.on_instance_stderr(&self, &buf[..n]));
        }
    }

    /// Tick until cancelled; kill the instance when heartbeats stop, warn
    /// when they slow down.
    pub(crate) async fn run_monitor(self: Arc<Self>) -> Result<(), LaunchError> {
        let mut ticker = tokio::time::interval(MONITOR_TICK);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            let idle = self.idle_for();
            if idle > MAX_HEARTBEAT_INTERVAL {
                let error = LaunchError::NotActive(format!(
                    "plugin {} is not active for {} seconds, it may be dead, captured error logs: {}",
                    self.plugin_identity,
                    idle.as_secs(),
                    self.error().unwrap_or_default(),
                ));
                self.walk_notifiers(|n| n.on_instance_launch_failed(&self, &error));
                self.stop();
                return Err(error);
            }
            if idle > MAX_HEARTBEAT_INTERVAL / 2 {
                let warning = format!(
                    "plugin {} is not active for {} seconds, it may be dead",
                    self.plugin_identity,
                    idle.as_secs(),
                );
                self.walk_notifiers(|n| n.on_instance_warning_log(&self, &warning));
            }
        }
    }
}

/// Longest prefix of `s` that fits in `max` bytes on a char boundary.
fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    &s[..cut]
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
