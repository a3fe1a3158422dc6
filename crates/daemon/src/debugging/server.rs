// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The debugging TCP listener.
//!
//! One task per connection reads newline-delimited frames; registration
//! frames drive the handshake state machine, everything after `END` is
//! session traffic. A connection that has not completed the handshake
//! within 10 s is closed.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use warden_core::config::Config;
use warden_wire::FrameReader;

use super::handlers;
use super::runtime::RemotePluginRuntime;
use super::{ConnectionKeyResolver, DebuggingNotifier, ServerShutdownReason};

const HANDSHAKE_DEADLINE: Duration = Duration::from_secs(10);

pub struct DebuggingServer {
    weak_self: Weak<DebuggingServer>,
    pub(crate) config: Arc<Config>,
    pub(crate) key_resolver: Arc<dyn ConnectionKeyResolver>,
    notifiers: Mutex<Vec<Arc<dyn DebuggingNotifier>>>,
    pub(crate) current_conn: AtomicI32,
    cancel: CancellationToken,
}

impl DebuggingServer {
    pub fn new(config: Arc<Config>, key_resolver: Arc<dyn ConnectionKeyResolver>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            config,
            key_resolver,
            notifiers: Mutex::new(Vec::new()),
            current_conn: AtomicI32::new(0),
            cancel: CancellationToken::new(),
        })
    }

    pub fn add_notifier(&self, notifier: Arc<dyn DebuggingNotifier>) {
        self.notifiers.lock().push(notifier);
    }

    /// Snapshot the observer list under the lock, then invoke lock-free.
    pub fn walk_notifiers(&self, f: impl Fn(&dyn DebuggingNotifier)) {
        let notifiers = self.notifiers.lock().clone();
        for notifier in &notifiers {
            f(notifier.as_ref());
        }
    }

    pub fn connection_count(&self) -> i32 {
        self.current_conn.load(Ordering::Acquire)
    }

    /// Bind and start accepting. Returns the bound address (useful when
    /// configured with port 0).
    pub async fn launch(&self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind((
            self.config.plugin_remote_installing_host.as_str(),
            self.config.plugin_remote_installing_port,
        ))
        .await?;
        let addr = listener.local_addr()?;

        tracing::info!(
            %addr,
            max_conn = self.config.plugin_remote_installing_max_conn,
            event_loops = self.config.plugin_remote_install_server_event_loop_nums,
            "debugging server listening"
        );

        let Some(server) = self.weak_self.upgrade() else {
            return Err(std::io::Error::other("server dropped before launch"));
        };
        tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = server.cancel.cancelled() => break,
                    accepted = listener.accept() => accepted,
                };
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "debugging connection opened");
                        let server = Arc::clone(&server);
                        tokio::spawn(async move {
                            server.handle_connection(stream).await;
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "debugging accept error"),
                }
            }
        });

        Ok(addr)
    }

    /// Signal shutdown: stop accepting and notify observers.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.walk_notifiers(|n| n.on_server_shutdown(ServerShutdownReason::Exit));
    }

    async fn handle_connection(self: Arc<Self>, stream: tokio::net::TcpStream) {
        let (read_half, write_half) = stream.into_split();
        let runtime = RemotePluginRuntime::new(write_half);

        // handshake deadline: close silently if no handshake in time
        let deadline_runtime = Arc::clone(&runtime);
        tokio::spawn(async move {
            tokio::time::sleep(HANDSHAKE_DEADLINE).await;
            if !deadline_runtime.handshake_done() {
                deadline_runtime.stop();
            }
        });

        self.read_loop(read_half, &runtime).await;
        self.on_close(&runtime);
    }

    async fn read_loop(&self, read_half: OwnedReadHalf, runtime: &Arc<RemotePluginRuntime>) {
        let cancel = runtime.cancel_token();
        let mut reader =
            FrameReader::new(read_half, self.config.plugin_runtime_max_buffer_size);
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = reader.next_frame() => frame,
            };
            match frame {
                Some(Ok(line)) => handlers::on_message(self, runtime, &line).await,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "debugging connection frame error");
                    break;
                }
                None => break,
            }
        }
    }

    fn on_close(&self, runtime: &Arc<RemotePluginRuntime>) {
        if runtime.counted.load(Ordering::Acquire) {
            self.current_conn.fetch_sub(1, Ordering::AcqRel);
        }
        runtime.cleanup_resources();
        self.walk_notifiers(|n| n.on_runtime_disconnected(runtime));
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
