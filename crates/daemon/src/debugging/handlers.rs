// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration frame handlers.
//!
//! Until a connection is initialized, every frame must be a
//! `RegisterPayload`; protocol violations answer with an error line and
//! close. After `END`, frames flow to the session dispatcher.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use warden_core::declaration::{CapabilityRef, PluginDeclaration};
use warden_core::error::ProtocolError;
use warden_wire::{AssetChunkPayload, HandshakePayload, RegisterEventType, RegisterPayload};

use super::runtime::RemotePluginRuntime;
use super::server::DebuggingServer;

/// 50 MiB total across all asset files of one connection.
const MAX_ASSETS_BYTES: usize = 50 * 1024 * 1024;

pub(crate) async fn on_message(
    server: &DebuggingServer,
    runtime: &Arc<RemotePluginRuntime>,
    frame: &str,
) {
    if runtime.flags.lock().handshake_failed {
        return;
    }

    if runtime.is_initialized() {
        runtime.touch();
        runtime.dispatch_frame(frame.as_bytes()).await;
        return;
    }

    let payload: RegisterPayload = match serde_json::from_str(frame) {
        Ok(payload) => payload,
        Err(_) => {
            runtime.flags.lock().handshake_failed = true;
            runtime.close_with_error(&ProtocolError::InvalidHandshake).await;
            return;
        }
    };

    match payload.kind {
        RegisterEventType::HandShake => handle_handshake(server, runtime, payload).await,
        RegisterEventType::AssetChunk => {
            if let Err(e) = handle_asset_chunk(runtime, payload) {
                runtime.close_with_error(&e).await;
            }
        }
        RegisterEventType::End => handle_end(server, runtime).await,
        kind => {
            if let Err(e) = handle_declaration(runtime, kind, payload.data) {
                runtime.close_with_error(&e).await;
            }
        }
    }
}

async fn handle_handshake(
    server: &DebuggingServer,
    runtime: &Arc<RemotePluginRuntime>,
    payload: RegisterPayload,
) {
    if runtime.handshake_done() {
        runtime.flags.lock().handshake_failed = true;
        runtime.close_with_error(&ProtocolError::HandshakeCompleted).await;
        return;
    }

    let handshake: HandshakePayload = match serde_json::from_value(payload.data) {
        Ok(handshake) => handshake,
        Err(_) => {
            runtime.flags.lock().handshake_failed = true;
            runtime.close_with_error(&ProtocolError::InvalidHandshake).await;
            return;
        }
    };

    match server.key_resolver.resolve(&handshake.key).await {
        Ok(info) => {
            *runtime.tenant_id.write() = info.tenant_id;
            runtime.flags.lock().handshake = true;
        }
        Err(error) => {
            runtime.flags.lock().handshake_failed = true;
            runtime.close_with_error(&error).await;
        }
    }
}

fn handle_asset_chunk(
    runtime: &Arc<RemotePluginRuntime>,
    payload: RegisterPayload,
) -> Result<(), ProtocolError> {
    let chunk: AssetChunkPayload = serde_json::from_value(payload.data)
        .map_err(|e| ProtocolError::MalformedFrame(format!("transfer assets failed, error: {e}")))?;

    {
        let total = runtime.assets_bytes.lock();
        if *total + chunk.data.len() > MAX_ASSETS_BYTES {
            return Err(ProtocolError::AssetsTooLarge);
        }
    }

    let bytes = chunk.decode()?;

    let mut assets = runtime.assets.lock();
    assets.entry(chunk.filename).or_default().extend_from_slice(&bytes);
    *runtime.assets_bytes.lock() += bytes.len();
    Ok(())
}

fn handle_declaration(
    runtime: &Arc<RemotePluginRuntime>,
    kind: RegisterEventType,
    data: serde_json::Value,
) -> Result<(), ProtocolError> {
    match kind {
        RegisterEventType::ManifestDeclaration => {
            if runtime.flags.lock().manifest {
                return Err(ProtocolError::DuplicateDeclaration("manifest"));
            }
            let declaration: PluginDeclaration = serde_json::from_value(data).map_err(|e| {
                ProtocolError::MalformedFrame(format!(
                    "handshake failed, invalid plugin declaration: {e}"
                ))
            })?;
            *runtime.declaration.write() = Some(declaration);
            runtime.flags.lock().manifest = true;
            Ok(())
        }
        RegisterEventType::ToolDeclaration => {
            register_capability(runtime, "tools", data, |flags| &mut flags.tools, |slots, cap| {
                slots.tool = cap;
            })
        }
        RegisterEventType::ModelDeclaration => {
            register_capability(runtime, "models", data, |flags| &mut flags.models, |slots, cap| {
                slots.model = cap;
            })
        }
        RegisterEventType::EndpointDeclaration => register_capability(
            runtime,
            "endpoints",
            data,
            |flags| &mut flags.endpoints,
            |slots, cap| {
                slots.endpoint = cap;
            },
        ),
        RegisterEventType::AgentStrategyDeclaration => register_capability(
            runtime,
            "agent strategies",
            data,
            |flags| &mut flags.agent_strategies,
            |slots, cap| {
                slots.agent_strategy = cap;
            },
        ),
        RegisterEventType::DatasourceDeclaration => register_capability(
            runtime,
            "datasources",
            data,
            |flags| &mut flags.datasources,
            |slots, cap| {
                slots.datasource = cap;
            },
        ),
        RegisterEventType::TriggerDeclaration => register_capability(
            runtime,
            "triggers",
            data,
            |flags| &mut flags.triggers,
            |slots, cap| {
                slots.trigger = cap;
            },
        ),
        RegisterEventType::HandShake | RegisterEventType::AssetChunk | RegisterEventType::End => {
            unreachable!("routed before handle_declaration")
        }
    }
}

fn register_capability(
    runtime: &Arc<RemotePluginRuntime>,
    family: &'static str,
    data: serde_json::Value,
    flag: impl Fn(&mut super::runtime::RegistrationFlags) -> &mut bool,
    store: impl Fn(&mut super::runtime::CapabilitySlots, Option<CapabilityRef>),
) -> Result<(), ProtocolError> {
    {
        let mut flags = runtime.flags.lock();
        let transferred = flag(&mut flags);
        if *transferred {
            return Err(ProtocolError::DuplicateDeclaration(family));
        }
        *transferred = true;
    }

    let declarations: Vec<CapabilityRef> = serde_json::from_value(data).map_err(|e| {
        ProtocolError::MalformedFrame(format!("{family} register failed, invalid declaration: {e}"))
    })?;

    store(&mut runtime.capabilities.lock(), declarations.into_iter().next());
    Ok(())
}

async fn handle_end(server: &DebuggingServer, runtime: &Arc<RemotePluginRuntime>) {
    // capacity is claimed at END, released when the connection closes
    runtime.counted.store(true, Ordering::Release);
    let current = server.current_conn.fetch_add(1, Ordering::AcqRel) + 1;
    if current > server.config.plugin_remote_installing_max_conn as i32 {
        let busy = warden_core::CapacityError::ServerBusy;
        runtime.close_with_error_line(&busy.to_string()).await;
        return;
    }

    if let Err(e) = initialize(runtime) {
        runtime.close_with_error(&e).await;
        return;
    }

    tokio::spawn(Arc::clone(runtime).heartbeat_monitor());
    server.walk_notifiers(|n| n.on_runtime_connected(runtime));
}

fn initialize(runtime: &Arc<RemotePluginRuntime>) -> Result<(), ProtocolError> {
    {
        let flags = runtime.flags.lock();
        if !flags.any_registration_transferred() {
            return Err(ProtocolError::NoRegistrationTransferred);
        }
    }

    {
        let mut declaration = runtime.declaration.write();
        let declaration = declaration
            .as_mut()
            .ok_or_else(|| ProtocolError::InvalidManifest("manifest declaration missing".into()))?;

        let mut slots = runtime.capabilities.lock();
        declaration.tool = slots.tool.take();
        declaration.model = slots.model.take();
        declaration.endpoint = slots.endpoint.take();
        declaration.agent_strategy = slots.agent_strategy.take();
        declaration.datasource = slots.datasource.take();
        declaration.trigger = slots.trigger.take();
        declaration.fill_in_default_values();

        declaration.validate().map_err(|e| ProtocolError::InvalidManifest(e.to_string()))?;
    }

    let checksum = runtime.calculate_checksum();
    *runtime.checksum.write() = checksum;
    runtime.init_state();
    runtime.touch();

    let mut flags = runtime.flags.lock();
    flags.assets_transferred = true;
    flags.initialized = true;
    Ok(())
}
