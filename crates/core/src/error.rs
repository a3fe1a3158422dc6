// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor error taxonomy.
//!
//! Configuration errors are never retried; environment and launch errors
//! are retried by the reconciler under backoff; not-found errors always
//! surface to the caller.

use thiserror::Error;

/// Unsupported runner language, malformed manifest or identifier.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid plugin identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("unsupported runner language")]
    UnsupportedLanguage,
}

/// Failures while bringing a runtime up.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("plugin already launched")]
    AlreadyLaunched,

    #[error("failed to start plugin as no heartbeat received")]
    NoHeartbeat,

    #[error("plugin instance shut down before it became ready: {stderr}")]
    InstanceShutdownBeforeReady { stderr: String },

    #[error("runtime schedule already started")]
    AlreadyScheduled,

    #[error("plugin runtime is not active: {0}")]
    NotActive(String),

    #[error("failed to prepare environment: {0}")]
    Environment(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("failed to spawn plugin process: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Lookup failures; always surfaced, never retried internally.
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("plugin runtime not found")]
    PluginRuntime,

    #[error("local plugin runtime not found")]
    LocalPluginRuntime,

    #[error("session not found")]
    Session,

    #[error("no plugin instance available")]
    NoProperInstance,
}

/// Debugging-protocol violations; each closes the connection with an
/// error line.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("handshake failed, invalid handshake message")]
    InvalidHandshake,

    #[error("handshake failed, invalid key")]
    InvalidKey,

    #[error("handshake already completed")]
    HandshakeCompleted,

    #[error("{0} declaration already registered")]
    DuplicateDeclaration(&'static str),

    #[error("no registration transferred, cannot initialize")]
    NoRegistrationTransferred,

    #[error("assets too large, at most 50MB")]
    AssetsTooLarge,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("frame exceeds maximum size")]
    FrameTooLarge,

    #[error("register failed, invalid manifest detected: {0}")]
    InvalidManifest(String),
}

/// Debugging server at capacity.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("server is busy now, please try again later")]
    ServerBusy,
}
