// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-daemon: the per-node supervisor engine.
//!
//! The control panel reconciles live runtimes against the shared
//! installed-marker bucket, admits launches through a bounded semaphore,
//! and hosts the debugging TCP server for externally-running plugins.

pub mod bucket;
pub mod control_panel;
pub mod debugging;
pub mod package;
pub mod serverless;

pub use bucket::{FsInstalledBucket, FsPackageBucket, InstalledBucket, PackageBucket};
#[cfg(any(test, feature = "test-support"))]
pub use bucket::{MemInstalledBucket, MemPackageBucket};
pub use control_panel::{
    calculate_wait_time, ControlPanel, ControlPanelNotifier, FailureRecord, InstallError,
    LoggingNotifier, MAX_RETRY_COUNT,
};
pub use debugging::{
    ConnectionInfo, ConnectionKeyResolver, DebuggingNotifier, DebuggingServer,
    RemotePluginRuntime, ServerShutdownReason,
};
#[cfg(any(test, feature = "test-support"))]
pub use debugging::StaticKeyResolver;
pub use package::{DecoderFactory, JsonPackageDecoder, JsonPackageDecoderFactory};
pub use serverless::{ServerlessConnector, ServerlessInstallCache, ServerlessRuntimeRecord};
