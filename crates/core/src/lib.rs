// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-core: shared entities and primitives for the plugin supervisor.

pub mod broadcast;
pub mod config;
pub mod declaration;
pub mod decoder;
pub mod error;
pub mod event;
pub mod identifier;
pub mod lock;
pub mod routine;
pub mod state;

pub use broadcast::{Broadcast, Subscription};
pub use config::{Config, Platform};
pub use declaration::{
    CapabilityRef, PluginDeclaration, PluginExtensions, PluginMeta, PluginResource, PluginRunner,
    RunnerLanguage,
};
#[cfg(any(test, feature = "test-support"))]
pub use decoder::DirPluginDecoder;
pub use decoder::PluginDecoder;
pub use error::{CapacityError, ConfigurationError, LaunchError, NotFoundError, ProtocolError};
pub use event::{parse_universal_event, UniversalEvent};
pub use identifier::{hashed_identity, PluginUniqueIdentifier};
pub use lock::GranularLock;
pub use routine::TaskPool;
pub use state::{PluginRuntimeState, PluginRuntimeStatus};
