// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-runtime: the local plugin runtime.
//!
//! One `LocalPluginRuntime` per plugin identifier owns a set of
//! subprocess instances, keeps their count converged on the replica
//! target, and dispatches host sessions across them.

mod dispatch;
mod environment;
mod instance;
mod notifier;
mod patch;
mod python;
mod runtime;

#[cfg(test)]
mod test_support;

pub use dispatch::WriteError;
pub use instance::{PluginInstance, MAX_ERR_MSG_LEN, MAX_HEARTBEAT_INTERVAL};
pub use notifier::{
    InstanceNotifier, InstanceNotifierTemplate, LoggerNotifier, RuntimeNotifier,
    RuntimeNotifierTemplate,
};
pub use runtime::{LocalPluginRuntime, SCHEDULE_LOOP_INTERVAL};
