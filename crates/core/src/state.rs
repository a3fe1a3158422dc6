// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-runtime lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one runtime. Transitions are monotone within a launch
/// attempt; a restart bumps the counter and returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginRuntimeStatus {
    Pending,
    Launching,
    Active,
    Restarting,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRuntimeState {
    pub status: PluginRuntimeStatus,
    pub restarts: u32,
    pub working_path: std::path::PathBuf,
    pub active_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub verified: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub logs: Vec<String>,
}

impl PluginRuntimeState {
    pub fn new(working_path: std::path::PathBuf, verified: bool) -> Self {
        Self {
            status: PluginRuntimeStatus::Pending,
            restarts: 0,
            working_path,
            active_at: None,
            stopped_at: None,
            verified,
            scheduled_at: None,
            logs: Vec::new(),
        }
    }

    pub fn set_active(&mut self) {
        self.status = PluginRuntimeStatus::Active;
        self.active_at = Some(Utc::now());
    }

    pub fn set_launching(&mut self) {
        self.status = PluginRuntimeStatus::Launching;
    }

    pub fn set_restarting(&mut self) {
        self.status = PluginRuntimeStatus::Restarting;
        self.restarts += 1;
    }

    pub fn set_pending(&mut self) {
        self.status = PluginRuntimeStatus::Pending;
    }

    pub fn set_stopped(&mut self) {
        self.status = PluginRuntimeStatus::Stopped;
        self.stopped_at = Some(Utc::now());
    }

    pub fn is_stopped(&self) -> bool {
        self.status == PluginRuntimeStatus::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_bumps_counter_and_returns_to_pending() {
        let mut state = PluginRuntimeState::new("/tmp/w".into(), false);
        state.set_active();
        state.set_restarting();
        assert_eq!(state.restarts, 1);
        state.set_pending();
        assert_eq!(state.status, PluginRuntimeStatus::Pending);
    }

    #[test]
    fn stop_records_timestamp() {
        let mut state = PluginRuntimeState::new("/tmp/w".into(), true);
        assert!(state.stopped_at.is_none());
        state.set_stopped();
        assert!(state.is_stopped());
        assert!(state.stopped_at.is_some());
    }
}
