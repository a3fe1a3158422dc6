// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsed plugin manifest.
//!
//! The declaration is immutable after decode; the supervisor reads it for
//! identity, runner selection and capability metadata. Schema-level
//! validation of capability payloads belongs to the package decoder, so
//! capability declarations are carried as thin named wrappers over raw
//! JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Runner languages the local runtime knows how to spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerLanguage {
    Python,
    #[serde(other)]
    Unknown,
}

/// How to start the plugin process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRunner {
    pub language: RunnerLanguage,
    #[serde(default)]
    pub version: String,
    /// Module passed to the interpreter (`python -m <entrypoint>`).
    pub entrypoint: String,
}

/// Build metadata attached to the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMeta {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub arch: Vec<String>,
    pub runner: PluginRunner,
}

/// Declared resource requirements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginResource {
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub permission: Option<serde_json::Value>,
}

/// Manifest file paths per capability family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginExtensions {
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub agent_strategies: Vec<String>,
    #[serde(default)]
    pub datasources: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// A capability provider declaration: a name plus whatever schema the
/// decoder validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRef {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub spec: serde_json::Value,
}

/// Parsed plugin manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDeclaration {
    pub version: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub author: String,
    pub name: String,
    #[serde(default)]
    pub label: serde_json::Value,
    #[serde(default)]
    pub description: serde_json::Value,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub resource: PluginResource,
    #[serde(default)]
    pub plugins: PluginExtensions,
    pub meta: PluginMeta,

    // Merged capability declarations. The debugging server fills these from
    // registration frames; the decoder fills them from bundled manifests.
    #[serde(default)]
    pub tool: Option<CapabilityRef>,
    #[serde(default)]
    pub model: Option<CapabilityRef>,
    #[serde(default)]
    pub endpoint: Option<CapabilityRef>,
    #[serde(default)]
    pub agent_strategy: Option<CapabilityRef>,
    #[serde(default)]
    pub datasource: Option<CapabilityRef>,
    #[serde(default)]
    pub trigger: Option<CapabilityRef>,
}

impl PluginDeclaration {
    /// `author/name:version` — the identity without a package checksum.
    pub fn identity(&self) -> String {
        format!("{}/{}:{}", self.author, self.name, self.version)
    }

    /// Checks the fields the supervisor itself relies on.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.is_empty() {
            return Err(ConfigurationError::InvalidManifest("name is empty".into()));
        }
        if self.author.is_empty() {
            return Err(ConfigurationError::InvalidManifest("author is empty".into()));
        }
        if self.version.is_empty() {
            return Err(ConfigurationError::InvalidManifest("version is empty".into()));
        }
        if self.meta.runner.entrypoint.is_empty() {
            return Err(ConfigurationError::InvalidManifest("runner entrypoint is empty".into()));
        }
        Ok(())
    }

    /// Backfill optional presentation fields so downstream consumers never
    /// see an absent label.
    pub fn fill_in_default_values(&mut self) {
        if self.label.is_null() {
            self.label = serde_json::json!({ "en_US": self.name });
        }
        if self.description.is_null() {
            self.description = serde_json::json!({ "en_US": "" });
        }
        if self.kind.is_empty() {
            self.kind = "plugin".to_string();
        }
    }
}

#[cfg(test)]
#[path = "declaration_tests.rs"]
mod tests;
