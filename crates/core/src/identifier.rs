// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin identity.
//!
//! A unique identifier has the form `author/name:version@checksum`. The
//! `author/name` prefix is tenant-visible; the checksum suffix pins the
//! exact package bytes a runtime was launched from.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigurationError;

/// Stable identity of one installable plugin package.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginUniqueIdentifier(String);

impl PluginUniqueIdentifier {
    /// Parse an `author/name:version@checksum` string.
    pub fn parse(s: impl Into<String>) -> Result<Self, ConfigurationError> {
        let s = s.into();
        let (identity, checksum) = s
            .rsplit_once('@')
            .ok_or_else(|| ConfigurationError::InvalidIdentifier(s.clone()))?;
        let (plugin_id, version) = identity
            .rsplit_once(':')
            .ok_or_else(|| ConfigurationError::InvalidIdentifier(s.clone()))?;
        if checksum.is_empty() || version.is_empty() || !plugin_id.contains('/') {
            return Err(ConfigurationError::InvalidIdentifier(s));
        }
        Ok(Self(s))
    }

    /// Build an identifier from an `author/name:version` identity and a checksum.
    pub fn from_identity(
        identity: &str,
        checksum: &str,
    ) -> Result<Self, ConfigurationError> {
        Self::parse(format!("{identity}@{checksum}"))
    }

    /// Debugging plugins derive identity from the owning tenant instead of
    /// the declared author.
    pub fn remote_like(
        tenant_id: &str,
        name: &str,
        version: &str,
        checksum: &str,
    ) -> Result<Self, ConfigurationError> {
        Self::parse(format!("{tenant_id}/{name}:{version}@{checksum}"))
    }

    /// Tenant-visible `author/name` prefix.
    pub fn plugin_id(&self) -> &str {
        self.0.split_once(':').map(|(id, _)| id).unwrap_or(&self.0)
    }

    /// Package checksum suffix.
    pub fn checksum(&self) -> &str {
        self.0.rsplit_once('@').map(|(_, c)| c).unwrap_or("")
    }

    /// Declared version segment.
    pub fn version(&self) -> &str {
        self.0
            .split_once(':')
            .and_then(|(_, rest)| rest.rsplit_once('@'))
            .map(|(v, _)| v)
            .unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form: colons are not allowed in paths on every
    /// platform, so they are replaced with dashes.
    pub fn working_dir_name(&self) -> String {
        self.0.replace(':', "-")
    }
}

impl std::fmt::Display for PluginUniqueIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for PluginUniqueIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl std::borrow::Borrow<str> for PluginUniqueIdentifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PluginUniqueIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// SHA-256 hex digest of an identity string, used where an identifier must
/// be safe for arbitrary key namespaces.
pub fn hashed_identity(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        // write! to a String cannot fail
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
#[path = "identifier_tests.rs"]
mod tests;
