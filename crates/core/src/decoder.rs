// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Package decoder interface.
//!
//! The package format (content-addressed archive, signatures, manifest
//! schema) is owned by the packager; the supervisor only consumes decoded
//! views through this trait.

use std::collections::HashMap;
use std::path::Path;

use crate::declaration::PluginDeclaration;
use crate::error::ConfigurationError;

pub trait PluginDecoder: Send + Sync {
    /// Parsed manifest. Immutable for the life of the decoder.
    fn manifest(&self) -> Result<PluginDeclaration, ConfigurationError>;

    /// Content checksum of the package bytes.
    fn checksum(&self) -> Result<String, ConfigurationError>;

    /// Unpack the full package into `dir`.
    fn extract_to(&self, dir: &Path) -> std::io::Result<()>;

    /// Asset files referenced by the manifest, keyed by filename.
    fn assets(&self) -> std::io::Result<HashMap<String, Vec<u8>>>;
}

/// Directory-backed decoder for tests: "extraction" copies a prepared
/// tree, the manifest and checksum are given up front.
#[cfg(any(test, feature = "test-support"))]
pub struct DirPluginDecoder {
    pub declaration: PluginDeclaration,
    pub checksum: String,
    pub source: std::path::PathBuf,
    pub asset_files: HashMap<String, Vec<u8>>,
}

#[cfg(any(test, feature = "test-support"))]
impl DirPluginDecoder {
    pub fn new(declaration: PluginDeclaration, checksum: impl Into<String>, source: std::path::PathBuf) -> Self {
        Self { declaration, checksum: checksum.into(), source, asset_files: HashMap::new() }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl PluginDecoder for DirPluginDecoder {
    fn manifest(&self) -> Result<PluginDeclaration, ConfigurationError> {
        Ok(self.declaration.clone())
    }

    fn checksum(&self) -> Result<String, ConfigurationError> {
        Ok(self.checksum.clone())
    }

    fn extract_to(&self, dir: &Path) -> std::io::Result<()> {
        copy_tree(&self.source, dir)
    }

    fn assets(&self) -> std::io::Result<HashMap<String, Vec<u8>>> {
        Ok(self.asset_files.clone())
    }
}

#[cfg(any(test, feature = "test-support"))]
fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
