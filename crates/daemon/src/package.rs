// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoder wiring.
//!
//! The production package format (signed, content-addressed archive)
//! lives in the packager; the daemon consumes packages only through
//! [`PluginDecoder`]. A [`DecoderFactory`] turns raw bucket bytes into a
//! decoder. [`JsonPackageDecoder`] implements the development package
//! layout — a single JSON document with the manifest inline and files as
//! base64 — which is enough to run the daemon without the packager.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use warden_core::declaration::PluginDeclaration;
use warden_core::decoder::PluginDecoder;
use warden_core::error::ConfigurationError;

/// Builds a decoder from raw package bytes.
pub trait DecoderFactory: Send + Sync {
    fn decode(&self, package: &[u8]) -> Result<Arc<dyn PluginDecoder>, ConfigurationError>;
}

#[derive(Deserialize)]
struct JsonPackage {
    manifest: PluginDeclaration,
    #[serde(default)]
    files: HashMap<String, String>,
    #[serde(default)]
    assets: HashMap<String, String>,
}

/// Development package: `{"manifest": {...}, "files": {...}, "assets": {...}}`
/// with base64 file bodies. The checksum is the SHA-256 of the package
/// bytes, so it is content-addressed like the production format.
pub struct JsonPackageDecoder {
    manifest: PluginDeclaration,
    checksum: String,
    files: HashMap<String, Vec<u8>>,
    assets: HashMap<String, Vec<u8>>,
}

impl JsonPackageDecoder {
    pub fn new(package: &[u8]) -> Result<Self, ConfigurationError> {
        let parsed: JsonPackage = serde_json::from_slice(package)
            .map_err(|e| ConfigurationError::InvalidManifest(e.to_string()))?;
        parsed.manifest.validate()?;

        let mut hasher = Sha256::new();
        hasher.update(package);
        let checksum = format!("{:x}", hasher.finalize());

        Ok(Self {
            manifest: parsed.manifest,
            checksum,
            files: decode_file_map(parsed.files)?,
            assets: decode_file_map(parsed.assets)?,
        })
    }
}

fn decode_file_map(
    encoded: HashMap<String, String>,
) -> Result<HashMap<String, Vec<u8>>, ConfigurationError> {
    let mut decoded = HashMap::with_capacity(encoded.len());
    for (name, body) in encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|e| ConfigurationError::InvalidManifest(format!("file {name}: {e}")))?;
        decoded.insert(name, bytes);
    }
    Ok(decoded)
}

impl PluginDecoder for JsonPackageDecoder {
    fn manifest(&self) -> Result<PluginDeclaration, ConfigurationError> {
        Ok(self.manifest.clone())
    }

    fn checksum(&self) -> Result<String, ConfigurationError> {
        Ok(self.checksum.clone())
    }

    fn extract_to(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        for (name, bytes) in &self.files {
            let target = dir.join(name);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, bytes)?;
        }
        Ok(())
    }

    fn assets(&self) -> std::io::Result<HashMap<String, Vec<u8>>> {
        Ok(self.assets.clone())
    }
}

#[derive(Default)]
pub struct JsonPackageDecoderFactory;

impl DecoderFactory for JsonPackageDecoderFactory {
    fn decode(&self, package: &[u8]) -> Result<Arc<dyn PluginDecoder>, ConfigurationError> {
        Ok(Arc::new(JsonPackageDecoder::new(package)?))
    }
}

#[cfg(test)]
#[path = "package_tests.rs"]
pub(crate) mod tests;
