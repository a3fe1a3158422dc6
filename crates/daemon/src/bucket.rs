// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object-store buckets.
//!
//! Two buckets matter to the supervisor: the *package* bucket holds raw
//! package bytes keyed by identifier, and the *installed* bucket holds
//! markers whose presence means "this cluster considers the plugin
//! installed". Both are shared across nodes; this module provides the
//! traits, a filesystem implementation for single-node deployments, and
//! in-memory fakes for tests.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use warden_core::identifier::PluginUniqueIdentifier;

/// Raw package bytes keyed by `identifier.to_string()`.
#[async_trait]
pub trait PackageBucket: Send + Sync {
    async fn get(&self, key: &str) -> io::Result<Vec<u8>>;
    async fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()>;
    async fn exists(&self, key: &str) -> io::Result<bool>;
    async fn delete(&self, key: &str) -> io::Result<()>;
}

/// Installed markers. `save` implies installed, `delete` implies
/// uninstalled, `list` enumerates the cluster's installed set.
#[async_trait]
pub trait InstalledBucket: Send + Sync {
    async fn save(&self, id: &PluginUniqueIdentifier, bytes: &[u8]) -> io::Result<()>;
    async fn exists(&self, id: &PluginUniqueIdentifier) -> io::Result<bool>;
    async fn delete(&self, id: &PluginUniqueIdentifier) -> io::Result<()>;
    async fn list(&self) -> io::Result<Vec<PluginUniqueIdentifier>>;
}

/// Filesystem-backed package bucket rooted at one directory. Identifier
/// keys contain `/`, so objects land in nested directories.
pub struct FsPackageBucket {
    root: PathBuf,
}

impl FsPackageBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl PackageBucket for FsPackageBucket {
    async fn get(&self, key: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.object_path(key)).await
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await
    }

    async fn exists(&self, key: &str) -> io::Result<bool> {
        Ok(tokio::fs::try_exists(self.object_path(key)).await?)
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Filesystem-backed installed bucket. Each marker is one file whose
/// relative path is the identifier string.
pub struct FsInstalledBucket {
    root: PathBuf,
}

impl FsInstalledBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn marker_path(&self, id: &PluginUniqueIdentifier) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn collect(dir: &Path, prefix: &str, out: &mut Vec<PluginUniqueIdentifier>) -> io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
            if entry.file_type()?.is_dir() {
                Self::collect(&entry.path(), &key, out)?;
            } else if let Ok(id) = PluginUniqueIdentifier::parse(key) {
                out.push(id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InstalledBucket for FsInstalledBucket {
    async fn save(&self, id: &PluginUniqueIdentifier, bytes: &[u8]) -> io::Result<()> {
        let path = self.marker_path(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await
    }

    async fn exists(&self, id: &PluginUniqueIdentifier) -> io::Result<bool> {
        Ok(tokio::fs::try_exists(self.marker_path(id)).await?)
    }

    async fn delete(&self, id: &PluginUniqueIdentifier) -> io::Result<()> {
        match tokio::fs::remove_file(self.marker_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> io::Result<Vec<PluginUniqueIdentifier>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            if !root.exists() {
                return Ok(Vec::new());
            }
            let mut out = Vec::new();
            Self::collect(&root, "", &mut out)?;
            Ok(out)
        })
        .await
        .map_err(|e| io::Error::other(format!("list task failed: {e}")))?
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fakes::{MemInstalledBucket, MemPackageBucket};

#[cfg(any(test, feature = "test-support"))]
mod fakes {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    /// In-memory package bucket for tests.
    #[derive(Default)]
    pub struct MemPackageBucket {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemPackageBucket {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PackageBucket for MemPackageBucket {
        async fn get(&self, key: &str) -> io::Result<Vec<u8>> {
            self.objects
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no object: {key}")))
        }

        async fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
            self.objects.lock().insert(key.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn exists(&self, key: &str) -> io::Result<bool> {
            Ok(self.objects.lock().contains_key(key))
        }

        async fn delete(&self, key: &str) -> io::Result<()> {
            self.objects.lock().remove(key);
            Ok(())
        }
    }

    /// In-memory installed bucket for tests.
    #[derive(Default)]
    pub struct MemInstalledBucket {
        markers: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemInstalledBucket {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl InstalledBucket for MemInstalledBucket {
        async fn save(&self, id: &PluginUniqueIdentifier, bytes: &[u8]) -> io::Result<()> {
            self.markers.lock().insert(id.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn exists(&self, id: &PluginUniqueIdentifier) -> io::Result<bool> {
            Ok(self.markers.lock().contains_key(id.as_str()))
        }

        async fn delete(&self, id: &PluginUniqueIdentifier) -> io::Result<()> {
            self.markers.lock().remove(id.as_str());
            Ok(())
        }

        async fn list(&self) -> io::Result<Vec<PluginUniqueIdentifier>> {
            let markers = self.markers.lock();
            let mut ids: Vec<_> =
                markers.keys().filter_map(|k| PluginUniqueIdentifier::parse(k.clone()).ok()).collect();
            ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            Ok(ids)
        }
    }
}

#[cfg(test)]
#[path = "bucket_tests.rs"]
mod tests;
