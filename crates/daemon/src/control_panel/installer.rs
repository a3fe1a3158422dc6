// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Install/remove surface.
//!
//! Installing only marks the plugin as installed; launching is left to
//! the reconciler or an explicit `launch_local_plugin`. Removing only
//! deletes the marker; the caller must also invoke a shutdown to stop a
//! running runtime.

use thiserror::Error;

use warden_core::error::ConfigurationError;
use warden_core::identifier::PluginUniqueIdentifier;

use super::ControlPanel;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("bucket error: {0}")]
    Bucket(#[from] std::io::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ControlPanel {
    /// Copy the package from the packages bucket into the installed
    /// bucket and validate its manifest. Idempotent.
    pub async fn install_to_local(&self, id: &PluginUniqueIdentifier) -> Result<(), InstallError> {
        let package = self.package_bucket.get(id.as_str()).await?;
        self.installed_bucket.save(id, &package).await?;

        let decoder = self.decoder_factory.decode(&package)?;
        let manifest = decoder.manifest()?;
        manifest.validate()?;
        Ok(())
    }

    /// Delete the installed marker. Idempotent; running runtimes are not
    /// stopped here.
    pub async fn remove_local_plugin(&self, id: &PluginUniqueIdentifier) -> std::io::Result<()> {
        self.installed_bucket.delete(id).await
    }
}
