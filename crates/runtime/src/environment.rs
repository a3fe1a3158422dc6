// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Working-directory preparation.
//!
//! Extraction happens at most once per working path: a non-empty
//! directory is assumed to hold a previously extracted package for the
//! same checksum (the checksum is part of the path).

use warden_core::declaration::RunnerLanguage;
use warden_core::decoder::PluginDecoder;
use warden_core::error::{ConfigurationError, LaunchError};

use crate::runtime::LocalPluginRuntime;

impl LocalPluginRuntime {
    /// Extract the package and prepare the runner environment. Called
    /// before the first `schedule`; failure surfaces to the launcher.
    pub async fn init_environment(&self, decoder: &dyn PluginDecoder) -> Result<(), LaunchError> {
        self.extract_plugin_to_working_path(decoder)?;

        match self.declaration.meta.runner.language {
            RunnerLanguage::Python => self.init_python_environment().await,
            RunnerLanguage::Unknown => Err(ConfigurationError::UnsupportedLanguage.into()),
        }
    }

    fn extract_plugin_to_working_path(
        &self,
        decoder: &dyn PluginDecoder,
    ) -> Result<(), LaunchError> {
        let working_path = self.working_path();

        match std::fs::read_dir(&working_path) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    decoder
                        .extract_to(&working_path)
                        .map_err(|e| LaunchError::Environment(format!("extract plugin: {e}")))?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::create_dir_all(&working_path).map_err(|e| {
                    LaunchError::Environment(format!("create working directory: {e}"))
                })?;
                decoder
                    .extract_to(&working_path)
                    .map_err(|e| LaunchError::Environment(format!("extract plugin: {e}")))?;
            }
            Err(e) => {
                return Err(LaunchError::Environment(format!("check working directory: {e}")))
            }
        }

        Ok(())
    }

    /// Re-check that the prepared environment is still usable.
    pub fn environment_validation(&self) -> Result<(), LaunchError> {
        match self.declaration.meta.runner.language {
            RunnerLanguage::Python => self
                .check_python_virtual_environment()
                .map(|_| ())
                .map_err(|e| LaunchError::Environment(e.to_string())),
            RunnerLanguage::Unknown => Err(ConfigurationError::UnsupportedLanguage.into()),
        }
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
