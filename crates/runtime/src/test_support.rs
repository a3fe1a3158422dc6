// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders shared by this crate's tests.

use std::path::Path;
use std::sync::Arc;

use warden_core::config::Config;
use warden_core::declaration::PluginDeclaration;
use warden_core::decoder::DirPluginDecoder;

pub(crate) fn declaration() -> PluginDeclaration {
    #[allow(clippy::unwrap_used)]
    let declaration: PluginDeclaration = serde_json::from_value(serde_json::json!({
        "version": "1.0.0",
        "type": "plugin",
        "author": "acme",
        "name": "demo",
        "meta": {
            "version": "0.0.1",
            "arch": ["amd64"],
            "runner": {
                "language": "python",
                "version": "3.12",
                "entrypoint": "main"
            }
        }
    }))
    .unwrap();
    declaration
}

pub(crate) fn config(root: &Path) -> Arc<Config> {
    let mut config = Config::default();
    config.plugin_working_path = root.join("working");
    config.plugin_installed_path = root.join("installed");
    config.plugin_package_cache_path = root.join("packages");
    Arc::new(config)
}

pub(crate) fn decoder(source: &Path) -> DirPluginDecoder {
    DirPluginDecoder::new(declaration(), "c0ffee", source.to_path_buf())
}
