// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wardend: the plugin supervisor daemon.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use warden_core::config::Config;
use warden_daemon::control_panel::LoggingNotifier;
use warden_daemon::{
    ControlPanel, FsInstalledBucket, FsPackageBucket, JsonPackageDecoderFactory,
};

mod key_resolver;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(Config::from_env());
    tracing::info!(platform = ?config.platform, "starting plugin supervisor");

    let storage_root = config.plugin_storage_local_root.clone();
    let package_bucket =
        Arc::new(FsPackageBucket::new(storage_root.join(&config.plugin_package_cache_path)));
    let installed_bucket =
        Arc::new(FsInstalledBucket::new(storage_root.join(&config.plugin_installed_path)));

    let panel = ControlPanel::new(
        config,
        package_bucket,
        installed_bucket,
        Arc::new(JsonPackageDecoderFactory),
    );
    panel.add_notifier(Arc::new(LoggingNotifier));

    panel.start_watch_dog(Arc::new(key_resolver::EnvKeyResolver::from_env()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to wait for shutdown signal");
    }
    tracing::info!("shutting down");
    panel.shutdown();
}
