// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use warden_core::config::Config;
use warden_core::identifier::PluginUniqueIdentifier;

use super::*;
use crate::bucket::{InstalledBucket, MemInstalledBucket, MemPackageBucket, PackageBucket};
use crate::package::JsonPackageDecoderFactory;

#[test]
fn wait_time_matches_the_step_table() {
    assert_eq!(calculate_wait_time(0), Duration::from_secs(0));
    assert_eq!(calculate_wait_time(1), Duration::from_secs(0));
    assert_eq!(calculate_wait_time(2), Duration::from_secs(0));
    assert_eq!(calculate_wait_time(3), Duration::from_secs(30));
    assert_eq!(calculate_wait_time(7), Duration::from_secs(30));
    assert_eq!(calculate_wait_time(8), Duration::from_secs(60));
    assert_eq!(calculate_wait_time(14), Duration::from_secs(60));
    assert_eq!(calculate_wait_time(15), Duration::from_secs(240));
    assert_eq!(calculate_wait_time(100), Duration::from_secs(240));
}

#[test]
fn wait_time_is_monotone() {
    let mut previous = Duration::from_secs(0);
    for count in 0..32 {
        let wait = calculate_wait_time(count);
        assert!(wait >= previous, "wait time decreased at count {count}");
        previous = wait;
    }
}

fn panel_with_mem_buckets() -> (Arc<ControlPanel>, Arc<MemPackageBucket>, Arc<MemInstalledBucket>)
{
    let packages = Arc::new(MemPackageBucket::new());
    let installed = Arc::new(MemInstalledBucket::new());
    let panel = ControlPanel::new(
        Arc::new(Config::default()),
        Arc::clone(&packages) as Arc<dyn PackageBucket>,
        Arc::clone(&installed) as Arc<dyn InstalledBucket>,
        Arc::new(JsonPackageDecoderFactory),
    );
    (panel, packages, installed)
}

fn id(s: &str) -> PluginUniqueIdentifier {
    PluginUniqueIdentifier::parse(s).unwrap()
}

#[tokio::test]
async fn failed_launches_are_recorded_for_backoff() {
    let (panel, packages, installed) = panel_with_mem_buckets();
    let plugin = id("acme/broken:1.0.0@abc");
    packages.save(plugin.as_str(), b"not a decodable package").await.unwrap();
    installed.save(&plugin, b"marker").await.unwrap();

    panel.handle_new_local_plugins().await;
    let record = panel.failure_record(&plugin).unwrap();
    assert_eq!(record.retry_count, 1);

    // under three failures the wait is zero, so the next pass retries
    panel.handle_new_local_plugins().await;
    assert_eq!(panel.failure_record(&plugin).unwrap().retry_count, 2);

    // at three failures the 30 s wait suppresses further attempts
    panel.handle_new_local_plugins().await;
    assert_eq!(panel.failure_record(&plugin).unwrap().retry_count, 3);
    panel.handle_new_local_plugins().await;
    assert_eq!(panel.failure_record(&plugin).unwrap().retry_count, 3);
}

#[tokio::test]
async fn ignored_plugins_are_never_auto_launched() {
    let (panel, packages, installed) = panel_with_mem_buckets();
    let plugin = id("acme/broken:1.0.0@abc");
    packages.save(plugin.as_str(), b"not a decodable package").await.unwrap();
    installed.save(&plugin, b"marker").await.unwrap();

    panel.disable_auto_launch(&plugin);
    panel.handle_new_local_plugins().await;
    assert!(panel.failure_record(&plugin).is_none());

    panel.enable_auto_launch(&plugin);
    panel.handle_new_local_plugins().await;
    assert!(panel.failure_record(&plugin).is_some());
}

#[tokio::test]
async fn evict_drains_runtimes_whose_marker_is_gone() {
    let (panel, _packages, installed) = panel_with_mem_buckets();
    let plugin = id("acme/demo:1.0.0@c0ffee");

    // hand-build a runtime and publish it as live
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.plugin_working_path = dir.path().join("working");
    let declaration: warden_core::PluginDeclaration = serde_json::from_value(serde_json::json!({
        "version": "1.0.0",
        "author": "acme",
        "name": "demo",
        "meta": { "runner": { "language": "python", "version": "3.12", "entrypoint": "main" } }
    }))
    .unwrap();
    let decoder =
        warden_core::DirPluginDecoder::new(declaration, "c0ffee", dir.path().join("src"));
    let runtime =
        warden_runtime::LocalPluginRuntime::construct(Arc::new(config), &decoder).unwrap();
    panel.local_runtimes.write().insert(plugin.clone(), Arc::clone(&runtime));

    // marker present: nothing happens
    installed.save(&plugin, b"marker").await.unwrap();
    panel.evict_uninstalled_plugins().await;
    assert!(!runtime.runtime_state().is_stopped());

    // marker gone: the runtime is drained
    installed.delete(&plugin).await.unwrap();
    panel.evict_uninstalled_plugins().await;
    for _ in 0..200 {
        if runtime.runtime_state().is_stopped() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(runtime.runtime_state().is_stopped());
}
