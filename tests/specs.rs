// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenarios exercising the public supervisor surface:
//! install/reconcile/backoff on the control panel, and the debugging
//! registration path end to end over TCP.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use warden_core::config::Config;
use warden_core::identifier::PluginUniqueIdentifier;
use warden_daemon::{
    ControlPanel, InstalledBucket, JsonPackageDecoderFactory, MemInstalledBucket,
    MemPackageBucket, PackageBucket, StaticKeyResolver,
};

fn build_panel(
    config: Config,
) -> (Arc<ControlPanel>, Arc<MemPackageBucket>, Arc<MemInstalledBucket>) {
    let packages = Arc::new(MemPackageBucket::new());
    let installed = Arc::new(MemInstalledBucket::new());
    let panel = ControlPanel::new(
        Arc::new(config),
        Arc::clone(&packages) as Arc<dyn PackageBucket>,
        Arc::clone(&installed) as Arc<dyn InstalledBucket>,
        Arc::new(JsonPackageDecoderFactory),
    );
    (panel, packages, installed)
}

fn id(s: &str) -> PluginUniqueIdentifier {
    PluginUniqueIdentifier::parse(s).unwrap()
}

async fn send_line(stream: &mut TcpStream, value: &serde_json::Value) {
    let mut bytes = serde_json::to_vec(value).unwrap();
    bytes.push(b'\n');
    stream.write_all(&bytes).await.unwrap();
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn install_marks_and_reconcile_attempts_a_launch() {
    let (panel, packages, installed) = build_panel(Config::default());
    let plugin = id("acme/broken:1.0.0@abc");

    // a marker for a package that cannot be decoded: the reconciler
    // attempts the launch and records the failure for backoff
    packages.save(plugin.as_str(), b"undecodable").await.unwrap();
    installed.save(&plugin, b"marker").await.unwrap();

    panel.reconcile_once().await;

    assert!(installed.exists(&plugin).await.unwrap());
    assert_eq!(panel.failure_record(&plugin).unwrap().retry_count, 1);
}

#[tokio::test]
async fn retry_backoff_survives_uninstall() {
    let (panel, packages, installed) = build_panel(Config::default());
    let plugin = id("acme/broken:1.0.0@abc");
    packages.save(plugin.as_str(), b"undecodable").await.unwrap();
    installed.save(&plugin, b"marker").await.unwrap();

    for _ in 0..3 {
        panel.reconcile_once().await;
    }
    assert_eq!(panel.failure_record(&plugin).unwrap().retry_count, 3);

    // uninstalling does not clear the record; only a successful launch does
    panel.remove_local_plugin(&plugin).await.unwrap();
    panel.reconcile_once().await;
    assert_eq!(panel.failure_record(&plugin).unwrap().retry_count, 3);
}

#[tokio::test]
async fn concurrent_installs_collapse_to_one_marker() {
    let (panel, packages, installed) = build_panel(Config::default());
    let plugin = id("acme/demo:1.0.0@abc");

    let package = serde_json::to_vec(&serde_json::json!({
        "manifest": {
            "version": "1.0.0",
            "author": "acme",
            "name": "demo",
            "meta": { "runner": { "language": "python", "version": "3.12", "entrypoint": "main" } }
        }
    }))
    .unwrap();
    packages.save(plugin.as_str(), &package).await.unwrap();

    let a = {
        let panel = Arc::clone(&panel);
        let plugin = plugin.clone();
        tokio::spawn(async move { panel.install_to_local(&plugin).await })
    };
    let b = {
        let panel = Arc::clone(&panel);
        let plugin = plugin.clone();
        tokio::spawn(async move { panel.install_to_local(&plugin).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(installed.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn debugging_registration_reaches_the_panel() {
    let mut config = Config::default();
    config.plugin_remote_installing_host = "127.0.0.1".to_string();
    config.plugin_remote_installing_port = 0;
    let (panel, _packages, _installed) = build_panel(config);

    let resolver =
        Arc::new(StaticKeyResolver::new([("dbg-key".to_string(), "tenant-7".to_string())]));
    let server = panel.setup_debugging_server(resolver);
    let addr = server.launch().await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    send_line(&mut stream, &serde_json::json!({"type": "HAND_SHAKE", "data": {"key": "dbg-key"}}))
        .await;
    send_line(
        &mut stream,
        &serde_json::json!({
            "type": "MANIFEST_DECLARATION",
            "data": {
                "version": "0.0.1",
                "author": "dev",
                "name": "probe",
                "meta": { "runner": { "language": "python", "version": "3.12", "entrypoint": "main" } }
            }
        }),
    )
    .await;
    send_line(&mut stream, &serde_json::json!({"type": "TOOL_DECLARATION", "data": [{"name": "t"}]}))
        .await;
    send_line(&mut stream, &serde_json::json!({"type": "END"})).await;

    wait_until(|| !panel.debugging_runtime_identifiers().is_empty()).await;
    let identifier = panel.debugging_runtime_identifiers().remove(0);
    assert!(identifier.as_str().starts_with("tenant-7/probe:0.0.1@"));

    let runtime = panel.get_debugging_runtime(&identifier).unwrap();
    assert_eq!(runtime.tenant_id(), "tenant-7");

    // dropping the socket evicts the runtime from the panel
    drop(stream);
    wait_until(|| panel.debugging_runtime_identifiers().is_empty()).await;
}
