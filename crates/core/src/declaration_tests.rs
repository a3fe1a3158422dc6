// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn manifest_json() -> serde_json::Value {
    serde_json::json!({
        "version": "1.0.0",
        "type": "plugin",
        "author": "acme",
        "name": "demo",
        "icon": "icon.svg",
        "meta": {
            "version": "0.0.1",
            "arch": ["amd64"],
            "runner": {
                "language": "python",
                "version": "3.12",
                "entrypoint": "main"
            }
        },
        "plugins": { "tools": ["provider.yaml"] }
    })
}

#[test]
fn deserializes_manifest() {
    let decl: PluginDeclaration = serde_json::from_value(manifest_json()).unwrap();
    assert_eq!(decl.identity(), "acme/demo:1.0.0");
    assert_eq!(decl.meta.runner.language, RunnerLanguage::Python);
    assert_eq!(decl.meta.runner.entrypoint, "main");
    assert_eq!(decl.plugins.tools, vec!["provider.yaml"]);
    assert!(!decl.verified);
}

#[test]
fn unknown_runner_language_is_tolerated_at_decode() {
    let mut json = manifest_json();
    json["meta"]["runner"]["language"] = "cobol".into();
    let decl: PluginDeclaration = serde_json::from_value(json).unwrap();
    assert_eq!(decl.meta.runner.language, RunnerLanguage::Unknown);
}

#[test]
fn validate_rejects_empty_name() {
    let mut decl: PluginDeclaration = serde_json::from_value(manifest_json()).unwrap();
    decl.name.clear();
    assert!(decl.validate().is_err());
}

#[test]
fn validate_rejects_empty_entrypoint() {
    let mut decl: PluginDeclaration = serde_json::from_value(manifest_json()).unwrap();
    decl.meta.runner.entrypoint.clear();
    assert!(decl.validate().is_err());
}

#[test]
fn fill_in_default_values_backfills_label() {
    let mut decl: PluginDeclaration = serde_json::from_value(manifest_json()).unwrap();
    assert!(decl.label.is_null());
    decl.fill_in_default_values();
    assert_eq!(decl.label["en_US"], "demo");
}

#[test]
fn capability_ref_keeps_raw_spec() {
    let cap: CapabilityRef = serde_json::from_value(serde_json::json!({
        "name": "search",
        "credentials_schema": { "api_key": { "type": "secret-input" } }
    }))
    .unwrap();
    assert_eq!(cap.name, "search");
    assert!(cap.spec["credentials_schema"]["api_key"].is_object());
}
