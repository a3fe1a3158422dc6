// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::runtime::LocalPluginRuntime;
use crate::test_support;

fn package_source(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let source = dir.path().join("package");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("requirements.txt"), "dify-plugin==0.2.0\n").unwrap();
    std::fs::write(source.join("main.py"), "print('hi')\n").unwrap();
    source
}

#[test]
fn extraction_populates_a_missing_working_path() {
    let dir = tempfile::tempdir().unwrap();
    let decoder = test_support::decoder(&package_source(&dir));
    let runtime =
        LocalPluginRuntime::construct(test_support::config(dir.path()), &decoder).unwrap();

    runtime.extract_plugin_to_working_path(&decoder).unwrap();

    let working = runtime.working_path();
    assert!(working.join("requirements.txt").exists());
    assert!(working.join("main.py").exists());
}

#[test]
fn non_empty_working_path_is_not_extracted_again() {
    let dir = tempfile::tempdir().unwrap();
    let source = package_source(&dir);
    let decoder = test_support::decoder(&source);
    let runtime =
        LocalPluginRuntime::construct(test_support::config(dir.path()), &decoder).unwrap();

    runtime.extract_plugin_to_working_path(&decoder).unwrap();
    // mutate the source; a second extraction would overwrite main.py
    std::fs::write(source.join("main.py"), "print('changed')\n").unwrap();
    runtime.extract_plugin_to_working_path(&decoder).unwrap();

    let content = std::fs::read_to_string(runtime.working_path().join("main.py")).unwrap();
    assert_eq!(content, "print('hi')\n");
}

#[test]
fn working_path_encodes_identity_and_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let decoder = test_support::decoder(&package_source(&dir));
    let runtime =
        LocalPluginRuntime::construct(test_support::config(dir.path()), &decoder).unwrap();

    let working = runtime.working_path();
    assert!(working.ends_with("acme/demo-1.0.0@c0ffee"));
    assert!(working.starts_with(dir.path().join("working")));
}

#[test]
fn environment_validation_fails_without_a_venv() {
    let dir = tempfile::tempdir().unwrap();
    let decoder = test_support::decoder(&package_source(&dir));
    let runtime =
        LocalPluginRuntime::construct(test_support::config(dir.path()), &decoder).unwrap();
    runtime.extract_plugin_to_working_path(&decoder).unwrap();

    assert!(runtime.environment_validation().is_err());
}

#[test]
fn environment_validation_requires_the_validity_marker() {
    let dir = tempfile::tempdir().unwrap();
    let decoder = test_support::decoder(&package_source(&dir));
    let runtime =
        LocalPluginRuntime::construct(test_support::config(dir.path()), &decoder).unwrap();
    runtime.extract_plugin_to_working_path(&decoder).unwrap();

    // venv skeleton without the marker is invalid
    let venv_bin = runtime.working_path().join(".venv/bin");
    std::fs::create_dir_all(&venv_bin).unwrap();
    std::fs::write(venv_bin.join("python"), "").unwrap();
    assert!(runtime.environment_validation().is_err());

    let marker = runtime.working_path().join(".venv/dify");
    std::fs::create_dir_all(&marker).unwrap();
    std::fs::write(marker.join("plugin.json"), "{\"timestamp\":0}").unwrap();
    assert!(runtime.environment_validation().is_ok());
}
