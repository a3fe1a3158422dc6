// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn id(s: &str) -> PluginUniqueIdentifier {
    PluginUniqueIdentifier::parse(s).unwrap()
}

#[tokio::test]
async fn fs_package_bucket_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FsPackageBucket::new(dir.path());

    let key = "acme/demo:1.0.0@abc";
    assert!(!bucket.exists(key).await.unwrap());
    bucket.save(key, b"package-bytes").await.unwrap();
    assert!(bucket.exists(key).await.unwrap());
    assert_eq!(bucket.get(key).await.unwrap(), b"package-bytes");

    bucket.delete(key).await.unwrap();
    assert!(!bucket.exists(key).await.unwrap());
}

#[tokio::test]
async fn fs_package_delete_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FsPackageBucket::new(dir.path());
    bucket.delete("acme/demo:1.0.0@abc").await.unwrap();
    bucket.delete("acme/demo:1.0.0@abc").await.unwrap();
}

#[tokio::test]
async fn fs_installed_bucket_lists_markers() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FsInstalledBucket::new(dir.path());

    bucket.save(&id("acme/demo:1.0.0@abc"), b"m").await.unwrap();
    bucket.save(&id("other/tool:2.1.0@def"), b"m").await.unwrap();

    let mut listed: Vec<String> =
        bucket.list().await.unwrap().iter().map(|i| i.to_string()).collect();
    listed.sort();
    assert_eq!(listed, vec!["acme/demo:1.0.0@abc", "other/tool:2.1.0@def"]);
}

#[tokio::test]
async fn fs_installed_bucket_list_on_missing_root_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FsInstalledBucket::new(dir.path().join("never-created"));
    assert!(bucket.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn fs_installed_delete_removes_the_marker() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FsInstalledBucket::new(dir.path());
    let marker = id("acme/demo:1.0.0@abc");

    bucket.save(&marker, b"m").await.unwrap();
    assert!(bucket.exists(&marker).await.unwrap());
    bucket.delete(&marker).await.unwrap();
    assert!(!bucket.exists(&marker).await.unwrap());
    // idempotent on a non-existent marker
    bucket.delete(&marker).await.unwrap();
}

#[tokio::test]
async fn mem_buckets_mirror_the_fs_contract() {
    let packages = MemPackageBucket::new();
    packages.save("k", b"v").await.unwrap();
    assert!(packages.exists("k").await.unwrap());
    assert_eq!(packages.get("k").await.unwrap(), b"v");
    packages.delete("k").await.unwrap();
    assert!(packages.get("k").await.is_err());

    let installed = MemInstalledBucket::new();
    let marker = id("acme/demo:1.0.0@abc");
    installed.save(&marker, b"m").await.unwrap();
    assert_eq!(installed.list().await.unwrap().len(), 1);
    installed.delete(&marker).await.unwrap();
    assert!(installed.list().await.unwrap().is_empty());
}
