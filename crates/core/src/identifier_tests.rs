// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_full_identifier() {
    let id = PluginUniqueIdentifier::parse("acme/demo:1.0.0@abcdef0123").unwrap();
    assert_eq!(id.plugin_id(), "acme/demo");
    assert_eq!(id.version(), "1.0.0");
    assert_eq!(id.checksum(), "abcdef0123");
    assert_eq!(id.as_str(), "acme/demo:1.0.0@abcdef0123");
}

#[test]
fn rejects_missing_checksum() {
    assert!(PluginUniqueIdentifier::parse("acme/demo:1.0.0").is_err());
}

#[test]
fn rejects_missing_author() {
    assert!(PluginUniqueIdentifier::parse("demo:1.0.0@abc").is_err());
}

#[test]
fn rejects_missing_version() {
    assert!(PluginUniqueIdentifier::parse("acme/demo@abc").is_err());
}

#[test]
fn remote_like_uses_tenant_as_author() {
    let id = PluginUniqueIdentifier::remote_like("tenant-1", "dbg", "0.0.1", "c0ffee").unwrap();
    assert_eq!(id.plugin_id(), "tenant-1/dbg");
}

#[test]
fn working_dir_name_replaces_colons() {
    let id = PluginUniqueIdentifier::parse("acme/demo:1.0.0@abc").unwrap();
    assert_eq!(id.working_dir_name(), "acme/demo-1.0.0@abc");
}

#[test]
fn display_round_trips_through_parse() {
    let id = PluginUniqueIdentifier::parse("acme/demo:1.0.0@abc").unwrap();
    let again = PluginUniqueIdentifier::parse(id.to_string()).unwrap();
    assert_eq!(id, again);
}

#[test]
fn hashed_identity_is_stable() {
    let a = hashed_identity("acme/demo:1.0.0");
    let b = hashed_identity("acme/demo:1.0.0");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert_ne!(a, hashed_identity("acme/demo:1.0.1"));
}
