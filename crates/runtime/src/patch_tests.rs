// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn exact_pin_wins() {
    let requirements = "requests>=2.0\ndify_plugin==0.0.1b50\n";
    assert_eq!(sdk_version_from_requirements(requirements), Some("0.0.1b50".to_string()));
}

#[test]
fn compatible_pin_is_recognised() {
    let requirements = "dify-plugin~=0.2.3\n";
    assert_eq!(sdk_version_from_requirements(requirements), Some("0.2.3".to_string()));
}

#[test]
fn range_constraint_uses_highest_bound() {
    let requirements = "dify-plugin>=0.1.0,<0.2.0\n";
    assert_eq!(sdk_version_from_requirements(requirements), Some("0.2.0".to_string()));
}

#[test]
fn missing_sdk_returns_none() {
    assert_eq!(sdk_version_from_requirements("requests==2.31.0\n"), None);
}

#[test]
fn dash_and_underscore_names_both_match() {
    assert_eq!(sdk_version_from_requirements("dify_plugin==0.1.0"), Some("0.1.0".to_string()));
    assert_eq!(sdk_version_from_requirements("dify-plugin==0.1.0"), Some("0.1.0".to_string()));
}

#[test]
fn numeric_comparison_is_segment_wise() {
    assert!(version_less_than("0.0.9", "0.1.0"));
    assert!(version_less_than("0.1.0", "0.1.1"));
    assert!(!version_less_than("0.2.0", "0.1.9"));
    assert!(!version_less_than("0.1.1", "0.1.1"));
}

#[test]
fn shorter_versions_are_zero_padded() {
    assert!(version_less_than("0.1", "0.1.1"));
    assert!(!version_less_than("0.1.0", "0.1"));
}

#[test]
fn pre_release_precedes_release() {
    assert!(version_less_than("0.0.1b70", "0.0.1"));
    assert!(!version_less_than("0.0.1", "0.0.1b70"));
}

#[test]
fn pre_release_numbers_compare_numerically() {
    assert!(version_less_than("0.0.1b69", "0.0.1b70"));
    assert!(!version_less_than("0.0.1b70", "0.0.1b70"));
    assert!(version_less_than("0.0.1a70", "0.0.1b1"));
}
