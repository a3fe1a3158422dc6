// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version-pinned overwrites for known SDK defects.
//!
//! Patched module bytes are embedded at build time. The SDK version is
//! parsed out of the plugin's requirements.txt; each patch applies to
//! versions strictly below its bound. Writes are idempotent overwrites of
//! the installed module files.

use std::path::{Path, PathBuf};

use warden_core::error::LaunchError;

use crate::runtime::LocalPluginRuntime;

struct SdkPatch {
    /// Applies to SDK versions strictly below this.
    upper_bound: &'static str,
    /// Path of the module inside the installed SDK package.
    relative_path: &'static str,
    bytes: &'static [u8],
}

const SDK_PATCHES: &[SdkPatch] = &[
    SdkPatch {
        upper_bound: "0.0.1b70",
        relative_path: "interfaces/model/ai_model.py",
        bytes: include_bytes!("patches/0.0.1b70.ai_model.py"),
    },
    SdkPatch {
        upper_bound: "0.1.1",
        relative_path: "entities/model/llm.py",
        bytes: include_bytes!("patches/0.1.1.llm.py"),
    },
    SdkPatch {
        upper_bound: "0.1.1",
        relative_path: "core/server/stdio/request_reader.py",
        bytes: include_bytes!("patches/0.1.1.request_reader.py"),
    },
];

impl LocalPluginRuntime {
    /// Overwrite defective SDK modules for old SDK versions. A missing
    /// version pin is logged and skipped, not an error.
    pub(crate) async fn patch_plugin_sdk(&self, python: &Path) -> Result<(), LaunchError> {
        let requirements =
            tokio::fs::read_to_string(self.requirements_path()).await.map_err(|e| {
                LaunchError::Environment(format!("failed to read requirements.txt: {e}"))
            })?;

        let Some(version) = sdk_version_from_requirements(&requirements) else {
            tracing::error!(
                plugin = %self.identity_string,
                "failed to find the version of the plugin sdk"
            );
            return Ok(());
        };

        let mut sdk_dir: Option<PathBuf> = None;
        for patch in SDK_PATCHES {
            if !version_less_than(&version, patch.upper_bound) {
                continue;
            }

            let dir = match &sdk_dir {
                Some(dir) => dir.clone(),
                None => {
                    let dir = self.locate_sdk_dir(python).await?;
                    sdk_dir = Some(dir.clone());
                    dir
                }
            };

            let target = dir.join(patch.relative_path);
            if !target.exists() {
                return Err(LaunchError::Environment(format!(
                    "failed to find the patch target: {}",
                    target.display()
                )));
            }
            tokio::fs::write(&target, patch.bytes).await.map_err(|e| {
                LaunchError::Environment(format!("failed to write the patch file: {e}"))
            })?;
        }

        Ok(())
    }

    async fn locate_sdk_dir(&self, python: &Path) -> Result<PathBuf, LaunchError> {
        let output = tokio::process::Command::new(python)
            .args([
                "-c",
                "import importlib.util;print(importlib.util.find_spec('dify_plugin').origin)",
            ])
            .current_dir(self.working_path())
            .output()
            .await
            .map_err(|e| {
                LaunchError::Environment(format!("failed to get the path of the plugin sdk: {e}"))
            })?;
        if !output.status.success() {
            return Err(LaunchError::Environment(format!(
                "failed to get the path of the plugin sdk: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let origin = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim().to_string());
        origin.parent().map(Path::to_path_buf).ok_or_else(|| {
            LaunchError::Environment("plugin sdk origin has no parent directory".into())
        })
    }
}

/// Extract the pinned SDK version from a requirements file. Exact pins
/// (`==`, `~=`) win; for range constraints the highest bound is used.
pub(crate) fn sdk_version_from_requirements(requirements: &str) -> Option<String> {
    // exact or compatible pin
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    let pinned = regex::Regex::new(r"(?:dify[_-]plugin)(?:~=|==)([0-9.a-z]+)").unwrap();
    if let Some(captures) = pinned.captures(requirements) {
        return Some(captures[1].to_string());
    }

    // range constraints like dify-plugin>=0.1.0,<0.2.0
    #[allow(clippy::unwrap_used)]
    let ranged = regex::Regex::new(
        r"(?:dify[_-]plugin)(?:[><]=?|==)([0-9.a-z]+)(?:,(?:[><]=?|==)([0-9.a-z]+))?",
    )
    .unwrap();

    let mut highest: Option<String> = None;
    for captures in ranged.captures_iter(requirements) {
        for idx in [1, 2] {
            let Some(m) = captures.get(idx) else { continue };
            let candidate = m.as_str().to_string();
            match &highest {
                Some(current) if !version_less_than(current, &candidate) => {}
                _ => highest = Some(candidate),
            }
        }
    }
    highest
}

/// Compare dotted versions with an optional pre-release letter suffix on
/// the last segment (`0.0.1b70` precedes `0.0.1`).
pub(crate) fn version_less_than(a: &str, b: &str) -> bool {
    let (a_nums, a_pre) = split_version(a);
    let (b_nums, b_pre) = split_version(b);

    let len = a_nums.len().max(b_nums.len());
    for i in 0..len {
        let x = a_nums.get(i).copied().unwrap_or(0);
        let y = b_nums.get(i).copied().unwrap_or(0);
        if x != y {
            return x < y;
        }
    }

    match (a_pre, b_pre) {
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => false,
        (Some((ac, an)), Some((bc, bn))) => {
            if ac != bc {
                ac < bc
            } else {
                an < bn
            }
        }
    }
}

type PreRelease = (char, u64);

fn split_version(version: &str) -> (Vec<u64>, Option<PreRelease>) {
    let mut nums = Vec::new();
    let mut pre = None;

    for segment in version.split('.') {
        match segment.find(|c: char| c.is_ascii_alphabetic()) {
            Some(pos) => {
                nums.push(segment[..pos].parse().unwrap_or(0));
                let letter = segment[pos..].chars().next().unwrap_or('a');
                let number = segment[pos + 1..].parse().unwrap_or(0);
                pre = Some((letter, number));
            }
            None => nums.push(segment.parse().unwrap_or(0)),
        }
    }

    (nums, pre)
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
