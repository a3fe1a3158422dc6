// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! Every option the supervisor recognises, loadable from the process
//! environment. Unset values fall back to the documented defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which runtime family this node serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Local,
    Serverless,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub platform: Platform,

    /// Launch-admission semaphore capacity.
    pub plugin_local_launching_concurrent: usize,
    /// Graceful-drain deadline, seconds.
    pub plugin_max_execution_timeout: u64,
    /// Dependency-install activity watchdog ceiling, seconds.
    pub python_env_init_timeout: u64,

    /// Initial stdio scanner buffer, bytes.
    pub plugin_runtime_buffer_size: usize,
    /// Hard frame-size cap, bytes.
    pub plugin_runtime_max_buffer_size: usize,

    pub pip_mirror_url: String,
    pub pip_extra_args: String,
    pub pip_verbose: bool,
    pub python_compileall_extra_args: String,

    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,

    pub plugin_remote_installing_enabled: bool,
    pub plugin_remote_installing_host: String,
    pub plugin_remote_installing_port: u16,
    pub plugin_remote_installing_max_conn: usize,
    /// Caps the debugging server's concurrent connection-handler tasks.
    pub plugin_remote_install_server_event_loop_nums: usize,

    pub plugin_working_path: PathBuf,
    pub plugin_installed_path: PathBuf,
    pub plugin_package_cache_path: PathBuf,
    pub plugin_storage_local_root: PathBuf,

    pub python_interpreter_path: PathBuf,
    /// Explicit uv binary; discovered through the interpreter when empty.
    pub uv_path: Option<PathBuf>,

    /// Process-wide short-lived task pool capacity.
    pub routine_pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            platform: Platform::Local,
            plugin_local_launching_concurrent: 2,
            plugin_max_execution_timeout: 600,
            python_env_init_timeout: 120,
            plugin_runtime_buffer_size: 1024,
            plugin_runtime_max_buffer_size: 5 * 1024 * 1024,
            pip_mirror_url: String::new(),
            pip_extra_args: String::new(),
            pip_verbose: false,
            python_compileall_extra_args: String::new(),
            http_proxy: String::new(),
            https_proxy: String::new(),
            no_proxy: String::new(),
            plugin_remote_installing_enabled: false,
            plugin_remote_installing_host: "0.0.0.0".to_string(),
            plugin_remote_installing_port: 5003,
            plugin_remote_installing_max_conn: 256,
            plugin_remote_install_server_event_loop_nums: 8,
            plugin_working_path: PathBuf::from("plugin_working"),
            plugin_installed_path: PathBuf::from("plugin"),
            plugin_package_cache_path: PathBuf::from("plugin_packages"),
            plugin_storage_local_root: PathBuf::from("storage"),
            python_interpreter_path: PathBuf::from("/usr/bin/python3"),
            uv_path: None,
            routine_pool_size: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_str("PLATFORM") {
            if v.eq_ignore_ascii_case("serverless") {
                config.platform = Platform::Serverless;
            }
        }
        if let Some(v) = env_parse("PLUGIN_LOCAL_LAUNCHING_CONCURRENT") {
            config.plugin_local_launching_concurrent = v;
        }
        if let Some(v) = env_parse("PLUGIN_MAX_EXECUTION_TIMEOUT") {
            config.plugin_max_execution_timeout = v;
        }
        if let Some(v) = env_parse("PYTHON_ENV_INIT_TIMEOUT") {
            config.python_env_init_timeout = v;
        }
        if let Some(v) = env_parse("PLUGIN_RUNTIME_BUFFER_SIZE") {
            config.plugin_runtime_buffer_size = v;
        }
        if let Some(v) = env_parse("PLUGIN_RUNTIME_MAX_BUFFER_SIZE") {
            config.plugin_runtime_max_buffer_size = v;
        }
        if let Some(v) = env_str("PIP_MIRROR_URL") {
            config.pip_mirror_url = v;
        }
        if let Some(v) = env_str("PIP_EXTRA_ARGS") {
            config.pip_extra_args = v;
        }
        if let Some(v) = env_bool("PIP_VERBOSE") {
            config.pip_verbose = v;
        }
        if let Some(v) = env_str("PYTHON_COMPILEALL_EXTRA_ARGS") {
            config.python_compileall_extra_args = v;
        }
        if let Some(v) = env_str("HTTP_PROXY") {
            config.http_proxy = v;
        }
        if let Some(v) = env_str("HTTPS_PROXY") {
            config.https_proxy = v;
        }
        if let Some(v) = env_str("NO_PROXY") {
            config.no_proxy = v;
        }
        if let Some(v) = env_bool("PLUGIN_REMOTE_INSTALLING_ENABLED") {
            config.plugin_remote_installing_enabled = v;
        }
        if let Some(v) = env_str("PLUGIN_REMOTE_INSTALLING_HOST") {
            config.plugin_remote_installing_host = v;
        }
        if let Some(v) = env_parse("PLUGIN_REMOTE_INSTALLING_PORT") {
            config.plugin_remote_installing_port = v;
        }
        if let Some(v) = env_parse("PLUGIN_REMOTE_INSTALLING_MAX_CONN") {
            config.plugin_remote_installing_max_conn = v;
        }
        if let Some(v) = env_parse("PLUGIN_REMOTE_INSTALL_SERVER_EVENT_LOOP_NUMS") {
            config.plugin_remote_install_server_event_loop_nums = v;
        }
        if let Some(v) = env_str("PLUGIN_WORKING_PATH") {
            config.plugin_working_path = PathBuf::from(v);
        }
        if let Some(v) = env_str("PLUGIN_INSTALLED_PATH") {
            config.plugin_installed_path = PathBuf::from(v);
        }
        if let Some(v) = env_str("PLUGIN_PACKAGE_CACHE_PATH") {
            config.plugin_package_cache_path = PathBuf::from(v);
        }
        if let Some(v) = env_str("PLUGIN_STORAGE_LOCAL_ROOT") {
            config.plugin_storage_local_root = PathBuf::from(v);
        }
        if let Some(v) = env_str("PYTHON_INTERPRETER_PATH") {
            config.python_interpreter_path = PathBuf::from(v);
        }
        if let Some(v) = env_str("UV_PATH") {
            config.uv_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env_parse("ROUTINE_POOL_SIZE") {
            config.routine_pool_size = v;
        }

        config
    }

    pub fn graceful_drain_deadline(&self) -> Duration {
        Duration::from_secs(self.plugin_max_execution_timeout)
    }

    pub fn env_init_watchdog(&self) -> Duration {
        Duration::from_secs(self.python_env_init_timeout)
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_str(key).and_then(|s| s.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| matches!(s.as_str(), "1" | "true" | "TRUE" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.plugin_local_launching_concurrent, 2);
        assert_eq!(config.plugin_max_execution_timeout, 600);
        assert_eq!(config.python_env_init_timeout, 120);
        assert_eq!(config.plugin_runtime_max_buffer_size, 5 * 1024 * 1024);
        assert_eq!(config.plugin_remote_installing_max_conn, 256);
        assert_eq!(config.routine_pool_size, 10_000);
        assert_eq!(config.platform, Platform::Local);
    }

    #[test]
    fn durations_derive_from_seconds() {
        let config = Config::default();
        assert_eq!(config.graceful_drain_deadline(), Duration::from_secs(600));
        assert_eq!(config.env_init_watchdog(), Duration::from_secs(120));
    }
}
