// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Python environment setup: uv discovery, venv lifecycle, dependency
//! install, precompilation, and the validity marker.
//!
//! Install output is streamed, never buffered whole. Two independent
//! limits guard the install: a 10-minute hard deadline and a no-activity
//! watchdog fed by any stdout/stderr byte.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;

use warden_core::error::LaunchError;

use crate::runtime::LocalPluginRuntime;

const VENV_DIR: &str = ".venv";
const VENV_PYTHON: &str = ".venv/bin/python";
const VENV_VALID_MARKER: &str = ".venv/dify/plugin.json";
const VENV_PYTHON_VERSION: &str = "3.12";

const INSTALL_HARD_DEADLINE: Duration = Duration::from_secs(10 * 60);
const INSTALL_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Why an existing `.venv` cannot be reused.
#[derive(Debug, thiserror::Error)]
pub(crate) enum VenvProbe {
    #[error("virtual environment not found")]
    NotFound,
    #[error("virtual environment is invalid")]
    Invalid,
}

impl LocalPluginRuntime {
    pub(crate) fn requirements_path(&self) -> PathBuf {
        self.working_path().join("requirements.txt")
    }

    /// Absolute interpreter path inside the venv; error when the venv is
    /// not prepared yet.
    pub(crate) fn virtual_environment_python_path(&self) -> Result<PathBuf, LaunchError> {
        let python = self.working_path().join(VENV_PYTHON);
        if !python.exists() {
            return Err(LaunchError::Environment("virtual environment not found".into()));
        }
        Ok(python)
    }

    /// Locate uv: explicit config first, then the cached discovery, then
    /// asking the default interpreter where its uv module lives.
    async fn prepare_uv(&self) -> Result<PathBuf, LaunchError> {
        if let Some(path) = &self.config.uv_path {
            return Ok(path.clone());
        }
        if let Some(path) = self.uv_path.lock().clone() {
            return Ok(path);
        }

        let output = tokio::process::Command::new(&self.config.python_interpreter_path)
            .arg("-c")
            .arg("from uv._find_uv import find_uv_bin; print(find_uv_bin())")
            .current_dir(self.working_path())
            .output()
            .await
            .map_err(|e| LaunchError::Environment(format!("failed to find uv path: {e}")))?;
        if !output.status.success() {
            return Err(LaunchError::Environment(format!(
                "failed to find uv path: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let path = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim().to_string());
        *self.uv_path.lock() = Some(path.clone());
        Ok(path)
    }

    pub(crate) fn check_python_virtual_environment(&self) -> Result<PathBuf, VenvProbe> {
        let working_path = self.working_path();
        if !working_path.join(VENV_DIR).exists() {
            return Err(VenvProbe::NotFound);
        }
        let python = working_path.join(VENV_PYTHON);
        if !python.exists() {
            return Err(VenvProbe::NotFound);
        }
        if !working_path.join(VENV_VALID_MARKER).exists() {
            return Err(VenvProbe::Invalid);
        }
        Ok(python)
    }

    fn delete_virtual_environment(&self) -> Result<(), LaunchError> {
        let venv = self.working_path().join(VENV_DIR);
        if !venv.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&venv)
            .map_err(|e| LaunchError::Environment(format!("delete virtual environment: {e}")))
    }

    async fn create_virtual_environment(&self, uv_path: &Path) -> Result<PathBuf, LaunchError> {
        let output = tokio::process::Command::new(uv_path)
            .args(["venv", VENV_DIR, "--python", VENV_PYTHON_VERSION])
            .current_dir(self.working_path())
            .output()
            .await
            .map_err(|e| {
                LaunchError::Environment(format!("failed to create virtual environment: {e}"))
            })?;
        if !output.status.success() {
            return Err(LaunchError::Environment(format!(
                "failed to create virtual environment: {}, output: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let python = self.working_path().join(VENV_PYTHON);
        if !python.exists() {
            return Err(LaunchError::Environment("failed to find python in new venv".into()));
        }
        if !self.requirements_path().exists() {
            return Err(LaunchError::Environment("failed to find requirements.txt".into()));
        }
        Ok(python)
    }

    fn pip_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["pip".into(), "install".into()];
        if !self.config.pip_mirror_url.is_empty() {
            args.push("-i".into());
            args.push(self.config.pip_mirror_url.clone());
        }
        args.push("-r".into());
        args.push("requirements.txt".into());
        if self.config.pip_verbose {
            args.push("-vvv".into());
        }
        args.extend(self.config.pip_extra_args.split_whitespace().map(String::from));
        args
    }

    async fn install_dependencies(&self, uv_path: &Path) -> Result<(), LaunchError> {
        let mut cmd = tokio::process::Command::new(uv_path);
        cmd.args(self.pip_args())
            .env("VIRTUAL_ENV", self.working_path().join(VENV_DIR))
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .current_dir(self.working_path())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if !self.config.http_proxy.is_empty() {
            cmd.env("HTTP_PROXY", &self.config.http_proxy);
        }
        if !self.config.https_proxy.is_empty() {
            cmd.env("HTTPS_PROXY", &self.config.https_proxy);
        }
        if !self.config.no_proxy.is_empty() {
            cmd.env("NO_PROXY", &self.config.no_proxy);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| LaunchError::Environment(format!("failed to start install: {e}")))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| LaunchError::Environment("install stdout pipe missing".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| LaunchError::Environment("install stderr pipe missing".into()))?;

        let last_active = Arc::new(Mutex::new(Instant::now()));
        let error_output = Arc::new(Mutex::new(String::new()));

        let identity = self.identity_string.clone();
        let active = Arc::clone(&last_active);
        let stdout_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        tracing::info!(
                            plugin = %identity,
                            output = %String::from_utf8_lossy(&buf[..n]).trim_end(),
                            "installing dependencies"
                        );
                        *active.lock() = Instant::now();
                    }
                }
            }
        });

        let active = Arc::clone(&last_active);
        let errors = Arc::clone(&error_output);
        let stderr_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        errors.lock().push_str(&String::from_utf8_lossy(&buf[..n]));
                        *active.lock() = Instant::now();
                    }
                }
            }
        });

        let watchdog = self.config.env_init_watchdog();
        let started = Instant::now();
        let status = loop {
            tokio::select! {
                status = child.wait() => {
                    break status.map_err(|e| {
                        LaunchError::Environment(format!("failed to wait for install: {e}"))
                    })?;
                }
                _ = tokio::time::sleep(INSTALL_POLL_INTERVAL) => {
                    if last_active.lock().elapsed() > watchdog {
                        let _ = child.start_kill();
                        error_output.lock().push_str(&format!(
                            "init process exited due to no activity for {} seconds",
                            watchdog.as_secs()
                        ));
                    } else if started.elapsed() > INSTALL_HARD_DEADLINE {
                        let _ = child.start_kill();
                        error_output
                            .lock()
                            .push_str("init process exceeded the install deadline");
                    }
                }
            }
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        if !status.success() {
            return Err(LaunchError::Environment(format!(
                "failed to install dependencies: {}, output: {}",
                status,
                error_output.lock().trim()
            )));
        }
        Ok(())
    }

    /// Compile sources to bytecode and preload the SDK import. Failures
    /// are logged, never fatal: some plugins reference a broken SDK
    /// module yet run fine.
    async fn precompile(&self, python: &Path) {
        let mut args: Vec<String> = vec!["-m".into(), "compileall".into()];
        args.extend(
            self.config.python_compileall_extra_args.split_whitespace().map(String::from),
        );
        args.push(".".into());

        let compile = tokio::process::Command::new(python)
            .args(&args)
            .current_dir(self.working_path())
            .output()
            .await;
        match compile {
            Ok(output) if !output.status.success() => {
                tracing::warn!(
                    plugin = %self.identity_string,
                    output = %String::from_utf8_lossy(&output.stderr).trim_end(),
                    "failed to pre-compile the plugin"
                );
            }
            Err(e) => {
                tracing::warn!(
                    plugin = %self.identity_string,
                    error = %e,
                    "failed to pre-compile the plugin"
                );
            }
            Ok(_) => {
                tracing::info!(plugin = %self.identity_string, "pre-compiled the plugin");
            }
        }

        // warming the SDK import makes the first instance launch much cheaper
        let _ = tokio::process::Command::new(python)
            .args(["-c", "import dify_plugin"])
            .current_dir(self.working_path())
            .output()
            .await;
    }

    fn mark_virtual_environment_valid(&self) -> Result<(), LaunchError> {
        let marker = self.working_path().join(VENV_VALID_MARKER);
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LaunchError::Environment(format!("create marker directory: {e}")))?;
        }
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        std::fs::write(&marker, format!("{{\"timestamp\":{timestamp}}}"))
            .map_err(|e| LaunchError::Environment(format!("write validity marker: {e}")))
    }

    pub(crate) async fn init_python_environment(&self) -> Result<(), LaunchError> {
        let uv_path = self.prepare_uv().await?;

        let python = match self.check_python_virtual_environment() {
            Ok(python) => {
                // reusable venv: only runtime patches apply
                if let Err(e) = self.patch_plugin_sdk(&python).await {
                    tracing::error!(
                        plugin = %self.identity_string,
                        error = %e,
                        "failed to patch the plugin sdk"
                    );
                }
                return Ok(());
            }
            Err(VenvProbe::Invalid) => {
                self.delete_virtual_environment()?;
                self.create_virtual_environment(&uv_path).await?
            }
            Err(VenvProbe::NotFound) => self.create_virtual_environment(&uv_path).await?,
        };

        self.install_dependencies(&uv_path).await?;
        self.precompile(&python).await;

        if let Err(e) = self.patch_plugin_sdk(&python).await {
            tracing::error!(
                plugin = %self.identity_string,
                error = %e,
                "failed to patch the plugin sdk"
            );
        }

        if let Err(e) = self.mark_virtual_environment_valid() {
            tracing::error!(
                plugin = %self.identity_string,
                error = %e,
                "failed to mark the virtual environment as valid"
            );
        }

        Ok(())
    }
}
