// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, reload, shutdown.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moor_adapters::EngineDriver;
use moor_core::{ConfigError, DesiredConfig};
use moor_engine::{ConfigureOutcome, Reconciler};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::status;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/moor)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Directory for rolling daemon logs
    pub log_dir: PathBuf,
    /// Path to the status snapshot
    pub status_path: PathBuf,
    /// Desired-state TOML file
    pub config_path: PathBuf,
    /// Run-history directory
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub status_interval: Duration,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `config_override` (from the command line) wins over `MOOR_CONFIG`,
    /// which wins over `<state_dir>/config.toml`.
    pub fn load(config_override: Option<PathBuf>) -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let mut config = Self::for_state_dir(state_dir);
        if let Some(path) = config_override.or_else(crate::env::config_path) {
            config.config_path = path;
        }
        if let Some(dir) = crate::env::data_dir() {
            config.data_dir = dir;
        }
        config.poll_interval = crate::env::poll_interval();
        config.status_interval = crate::env::status_interval();
        Ok(config)
    }

    /// Default layout under `state_dir`, ignoring the environment.
    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        Self {
            lock_path: state_dir.join("moord.pid"),
            log_dir: state_dir.join("logs"),
            status_path: state_dir.join("status.json"),
            config_path: state_dir.join("config.toml"),
            data_dir: state_dir.clone(),
            poll_interval: moor_engine::DEFAULT_POLL_INTERVAL,
            status_interval: Duration::from_secs(30),
            state_dir,
        }
    }
}

/// Read and validate the desired-state file.
pub fn load_desired(path: &Path) -> Result<DesiredConfig, LifecycleError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LifecycleError::ConfigRead(path.to_path_buf(), e))?;
    Ok(DesiredConfig::from_toml(&content)?)
}

/// Running daemon.
pub struct Daemon<E: EngineDriver> {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub reconciler: Arc<Reconciler<E>>,
    status_task: Option<JoinHandle<()>>,
}

impl<E: EngineDriver> Daemon<E> {
    /// Re-read the config file and apply it. A no-op when it is unchanged.
    ///
    /// Errors are logged and recorded in the status snapshot; the daemon keeps
    /// running on whatever it last applied.
    pub async fn reload(&self) {
        info!(path = %self.config.config_path.display(), "reloading config");
        match load_desired(&self.config.config_path) {
            Ok(desired) => self.apply(desired).await,
            Err(e) => warn!(error = %e, "config reload failed"),
        }
    }

    pub(crate) async fn apply(&self, desired: DesiredConfig) {
        match self.reconciler.configure(desired).await {
            Ok(ConfigureOutcome::Unchanged) => info!("config unchanged"),
            Ok(ConfigureOutcome::Reconciled(changes)) => {
                info!(changes = changes.len(), "config applied")
            }
            Err(e) => warn!(error = %e, "config apply failed"),
        }
        self.write_status().await;
    }

    async fn write_status(&self) {
        if let Err(e) = status::write_snapshot(&self.reconciler, &self.config).await {
            warn!(error = %e, "failed to write status snapshot");
        }
    }

    /// Close the reconciler, write a final snapshot and remove the PID file.
    pub async fn shutdown(mut self) {
        info!("shutting down daemon");
        self.reconciler.close().await;
        if let Some(task) = self.status_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "status writer ended abnormally");
            }
        }
        self.write_status().await;

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }
        info!("daemon shutdown complete");
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to read config {0}: {1}")]
    ConfigRead(PathBuf, #[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Status error: {0}")]
    Status(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
