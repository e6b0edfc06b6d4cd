// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use moor_adapters::EngineDriver;
use moor_engine::{Reconciler, ReconcilerConfig};
use moor_storage::RunHistoryStore;
use tracing::{info, warn};

use super::{load_desired, Config, Daemon, LifecycleError};
use crate::status;

/// Start the daemon on `engine` and apply the configured desired state.
pub async fn startup<E: EngineDriver>(
    config: &Config,
    engine: E,
) -> Result<Daemon<E>, LifecycleError> {
    match startup_inner(config, engine).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock —
            // the PID file belongs to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner<E: EngineDriver>(
    config: &Config,
    engine: E,
) -> Result<Daemon<E>, LifecycleError> {
    // 1. Create state directory (needed for the lock)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Use OpenOptions to avoid truncating the file before we hold the lock,
    // which would wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file (truncate now that we hold the lock)
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file; // Drop mutability

    // 3. Read the desired state before touching the engine
    let desired = load_desired(&config.config_path)?;
    std::fs::create_dir_all(&config.data_dir)?;

    // 4. Build the reconciler
    let store = RunHistoryStore::new(&config.data_dir);
    let reconciler = Arc::new(Reconciler::new(
        engine,
        store,
        ReconcilerConfig { poll_interval: config.poll_interval },
    ));
    info!(
        state_dir = %config.state_dir.display(),
        data_dir = %config.data_dir.display(),
        poll_ms = config.poll_interval.as_millis() as u64,
        "daemon starting"
    );

    let status_task =
        status::spawn_writer(Arc::clone(&reconciler), config.clone(), config.status_interval);
    let daemon =
        Daemon { config: config.clone(), lock_file, reconciler, status_task: Some(status_task) };

    // 5. Apply. Engine failures leave the daemon up and not ready.
    daemon.apply(desired).await;
    Ok(daemon)
}

fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        if let Err(e) = std::fs::remove_file(&config.lock_path) {
            warn!("Failed to remove PID file: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
