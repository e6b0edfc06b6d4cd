// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status snapshot persistence.
//!
//! The snapshot is rewritten atomically (temp file + rename) so readers never
//! see a partial document.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moor_adapters::EngineDriver;
use moor_engine::{Reconciler, ReconcilerStatus};
use moor_storage::RunRecord;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::lifecycle::{Config, LifecycleError};

/// Document written to `status.json`.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub pid: u32,
    pub written_at: DateTime<Utc>,
    pub ready: bool,
    #[serde(flatten)]
    pub status: ReconcilerStatus,
    /// Run history, or empty when it could not be read.
    pub history: Vec<RunRecord>,
}

/// Collect and atomically write the current snapshot.
pub async fn write_snapshot<E: EngineDriver>(
    reconciler: &Reconciler<E>,
    config: &Config,
) -> Result<(), LifecycleError> {
    let data_dir = config.data_dir.clone();
    let history = tokio::task::spawn_blocking(move || {
        moor_storage::RunHistoryStore::new(data_dir).records()
    })
    .await
    .map_err(|e| LifecycleError::Io(std::io::Error::other(e)))?
    .unwrap_or_else(|e| {
        debug!(error = %e, "run history unavailable for status");
        Vec::new()
    });

    let snapshot = StatusSnapshot {
        pid: std::process::id(),
        written_at: Utc::now(),
        ready: reconciler.is_ready().await,
        status: reconciler.status().await,
        history,
    };
    write_atomic(&config.status_path, &snapshot)
}

/// Serialize `value` to `path` via a sibling temp file and rename.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Write a snapshot every `interval` until the reconciler shuts down.
pub fn spawn_writer<E: EngineDriver>(
    reconciler: Arc<Reconciler<E>>,
    config: Config,
    interval: Duration,
) -> JoinHandle<()> {
    let shutdown = reconciler.shutdown_token();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; startup writes its own snapshot.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = write_snapshot(&reconciler, &config).await {
                warn!(error = %e, "failed to write status snapshot");
            }
        }
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
