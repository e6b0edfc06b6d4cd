// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Default log filter when `MOOR_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Resolve state directory: MOOR_STATE_DIR > XDG_STATE_HOME/moor > ~/.local/state/moor
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("MOOR_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("moor"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/moor"))
}

/// Run-history directory override (`MOOR_DATA_DIR`).
pub fn data_dir() -> Option<PathBuf> {
    std::env::var("MOOR_DATA_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Desired-state file override (`MOOR_CONFIG`).
pub fn config_path() -> Option<PathBuf> {
    std::env::var("MOOR_CONFIG").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Watch poll interval (default 10s, configurable via `MOOR_POLL_INTERVAL_MS`).
pub fn poll_interval() -> Duration {
    std::env::var("MOOR_POLL_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(moor_engine::DEFAULT_POLL_INTERVAL)
}

/// Status snapshot interval (default 30s, configurable via `MOOR_STATUS_INTERVAL_MS`).
pub fn status_interval() -> Duration {
    std::env::var("MOOR_STATUS_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// Log filter directive (`MOOR_LOG`).
pub fn log_filter() -> String {
    std::env::var("MOOR_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
