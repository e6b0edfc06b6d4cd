// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable run history for run-once workloads.
//!
//! One text file, one `key,RFC3339` record per line. Every call takes an
//! exclusive advisory lock on a sidecar `.lock` file, reads the full record
//! set, and for marks writes the whole set to a temp file that is synced and
//! renamed over the history. A crash mid-write leaves the previous history
//! intact. The lock is never held across calls, so separate processes and
//! separate store instances in the same process serialize on it.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// File name of the run history inside the store directory.
pub const HISTORY_FILE: &str = "has-run.status";
/// Lock sidecar guarding every read-modify-write of [`HISTORY_FILE`].
pub const LOCK_FILE: &str = "has-run.status.lock";
/// Staging file renamed over [`HISTORY_FILE`] on every mark.
pub const TEMP_FILE: &str = "has-run.status.tmp";

/// Errors from run history operations
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("run history location is not configured")]
    Unconfigured,
    #[error("history key '{0}' may not contain ',' or line breaks")]
    InvalidKey(String),
    #[error("failed to lock {0}: {1}")]
    Lock(PathBuf, #[source] std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Last successful start of one history key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub key: String,
    pub last_run: DateTime<Utc>,
}

/// Run history rooted at an optional directory.
///
/// A store without a location is valid to construct but every operation on
/// it fails with [`HistoryError::Unconfigured`].
#[derive(Debug, Clone)]
pub struct RunHistoryStore {
    dir: Option<PathBuf>,
}

impl RunHistoryStore {
    /// Store backed by `<dir>/has-run.status`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: Some(dir.as_ref().to_path_buf()) }
    }

    pub fn unconfigured() -> Self {
        Self { dir: None }
    }

    /// Whether `key` has a recorded start.
    pub fn has_run(&self, key: &str) -> Result<bool, HistoryError> {
        Ok(self.last_run(key)?.is_some())
    }

    pub fn last_run(&self, key: &str) -> Result<Option<DateTime<Utc>>, HistoryError> {
        let locked = self.open_locked()?;
        let records = locked.read_records()?;
        Ok(records.into_iter().find(|r| r.key == key).map(|r| r.last_run))
    }

    /// Record a start of `key` at the current time.
    pub fn mark_run(&self, key: &str) -> Result<(), HistoryError> {
        self.mark_run_at(key, Utc::now())
    }

    /// Record a start of `key` at `at`.
    ///
    /// A key appears at most once in the file; marking it again keeps the
    /// later of the two timestamps.
    pub fn mark_run_at(&self, key: &str, at: DateTime<Utc>) -> Result<(), HistoryError> {
        if key.is_empty() || key.contains([',', '\n', '\r']) {
            return Err(HistoryError::InvalidKey(key.to_string()));
        }

        let locked = self.open_locked()?;
        let mut records = locked.read_records()?;
        match records.iter_mut().find(|r| r.key == key) {
            Some(existing) => existing.last_run = existing.last_run.max(at),
            None => records.push(RunRecord { key: key.to_string(), last_run: at }),
        }
        locked.replace(&records)?;
        debug!(key, at = %at.to_rfc3339(), "recorded run");
        Ok(())
    }

    /// Every record, in file order.
    pub fn records(&self) -> Result<Vec<RunRecord>, HistoryError> {
        self.open_locked()?.read_records()
    }

    fn open_locked(&self) -> Result<LockedHistory, HistoryError> {
        let dir = self.dir.as_ref().ok_or(HistoryError::Unconfigured)?;
        std::fs::create_dir_all(dir)?;
        let lock_path = dir.join(LOCK_FILE);
        let lock = OpenOptions::new().write(true).create(true).truncate(false).open(&lock_path)?;
        lock.lock_exclusive().map_err(|e| HistoryError::Lock(lock_path, e))?;
        Ok(LockedHistory { lock, dir: dir.clone() })
    }
}

/// Exclusive hold on a history directory until dropped.
struct LockedHistory {
    lock: File,
    dir: PathBuf,
}

impl LockedHistory {
    fn path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    fn read_records(&self) -> Result<Vec<RunRecord>, HistoryError> {
        let path = self.path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records: Vec<RunRecord> = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_record(line) {
                Some(record) => match records.iter_mut().find(|r| r.key == record.key) {
                    Some(existing) => existing.last_run = existing.last_run.max(record.last_run),
                    None => records.push(record),
                },
                None => warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    "skipping corrupt run history record"
                ),
            }
        }
        Ok(records)
    }

    /// Stage the full set in the temp file, sync it, and rename it into place.
    fn replace(&self, records: &[RunRecord]) -> Result<(), HistoryError> {
        let mut out = String::new();
        for record in records {
            out.push_str(&record.key);
            out.push(',');
            out.push_str(&record.last_run.to_rfc3339());
            out.push('\n');
        }

        let tmp = self.dir.join(TEMP_FILE);
        let mut file =
            OpenOptions::new().write(true).create(true).truncate(true).open(&tmp)?;
        file.write_all(out.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp, self.path())?;
        // Persist the rename itself.
        if let Err(e) = File::open(&self.dir).and_then(|d| d.sync_all()) {
            debug!(dir = %self.dir.display(), error = %e, "directory sync skipped");
        }
        Ok(())
    }
}

impl Drop for LockedHistory {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.lock) {
            warn!(dir = %self.dir.display(), error = %e, "failed to unlock run history");
        }
    }
}

fn parse_record(line: &str) -> Option<RunRecord> {
    let (key, ts) = line.split_once(',')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let last_run = DateTime::parse_from_rfc3339(ts.trim()).ok()?.with_timezone(&Utc);
    Some(RunRecord { key: key.to_string(), last_run })
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
