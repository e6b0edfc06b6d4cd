// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workload watch task.
//!
//! Each workload gets one task that polls its running state and applies the
//! start policy. Tasks never touch reconciler state; they only see the
//! engine, the run history and their own cancellation token.

use std::sync::Arc;
use std::time::Duration;

use moor_adapters::{EngineDriver, EngineError, WorkloadHandle};
use moor_core::RunPolicy;
use moor_storage::RunHistoryStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::policy::{needs_history, should_run};

/// Everything a watch task needs, shared by all tasks of one workload set.
pub(crate) struct WatchContext<E: EngineDriver> {
    pub engine: E,
    pub store: RunHistoryStore,
    pub policy: RunPolicy,
    pub interval: Duration,
}

/// Result of one watch tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    Running,
    Started,
    AlreadyRan,
    PolicySkip,
    /// Running state could not be read.
    InspectFailed,
    /// The engine no longer knows the container (e.g. removed by `--rm` on
    /// exit). Terminal: the task stops until the next reconciliation pass.
    Gone,
    /// Run history could not be read; no start is attempted.
    HistoryUnavailable,
    StartFailed,
    Cancelled,
}

moor_core::simple_display! {
    Tick {
        Running => "running",
        Started => "started",
        AlreadyRan => "already-ran",
        PolicySkip => "policy-skip",
        InspectFailed => "inspect-failed",
        Gone => "gone",
        HistoryUnavailable => "history-unavailable",
        StartFailed => "start-failed",
        Cancelled => "cancelled",
    }
}

/// A spawned watch task and the token that stops it.
pub(crate) struct WatchTask {
    pub token: CancellationToken,
    pub handle: JoinHandle<()>,
}

/// Spawn the watch loop for `workload`.
pub(crate) fn spawn<E: EngineDriver>(
    ctx: Arc<WatchContext<E>>,
    workload: Arc<E::Workload>,
    token: CancellationToken,
) -> WatchTask {
    let handle = tokio::spawn(run(ctx, workload, token.clone()));
    WatchTask { token, handle }
}

async fn run<E: EngineDriver>(
    ctx: Arc<WatchContext<E>>,
    workload: Arc<E::Workload>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(workload = %workload.id(), "watch started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match tick(&ctx, workload.as_ref(), &token).await {
            Tick::Cancelled => break,
            Tick::Gone => {
                warn!(workload = %workload.id(), "workload removed by the engine, watch ending");
                break;
            }
            _ => {}
        }
    }

    debug!(workload = %workload.id(), "watch stopped");
}

/// One poll of `workload`: start it if it is stopped and policy allows.
pub(crate) async fn tick<E: EngineDriver>(
    ctx: &WatchContext<E>,
    workload: &E::Workload,
    token: &CancellationToken,
) -> Tick {
    let id = workload.id();
    match workload.is_running().await {
        Ok(true) => return Tick::Running,
        Ok(false) => {}
        Err(EngineError::NotFound(_)) => return Tick::Gone,
        Err(e) => {
            warn!(workload = %id, error = %e, "failed to read workload state");
            return Tick::InspectFailed;
        }
    }
    if token.is_cancelled() {
        return Tick::Cancelled;
    }

    let has_run = if needs_history(ctx.policy) {
        match has_run(&ctx.store, workload.history_key()).await {
            Ok(has_run) => has_run,
            Err(e) => {
                warn!(
                    workload = %id,
                    key = %workload.history_key(),
                    error = %e,
                    "run history unavailable, not starting"
                );
                return Tick::HistoryUnavailable;
            }
        }
    } else {
        false
    };
    if !should_run(ctx.policy, has_run) {
        return if has_run { Tick::AlreadyRan } else { Tick::PolicySkip };
    }
    if token.is_cancelled() {
        return Tick::Cancelled;
    }

    if let Err(e) = ctx.engine.start_workload(id).await {
        warn!(workload = %id, error = %e, "failed to start workload");
        return Tick::StartFailed;
    }
    info!(workload = %id, digest = %workload.digest(), "started workload");

    // A failed mark is not retried and does not undo the start.
    if let Err(e) = mark_run(&ctx.store, workload.history_key()).await {
        warn!(workload = %id, key = %workload.history_key(), error = %e, "failed to record run");
    }
    Tick::Started
}

async fn has_run(store: &RunHistoryStore, key: &str) -> Result<bool, ReconcileError> {
    let store = store.clone();
    let key = key.to_string();
    Ok(tokio::task::spawn_blocking(move || store.has_run(&key)).await??)
}

async fn mark_run(store: &RunHistoryStore, key: &str) -> Result<(), ReconcileError> {
    let store = store.clone();
    let key = key.to_string();
    tokio::task::spawn_blocking(move || store.mark_run(&key)).await??;
    Ok(())
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
