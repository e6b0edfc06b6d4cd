// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired-state reconciler.
//!
//! A pass runs only when the incoming config differs operationally from the
//! applied one. Within a pass the order is fixed: tear down the old workload
//! set (joining its watch tasks first), make the image present, create the new
//! set, then arm one watch task per workload.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moor_adapters::{EngineDriver, WorkloadHandle};
use moor_core::{diff, Change, DesiredConfig, WorkloadSpec};
use moor_storage::RunHistoryStore;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::watch::{self, WatchContext, WatchTask};

/// Default watch poll interval (10 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Reconciler tuning.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub poll_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

/// Lifecycle phase of a [`Reconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Reconciling,
    Steady,
    Closed,
}

moor_core::simple_display! {
    Phase {
        Uninitialized => "uninitialized",
        Reconciling => "reconciling",
        Steady => "steady",
        Closed => "closed",
    }
}

/// What [`Reconciler::configure`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// The config matched the applied one; nothing was touched.
    Unchanged,
    /// A full pass ran because of these changes.
    Reconciled(Vec<Change>),
}

/// Point-in-time view of one managed workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadStatus {
    pub container_id: String,
    pub digest: String,
    pub history_key: String,
    /// `None` when the engine could not be queried.
    pub image_id: Option<String>,
    pub running: bool,
}

/// Point-in-time view of the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcilerStatus {
    pub phase: Phase,
    /// Applied image reference, if a config is applied.
    pub image: Option<String>,
    pub workloads: Vec<WorkloadStatus>,
    pub last_error: Option<String>,
}

struct ReconcilerState<W> {
    config: Option<DesiredConfig>,
    workloads: Vec<Arc<W>>,
    phase: Phase,
    last_error: Option<String>,
    watches: HashMap<String, WatchTask>,
}

/// Converges the engine toward the applied [`DesiredConfig`].
pub struct Reconciler<E: EngineDriver> {
    engine: E,
    store: RunHistoryStore,
    settings: ReconcilerConfig,
    shutdown: CancellationToken,
    state: RwLock<ReconcilerState<E::Workload>>,
}

impl<E: EngineDriver> Reconciler<E> {
    pub fn new(engine: E, store: RunHistoryStore, settings: ReconcilerConfig) -> Self {
        Self {
            engine,
            store,
            settings,
            shutdown: CancellationToken::new(),
            state: RwLock::new(ReconcilerState {
                config: None,
                workloads: Vec::new(),
                phase: Phase::Uninitialized,
                last_error: None,
                watches: HashMap::new(),
            }),
        }
    }

    /// Apply `config`, running a reconciliation pass if it changed.
    ///
    /// Validation runs before any engine call. If a pass fails the applied
    /// config is cleared, so applying the same config again retries.
    pub async fn configure(
        &self,
        config: DesiredConfig,
    ) -> Result<ConfigureOutcome, ReconcileError> {
        let mut state = self.state.write().await;
        if state.phase == Phase::Closed {
            return Err(ReconcileError::Closed);
        }

        if let Err(e) = config.validate() {
            warn!(error = %e, "rejected config");
            state.last_error = Some(e.to_string());
            return Err(e.into());
        }

        let changes = diff(state.config.as_ref(), &config);
        if changes.is_empty() {
            debug!(image = %config.image, "config unchanged");
            state.last_error = None;
            return Ok(ConfigureOutcome::Unchanged);
        }

        let changed: Vec<String> = changes.iter().map(ToString::to_string).collect();
        info!(image = %config.image, changes = ?changed, "reconciling");
        state.phase = Phase::Reconciling;

        let result = self.reconcile(&mut state, config).await;
        state.phase = Phase::Steady;
        match result {
            Ok(()) => {
                state.last_error = None;
                info!(workloads = state.workloads.len(), "reconciled");
                Ok(ConfigureOutcome::Reconciled(changes))
            }
            Err(e) => {
                warn!(error = %e, "reconciliation failed");
                state.config = None;
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn reconcile(
        &self,
        state: &mut ReconcilerState<E::Workload>,
        config: DesiredConfig,
    ) -> Result<(), ReconcileError> {
        let previous = state.config.take();
        self.teardown(state).await;

        if config.prune_previous_image {
            if let Some(previous) = previous.filter(|p| p.image.digest != config.image.digest) {
                match self.engine.remove_image(&previous.image).await {
                    Ok(()) => info!(image = %previous.image, "removed previous image"),
                    Err(e) => {
                        warn!(image = %previous.image, error = %e, "failed to remove previous image")
                    }
                }
            }
        }

        self.ensure_image(&config).await?;
        if self.shutdown.is_cancelled() {
            return Err(ReconcileError::Closed);
        }

        if config.policy.download_only {
            info!(image = %config.image, "download only, not creating workloads");
            state.config = Some(config);
            return Ok(());
        }

        let created = match &config.workload {
            WorkloadSpec::Run(spec) => vec![self
                .engine
                .create_workload(&config.image, spec)
                .await
                .map_err(ReconcileError::Create)?],
            WorkloadSpec::Compose(compose) => self
                .engine
                .create_compose_workloads(&config.image, &compose.lines)
                .await
                .map_err(ReconcileError::Create)?,
        };
        state.workloads = created.into_iter().map(Arc::new).collect();

        let ctx = Arc::new(WatchContext {
            engine: self.engine.clone(),
            store: self.store.clone(),
            policy: config.policy,
            interval: self.settings.poll_interval,
        });
        for workload in &state.workloads {
            let task =
                watch::spawn(Arc::clone(&ctx), Arc::clone(workload), self.shutdown.child_token());
            state.watches.insert(workload.id().to_string(), task);
        }

        state.config = Some(config);
        Ok(())
    }

    async fn ensure_image(&self, config: &DesiredConfig) -> Result<(), ReconcileError> {
        let unavailable = |source| ReconcileError::ImageUnavailable {
            image: config.image.reference(),
            source,
        };
        if self.engine.image_exists(&config.image.digest).await.map_err(unavailable)? {
            debug!(image = %config.image, "image present");
            return Ok(());
        }
        self.engine
            .pull_image(&config.image, config.credentials.as_ref())
            .await
            .map_err(unavailable)?;
        info!(image = %config.image, "pulled image");
        Ok(())
    }

    /// Cancel and join every watch task, then stop and remove every workload.
    async fn teardown(&self, state: &mut ReconcilerState<E::Workload>) {
        join_watches(&mut state.watches).await;
        for workload in state.workloads.drain(..) {
            let id = workload.id();
            if let Err(e) = self.engine.stop_workload(id).await {
                warn!(workload = %id, error = %e, "failed to stop workload");
            }
            if let Err(e) = self.engine.remove_workload(id).await {
                warn!(workload = %id, error = %e, "failed to remove workload");
            }
        }
    }

    /// Snapshot of phase, workloads and last error.
    pub async fn status(&self) -> ReconcilerStatus {
        let state = self.state.read().await;
        let mut workloads = Vec::with_capacity(state.workloads.len());
        for workload in &state.workloads {
            let running = match workload.is_running().await {
                Ok(running) => running,
                Err(e) => {
                    debug!(workload = %workload.id(), error = %e, "status query failed");
                    false
                }
            };
            workloads.push(WorkloadStatus {
                container_id: workload.id().to_string(),
                digest: workload.digest().to_string(),
                history_key: workload.history_key().to_string(),
                image_id: workload.image_identity().await.ok(),
                running,
            });
        }
        ReconcilerStatus {
            phase: state.phase,
            image: state.config.as_ref().map(|c| c.image.reference()),
            workloads,
            last_error: state.last_error.clone(),
        }
    }

    /// Whether the applied config has converged.
    ///
    /// Run-once and download-only configs are ready once applied; otherwise
    /// every workload must be running.
    pub async fn is_ready(&self) -> bool {
        let state = self.state.read().await;
        if state.phase != Phase::Steady || state.last_error.is_some() {
            return false;
        }
        let Some(config) = &state.config else {
            return false;
        };
        if config.policy.download_only || config.policy.run_once {
            return true;
        }
        for workload in &state.workloads {
            if !matches!(workload.is_running().await, Ok(true)) {
                return false;
            }
        }
        true
    }

    /// Stop every watch task and workload. Workloads are stopped, not removed.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let mut state = self.state.write().await;
        if state.phase == Phase::Closed {
            return;
        }
        join_watches(&mut state.watches).await;
        for workload in &state.workloads {
            if let Err(e) = self.engine.stop_workload(workload.id()).await {
                warn!(workload = %workload.id(), error = %e, "failed to stop workload");
            }
        }
        state.phase = Phase::Closed;
        info!("reconciler closed");
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.phase
    }

    /// Currently applied config.
    pub async fn applied(&self) -> Option<DesiredConfig> {
        self.state.read().await.config.clone()
    }

    /// Number of live watch tasks.
    pub async fn watch_count(&self) -> usize {
        self.state.read().await.watches.len()
    }

    /// Signalled once [`Reconciler::close`] starts.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

async fn join_watches(watches: &mut HashMap<String, WatchTask>) {
    let tasks: Vec<(String, WatchTask)> = watches.drain().collect();
    for (_, task) in &tasks {
        task.token.cancel();
    }
    for (id, task) in tasks {
        if let Err(e) = task.handle.await {
            warn!(workload = %id, error = %e, "watch task ended abnormally");
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
