// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container engine capability boundary.

use async_trait::async_trait;
use moor_core::{Credentials, ImageRef, RunSpec};
use thiserror::Error;

use crate::compose::ComposeError;

/// Errors from container engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine command failed: {0}")]
    CommandFailed(String),
    #[error("pull of {image} failed: {reason}")]
    PullFailed { image: String, reason: String },
    #[error("registry login to {registry} failed: {reason}")]
    LoginFailed { registry: String, reason: String },
    #[error("create failed: {0}")]
    CreateFailed(String),
    #[error("workload not found: {0}")]
    NotFound(String),
    #[error("unexpected engine output: {0}")]
    Parse(String),
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// A created container managed by the reconciler.
///
/// Handles are shared between the reconciler and the workload's watch task,
/// so every query goes back to the engine rather than caching state.
#[async_trait]
pub trait WorkloadHandle: Send + Sync + 'static {
    /// Engine-assigned container identity.
    fn id(&self) -> &str;

    /// Digest of the image the workload was created from.
    fn digest(&self) -> &str;

    /// Run-history key: the digest for a run workload, `<digest>/<service>`
    /// for a compose service.
    fn history_key(&self) -> &str;

    async fn is_running(&self) -> Result<bool, EngineError>;

    /// Engine image id the container was created from.
    async fn image_identity(&self) -> Result<String, EngineError>;
}

/// Image and container operations the reconciler needs from an engine.
///
/// Creating a workload never starts it; starting is left to the watch loop
/// so that run policy is applied in one place.
#[async_trait]
pub trait EngineDriver: Clone + Send + Sync + 'static {
    type Workload: WorkloadHandle;

    /// Whether an image with `digest` is present locally.
    async fn image_exists(&self, digest: &str) -> Result<bool, EngineError>;

    async fn pull_image(
        &self,
        image: &ImageRef,
        credentials: Option<&Credentials>,
    ) -> Result<(), EngineError>;

    async fn create_workload(
        &self,
        image: &ImageRef,
        spec: &RunSpec,
    ) -> Result<Self::Workload, EngineError>;

    /// Create one workload per service in the compose document.
    ///
    /// Either every service is created or none are.
    async fn create_compose_workloads(
        &self,
        image: &ImageRef,
        compose_lines: &[String],
    ) -> Result<Vec<Self::Workload>, EngineError>;

    async fn start_workload(&self, id: &str) -> Result<(), EngineError>;

    async fn stop_workload(&self, id: &str) -> Result<(), EngineError>;

    async fn remove_workload(&self, id: &str) -> Result<(), EngineError>;

    async fn remove_image(&self, image: &ImageRef) -> Result<(), EngineError>;
}

/// History key of a compose service pinned to `digest`.
pub fn service_history_key(digest: &str, service: &str) -> String {
    format!("{digest}/{service}")
}
