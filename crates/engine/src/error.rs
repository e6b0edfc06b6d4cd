// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use moor_adapters::EngineError;
use moor_core::ConfigError;
use moor_storage::HistoryError;
use thiserror::Error;

/// Errors surfaced by [`crate::Reconciler::configure`]
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("image {image} unavailable: {source}")]
    ImageUnavailable {
        image: String,
        #[source]
        source: EngineError,
    },
    #[error("failed to create workloads: {0}")]
    Create(#[source] EngineError),
    #[error("run history error: {0}")]
    History(#[from] HistoryError),
    #[error("run history task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("reconciler is closed")]
    Closed,
}
