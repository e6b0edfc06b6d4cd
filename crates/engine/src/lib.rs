// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! moor-engine: reconciliation loop and per-workload watch tasks

mod error;
pub mod policy;
mod reconciler;
mod watch;

pub use error::ReconcileError;
pub use policy::should_run;
pub use reconciler::{
    ConfigureOutcome, Phase, Reconciler, ReconcilerConfig, ReconcilerStatus, WorkloadStatus,
    DEFAULT_POLL_INTERVAL,
};
