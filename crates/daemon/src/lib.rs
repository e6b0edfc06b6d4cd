// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Moor daemon library
//!
//! Process lifecycle around the reconciler: single-instance lock, config
//! loading and reload, status snapshots and logging.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod logging;
pub mod status;

pub use lifecycle::{load_desired, startup, Config, Daemon, LifecycleError};
pub use status::StatusSnapshot;
