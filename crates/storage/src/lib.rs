// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! moor-storage: crash-safe run history for moor

mod history;

pub use history::{HistoryError, RunHistoryStore, RunRecord, HISTORY_FILE, LOCK_FILE, TEMP_FILE};
