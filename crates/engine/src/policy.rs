// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Start policy.

use moor_core::RunPolicy;

/// Whether a stopped workload should be started.
///
/// `has_run` is only consulted under run-once policy; callers may pass
/// `false` without querying history otherwise.
pub fn should_run(policy: RunPolicy, has_run: bool) -> bool {
    if policy.download_only {
        return false;
    }
    !(policy.run_once && has_run)
}

/// Whether the run history must be queried before starting.
pub fn needs_history(policy: RunPolicy) -> bool {
    policy.run_once && !policy.download_only
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
