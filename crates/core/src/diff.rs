// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired-state change detection.
//!
//! A reconciliation pass tears down and recreates every workload, so it only
//! runs when the differ reports an operational difference between the applied
//! config and the incoming one.

use crate::config::{DesiredConfig, WorkloadSpec};

/// One operational difference between two desired-state snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// There was no previously applied config.
    Initial,
    ImageName,
    Digest,
    /// Switched between a run workload and a compose workload.
    WorkloadKind,
    Env,
    EntrypointArgs,
    EngineOptions,
    HostOptions,
    ComposeFile,
    Credentials,
    RunOnce,
    DownloadOnly,
}

crate::simple_display! {
    Change {
        Initial => "initial",
        ImageName => "image_name",
        Digest => "repo_digest",
        WorkloadKind => "workload",
        Env => "env",
        EntrypointArgs => "entry_point_args",
        EngineOptions => "options",
        HostOptions => "host_options",
        ComposeFile => "compose_file",
        Credentials => "credentials",
        RunOnce => "run_once",
        DownloadOnly => "download_only",
    }
}

/// Every operational difference between `old` and `new`, in field order.
///
/// `prune_previous_image` only affects how a pass tears down, never whether
/// one is needed, so it is not compared.
pub fn diff(old: Option<&DesiredConfig>, new: &DesiredConfig) -> Vec<Change> {
    let Some(old) = old else {
        return vec![Change::Initial];
    };

    let mut changes = Vec::new();
    if old.image.name != new.image.name {
        changes.push(Change::ImageName);
    }
    if old.image.digest != new.image.digest {
        changes.push(Change::Digest);
    }

    match (&old.workload, &new.workload) {
        (WorkloadSpec::Run(a), WorkloadSpec::Run(b)) => {
            if a.env != b.env {
                changes.push(Change::Env);
            }
            if a.entrypoint_args != b.entrypoint_args {
                changes.push(Change::EntrypointArgs);
            }
            if a.options != b.options {
                changes.push(Change::EngineOptions);
            }
            if a.host_options != b.host_options {
                changes.push(Change::HostOptions);
            }
        }
        (WorkloadSpec::Compose(a), WorkloadSpec::Compose(b)) => {
            if a.lines != b.lines {
                changes.push(Change::ComposeFile);
            }
        }
        _ => changes.push(Change::WorkloadKind),
    }

    if old.credentials != new.credentials {
        changes.push(Change::Credentials);
    }
    if old.policy.run_once != new.policy.run_once {
        changes.push(Change::RunOnce);
    }
    if old.policy.download_only != new.policy.download_only {
        changes.push(Change::DownloadOnly);
    }
    changes
}

/// Whether applying `new` over `old` requires a reconciliation pass.
pub fn has_changed(old: Option<&DesiredConfig>, new: &DesiredConfig) -> bool {
    !diff(old, new).is_empty()
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
