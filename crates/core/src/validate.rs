// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired-state validation.
//!
//! Every check here runs before any engine call is made, so a rejected
//! configuration never touches images or containers.

use thiserror::Error;

use crate::config::{DesiredConfig, HostOptions, RunSpec, WorkloadSpec};

/// Configuration errors. Never retried; surfaced to whoever applied the config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("only one of run_options or compose_options can be set")]
    ConflictingSpecs,
    #[error("one of run_options or compose_options is required")]
    MissingSpec,
    #[error("image_name is required")]
    MissingImageName,
    #[error("repo_digest is required")]
    MissingDigest,
    #[error("compose_file is required")]
    EmptyComposeFile,
    #[error("compose_file must reference repo_digest {0}")]
    ComposeDigestMismatch(String),
    #[error("env entry '{0}' must have the form KEY=VALUE")]
    InvalidEnv(String),
    #[error("host_options.binds entries must be non-empty")]
    EmptyBind,
    #[error("host_options.network_mode must be non-empty when set")]
    EmptyNetworkMode,
    #[error("credentials.username is required")]
    MissingUsername,
    #[error("credentials.password is required")]
    MissingPassword,
    #[error("invalid config: {0}")]
    Parse(String),
}

impl DesiredConfig {
    /// Check the invariants a [`DesiredConfig`] must hold before it is applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.name.trim().is_empty() {
            return Err(ConfigError::MissingImageName);
        }
        if self.image.digest.trim().is_empty() {
            return Err(ConfigError::MissingDigest);
        }

        match &self.workload {
            WorkloadSpec::Compose(compose) => {
                if compose.lines.iter().all(|line| line.trim().is_empty()) {
                    return Err(ConfigError::EmptyComposeFile);
                }
                // Without the digest in the document the engine would resolve
                // the service image by tag and may pull something newer.
                if !compose.lines.iter().any(|line| line.contains(&self.image.digest)) {
                    return Err(ConfigError::ComposeDigestMismatch(self.image.digest.clone()));
                }
            }
            WorkloadSpec::Run(run) => validate_run(run)?,
        }

        if let Some(credentials) = &self.credentials {
            if credentials.username.is_empty() {
                return Err(ConfigError::MissingUsername);
            }
            if credentials.password.is_empty() {
                return Err(ConfigError::MissingPassword);
            }
        }

        Ok(())
    }
}

fn validate_run(run: &RunSpec) -> Result<(), ConfigError> {
    for entry in &run.env {
        match entry.split_once('=') {
            Some((key, _)) if !key.is_empty() => {}
            _ => return Err(ConfigError::InvalidEnv(entry.clone())),
        }
    }
    validate_host(&run.host_options)
}

fn validate_host(host: &HostOptions) -> Result<(), ConfigError> {
    if host.binds.iter().any(|b| b.trim().is_empty()) {
        return Err(ConfigError::EmptyBind);
    }
    if host.network_mode.as_deref().is_some_and(|m| m.trim().is_empty()) {
        return Err(ConfigError::EmptyNetworkMode);
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
