// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired-state configuration.
//!
//! [`RawConfig`] is the on-disk shape (TOML), where `run_options` and
//! `compose_options` are independent optional tables. Validation turns it into
//! a [`DesiredConfig`], where the two shapes are a single [`WorkloadSpec`] sum
//! type and cannot both be present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::image::ImageRef;
use crate::validate::ConfigError;

/// Engine-specific container options, keyed by option name.
///
/// A `BTreeMap` so two configs that differ only in key order compare equal.
pub type EngineOptions = BTreeMap<String, serde_json::Value>;

/// Validated desired state for one managed image.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredConfig {
    pub image: ImageRef,
    pub workload: WorkloadSpec,
    pub policy: RunPolicy,
    pub credentials: Option<Credentials>,
    /// Remove the previously configured image after a digest change.
    pub prune_previous_image: bool,
}

/// How the desired containers are described.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadSpec {
    /// A single container run from the image.
    Run(RunSpec),
    /// One container per service declared in a compose document.
    Compose(ComposeSpec),
}

crate::simple_display! {
    WorkloadSpec {
        Run(..) => "run",
        Compose(..) => "compose",
    }
}

/// Start policy applied by the watch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPolicy {
    /// Start each workload at most once across process restarts.
    pub run_once: bool,
    /// Fetch the image but never create or start workloads.
    pub download_only: bool,
}

/// Container settings for a single-run workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSpec {
    /// Environment entries in `KEY=VALUE` form.
    pub env: Vec<String>,
    /// Arguments passed to the image entrypoint.
    #[serde(rename = "entry_point_args")]
    pub entrypoint_args: Vec<String>,
    pub options: EngineOptions,
    pub host_options: HostOptions,
}

impl RunSpec {
    pub fn new() -> Self {
        Self::default()
    }

    crate::setters! {
        set {
            env: Vec<String>,
            entrypoint_args: Vec<String>,
            options: EngineOptions,
            host_options: HostOptions,
        }
    }
}

/// Host-level container settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostOptions {
    /// Bind mounts in `host:container[:mode]` form.
    pub binds: Vec<String>,
    pub network_mode: Option<String>,
    pub auto_remove: Option<bool>,
}

/// Compose document, kept line by line as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComposeSpec {
    #[serde(rename = "compose_file", default)]
    pub lines: Vec<String>,
}

impl ComposeSpec {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// The document text, one configured line per line.
    pub fn document(&self) -> String {
        let mut doc = self.lines.join("\n");
        doc.push('\n');
        doc
    }
}

/// Registry credentials for private images.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DesiredConfig {
    /// Desired state for a single container run from `name@digest`.
    pub fn run(name: impl Into<String>, digest: impl Into<String>, spec: RunSpec) -> Self {
        Self::new(ImageRef::new(name, digest), WorkloadSpec::Run(spec))
    }

    /// Desired state for the services of a compose document.
    pub fn compose(name: impl Into<String>, digest: impl Into<String>, lines: Vec<String>) -> Self {
        Self::new(ImageRef::new(name, digest), WorkloadSpec::Compose(ComposeSpec::new(lines)))
    }

    fn new(image: ImageRef, workload: WorkloadSpec) -> Self {
        Self {
            image,
            workload,
            policy: RunPolicy::default(),
            credentials: None,
            prune_previous_image: false,
        }
    }

    pub fn run_once(mut self, run_once: bool) -> Self {
        self.policy.run_once = run_once;
        self
    }

    pub fn download_only(mut self, download_only: bool) -> Self {
        self.policy.download_only = download_only;
        self
    }

    crate::setters! {
        set {
            prune_previous_image: bool,
        }
        option {
            credentials: Credentials,
        }
    }

    /// Parse and validate a TOML desired-state document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        raw.try_into()
    }
}

/// On-disk desired-state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub image_name: String,
    #[serde(default)]
    pub repo_digest: String,
    #[serde(default)]
    pub run_options: Option<RunSpec>,
    #[serde(default)]
    pub compose_options: Option<ComposeSpec>,
    #[serde(default)]
    pub run_once: bool,
    #[serde(default)]
    pub download_only: bool,
    #[serde(default)]
    pub prune_previous_image: bool,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl TryFrom<RawConfig> for DesiredConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let workload = match (raw.run_options, raw.compose_options) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingSpecs),
            (None, None) => return Err(ConfigError::MissingSpec),
            (Some(run), None) => WorkloadSpec::Run(run),
            (None, Some(compose)) => WorkloadSpec::Compose(compose),
        };
        let config = DesiredConfig {
            image: ImageRef::new(raw.image_name, raw.repo_digest),
            workload,
            policy: RunPolicy { run_once: raw.run_once, download_only: raw.download_only },
            credentials: raw.credentials,
            prune_previous_image: raw.prune_previous_image,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
