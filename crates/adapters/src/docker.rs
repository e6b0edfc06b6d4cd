// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker engine driver.
//!
//! Drives the `docker` CLI. Every container this driver creates carries a
//! `moor.digest` label, and compose services also carry `moor.service`.

use std::process::Stdio;

use async_trait::async_trait;
use moor_core::{Credentials, EngineOptions, ImageRef, RunSpec};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::compose::{ComposeTranslator, ServiceSpec, YamlComposeTranslator};
use crate::engine::{service_history_key, EngineDriver, EngineError, WorkloadHandle};

pub const DIGEST_LABEL: &str = "moor.digest";
pub const SERVICE_LABEL: &str = "moor.service";

/// [`EngineDriver`] backed by the docker CLI.
#[derive(Debug, Clone, Default)]
pub struct DockerEngine {
    translator: YamlComposeTranslator,
}

impl DockerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    async fn login(&self, image: &ImageRef, credentials: &Credentials) -> Result<(), EngineError> {
        let registry = image.registry_host();
        let mut args = vec!["login", "--username", credentials.username.as_str(), "--password-stdin"];
        if let Some(host) = registry {
            args.push(host);
        }
        let registry = registry.unwrap_or("default registry").to_string();
        run_docker_with_stdin(&args, &credentials.password)
            .await
            .map_err(|reason| EngineError::LoginFailed { registry: registry.clone(), reason })?;
        info!(registry = %registry, "logged in to registry");
        Ok(())
    }

    /// Remove a stale container left under a service name by an earlier run.
    ///
    /// Only containers carrying the digest label are removed; anything else
    /// holding the name is left alone and the create fails.
    async fn clear_stale_service(&self, name: &str) {
        let Ok(output) = run_docker(&["inspect", "--type", "container", name]).await else {
            return;
        };
        match parse_inspect(&output) {
            Ok(container) if container.config.labels.contains_key(DIGEST_LABEL) => {
                info!(container = name, "removing stale service container");
                if let Err(e) = run_docker(&["rm", "-f", name]).await {
                    warn!(container = name, error = %e, "failed to remove stale container");
                }
            }
            _ => {}
        }
    }

    async fn create_service(
        &self,
        image: &ImageRef,
        service: &ServiceSpec,
    ) -> Result<DockerWorkload, EngineError> {
        self.clear_stale_service(&service.name).await;

        let args = service_create_args(&image.digest, service);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = run_docker(&args).await.map_err(EngineError::CreateFailed)?;
        info!(service = %service.name, container = %short_id(&id), "created service container");
        Ok(DockerWorkload {
            history_key: service_history_key(&image.digest, &service.name),
            id,
            digest: image.digest.clone(),
        })
    }
}

#[async_trait]
impl EngineDriver for DockerEngine {
    type Workload = DockerWorkload;

    async fn image_exists(&self, digest: &str) -> Result<bool, EngineError> {
        let output = run_docker(&["images", "--digests", "--no-trunc", "--format", "{{json .}}"])
            .await
            .map_err(EngineError::CommandFailed)?;
        Ok(list_image_digests(&output)?.iter().any(|d| d == digest))
    }

    async fn pull_image(
        &self,
        image: &ImageRef,
        credentials: Option<&Credentials>,
    ) -> Result<(), EngineError> {
        if let Some(credentials) = credentials {
            self.login(image, credentials).await?;
        }
        let reference = image.reference();
        info!(image = %reference, "pulling image");
        run_docker(&["pull", "--quiet", &reference])
            .await
            .map_err(|reason| EngineError::PullFailed { image: reference.clone(), reason })?;
        Ok(())
    }

    async fn create_workload(
        &self,
        image: &ImageRef,
        spec: &RunSpec,
    ) -> Result<DockerWorkload, EngineError> {
        let args = run_create_args(image, spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = run_docker(&args).await.map_err(EngineError::CreateFailed)?;
        info!(image = %image, container = %short_id(&id), "created container");
        Ok(DockerWorkload { history_key: image.digest.clone(), id, digest: image.digest.clone() })
    }

    async fn create_compose_workloads(
        &self,
        image: &ImageRef,
        compose_lines: &[String],
    ) -> Result<Vec<DockerWorkload>, EngineError> {
        let document = moor_core::ComposeSpec::new(compose_lines.to_vec()).document();
        let services = self.translator.translate(&document)?;

        let mut created: Vec<DockerWorkload> = Vec::with_capacity(services.len());
        for service in &services {
            match self.create_service(image, service).await {
                Ok(workload) => created.push(workload),
                Err(e) => {
                    warn!(service = %service.name, error = %e, "service create failed, rolling back");
                    for workload in &created {
                        if let Err(e) = run_docker(&["rm", "-f", &workload.id]).await {
                            warn!(container = %short_id(&workload.id), error = %e, "rollback remove failed");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(created)
    }

    async fn start_workload(&self, id: &str) -> Result<(), EngineError> {
        run_docker(&["start", id]).await.map_err(EngineError::CommandFailed)?;
        Ok(())
    }

    async fn stop_workload(&self, id: &str) -> Result<(), EngineError> {
        run_docker(&["stop", id]).await.map_err(|e| not_found_or(id, e))?;
        Ok(())
    }

    async fn remove_workload(&self, id: &str) -> Result<(), EngineError> {
        run_docker(&["rm", "-f", id]).await.map_err(|e| not_found_or(id, e))?;
        Ok(())
    }

    async fn remove_image(&self, image: &ImageRef) -> Result<(), EngineError> {
        run_docker(&["rmi", &image.reference()]).await.map_err(EngineError::CommandFailed)?;
        Ok(())
    }
}

/// A container created by [`DockerEngine`].
#[derive(Debug, Clone)]
pub struct DockerWorkload {
    id: String,
    digest: String,
    history_key: String,
}

impl DockerWorkload {
    async fn inspect(&self) -> Result<ContainerInspect, EngineError> {
        let output = run_docker(&["inspect", "--type", "container", &self.id])
            .await
            .map_err(|e| not_found_or(&self.id, e))?;
        parse_inspect(&output)
    }
}

#[async_trait]
impl WorkloadHandle for DockerWorkload {
    fn id(&self) -> &str {
        &self.id
    }

    fn digest(&self) -> &str {
        &self.digest
    }

    fn history_key(&self) -> &str {
        &self.history_key
    }

    async fn is_running(&self) -> Result<bool, EngineError> {
        Ok(self.inspect().await?.state.running)
    }

    async fn image_identity(&self) -> Result<String, EngineError> {
        Ok(self.inspect().await?.image)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerInspect {
    pub image: String,
    pub state: ContainerState,
    #[serde(default)]
    pub config: ContainerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerState {
    pub running: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: std::collections::HashMap<String, String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse `docker inspect` output (a JSON array with one object).
pub(crate) fn parse_inspect(output: &str) -> Result<ContainerInspect, EngineError> {
    let mut containers: Vec<ContainerInspect> =
        serde_json::from_str(output).map_err(|e| EngineError::Parse(e.to_string()))?;
    if containers.is_empty() {
        return Err(EngineError::Parse("empty inspect output".to_string()));
    }
    Ok(containers.swap_remove(0))
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageLine {
    #[serde(default)]
    digest: String,
}

/// Digests from `docker images --digests --format '{{json .}}'`, one JSON
/// object per line. Untagged or digest-less images report `<none>`.
pub(crate) fn list_image_digests(output: &str) -> Result<Vec<String>, EngineError> {
    let mut digests = Vec::new();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let image: ImageLine =
            serde_json::from_str(line).map_err(|e| EngineError::Parse(e.to_string()))?;
        if image.digest.is_empty() || image.digest == "<none>" {
            continue;
        }
        digests.push(image.digest);
    }
    Ok(digests)
}

/// `docker create` arguments for a single-run workload.
pub(crate) fn run_create_args(image: &ImageRef, spec: &RunSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--label".to_string(),
        format!("{DIGEST_LABEL}={}", image.digest),
    ];
    for entry in &spec.env {
        args.push("-e".to_string());
        args.push(entry.clone());
    }
    for bind in &spec.host_options.binds {
        args.push("-v".to_string());
        args.push(bind.clone());
    }
    if let Some(mode) = &spec.host_options.network_mode {
        args.push("--network".to_string());
        args.push(mode.clone());
    }
    if spec.host_options.auto_remove == Some(true) {
        args.push("--rm".to_string());
    }
    args.extend(option_flags(&spec.options));
    args.push(image.reference());
    args.extend(spec.entrypoint_args.iter().cloned());
    args
}

/// `docker create` arguments for one compose service.
pub(crate) fn service_create_args(digest: &str, service: &ServiceSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        service.name.clone(),
        "--label".to_string(),
        format!("{DIGEST_LABEL}={digest}"),
        "--label".to_string(),
        format!("{SERVICE_LABEL}={}", service.name),
    ];
    for (key, value) in &service.environment {
        args.push("-e".to_string());
        match value {
            Some(value) => args.push(format!("{key}={value}")),
            None => args.push(key.clone()),
        }
    }
    for port in &service.ports {
        args.push("-p".to_string());
        args.push(port.to_flag());
    }
    args.push(service.image.clone());
    args.extend(service.command.iter().cloned());
    args
}

/// Map engine options onto long CLI flags.
///
/// `true` becomes a bare flag, `false` and null are omitted, arrays repeat
/// the flag per element, and any other value is passed as the flag's value.
pub(crate) fn option_flags(options: &EngineOptions) -> Vec<String> {
    let mut flags = Vec::new();
    for (key, value) in options {
        let flag = format!("--{}", key.replace('_', "-"));
        match value {
            serde_json::Value::Bool(true) => flags.push(flag),
            serde_json::Value::Bool(false) | serde_json::Value::Null => {}
            serde_json::Value::Array(items) => {
                for item in items {
                    flags.push(flag.clone());
                    flags.push(json_scalar(item));
                }
            }
            other => {
                flags.push(flag);
                flags.push(json_scalar(other));
            }
        }
    }
    flags
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn not_found_or(id: &str, message: String) -> EngineError {
    if message.contains("No such container") || message.contains("No such object") {
        EngineError::NotFound(id.to_string())
    } else {
        EngineError::CommandFailed(message)
    }
}

/// Run a docker CLI command and return stdout on success.
async fn run_docker(args: &[&str]) -> Result<String, String> {
    debug!(command = %args.first().unwrap_or(&""), "docker");
    let output = tokio::process::Command::new("docker")
        .args(args)
        .output()
        .await
        .map_err(|e| format!("failed to exec docker: {}", e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("docker {} failed: {}", args.first().unwrap_or(&""), stderr.trim()))
    }
}

/// Like [`run_docker`], feeding `input` on stdin.
async fn run_docker_with_stdin(args: &[&str], input: &str) -> Result<String, String> {
    let mut child = tokio::process::Command::new("docker")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to exec docker: {}", e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .await
            .map_err(|e| format!("failed to write docker stdin: {}", e))?;
    }

    let output =
        child.wait_with_output().await.map_err(|e| format!("failed to wait for docker: {}", e))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("docker {} failed: {}", args.first().unwrap_or(&""), stderr.trim()))
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
