// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory engine for tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use moor_core::{Credentials, ImageRef, RunSpec};
use parking_lot::Mutex;

use crate::compose::{ComposeTranslator, YamlComposeTranslator};
use crate::engine::{service_history_key, EngineDriver, EngineError, WorkloadHandle};

/// Recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    ImageExists { digest: String },
    PullImage { reference: String, with_credentials: bool },
    CreateWorkload { reference: String },
    CreateCompose { reference: String, services: Vec<String> },
    Start { id: String },
    Stop { id: String },
    Remove { id: String },
    RemoveImage { reference: String },
}

/// State of one fake container.
#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub digest: String,
    pub service: Option<String>,
    pub running: bool,
    pub starts: u32,
}

#[derive(Default)]
struct FakeEngineState {
    images: HashSet<String>,
    containers: BTreeMap<String, FakeContainer>,
    calls: Vec<EngineCall>,
    next_id: u32,
    pull_error: Option<String>,
    create_error: Option<String>,
    start_error: Option<String>,
    stop_error: Option<String>,
    remove_error: Option<String>,
    inspect_error: Option<String>,
}

/// Fake engine that records every call and keeps containers in memory.
///
/// Started containers stay running until [`FakeEngine::exit`] is called,
/// which stands in for the process inside the container finishing.
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Mutex<FakeEngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with the image for `digest` already present.
    pub fn with_image(digest: &str) -> Self {
        let engine = Self::new();
        engine.inner.lock().images.insert(digest.to_string());
        engine
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Number of recorded start calls, successful or not.
    pub fn start_calls(&self) -> usize {
        self.inner.lock().calls.iter().filter(|c| matches!(c, EngineCall::Start { .. })).count()
    }

    pub fn has_image(&self, digest: &str) -> bool {
        self.inner.lock().images.contains(digest)
    }

    /// Containers that currently exist, keyed by id.
    pub fn containers(&self) -> BTreeMap<String, FakeContainer> {
        self.inner.lock().containers.clone()
    }

    pub fn container(&self, id: &str) -> Option<FakeContainer> {
        self.inner.lock().containers.get(id).cloned()
    }

    /// Mark a container as exited.
    pub fn exit(&self, id: &str) {
        if let Some(container) = self.inner.lock().containers.get_mut(id) {
            container.running = false;
        }
    }

    /// Make every pull fail with `reason` (or succeed again with `None`).
    pub fn fail_pull(&self, reason: Option<&str>) {
        self.inner.lock().pull_error = reason.map(str::to_string);
    }

    pub fn fail_create(&self, reason: Option<&str>) {
        self.inner.lock().create_error = reason.map(str::to_string);
    }

    pub fn fail_start(&self, reason: Option<&str>) {
        self.inner.lock().start_error = reason.map(str::to_string);
    }

    /// Make every stop fail with `reason` (or succeed again with `None`).
    pub fn fail_stop(&self, reason: Option<&str>) {
        self.inner.lock().stop_error = reason.map(str::to_string);
    }

    /// Make every container removal fail with `reason`.
    pub fn fail_remove(&self, reason: Option<&str>) {
        self.inner.lock().remove_error = reason.map(str::to_string);
    }

    /// Make running-state queries fail.
    pub fn fail_inspect(&self, reason: Option<&str>) {
        self.inner.lock().inspect_error = reason.map(str::to_string);
    }

    fn create(&self, digest: &str, service: Option<&str>) -> FakeWorkload {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = format!("fake-{:04}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                digest: digest.to_string(),
                service: service.map(str::to_string),
                running: false,
                starts: 0,
            },
        );
        FakeWorkload {
            history_key: match service {
                Some(service) => service_history_key(digest, service),
                None => digest.to_string(),
            },
            id,
            digest: digest.to_string(),
            engine: self.clone(),
        }
    }
}

#[async_trait]
impl EngineDriver for FakeEngine {
    type Workload = FakeWorkload;

    async fn image_exists(&self, digest: &str) -> Result<bool, EngineError> {
        let mut state = self.inner.lock();
        state.calls.push(EngineCall::ImageExists { digest: digest.to_string() });
        Ok(state.images.contains(digest))
    }

    async fn pull_image(
        &self,
        image: &ImageRef,
        credentials: Option<&Credentials>,
    ) -> Result<(), EngineError> {
        let mut state = self.inner.lock();
        state.calls.push(EngineCall::PullImage {
            reference: image.reference(),
            with_credentials: credentials.is_some(),
        });
        if let Some(reason) = &state.pull_error {
            return Err(EngineError::PullFailed { image: image.reference(), reason: reason.clone() });
        }
        state.images.insert(image.digest.clone());
        Ok(())
    }

    async fn create_workload(
        &self,
        image: &ImageRef,
        _spec: &RunSpec,
    ) -> Result<FakeWorkload, EngineError> {
        {
            let mut state = self.inner.lock();
            state.calls.push(EngineCall::CreateWorkload { reference: image.reference() });
            if let Some(reason) = &state.create_error {
                return Err(EngineError::CreateFailed(reason.clone()));
            }
        }
        Ok(self.create(&image.digest, None))
    }

    async fn create_compose_workloads(
        &self,
        image: &ImageRef,
        compose_lines: &[String],
    ) -> Result<Vec<FakeWorkload>, EngineError> {
        let document = moor_core::ComposeSpec::new(compose_lines.to_vec()).document();
        let services = YamlComposeTranslator.translate(&document)?;
        {
            let mut state = self.inner.lock();
            state.calls.push(EngineCall::CreateCompose {
                reference: image.reference(),
                services: services.iter().map(|s| s.name.clone()).collect(),
            });
            if let Some(reason) = &state.create_error {
                return Err(EngineError::CreateFailed(reason.clone()));
            }
        }
        Ok(services.iter().map(|s| self.create(&image.digest, Some(&s.name))).collect())
    }

    async fn start_workload(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.inner.lock();
        state.calls.push(EngineCall::Start { id: id.to_string() });
        if let Some(reason) = &state.start_error {
            return Err(EngineError::CommandFailed(reason.clone()));
        }
        let container =
            state.containers.get_mut(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        container.running = true;
        container.starts += 1;
        Ok(())
    }

    async fn stop_workload(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.inner.lock();
        state.calls.push(EngineCall::Stop { id: id.to_string() });
        if let Some(reason) = &state.stop_error {
            return Err(EngineError::CommandFailed(reason.clone()));
        }
        let container =
            state.containers.get_mut(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        container.running = false;
        Ok(())
    }

    async fn remove_workload(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.inner.lock();
        state.calls.push(EngineCall::Remove { id: id.to_string() });
        if let Some(reason) = &state.remove_error {
            return Err(EngineError::CommandFailed(reason.clone()));
        }
        state.containers.remove(id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        Ok(())
    }

    async fn remove_image(&self, image: &ImageRef) -> Result<(), EngineError> {
        let mut state = self.inner.lock();
        state.calls.push(EngineCall::RemoveImage { reference: image.reference() });
        state.images.remove(&image.digest);
        Ok(())
    }
}

/// Handle to a [`FakeEngine`] container.
#[derive(Clone)]
pub struct FakeWorkload {
    id: String,
    digest: String,
    history_key: String,
    engine: FakeEngine,
}

#[async_trait]
impl WorkloadHandle for FakeWorkload {
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
        let state = self.engine.inner.lock();
        if let Some(reason) = &state.inspect_error {
            return Err(EngineError::CommandFailed(reason.clone()));
        }
        state
            .containers
            .get(&self.id)
            .map(|c| c.running)
            .ok_or_else(|| EngineError::NotFound(self.id.clone()))
    }

    async fn image_identity(&self) -> Result<String, EngineError> {
        let state = self.engine.inner.lock();
        state
            .containers
            .get(&self.id)
            .map(|c| format!("img-{}", c.digest.rsplit(':').next().unwrap_or(&c.digest)))
            .ok_or_else(|| EngineError::NotFound(self.id.clone()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
