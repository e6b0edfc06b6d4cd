// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! moor-adapters: container engine and compose adapters for moor

pub mod compose;
pub mod docker;
pub mod engine;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake;

pub use compose::{ComposeError, ComposeTranslator, PortSpec, ServiceSpec, YamlComposeTranslator};
pub use docker::{DockerEngine, DockerWorkload};
pub use engine::{service_history_key, EngineDriver, EngineError, WorkloadHandle};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{EngineCall, FakeContainer, FakeEngine, FakeWorkload};
