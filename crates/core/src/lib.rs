// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! moor-core: desired-state model, validation and change detection for moor

pub mod macros;

pub mod config;
pub mod diff;
pub mod image;
pub mod validate;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{
    ComposeSpec, Credentials, DesiredConfig, EngineOptions, HostOptions, RawConfig, RunPolicy,
    RunSpec, WorkloadSpec,
};
pub use diff::{diff, has_changed, Change};
pub use image::ImageRef;
pub use validate::ConfigError;
