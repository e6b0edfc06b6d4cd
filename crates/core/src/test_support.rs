// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::config::{DesiredConfig, RunSpec};

pub const TEST_IMAGE: &str = "ghcr.io/moor/worker";
pub const TEST_DIGEST: &str =
    "sha256:218bb51abbd1864df8be26166f847547b3851a89999ca7bfceb85ca9b5d2e95d";
pub const OTHER_DIGEST: &str =
    "sha256:9ce6ef0f9bd5e4e1a3b0f1d7b6f1c2a2c58c1c1f6d4b3e8a7f0e9d8c7b6a5f4e";

/// A minimal valid run config for [`TEST_IMAGE`] at `digest`.
pub fn run_config(digest: &str) -> DesiredConfig {
    DesiredConfig::run(TEST_IMAGE, digest, RunSpec::new())
}

/// A valid compose config with one service per name, all pinned to `digest`.
pub fn compose_config(digest: &str, services: &[&str]) -> DesiredConfig {
    DesiredConfig::compose(TEST_IMAGE, digest, compose_lines(digest, services))
}

pub fn compose_lines(digest: &str, services: &[&str]) -> Vec<String> {
    let mut lines = vec!["services:".to_string()];
    for service in services {
        lines.push(format!("  {service}:"));
        lines.push(format!("    image: {TEST_IMAGE}@{digest}"));
    }
    lines
}

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for desired-state types.
pub mod strategies {
    use crate::config::{Credentials, DesiredConfig, EngineOptions, HostOptions, RunSpec};
    use proptest::prelude::*;

    pub fn arb_digest() -> impl Strategy<Value = String> {
        "[0-9a-f]{12}".prop_map(|hex| format!("sha256:{hex}"))
    }

    pub fn arb_host_options() -> impl Strategy<Value = HostOptions> {
        (
            proptest::collection::vec("/[a-z]{1,8}:/[a-z]{1,8}", 0..3),
            proptest::option::of("[a-z]{1,8}"),
            any::<Option<bool>>(),
        )
            .prop_map(|(binds, network_mode, auto_remove)| HostOptions {
                binds,
                network_mode,
                auto_remove,
            })
    }

    pub fn arb_engine_options() -> impl Strategy<Value = EngineOptions> {
        proptest::collection::btree_map(
            "[a-z]{1,8}",
            prop_oneof![
                any::<bool>().prop_map(serde_json::Value::from),
                any::<i32>().prop_map(serde_json::Value::from),
                "[a-z0-9]{0,8}".prop_map(serde_json::Value::from),
            ],
            0..4,
        )
    }

    pub fn arb_run_spec() -> impl Strategy<Value = RunSpec> {
        (
            proptest::collection::vec("[A-Z]{1,6}=[a-z0-9]{0,6}", 0..4),
            proptest::collection::vec("[a-z-]{1,8}", 0..3),
            arb_engine_options(),
            arb_host_options(),
        )
            .prop_map(|(env, args, options, host)| {
                RunSpec::new().env(env).entrypoint_args(args).options(options).host_options(host)
            })
    }

    pub fn arb_credentials() -> impl Strategy<Value = Option<Credentials>> {
        proptest::option::of(
            ("[a-z]{1,8}", "[a-zA-Z0-9]{1,12}").prop_map(|(u, p)| Credentials::new(u, p)),
        )
    }

    pub fn arb_run_config() -> impl Strategy<Value = DesiredConfig> {
        (
            "[a-z]{1,8}(/[a-z]{1,8})?",
            arb_digest(),
            arb_run_spec(),
            any::<(bool, bool, bool)>(),
            arb_credentials(),
        )
            .prop_map(|(name, digest, spec, (run_once, download_only, prune), creds)| {
                let mut config = DesiredConfig::run(name, digest, spec)
                    .run_once(run_once)
                    .download_only(download_only)
                    .prune_previous_image(prune);
                config.credentials = creds;
                config
            })
    }

    pub fn arb_compose_config() -> impl Strategy<Value = DesiredConfig> {
        (arb_digest(), proptest::collection::vec("[a-z]{1,8}", 1..4), any::<bool>()).prop_map(
            |(digest, services, run_once)| {
                let names: Vec<&str> = services.iter().map(String::as_str).collect();
                super::compose_config(&digest, &names).run_once(run_once)
            },
        )
    }

    pub fn arb_config() -> impl Strategy<Value = DesiredConfig> {
        prop_oneof![arb_run_config(), arb_compose_config()]
    }
}
