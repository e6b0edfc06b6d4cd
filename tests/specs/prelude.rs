// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the specs.

use std::path::Path;
use std::time::Duration;

pub use moor_adapters::{EngineCall, FakeEngine};
pub use moor_daemon::{startup, Config, LifecycleError};
pub use moor_storage::RunHistoryStore;
pub use tempfile::tempdir;

pub const IMAGE: &str = "ghcr.io/moor/worker";
pub const DIGEST: &str = "sha256:218bb51abbd1864df8be26166f847547b3851a89999ca7bfceb85ca9b5d2e95d";
pub const OTHER_DIGEST: &str =
    "sha256:9ce6ef0f9bd5e4e1a3b0f1d7b6f1c2a2c58c1c1f6d4b3e8a7f0e9d8c7b6a5f4e";

/// A run-mode config for [`IMAGE`] at `digest` plus any extra top-level keys.
pub fn run_toml(digest: &str, extra: &str) -> String {
    format!(
        "image_name = \"{IMAGE}\"\nrepo_digest = \"{digest}\"\n{extra}\n\n[run_options]\nenv = [\"MODE=spec\"]\n"
    )
}

/// A compose-mode config whose services reference `service_digest`.
pub fn compose_toml(digest: &str, service_digest: &str) -> String {
    format!(
        r#"image_name = "{IMAGE}"
repo_digest = "{digest}"

[compose_options]
compose_file = [
  "services:",
  "  web:",
  "    image: {IMAGE}@{service_digest}",
  "    ports: ['8080:80']",
  "  worker:",
  "    image: {IMAGE}@{service_digest}",
]
"#
    )
}

/// Daemon config rooted at `dir` with fast polling.
pub fn daemon_config(dir: &Path) -> Config {
    let mut config = Config::for_state_dir(dir.to_path_buf());
    config.poll_interval = Duration::from_millis(10);
    config.status_interval = Duration::from_millis(50);
    config
}

pub fn write_config(config: &Config, content: &str) {
    std::fs::write(&config.config_path, content).unwrap();
}

pub fn read_status(config: &Config) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(&config.status_path).unwrap()).unwrap()
}

/// Poll `condition` every 5ms for up to 2.5s.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
