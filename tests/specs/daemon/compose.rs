// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compose workloads through the daemon lifecycle.

use crate::prelude::*;

#[tokio::test]
async fn compose_services_are_created_and_started() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &compose_toml(DIGEST, DIGEST));

    let engine = FakeEngine::with_image(DIGEST);
    let daemon = startup(&config, engine.clone()).await.unwrap();

    let mut services: Vec<String> =
        engine.containers().values().filter_map(|c| c.service.clone()).collect();
    services.sort();
    assert_eq!(services, vec!["web", "worker"]);
    wait_for(|| engine.containers().values().all(|c| c.running)).await;
    assert_eq!(daemon.reconciler.watch_count().await, 2);

    daemon.shutdown().await;
}

#[tokio::test]
async fn compose_digest_mismatch_is_rejected_before_engine_calls() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &compose_toml(DIGEST, OTHER_DIGEST));

    let engine = FakeEngine::new();
    let err = startup(&config, engine.clone()).await.err().unwrap();

    assert!(matches!(err, LifecycleError::Config(_)), "got {err}");
    assert!(err.to_string().contains("digest"), "got {err}");
    assert!(engine.calls().is_empty());
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn compose_mismatch_on_reload_keeps_running_services() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &compose_toml(DIGEST, DIGEST));

    let engine = FakeEngine::with_image(DIGEST);
    let daemon = startup(&config, engine.clone()).await.unwrap();
    assert_eq!(engine.containers().len(), 2);

    write_config(&config, &compose_toml(OTHER_DIGEST, DIGEST));
    daemon.reload().await;

    assert_eq!(engine.containers().len(), 2);
    assert_eq!(daemon.reconciler.applied().await.unwrap().image.digest, DIGEST);

    daemon.shutdown().await;
}
