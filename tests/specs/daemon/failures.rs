// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure handling: the daemon stays up and reports, never half-applies.

use crate::prelude::*;

#[tokio::test]
async fn pull_failure_leaves_no_workloads() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &run_toml(DIGEST, ""));

    let engine = FakeEngine::new();
    engine.fail_pull(Some("manifest unknown"));
    let daemon = startup(&config, engine.clone()).await.unwrap();

    assert!(engine.containers().is_empty());
    assert_eq!(daemon.reconciler.watch_count().await, 0);
    let status = read_status(&config);
    assert_eq!(status["ready"], false);
    assert!(status["last_error"].as_str().unwrap().contains("manifest unknown"));

    // Same config again once the registry recovers.
    engine.fail_pull(None);
    daemon.reload().await;
    assert_eq!(engine.containers().len(), 1);
    wait_for(|| engine.start_calls() == 1).await;

    daemon.shutdown().await;
}

#[tokio::test]
async fn pull_failure_on_update_tears_down_previous_workload() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &run_toml(DIGEST, ""));

    let engine = FakeEngine::with_image(DIGEST);
    let daemon = startup(&config, engine.clone()).await.unwrap();
    assert_eq!(engine.containers().len(), 1);

    engine.fail_pull(Some("denied"));
    write_config(&config, &run_toml(OTHER_DIGEST, ""));
    daemon.reload().await;

    assert!(engine.containers().is_empty());
    assert_eq!(daemon.reconciler.watch_count().await, 0);

    daemon.shutdown().await;
}

#[tokio::test]
async fn start_failures_are_retried_on_the_next_poll() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &run_toml(DIGEST, ""));

    let engine = FakeEngine::with_image(DIGEST);
    engine.fail_start(Some("port in use"));
    let daemon = startup(&config, engine.clone()).await.unwrap();
    wait_for(|| engine.start_calls() >= 2).await;

    engine.fail_start(None);
    let id = engine.containers().keys().next().cloned().unwrap();
    wait_for(|| engine.container(&id).is_some_and(|c| c.running)).await;

    daemon.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_but_keeps_containers() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &run_toml(DIGEST, ""));

    let engine = FakeEngine::with_image(DIGEST);
    let daemon = startup(&config, engine.clone()).await.unwrap();
    let id = engine.containers().keys().next().cloned().unwrap();
    wait_for(|| engine.container(&id).is_some_and(|c| c.running)).await;

    daemon.shutdown().await;

    let container = engine.container(&id).unwrap();
    assert!(!container.running);
    assert!(!config.lock_path.exists());
    assert_eq!(read_status(&config)["phase"], "closed");
}
