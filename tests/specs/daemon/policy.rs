// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-once and download-only behavior through the daemon lifecycle.

use std::time::Duration;

use crate::prelude::*;

#[tokio::test]
async fn run_once_survives_restart() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &run_toml(DIGEST, "run_once = true"));

    let engine = FakeEngine::with_image(DIGEST);
    let daemon = startup(&config, engine.clone()).await.unwrap();
    wait_for(|| engine.start_calls() == 1).await;
    let store = RunHistoryStore::new(&config.data_dir);
    wait_for(|| store.has_run(DIGEST).unwrap()).await;
    daemon.shutdown().await;

    // A fresh engine after restart: the container exists but must stay down.
    let engine = FakeEngine::with_image(DIGEST);
    let daemon = startup(&config, engine.clone()).await.unwrap();
    assert_eq!(engine.containers().len(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.start_calls(), 0);
    assert!(daemon.reconciler.is_ready().await);

    daemon.shutdown().await;
}

#[tokio::test]
async fn restart_policy_keeps_workload_running() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &run_toml(DIGEST, ""));

    let engine = FakeEngine::with_image(DIGEST);
    let daemon = startup(&config, engine.clone()).await.unwrap();
    wait_for(|| engine.start_calls() == 1).await;

    let id = engine.containers().keys().next().cloned().unwrap();
    engine.exit(&id);
    wait_for(|| engine.start_calls() == 2).await;
    assert!(engine.container(&id).unwrap().running);

    daemon.shutdown().await;
}

#[tokio::test]
async fn download_only_fetches_image_and_stops() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &run_toml(DIGEST, "download_only = true"));

    let engine = FakeEngine::new();
    let daemon = startup(&config, engine.clone()).await.unwrap();

    assert!(engine.has_image(DIGEST));
    assert!(engine.containers().is_empty());
    assert!(!engine.calls().iter().any(|c| matches!(c, EngineCall::CreateWorkload { .. })));
    assert_eq!(read_status(&config)["ready"], true);

    daemon.shutdown().await;
}

#[tokio::test]
async fn digest_change_replaces_workload() {
    let dir = tempdir().unwrap();
    let config = daemon_config(dir.path());
    write_config(&config, &run_toml(DIGEST, ""));

    let engine = FakeEngine::with_image(DIGEST);
    let daemon = startup(&config, engine.clone()).await.unwrap();
    let old_id = engine.containers().keys().next().cloned().unwrap();

    write_config(&config, &run_toml(OTHER_DIGEST, ""));
    daemon.reload().await;

    let containers = engine.containers();
    assert_eq!(containers.len(), 1);
    assert!(!containers.contains_key(&old_id));
    assert!(containers.values().all(|c| c.digest == OTHER_DIGEST));

    daemon.shutdown().await;
}
