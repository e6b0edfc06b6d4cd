// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use moor_adapters::{EngineCall, FakeEngine};
use moor_core::test_support::{compose_config, run_config, OTHER_DIGEST, TEST_DIGEST, TEST_IMAGE};
use moor_core::{ComposeSpec, ConfigError, Credentials, DesiredConfig, RunSpec};
use tempfile::{tempdir, TempDir};

const POLL: Duration = Duration::from_millis(10);

struct Harness {
    engine: FakeEngine,
    store: RunHistoryStore,
    reconciler: Reconciler<FakeEngine>,
    _dir: TempDir,
}

fn harness(engine: FakeEngine) -> Harness {
    let dir = tempdir().unwrap();
    let store = RunHistoryStore::new(dir.path());
    let reconciler = Reconciler::new(
        engine.clone(),
        store.clone(),
        ReconcilerConfig { poll_interval: POLL },
    );
    Harness { engine, store, reconciler, _dir: dir }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

fn reference(digest: &str) -> String {
    format!("{TEST_IMAGE}@{digest}")
}

#[tokio::test]
async fn first_config_creates_and_starts_workload() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));

    let outcome = h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    assert_eq!(outcome, ConfigureOutcome::Reconciled(vec![Change::Initial]));
    assert_eq!(h.reconciler.phase().await, Phase::Steady);
    assert_eq!(h.reconciler.watch_count().await, 1);

    wait_for(|| h.engine.start_calls() == 1).await;
    wait_for(|| h.store.has_run(TEST_DIGEST).unwrap()).await;
    assert!(h.reconciler.is_ready().await);

    // Image already present: no pull.
    assert!(!h.engine.calls().iter().any(|c| matches!(c, EngineCall::PullImage { .. })));
}

#[tokio::test]
async fn missing_image_is_pulled_with_credentials() {
    let h = harness(FakeEngine::new());
    let config = run_config(TEST_DIGEST).credentials(Credentials::new("bot", "secret"));

    h.reconciler.configure(config).await.unwrap();

    let calls = h.engine.calls();
    assert_eq!(calls[0], EngineCall::ImageExists { digest: TEST_DIGEST.to_string() });
    assert_eq!(
        calls[1],
        EngineCall::PullImage { reference: reference(TEST_DIGEST), with_credentials: true }
    );
    assert_eq!(calls[2], EngineCall::CreateWorkload { reference: reference(TEST_DIGEST) });
    assert!(h.engine.has_image(TEST_DIGEST));
}

#[tokio::test]
async fn unchanged_config_touches_nothing() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    wait_for(|| h.engine.start_calls() == 1).await;
    h.engine.clear_calls();

    let outcome = h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    assert_eq!(outcome, ConfigureOutcome::Unchanged);
    assert!(h.engine.calls().is_empty());
    assert_eq!(h.reconciler.watch_count().await, 1);
}

#[tokio::test]
async fn digest_change_tears_down_before_recreating() {
    let engine = FakeEngine::with_image(TEST_DIGEST);
    let h = harness(engine);
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    let old_id = h.reconciler.status().await.workloads[0].container_id.clone();

    let outcome = h.reconciler.configure(run_config(OTHER_DIGEST)).await.unwrap();
    assert_eq!(outcome, ConfigureOutcome::Reconciled(vec![Change::Digest]));

    let calls = h.engine.calls();
    let stop = calls.iter().position(|c| *c == EngineCall::Stop { id: old_id.clone() }).unwrap();
    let remove =
        calls.iter().position(|c| *c == EngineCall::Remove { id: old_id.clone() }).unwrap();
    let create = calls
        .iter()
        .position(|c| *c == EngineCall::CreateWorkload { reference: reference(OTHER_DIGEST) })
        .unwrap();
    assert!(stop < remove && remove < create);

    assert!(h.engine.container(&old_id).is_none());
    assert_eq!(h.reconciler.watch_count().await, 1);
    let status = h.reconciler.status().await;
    assert_eq!(status.workloads.len(), 1);
    assert_eq!(status.workloads[0].digest, OTHER_DIGEST);
}

#[tokio::test]
async fn pull_failure_leaves_zero_workloads() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();

    h.engine.fail_pull(Some("registry unreachable"));
    let err = h.reconciler.configure(run_config(OTHER_DIGEST)).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ImageUnavailable { .. }));

    let status = h.reconciler.status().await;
    assert!(status.workloads.is_empty());
    assert_eq!(status.phase, Phase::Steady);
    assert!(status.last_error.unwrap().contains("registry unreachable"));
    assert_eq!(h.reconciler.watch_count().await, 0);
    assert!(h.engine.containers().is_empty());
    assert!(!h.reconciler.is_ready().await);

    // Same config again retries the pass.
    h.engine.fail_pull(None);
    let outcome = h.reconciler.configure(run_config(OTHER_DIGEST)).await.unwrap();
    assert_eq!(outcome, ConfigureOutcome::Reconciled(vec![Change::Initial]));
    assert_eq!(h.reconciler.status().await.workloads.len(), 1);
}

#[tokio::test]
async fn create_failure_is_reported() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.engine.fail_create(Some("name in use"));

    let err = h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Create(_)));
    assert!(h.reconciler.applied().await.is_none());
}

#[tokio::test]
async fn download_only_creates_nothing() {
    let h = harness(FakeEngine::new());

    h.reconciler.configure(run_config(TEST_DIGEST).download_only(true)).await.unwrap();

    assert!(h.engine.has_image(TEST_DIGEST));
    assert!(h.engine.containers().is_empty());
    assert_eq!(h.reconciler.watch_count().await, 0);
    assert!(h.reconciler.status().await.workloads.is_empty());
    assert!(h.reconciler.is_ready().await);
}

#[tokio::test]
async fn run_once_is_not_restarted_after_exit() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST).run_once(true)).await.unwrap();
    wait_for(|| h.engine.start_calls() == 1).await;
    wait_for(|| h.store.has_run(TEST_DIGEST).unwrap()).await;

    let id = h.reconciler.status().await.workloads[0].container_id.clone();
    h.engine.exit(&id);
    tokio::time::sleep(POLL * 10).await;

    assert_eq!(h.engine.start_calls(), 1);
    assert!(h.reconciler.is_ready().await);
}

#[tokio::test]
async fn exited_workload_is_restarted_without_run_once() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    wait_for(|| h.engine.start_calls() == 1).await;

    let id = h.reconciler.status().await.workloads[0].container_id.clone();
    h.engine.exit(&id);
    wait_for(|| h.engine.start_calls() == 2).await;
    assert_eq!(h.engine.container(&id).unwrap().starts, 2);
}

#[tokio::test]
async fn start_failure_retried_next_tick() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.engine.fail_start(Some("port in use"));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();

    wait_for(|| h.engine.start_calls() >= 2).await;
    assert!(!h.store.has_run(TEST_DIGEST).unwrap());

    h.engine.fail_start(None);
    wait_for(|| h.store.has_run(TEST_DIGEST).unwrap()).await;
}

#[tokio::test]
async fn compose_services_each_watched_and_recorded() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    let config = compose_config(TEST_DIGEST, &["web", "db"]).run_once(true);
    h.reconciler.configure(config).await.unwrap();

    assert_eq!(h.reconciler.watch_count().await, 2);
    wait_for(|| h.engine.start_calls() == 2).await;
    wait_for(|| {
        h.store.has_run(&format!("{TEST_DIGEST}/web")).unwrap()
            && h.store.has_run(&format!("{TEST_DIGEST}/db")).unwrap()
    })
    .await;
    assert!(!h.store.has_run(TEST_DIGEST).unwrap());
}

#[tokio::test]
async fn compose_without_digest_rejected_before_engine_calls() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    let mut config = compose_config(TEST_DIGEST, &["web"]);
    config.workload = WorkloadSpec::Compose(ComposeSpec::new(vec![
        "services:".into(),
        "  web:".into(),
        format!("    image: {TEST_IMAGE}:latest"),
    ]));

    let err = h.reconciler.configure(config).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Config(ConfigError::ComposeDigestMismatch(_))));
    assert!(h.engine.calls().is_empty());
    assert!(!h.reconciler.is_ready().await);
}

#[tokio::test]
async fn rejected_config_keeps_applied_workloads() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    h.engine.clear_calls();

    let invalid = DesiredConfig::run(TEST_IMAGE, "", moor_core::RunSpec::new());
    assert!(h.reconciler.configure(invalid).await.is_err());
    assert_eq!(h.reconciler.status().await.workloads.len(), 1);
    assert!(!h.engine.calls().iter().any(|c| matches!(c, EngineCall::Remove { .. })));

    // Re-applying the good config clears the error.
    let outcome = h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    assert_eq!(outcome, ConfigureOutcome::Unchanged);
    assert!(h.reconciler.status().await.last_error.is_none());
}

#[tokio::test]
async fn prune_removes_previous_image_on_digest_change() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();

    h.reconciler
        .configure(run_config(OTHER_DIGEST).prune_previous_image(true))
        .await
        .unwrap();

    assert!(h
        .engine
        .calls()
        .contains(&EngineCall::RemoveImage { reference: reference(TEST_DIGEST) }));
    assert!(!h.engine.has_image(TEST_DIGEST));
}

#[tokio::test]
async fn without_prune_previous_image_is_kept() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    h.reconciler.configure(run_config(OTHER_DIGEST)).await.unwrap();

    assert!(h.engine.has_image(TEST_DIGEST));
}

#[tokio::test]
async fn prune_skips_name_only_change() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    h.engine.clear_calls();

    let renamed = DesiredConfig::run("registry.example.com/moor/worker", TEST_DIGEST, RunSpec::new())
        .prune_previous_image(true);
    let outcome = h.reconciler.configure(renamed).await.unwrap();

    assert_eq!(outcome, ConfigureOutcome::Reconciled(vec![Change::ImageName]));
    let calls = h.engine.calls();
    assert!(!calls.iter().any(|c| matches!(c, EngineCall::RemoveImage { .. })), "{calls:?}");
    assert!(!calls.iter().any(|c| matches!(c, EngineCall::PullImage { .. })), "{calls:?}");
    assert!(h.engine.has_image(TEST_DIGEST));
}

#[tokio::test]
async fn teardown_failures_do_not_block_the_new_set() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    wait_for(|| h.engine.start_calls() == 1).await;
    let old_id = h.reconciler.status().await.workloads[0].container_id.clone();

    h.engine.fail_stop(Some("daemon busy"));
    h.engine.fail_remove(Some("daemon busy"));
    let outcome = h.reconciler.configure(run_config(OTHER_DIGEST)).await.unwrap();
    assert!(matches!(outcome, ConfigureOutcome::Reconciled(_)));

    let calls = h.engine.calls();
    assert!(calls.contains(&EngineCall::Stop { id: old_id.clone() }));
    assert!(calls.contains(&EngineCall::Remove { id: old_id.clone() }));

    let status = h.reconciler.status().await;
    assert_eq!(status.workloads.len(), 1);
    assert_eq!(status.workloads[0].digest, OTHER_DIGEST);
    assert!(status.last_error.is_none());
    assert_eq!(h.reconciler.watch_count().await, 1);

    let new_id = status.workloads[0].container_id.clone();
    wait_for(|| h.engine.container(&new_id).is_some_and(|c| c.running)).await;

    // The old container is no longer watched.
    tokio::time::sleep(POLL * 5).await;
    assert_eq!(h.engine.container(&old_id).unwrap().starts, 1);
    assert_eq!(h.engine.start_calls(), 2);

    h.engine.fail_stop(None);
    h.engine.fail_remove(None);
    h.reconciler.close().await;
}

#[tokio::test]
async fn close_stops_but_keeps_workloads() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    wait_for(|| h.engine.start_calls() == 1).await;
    let id = h.reconciler.status().await.workloads[0].container_id.clone();

    h.reconciler.close().await;

    assert_eq!(h.reconciler.phase().await, Phase::Closed);
    assert!(h.reconciler.shutdown_token().is_cancelled());
    assert_eq!(h.reconciler.watch_count().await, 0);
    let container = h.engine.container(&id).unwrap();
    assert!(!container.running);

    // Idempotent, and no restart once closed.
    h.reconciler.close().await;
    tokio::time::sleep(POLL * 5).await;
    assert_eq!(h.engine.start_calls(), 1);
    assert!(matches!(
        h.reconciler.configure(run_config(OTHER_DIGEST)).await,
        Err(ReconcileError::Closed)
    ));
}

#[tokio::test]
async fn close_without_config_only_signals() {
    let h = harness(FakeEngine::new());
    h.reconciler.close().await;
    assert_eq!(h.reconciler.phase().await, Phase::Closed);
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn status_reports_workload_identity() {
    let h = harness(FakeEngine::with_image(TEST_DIGEST));
    assert_eq!(h.reconciler.status().await.phase, Phase::Uninitialized);

    h.reconciler.configure(run_config(TEST_DIGEST)).await.unwrap();
    wait_for(|| h.engine.start_calls() == 1).await;

    let status = h.reconciler.status().await;
    assert_eq!(status.image, Some(reference(TEST_DIGEST)));
    let workload = &status.workloads[0];
    assert_eq!(workload.digest, TEST_DIGEST);
    assert_eq!(workload.history_key, TEST_DIGEST);
    assert!(workload.image_id.is_some());
    assert!(workload.running);
}
