// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `moord --check` validates a config file without touching the engine.

use assert_cmd::Command;

use crate::prelude::*;

fn moord(state_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("moord").unwrap();
    cmd.env("MOOR_STATE_DIR", state_dir).env_remove("MOOR_CONFIG");
    cmd
}

#[test]
fn check_accepts_valid_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, run_toml(DIGEST, "run_once = true")).unwrap();

    moord(dir.path()).arg("--check").arg("--config").arg(&path).assert().success().stdout("ok\n");
}

#[test]
fn check_uses_state_dir_default() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), run_toml(DIGEST, "")).unwrap();

    moord(dir.path()).arg("--check").assert().success();
}

#[test]
fn check_rejects_compose_digest_mismatch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, compose_toml(DIGEST, OTHER_DIGEST)).unwrap();

    let output = moord(dir.path()).arg("--check").arg("--config").arg(&path).assert().code(2);
    let stderr = String::from_utf8_lossy(&output.get_output().stderr).to_string();
    assert!(stderr.contains("digest"), "stderr: {stderr}");
}

#[test]
fn check_reports_missing_file() {
    let dir = tempdir().unwrap();

    moord(dir.path())
        .arg("--check")
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(2);
}
