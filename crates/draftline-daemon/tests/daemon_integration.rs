//! Integration tests for the daemon as a whole.
//!
//! These start a real daemon (watcher, scheduler, control channel) over a
//! temp directory, with a mock runner standing in for git.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use draftline_core::Config;
use draftline_daemon::{ClientError, ControlClient, Daemon, Mode};
use draftline_vcs::mock::MockRunner;
use draftline_vcs::{Pipeline, VcsOp};
use tempfile::TempDir;

fn config() -> Config {
    Config {
        control_port: 0,
        ..Config::default()
    }
}

async fn start(runner: &MockRunner) -> (TempDir, Daemon) {
    let dir = TempDir::new().expect("failed to create temp dir");
    fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
    let daemon = Daemon::start_with_runner(dir.path(), config(), Arc::new(runner.clone()))
        .await
        .expect("daemon failed to start");
    (dir, daemon)
}

#[tokio::test]
async fn toggle_round_trip_over_control_channel() {
    let runner = MockRunner::new();
    let (_dir, daemon) = start(&runner).await;
    let client = ControlClient::new(daemon.control_addr());
    let handle = tokio::spawn(daemon.run());

    let status = client.status().await.unwrap();
    assert_eq!(status.mode, Mode::Stable);
    assert!(!status.draft_branch_exists);

    let status = client.toggle().await.unwrap();
    assert_eq!(status.mode, Mode::Draft);
    assert_eq!(status.branch, "draft");

    let mut expected = Pipeline::create_draft_branch("draft", "main", "origin").ops;
    expected.extend(Pipeline::checkout("draft").ops);
    expected.extend(Pipeline::refresh_draft().ops);
    assert_eq!(runner.operations(), expected);

    let status = client.toggle().await.unwrap();
    assert_eq!(status.mode, Mode::Stable);
    assert_eq!(runner.operations().last(), Some(&VcsOp::checkout("main")));

    client.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop")
        .unwrap();
}

#[tokio::test]
async fn edits_mark_tree_dirty() {
    let runner = MockRunner::new();
    let (dir, daemon) = start(&runner).await;
    let client = ControlClient::new(daemon.control_addr());
    let shutdown = daemon.shutdown_token();
    let handle = tokio::spawn(daemon.run());

    assert!(!client.status().await.unwrap().dirty);

    fs::write(dir.path().join("notes.md"), "new idea").unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut dirty = false;
    while !dirty && Instant::now() < deadline {
        dirty = client.status().await.unwrap().dirty;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(dirty, "watcher never raised the dirty flag");
    assert!(runner.operations().is_empty());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop")
        .unwrap();
}

#[tokio::test]
async fn stopped_daemon_refuses_connections() {
    let runner = MockRunner::new();
    let (_dir, daemon) = start(&runner).await;
    let client = ControlClient::new(daemon.control_addr());
    let shutdown = daemon.shutdown_token();
    let handle = tokio::spawn(daemon.run());

    shutdown.cancel();
    handle.await.unwrap();

    let err = client.status().await.unwrap_err();
    assert!(matches!(err, ClientError::Connect { .. }));
}
