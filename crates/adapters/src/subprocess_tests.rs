// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

#[tokio::test]
#[serial]
async fn captures_output() {
    let output = run_with_timeout(sh("echo hello"), Duration::from_secs(5), "echo").await.unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
#[serial]
async fn times_out() {
    let err = run_with_timeout(sh("sleep 5"), Duration::from_millis(50), "sleep").await.unwrap_err();
    assert!(err.contains("sleep timed out"), "{}", err);
}

#[tokio::test]
#[serial]
async fn missing_binary_is_an_error() {
    let cmd = Command::new("/nonexistent/ct-submit");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "submit").await.unwrap_err();
    assert!(err.starts_with("submit failed to run"), "{}", err);
}

#[tokio::test]
#[serial]
async fn checked_reports_stderr() {
    let err = run_checked(sh("echo nope >&2; exit 3"), Duration::from_secs(5), "sbatch")
        .await
        .unwrap_err();
    assert_eq!(err, "sbatch failed: nope");
    let out = run_checked(sh("echo ' 42 '"), Duration::from_secs(5), "sbatch").await.unwrap();
    assert_eq!(out, "42");
}
