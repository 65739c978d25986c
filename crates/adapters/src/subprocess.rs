// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess helpers shared by the cluster backends.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for `sbatch` / `bsub` submissions.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Run a command to completion, killing it if it exceeds `timeout`.
///
/// `description` names the command in error messages.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(format!("{} failed to run: {}", description, e)),
        Err(_) => Err(format!("{} timed out after {}s", description, timeout.as_secs())),
    }
}

/// Run a command and return its trimmed stdout, failing on non-zero exit.
pub async fn run_checked(
    cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<String, String> {
    let output = run_with_timeout(cmd, timeout, description).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} failed: {}", description, stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
