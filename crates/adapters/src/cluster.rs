// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings and script helpers shared by the batch-scheduler backends.

use crate::backend::BackendError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Binary invoked on the compute node as `<executable> run-job ...`.
    pub executable: PathBuf,
    /// Slurm partition or LSF queue.
    pub partition: Option<String>,
    pub poll_interval: Duration,
    pub submit_timeout: Duration,
    /// Replaces `sbatch` / `bsub` (e.g. a site wrapper).
    pub submit_program: Option<PathBuf>,
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value.chars().all(|c| c.is_ascii_alphanumeric() || "-_./=:,+".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub(crate) fn path_arg(path: &Path) -> String {
    shell_quote(&path.display().to_string())
}

/// The scheduler's submit command, honouring [`ClusterConfig::submit_program`].
pub(crate) fn submit_command(config: &ClusterConfig, default_program: &str) -> Command {
    match &config.submit_program {
        Some(program) => Command::new(program),
        None => Command::new(default_program),
    }
}

/// Write a submission script and make it executable.
pub(crate) fn write_script(path: &Path, content: &str) -> Result<(), BackendError> {
    let io_err = |source| BackendError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, content).map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(io_err)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod tests;
