// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slurm backend: one `sbatch` array submission per task.

use crate::backend::{ensure_layout, Backend, BackendError, SubmitBatch, SubmitHandle};
use crate::cluster::{path_arg, shell_quote, submit_command, write_script, ClusterConfig};
use crate::subprocess::run_checked;
use async_trait::async_trait;
use ct_core::JobId;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

const SBATCH: &str = "sbatch";

pub struct SlurmBackend {
    config: ClusterConfig,
}

impl SlurmBackend {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }
}

/// Compact `--array` specification, e.g. `[0, 1, 2, 5, 7, 8]` → `0-2,5,7-8`.
pub fn array_spec(job_ids: &[JobId]) -> String {
    let mut ids = job_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    let mut parts = Vec::new();
    let mut iter = ids.into_iter().peekable();
    while let Some(first) = iter.next() {
        let mut last = first;
        while iter.peek() == Some(&(last + 1)) {
            last += 1;
            iter.next();
        }
        if first == last {
            parts.push(first.to_string());
        } else {
            parts.push(format!("{}-{}", first, last));
        }
    }
    parts.join(",")
}

/// Array job script; each array element selects its config by
/// `$SLURM_ARRAY_TASK_ID`. Log paths go on the `sbatch` command line, see
/// [`sbatch_args`].
pub fn array_script(batch: &SubmitBatch, config: &ClusterConfig) -> String {
    let task = &batch.task_name;
    let mut script = String::from("#!/bin/bash\n");
    let _ = writeln!(script, "#SBATCH --job-name={}", task);
    let _ = writeln!(script, "#SBATCH --array={}", array_spec(&batch.job_ids));
    let _ = writeln!(script, "#SBATCH --cpus-per-task={}", batch.resources.threads);
    let _ = writeln!(script, "#SBATCH --mem={}M", batch.resources.mem_limit_mb());
    let _ = writeln!(script, "#SBATCH --time={}", batch.resources.time_limit_min);
    if let Some(partition) = &config.partition {
        let _ = writeln!(script, "#SBATCH --partition={}", partition);
    }
    script.push('\n');
    let config_prefix = batch.layout.config_dir().join(format!("{}_job_", task));
    let _ = writeln!(
        script,
        "exec {} run-job {} {}${{SLURM_ARRAY_TASK_ID}}.config",
        path_arg(&config.executable),
        shell_quote(&batch.kind),
        path_arg(&config_prefix),
    );
    script
}

/// `sbatch` arguments for one array submission, ending with the script.
///
/// `#SBATCH` lines are not shell-parsed, so the log paths travel as argv.
pub fn sbatch_args(batch: &SubmitBatch, script_path: &Path) -> Vec<String> {
    let logs = batch.layout.logs_dir();
    let task = &batch.task_name;
    vec![
        "--parsable".to_string(),
        format!("--output={}", logs.join(format!("{}_%a.out", task)).display()),
        format!("--error={}", logs.join(format!("{}_%a.err", task)).display()),
        script_path.display().to_string(),
    ]
}

/// Job id from `sbatch --parsable` output (`<id>` or `<id>;<cluster>`).
pub fn parse_sbatch_output(stdout: &str) -> Option<String> {
    let id = stdout.lines().last()?.split(';').next()?.trim();
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
}

#[async_trait]
impl Backend for SlurmBackend {
    fn name(&self) -> &'static str {
        "slurm"
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    async fn submit(&self, batch: SubmitBatch) -> Result<SubmitHandle, BackendError> {
        if batch.job_ids.is_empty() {
            return Err(BackendError::EmptyBatch(batch.task_name));
        }
        ensure_layout(&batch.layout)?;
        let script_path = batch.layout.array_script_path(&batch.task_name);
        write_script(&script_path, &array_script(&batch, &self.config))?;

        let mut cmd = submit_command(&self.config, SBATCH);
        cmd.args(sbatch_args(&batch, &script_path));
        let submit_err = |message: String| BackendError::Submit {
            backend: "slurm",
            task: batch.task_name.clone(),
            message,
        };
        let stdout = run_checked(cmd, self.config.submit_timeout, SBATCH).await.map_err(submit_err)?;
        let slurm_id = parse_sbatch_output(&stdout)
            .ok_or_else(|| submit_err(format!("unexpected sbatch output: {}", stdout)))?;

        tracing::info!(
            task = %batch.task_name,
            n_jobs = batch.job_ids.len(),
            slurm_id = %slurm_id,
            "submitted slurm array"
        );
        Ok(SubmitHandle::new(&batch).with_external_ids(vec![slurm_id]))
    }
}

#[cfg(test)]
#[path = "slurm_tests.rs"]
mod tests;
