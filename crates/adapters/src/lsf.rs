// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LSF backend: one `bsub` submission per job.

use crate::backend::{ensure_layout, Backend, BackendError, SubmitBatch, SubmitHandle};
use crate::cluster::{path_arg, shell_quote, submit_command, write_script, ClusterConfig};
use crate::subprocess::run_checked;
use async_trait::async_trait;
use ct_core::JobId;
use std::time::Duration;

const BSUB: &str = "bsub";

pub struct LsfBackend {
    config: ClusterConfig,
}

impl LsfBackend {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }
}

pub fn job_script(batch: &SubmitBatch, config: &ClusterConfig, job_id: JobId) -> String {
    format!(
        "#!/bin/bash\nexec {} run-job {} {}\n",
        path_arg(&config.executable),
        shell_quote(&batch.kind),
        path_arg(&batch.config_path(job_id))
    )
}

/// `bsub` arguments for one job, ending with the script to run.
pub fn bsub_args(batch: &SubmitBatch, config: &ClusterConfig, job_id: JobId) -> Vec<String> {
    let task = &batch.task_name;
    let resources = &batch.resources;
    let mut args = vec![
        "-J".to_string(),
        format!("{}_{}", task, job_id),
        "-n".to_string(),
        resources.threads.to_string(),
        "-M".to_string(),
        resources.mem_limit_mb().to_string(),
        "-W".to_string(),
        resources.time_limit_min.to_string(),
        "-o".to_string(),
        batch.layout.stdout_path(task, job_id).display().to_string(),
        "-e".to_string(),
        batch.layout.stderr_path(task, job_id).display().to_string(),
    ];
    if let Some(queue) = &config.partition {
        args.push("-q".to_string());
        args.push(queue.clone());
    }
    args.push("/bin/bash".to_string());
    args.push(batch.layout.job_script_path(task, job_id).display().to_string());
    args
}

/// Job id from `Job <123> is submitted to queue <normal>.`
pub fn parse_bsub_output(stdout: &str) -> Option<String> {
    let start = stdout.find("Job <")? + "Job <".len();
    let len = stdout[start..].find('>')?;
    let id = &stdout[start..start + len];
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
}

#[async_trait]
impl Backend for LsfBackend {
    fn name(&self) -> &'static str {
        "lsf"
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    async fn submit(&self, batch: SubmitBatch) -> Result<SubmitHandle, BackendError> {
        if batch.job_ids.is_empty() {
            return Err(BackendError::EmptyBatch(batch.task_name));
        }
        ensure_layout(&batch.layout)?;
        let submit_err = |message: String| BackendError::Submit {
            backend: "lsf",
            task: batch.task_name.clone(),
            message,
        };
        let mut external_ids = Vec::with_capacity(batch.job_ids.len());
        for &job_id in &batch.job_ids {
            let script_path = batch.layout.job_script_path(&batch.task_name, job_id);
            write_script(&script_path, &job_script(&batch, &self.config, job_id))?;
            let mut cmd = submit_command(&self.config, BSUB);
            cmd.args(bsub_args(&batch, &self.config, job_id));
            let stdout =
                run_checked(cmd, self.config.submit_timeout, BSUB).await.map_err(submit_err)?;
            let lsf_id = parse_bsub_output(&stdout)
                .ok_or_else(|| submit_err(format!("unexpected bsub output: {}", stdout)))?;
            tracing::debug!(task = %batch.task_name, job_id, lsf_id = %lsf_id, "submitted lsf job");
            external_ids.push(lsf_id);
        }
        tracing::info!(task = %batch.task_name, n_jobs = batch.job_ids.len(), "submitted lsf jobs");
        Ok(SubmitHandle::new(&batch).with_external_ids(external_ids))
    }
}

#[cfg(test)]
#[path = "lsf_tests.rs"]
mod tests;
