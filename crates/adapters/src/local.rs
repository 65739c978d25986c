// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local worker-process pool.

use crate::backend::{ensure_layout, Backend, BackendError, SubmitBatch, SubmitHandle};
use async_trait::async_trait;
use ct_core::JobId;
use ct_storage::JobLogger;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Binary invoked as `<executable> run-job <kind> <config_path>`.
    pub executable: PathBuf,
    /// Maximum number of concurrently running jobs.
    pub max_jobs: usize,
    pub poll_interval: Duration,
}

/// Runs each job as a child process on this machine, at most `max_jobs` at a
/// time.
///
/// Process exit is recorded on the handle: a job whose process exited without
/// a terminal marker is reported as failed.
pub struct LocalBackend {
    config: LocalConfig,
    slots: Arc<Semaphore>,
}

impl LocalBackend {
    pub fn new(config: LocalConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_jobs.max(1)));
        Self { config, slots }
    }

    fn command(&self, batch: &SubmitBatch, job_id: JobId) -> Result<Command, BackendError> {
        let open = |path: PathBuf| {
            File::create(&path).map_err(|source| BackendError::Io { path, source })
        };
        let stdout = open(batch.layout.stdout_path(&batch.task_name, job_id))?;
        let stderr = open(batch.layout.stderr_path(&batch.task_name, job_id))?;
        let mut cmd = Command::new(&self.config.executable);
        cmd.arg("run-job")
            .arg(&batch.kind)
            .arg(batch.config_path(job_id))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        Ok(cmd)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    async fn submit(&self, batch: SubmitBatch) -> Result<SubmitHandle, BackendError> {
        if batch.job_ids.is_empty() {
            return Err(BackendError::EmptyBatch(batch.task_name));
        }
        ensure_layout(&batch.layout)?;
        let handle = SubmitHandle::new(&batch);
        for &job_id in &batch.job_ids {
            let mut cmd = self.command(&batch, job_id)?;
            let slots = Arc::clone(&self.slots);
            let handle = handle.clone();
            let logger = JobLogger::new(&batch.layout, &batch.task_name, job_id);
            let task = batch.task_name.clone();
            tokio::spawn(async move {
                let _permit = slots.acquire_owned().await;
                match cmd.status().await {
                    Ok(status) => {
                        tracing::debug!(%task, job_id, code = ?status.code(), "job process exited");
                    }
                    Err(e) => {
                        tracing::error!(%task, job_id, error = %e, "failed to spawn job process");
                        logger.failure(&format!("failed to spawn job process: {}", e));
                    }
                }
                handle.mark_finished(job_id);
            });
        }
        tracing::info!(
            task = %batch.task_name,
            n_jobs = batch.job_ids.len(),
            max_jobs = self.config.max_jobs,
            "submitted local jobs"
        );
        Ok(handle)
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
