// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend that runs jobs on blocking threads of the orchestrator itself.

use crate::backend::{ensure_layout, Backend, BackendError, SubmitBatch, SubmitHandle};
use async_trait::async_trait;
use ct_core::JobStatus;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Runs one job to completion, writing its own log markers.
///
/// This is the in-process counterpart of the `run-job` entry point.
pub trait JobExecutor: Send + Sync + 'static {
    fn execute(&self, kind: &str, config_path: &Path) -> JobStatus;
}

pub struct InProcessBackend<E: JobExecutor> {
    executor: Arc<E>,
    slots: Arc<Semaphore>,
    max_jobs: usize,
    poll_interval: Duration,
}

impl<E: JobExecutor> InProcessBackend<E> {
    pub fn new(executor: Arc<E>, max_jobs: usize, poll_interval: Duration) -> Self {
        let max_jobs = max_jobs.max(1);
        Self { executor, slots: Arc::new(Semaphore::new(max_jobs)), max_jobs, poll_interval }
    }
}

#[async_trait]
impl<E: JobExecutor> Backend for InProcessBackend<E> {
    fn name(&self) -> &'static str {
        "in_process"
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn submit(&self, batch: SubmitBatch) -> Result<SubmitHandle, BackendError> {
        if batch.job_ids.is_empty() {
            return Err(BackendError::EmptyBatch(batch.task_name));
        }
        ensure_layout(&batch.layout)?;
        let handle = SubmitHandle::new(&batch);
        for &job_id in &batch.job_ids {
            let executor = Arc::clone(&self.executor);
            let slots = Arc::clone(&self.slots);
            let handle = handle.clone();
            let kind = batch.kind.clone();
            let config_path = batch.config_path(job_id);
            let task = batch.task_name.clone();
            tokio::spawn(async move {
                let _permit = slots.acquire_owned().await;
                let result =
                    tokio::task::spawn_blocking(move || executor.execute(&kind, &config_path))
                        .await;
                if let Err(e) = result {
                    tracing::error!(%task, job_id, error = %e, "in-process job panicked");
                }
                handle.mark_finished(job_id);
            });
        }
        tracing::debug!(
            task = %batch.task_name,
            n_jobs = batch.job_ids.len(),
            max_jobs = self.max_jobs,
            "submitted in-process jobs"
        );
        Ok(handle)
    }
}

#[cfg(test)]
#[path = "inprocess_tests.rs"]
mod tests;
