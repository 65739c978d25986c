// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entry point shared by `ct run-job` and the in-process backend.

use crate::error::{JobError, RegistryError};
use crate::registry::{JobContext, JobRegistry};
use ct_adapters::JobExecutor;
use ct_core::{JobConfig, JobStatus};
use ct_storage::{JobLogger, LogLayout, StoreProvider};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Config key naming the store a job opens.
pub const STORE_PATH_KEY: &str = "store_path";

/// Run one job to completion and leave its terminal marker.
///
/// The marker is the last thing written: `success` only after the job body
/// returned, `failed: <reason>` on any error. Only a config path that does not
/// identify a job fails without a marker.
pub fn run_job(
    registry: &JobRegistry,
    provider: &dyn StoreProvider,
    kind: &str,
    config_path: &Path,
) -> Result<JobStatus, RegistryError> {
    let (layout, task, job_id) = LogLayout::from_config_path(config_path)
        .ok_or_else(|| RegistryError::BadConfigPath(config_path.to_path_buf()))?;
    let logger = JobLogger::new(&layout, &task, job_id);
    logger.started();

    let start = Instant::now();
    match execute(registry, provider, kind, config_path, &task, &logger, job_id) {
        Ok(()) => {
            tracing::info!(
                %task,
                job_id,
                kind,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "job succeeded"
            );
            logger.success();
            Ok(JobStatus::Success)
        }
        Err(e) => {
            tracing::error!(%task, job_id, kind, error = %e, "job failed");
            logger.failure(&e.to_string());
            Ok(JobStatus::Failed)
        }
    }
}

fn execute(
    registry: &JobRegistry,
    provider: &dyn StoreProvider,
    kind: &str,
    config_path: &Path,
    task: &str,
    logger: &JobLogger,
    job_id: u32,
) -> Result<(), JobError> {
    let job = registry.get(kind)?;
    let config = JobConfig::read(config_path)?;
    logger.append(&format!("config {}", config_path.display()));
    let store = provider.open(config.str(STORE_PATH_KEY)?)?;
    let ctx = JobContext { task_name: task, job_id, config: &config, store: store.as_ref(), logger };
    job(&ctx)
}

/// Runs jobs inside the orchestrator for [`ct_adapters::InProcessBackend`].
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    provider: Arc<dyn StoreProvider>,
}

impl JobRunner {
    pub fn new(registry: Arc<JobRegistry>, provider: Arc<dyn StoreProvider>) -> Self {
        Self { registry, provider }
    }
}

impl JobExecutor for JobRunner {
    fn execute(&self, kind: &str, config_path: &Path) -> JobStatus {
        match run_job(&self.registry, self.provider.as_ref(), kind, config_path) {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(kind, error = %e, "cannot run job");
                JobStatus::Failed
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
