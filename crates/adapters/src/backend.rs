// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution backend interface.
//!
//! A backend receives a batch of already-written job configs, launches one
//! worker per job, and reports per-job status. Completion is observed through
//! the job log files in the tmp folder, which every backend shares. Backends
//! that own their workers (local processes, in-process threads) additionally
//! record when a worker finished, so a worker that died without writing a
//! terminal marker is reported as failed instead of pending forever.

use async_trait::async_trait;
use ct_core::{JobId, JobStatus, Resources};
use ct_storage::{read_status, LogLayout};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to prepare {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{backend} submission of {task} failed: {message}")]
    Submit { backend: &'static str, task: String, message: String },
    #[error("batch for {0} has no jobs")]
    EmptyBatch(String),
}

/// Everything a backend needs to launch the jobs of one task.
#[derive(Debug, Clone)]
pub struct SubmitBatch {
    pub task_name: String,
    /// Job kind passed to `run-job`.
    pub kind: String,
    pub job_ids: Vec<JobId>,
    pub resources: Resources,
    pub layout: LogLayout,
}

impl SubmitBatch {
    pub fn config_path(&self, job_id: JobId) -> PathBuf {
        self.layout.config_path(&self.task_name, job_id)
    }

    pub fn config_paths(&self) -> Vec<PathBuf> {
        self.job_ids.iter().map(|id| self.config_path(*id)).collect()
    }
}

/// Handle to a submitted batch.
///
/// Cloning shares the record of finished workers.
#[derive(Debug, Clone)]
pub struct SubmitHandle {
    pub task_name: String,
    pub job_ids: Vec<JobId>,
    pub layout: LogLayout,
    /// Identifiers assigned by a cluster scheduler, if any.
    pub external_ids: Vec<String>,
    finished: Arc<Mutex<BTreeSet<JobId>>>,
}

impl SubmitHandle {
    pub fn new(batch: &SubmitBatch) -> Self {
        Self {
            task_name: batch.task_name.clone(),
            job_ids: batch.job_ids.clone(),
            layout: batch.layout.clone(),
            external_ids: Vec::new(),
            finished: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn with_external_ids(mut self, ids: Vec<String>) -> Self {
        self.external_ids = ids;
        self
    }

    /// Record that the worker of `job_id` is gone.
    pub fn mark_finished(&self, job_id: JobId) {
        self.finished.lock().insert(job_id);
    }

    pub fn log_path(&self, job_id: JobId) -> PathBuf {
        self.layout.job_log_path(&self.task_name, job_id)
    }

    /// Current status of every job, from markers and finished workers.
    pub fn statuses(&self) -> BTreeMap<JobId, JobStatus> {
        let finished = self.finished.lock();
        self.job_ids
            .iter()
            .map(|&id| {
                let status = read_status(&self.log_path(id));
                let status = if !status.is_terminal() && finished.contains(&id) {
                    JobStatus::Failed
                } else {
                    status
                };
                (id, status)
            })
            .collect()
    }
}

/// Result of waiting on a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every job reached a terminal status.
    Completed(BTreeMap<JobId, JobStatus>),
    /// The timeout elapsed first; statuses as last observed.
    TimedOut(BTreeMap<JobId, JobStatus>),
}

impl WaitOutcome {
    pub fn statuses(&self) -> &BTreeMap<JobId, JobStatus> {
        match self {
            WaitOutcome::Completed(s) | WaitOutcome::TimedOut(s) => s,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut(_))
    }

    /// Ids of jobs that did not succeed.
    pub fn unsuccessful(&self) -> Vec<JobId> {
        self.statuses()
            .iter()
            .filter(|(_, status)| **status != JobStatus::Success)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.is_timed_out() && self.unsuccessful().is_empty()
    }
}

/// Launches jobs and reports their status.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Interval between status polls in [`Backend::wait`].
    fn poll_interval(&self) -> Duration;

    /// Launch every job in the batch. Returns once all jobs are handed off.
    async fn submit(&self, batch: SubmitBatch) -> Result<SubmitHandle, BackendError>;

    async fn poll_status(
        &self,
        handle: &SubmitHandle,
    ) -> Result<BTreeMap<JobId, JobStatus>, BackendError> {
        Ok(handle.statuses())
    }

    /// Poll until every job is terminal or `timeout` elapses.
    async fn wait(
        &self,
        handle: &SubmitHandle,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, BackendError> {
        let start = Instant::now();
        loop {
            let statuses = self.poll_status(handle).await?;
            if statuses.values().all(JobStatus::is_terminal) {
                return Ok(WaitOutcome::Completed(statuses));
            }
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                tracing::warn!(
                    task = %handle.task_name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "timed out waiting for jobs"
                );
                return Ok(WaitOutcome::TimedOut(statuses));
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }
}

/// Create the tmp folder layout, mapping failures to [`BackendError`].
pub(crate) fn ensure_layout(layout: &LogLayout) -> Result<(), BackendError> {
    layout
        .ensure_dirs()
        .map_err(|source| BackendError::Io { path: layout.root().to_path_buf(), source })
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ensure_layout, Backend, BackendError, SubmitBatch, SubmitHandle};
    use async_trait::async_trait;
    use ct_core::JobId;
    use ct_storage::JobLogger;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBackendState {
        submissions: Vec<SubmitBatch>,
        failing: HashMap<String, HashSet<JobId>>,
        silent: HashSet<String>,
    }

    /// Fake backend for testing.
    ///
    /// Records every batch and immediately writes markers: `success` for each
    /// job unless configured to fail, or nothing at all for silent tasks.
    #[derive(Clone, Default)]
    pub struct FakeBackend {
        inner: Arc<Mutex<FakeBackendState>>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the given jobs of `task` log a failure.
        pub fn fail_jobs(&self, task: &str, job_ids: &[JobId]) {
            self.inner.lock().failing.entry(task.to_string()).or_default().extend(job_ids);
        }

        /// Let jobs of `task` succeed again.
        pub fn heal(&self, task: &str) {
            self.inner.lock().failing.remove(task);
        }

        /// Jobs of `task` never write a marker.
        pub fn silence(&self, task: &str) {
            self.inner.lock().silent.insert(task.to_string());
        }

        pub fn submissions(&self) -> Vec<SubmitBatch> {
            self.inner.lock().submissions.clone()
        }

        pub fn submitted_tasks(&self) -> Vec<String> {
            self.inner.lock().submissions.iter().map(|b| b.task_name.clone()).collect()
        }

        pub fn submitted_job_count(&self) -> usize {
            self.inner.lock().submissions.iter().map(|b| b.job_ids.len()).sum()
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn poll_interval(&self) -> Duration {
            Duration::from_millis(1)
        }

        async fn submit(&self, batch: SubmitBatch) -> Result<SubmitHandle, BackendError> {
            ensure_layout(&batch.layout)?;
            let mut inner = self.inner.lock();
            if !inner.silent.contains(&batch.task_name) {
                let failing = inner.failing.get(&batch.task_name);
                for &id in &batch.job_ids {
                    let logger = JobLogger::new(&batch.layout, &batch.task_name, id);
                    logger.started();
                    if failing.is_some_and(|f| f.contains(&id)) {
                        logger.failure("injected failure");
                    } else {
                        logger.success();
                    }
                }
            }
            let handle = SubmitHandle::new(&batch);
            inner.submissions.push(batch);
            Ok(handle)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBackend;

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
