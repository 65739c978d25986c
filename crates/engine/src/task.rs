// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tasks: plan jobs for an operation, run them through a backend, and check
//! the persisted markers.
//!
//! A [`Task`] is immutable. Resolution first resolves the dependency, then
//! either recognises existing output (marker or store contents) or writes one
//! config per job, submits the batch and waits until every job reached a
//! terminal status. Results are memoised in the [`RunContext`], so a task
//! shared by several dependents runs once per workflow run.

use crate::config::TaskSettings;
use crate::error::{OpError, TaskError};
use crate::runner::STORE_PATH_KEY;
use ct_adapters::{Backend, SubmitBatch, WaitOutcome};
use ct_core::{assign_blocks, JobConfig, JobId, Shape};
use ct_storage::{tail, JobLogger, LogLayout, TaskMarker, VolumeStore};
use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lines of a failed job's log included in the error.
const LOG_TAIL_LINES: usize = 10;

/// State of a task's output found before any job is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputState {
    Missing,
    Complete,
    Malformed(String),
}

/// What a task computes: how many jobs, with which configs.
///
/// Implementations must be deterministic for unchanged inputs, and the block
/// ranges of the configs they build must partition the id space.
pub trait Operation: Send + Sync {
    /// Job kind registered in the [`crate::JobRegistry`].
    fn kind(&self) -> &'static str;

    fn n_required_jobs(&self, ctx: &TaskContext<'_>) -> Result<usize, OpError>;

    /// Exactly `n_required_jobs` configs, in job id order.
    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError>;

    /// Create output groups and datasets before any job starts.
    fn prepare(&self, _ctx: &TaskContext<'_>) -> Result<(), OpError> {
        Ok(())
    }

    /// Output already present without a completion marker.
    fn existing_output(&self, _ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        Ok(OutputState::Missing)
    }

    /// Output check for a task whose completion marker exists.
    fn verify_output(&self, _ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        Ok(OutputState::Complete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

ct_core::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Output was already there; nothing was submitted.
    AlreadyComplete,
    Completed { n_jobs: usize },
}

/// Settings shared by every task of a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub block_shape: Shape,
    pub max_jobs: usize,
    pub timeout: Option<Duration>,
    pub tasks: BTreeMap<String, TaskSettings>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { block_shape: [64, 64, 64], max_jobs: 8, timeout: None, tasks: BTreeMap::new() }
    }
}

impl RunSettings {
    ct_core::setters! {
        set { block_shape: Shape, max_jobs: usize, tasks: BTreeMap<String, TaskSettings> }
        option { timeout: Duration }
    }

    pub fn task(&self, kind: &str) -> TaskSettings {
        self.tasks.get(kind).cloned().unwrap_or_default()
    }
}

/// Shared state of one workflow run.
pub struct RunContext {
    backend: Arc<dyn Backend>,
    store: Arc<dyn VolumeStore>,
    layout: LogLayout,
    settings: RunSettings,
    results: Mutex<HashMap<String, Result<TaskOutcome, TaskError>>>,
    statuses: Mutex<IndexMap<String, TaskStatus>>,
    submitted_jobs: AtomicUsize,
}

impl RunContext {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn VolumeStore>,
        layout: LogLayout,
        settings: RunSettings,
    ) -> Self {
        Self {
            backend,
            store,
            layout,
            settings,
            results: Mutex::new(HashMap::new()),
            statuses: Mutex::new(IndexMap::new()),
            submitted_jobs: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn VolumeStore> {
        &self.store
    }

    pub fn layout(&self) -> &LogLayout {
        &self.layout
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn status(&self, task: &str) -> TaskStatus {
        self.statuses.lock().get(task).copied().unwrap_or(TaskStatus::Pending)
    }

    /// Statuses of every task touched so far, in first-touch order.
    pub fn statuses(&self) -> IndexMap<String, TaskStatus> {
        self.statuses.lock().clone()
    }

    /// Jobs handed to the backend during this run, retries included.
    pub fn submitted_jobs(&self) -> usize {
        self.submitted_jobs.load(Ordering::SeqCst)
    }

    fn set_status(&self, task: &str, status: TaskStatus) {
        self.statuses.lock().insert(task.to_string(), status);
    }

    fn memoised(&self, task: &str) -> Option<Result<TaskOutcome, TaskError>> {
        self.results.lock().get(task).cloned()
    }

    fn record(&self, task: &str, result: &Result<TaskOutcome, TaskError>) {
        let status = if result.is_ok() { TaskStatus::Success } else { TaskStatus::Failed };
        self.set_status(task, status);
        self.results.lock().insert(task.to_string(), result.clone());
    }
}

/// View of the run given to an [`Operation`].
pub struct TaskContext<'a> {
    task_name: &'a str,
    kind: &'a str,
    run: &'a RunContext,
}

impl<'a> TaskContext<'a> {
    pub fn new(task_name: &'a str, kind: &'a str, run: &'a RunContext) -> Self {
        Self { task_name, kind, run }
    }

    pub fn task_name(&self) -> &str {
        self.task_name
    }

    pub fn store(&self) -> &dyn VolumeStore {
        self.run.store.as_ref()
    }

    pub fn block_shape(&self) -> Shape {
        self.run.settings.block_shape
    }

    pub fn max_jobs(&self) -> usize {
        self.run.settings.max_jobs.max(1)
    }

    pub fn settings(&self) -> TaskSettings {
        self.run.settings.task(self.kind)
    }

    /// Config entries common to every job of this task.
    pub fn base_config(&self) -> JobConfig {
        JobConfig::builder()
            .merge(&self.settings().to_config_map())
            .set(STORE_PATH_KEY, self.store().path())
            .set("block_shape", self.block_shape().to_vec())
            .build()
    }

    /// Number of jobs for `n_blocks` blocks, capped at `max_jobs`.
    pub fn n_block_jobs(&self, n_blocks: usize) -> usize {
        n_blocks.min(self.max_jobs())
    }

    /// One config per job, each with a contiguous `block_begin..block_end`.
    pub fn block_configs(&self, n_blocks: usize, base: &JobConfig) -> Vec<JobConfig> {
        assign_blocks(n_blocks, self.n_block_jobs(n_blocks))
            .into_iter()
            .map(|range| base.with("block_begin", range.start).with("block_end", range.end))
            .collect()
    }
}

pub struct Task {
    name: String,
    dependency: Option<Arc<Task>>,
    operation: Arc<dyn Operation>,
    retry: Option<bool>,
}

pub struct TaskBuilder {
    name: String,
    dependency: Option<Arc<Task>>,
    operation: Arc<dyn Operation>,
    retry: Option<bool>,
}

impl TaskBuilder {
    ct_core::setters! {
        option { dependency: Arc<Task>, retry: bool }
    }

    pub fn depends_on(self, dependency: Option<Arc<Task>>) -> Self {
        Self { dependency, ..self }
    }

    pub fn build(self) -> Arc<Task> {
        Arc::new(Task {
            name: self.name,
            dependency: self.dependency,
            operation: self.operation,
            retry: self.retry,
        })
    }
}

impl Task {
    pub fn builder(name: impl Into<String>, operation: impl Operation + 'static) -> TaskBuilder {
        TaskBuilder { name: name.into(), dependency: None, operation: Arc::new(operation), retry: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &'static str {
        self.operation.kind()
    }

    pub fn dependency(&self) -> Option<&Arc<Task>> {
        self.dependency.as_ref()
    }

    /// Resolve the dependency chain, then this task.
    pub fn resolve<'a>(
        &'a self,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, Result<TaskOutcome, TaskError>> {
        async move {
            if let Some(result) = ctx.memoised(&self.name) {
                return result;
            }
            let result = self.resolve_uncached(ctx).await;
            match &result {
                Ok(outcome) => tracing::info!(task = %self.name, ?outcome, "task complete"),
                Err(e) => tracing::error!(task = %self.name, error = %e, "task failed"),
            }
            ctx.record(&self.name, &result);
            result
        }
        .boxed()
    }

    async fn resolve_uncached(&self, ctx: &RunContext) -> Result<TaskOutcome, TaskError> {
        if let Some(dep) = &self.dependency {
            if let Err(e) = dep.resolve(ctx).await {
                return Err(TaskError::DependencyFailed {
                    task: self.name.clone(),
                    dependency: dep.name.clone(),
                    source: Box::new(e),
                });
            }
        }

        let tctx = TaskContext::new(&self.name, self.operation.kind(), ctx);
        let marker = TaskMarker::new(&ctx.layout, &self.name);
        if let Some(outcome) = self.check_existing(&tctx, &marker)? {
            return Ok(outcome);
        }

        ctx.set_status(&self.name, TaskStatus::Running);
        let n_jobs = self.operation.n_required_jobs(&tctx).map_err(|e| self.op_error(e))?;
        let configs = if n_jobs == 0 {
            Vec::new()
        } else {
            self.operation.build_configs(&tctx).map_err(|e| self.op_error(e))?
        };
        if configs.len() != n_jobs {
            return Err(self.config_error(format!(
                "built {} job configs but {} jobs are required",
                configs.len(),
                n_jobs
            )));
        }
        self.operation.prepare(&tctx).map_err(|e| self.op_error(e))?;

        if n_jobs > 0 {
            let job_ids = self.write_configs(ctx, configs)?;
            self.run_jobs(ctx, &tctx, job_ids).await?;
        } else {
            tracing::info!(task = %self.name, "no jobs required");
        }

        marker
            .mark_done(n_jobs)
            .map_err(|e| self.config_error(format!("failed to write task marker: {}", e)))?;
        Ok(TaskOutcome::Completed { n_jobs })
    }

    /// `Some` when output from an earlier run can be reused.
    fn check_existing(
        &self,
        tctx: &TaskContext<'_>,
        marker: &TaskMarker,
    ) -> Result<Option<TaskOutcome>, TaskError> {
        let state = if marker.is_done() {
            self.operation.verify_output(tctx)
        } else {
            self.operation.existing_output(tctx)
        }
        .map_err(|e| self.op_error(e))?;

        match state {
            OutputState::Complete => {
                tracing::info!(task = %self.name, "output already complete, skipping");
                Ok(Some(TaskOutcome::AlreadyComplete))
            }
            OutputState::Missing => Ok(None),
            OutputState::Malformed(reason) => {
                Err(TaskError::StoreInconsistency { task: self.name.clone(), reason })
            }
        }
    }

    fn write_configs(
        &self,
        ctx: &RunContext,
        configs: Vec<JobConfig>,
    ) -> Result<Vec<JobId>, TaskError> {
        let mut job_ids = Vec::with_capacity(configs.len());
        for (index, config) in configs.into_iter().enumerate() {
            let job_id = index as JobId;
            let config = config.with("task_name", self.name.as_str()).with("job_id", job_id);
            let path = ctx.layout.config_path(&self.name, job_id);
            config
                .write_atomic(&path)
                .map_err(|e| self.config_error(e.to_string()))?;
            JobLogger::new(&ctx.layout, &self.name, job_id).rotate();
            job_ids.push(job_id);
        }
        Ok(job_ids)
    }

    async fn run_jobs(
        &self,
        ctx: &RunContext,
        tctx: &TaskContext<'_>,
        job_ids: Vec<JobId>,
    ) -> Result<(), TaskError> {
        let mut outcome = self.submit_and_wait(ctx, tctx, job_ids).await?;
        let retry = self.retry.unwrap_or_else(|| tctx.settings().retry);
        if retry && !outcome.is_timed_out() && !outcome.unsuccessful().is_empty() {
            let failed = outcome.unsuccessful();
            tracing::warn!(task = %self.name, ?failed, "retrying failed jobs once");
            for &job_id in &failed {
                JobLogger::new(&ctx.layout, &self.name, job_id).rotate();
            }
            outcome = self.submit_and_wait(ctx, tctx, failed).await?;
        }

        let failed = outcome.unsuccessful();
        let Some(&first) = failed.first() else {
            return Ok(());
        };
        let log_path = ctx.layout.job_log_path(&self.name, first);
        if outcome.is_timed_out() {
            return Err(TaskError::Timeout {
                task: self.name.clone(),
                job_ids: failed,
                timeout_s: ctx.settings.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                log_path,
            });
        }
        Err(TaskError::JobFailed {
            task: self.name.clone(),
            job_ids: failed,
            log_tail: tail(&log_path, LOG_TAIL_LINES),
            log_path,
        })
    }

    async fn submit_and_wait(
        &self,
        ctx: &RunContext,
        tctx: &TaskContext<'_>,
        job_ids: Vec<JobId>,
    ) -> Result<WaitOutcome, TaskError> {
        let n_jobs = job_ids.len();
        let batch = SubmitBatch {
            task_name: self.name.clone(),
            kind: self.operation.kind().to_string(),
            job_ids,
            resources: tctx.settings().resources(),
            layout: ctx.layout.clone(),
        };
        let backend_err =
            |e| TaskError::Backend { task: self.name.clone(), source: Arc::new(e) };

        let start = Instant::now();
        let handle = ctx.backend.submit(batch).await.map_err(backend_err)?;
        ctx.submitted_jobs.fetch_add(n_jobs, Ordering::SeqCst);
        tracing::info!(
            task = %self.name,
            backend = ctx.backend.name(),
            n_jobs,
            "submitted jobs"
        );
        let outcome = ctx.backend.wait(&handle, ctx.settings.timeout).await.map_err(backend_err)?;
        tracing::info!(
            task = %self.name,
            n_jobs,
            failed = outcome.unsuccessful().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "jobs finished"
        );
        Ok(outcome)
    }

    fn op_error(&self, error: OpError) -> TaskError {
        TaskError::from_op(&self.name, error)
    }

    fn config_error(&self, message: String) -> TaskError {
        TaskError::Config { task: self.name.clone(), message }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("dependency", &self.dependency.as_ref().map(|d| d.name.as_str()))
            .finish()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
