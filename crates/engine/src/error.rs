// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types of task resolution, job execution and workflows.

use ct_adapters::BackendError;
use ct_core::{ConfigError, JobId, ScaleError, ShapeError};
use ct_storage::StoreError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by an operation while planning its jobs or checking output.
#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Invalid(String),
}

/// Why a task did not reach `Success`.
///
/// Cloneable so a failure can be memoised and reported to every dependent.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("task {task}: {source}")]
    InvalidShape {
        task: String,
        #[source]
        source: ShapeError,
    },
    #[error("task {task}: {source}")]
    NonIntegerScaleRatio {
        task: String,
        #[source]
        source: ScaleError,
    },
    #[error("task {task}: jobs {job_ids:?} failed (log: {})", .log_path.display())]
    JobFailed { task: String, job_ids: Vec<JobId>, log_path: PathBuf, log_tail: String },
    #[error("task {task}: jobs {job_ids:?} did not finish within {timeout_s}s (log: {})", .log_path.display())]
    Timeout { task: String, job_ids: Vec<JobId>, timeout_s: u64, log_path: PathBuf },
    #[error("task {task} skipped: dependency {dependency} failed")]
    DependencyFailed {
        task: String,
        dependency: String,
        #[source]
        source: Box<TaskError>,
    },
    #[error("task {task}: existing output is inconsistent: {reason}")]
    StoreInconsistency { task: String, reason: String },
    #[error("task {task}: store error: {source}")]
    Store {
        task: String,
        #[source]
        source: Arc<StoreError>,
    },
    #[error("task {task}: backend error: {source}")]
    Backend {
        task: String,
        #[source]
        source: Arc<BackendError>,
    },
    #[error("task {task}: {message}")]
    Config { task: String, message: String },
}

impl TaskError {
    /// Attribute an operation error to `task`.
    pub fn from_op(task: &str, error: OpError) -> Self {
        let task = task.to_string();
        match error {
            OpError::Shape(source) => TaskError::InvalidShape { task, source },
            OpError::Scale(source @ ScaleError::NonIntegerScaleRatio { .. }) => {
                TaskError::NonIntegerScaleRatio { task, source }
            }
            OpError::Scale(other) => TaskError::Config { task, message: other.to_string() },
            OpError::Store(source) => TaskError::Store { task, source: Arc::new(source) },
            OpError::Config(e) => TaskError::Config { task, message: e.to_string() },
            OpError::Invalid(message) => TaskError::Config { task, message },
        }
    }

    /// Name of the task this error is attributed to.
    pub fn task(&self) -> &str {
        match self {
            TaskError::InvalidShape { task, .. }
            | TaskError::NonIntegerScaleRatio { task, .. }
            | TaskError::JobFailed { task, .. }
            | TaskError::Timeout { task, .. }
            | TaskError::DependencyFailed { task, .. }
            | TaskError::StoreInconsistency { task, .. }
            | TaskError::Store { task, .. }
            | TaskError::Backend { task, .. }
            | TaskError::Config { task, .. } => task,
        }
    }

    /// The error of the first failing task, following dependency failures.
    pub fn root_cause(&self) -> &TaskError {
        match self {
            TaskError::DependencyFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Job log of the failure, when it came from jobs.
    pub fn log_path(&self) -> Option<&Path> {
        match self {
            TaskError::JobFailed { log_path, .. } | TaskError::Timeout { log_path, .. } => {
                Some(log_path)
            }
            _ => None,
        }
    }
}

/// Errors raised inside a job process.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Invalid(String),
}

impl From<OpError> for JobError {
    fn from(e: OpError) -> Self {
        match e {
            OpError::Shape(e) => JobError::Shape(e),
            OpError::Scale(e) => JobError::Scale(e),
            OpError::Store(e) => JobError::Store(e),
            OpError::Config(e) => JobError::Config(e),
            OpError::Invalid(message) => JobError::Invalid(message),
        }
    }
}

impl From<ndarray::ShapeError> for JobError {
    fn from(e: ndarray::ShapeError) -> Self {
        JobError::Invalid(format!("array shape error: {}", e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown job kind `{0}`")]
    UnknownJobKind(String),
    #[error("job kind `{0}` registered twice")]
    DuplicateKind(String),
    #[error("cannot derive job id and log location from config path {}", .0.display())]
    BadConfigPath(PathBuf),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow {workflow}: task name {task} is used by two different tasks")]
    DuplicateTask { workflow: String, task: String },
    #[error("workflow {workflow}: {source}")]
    Registry {
        workflow: String,
        #[source]
        source: RegistryError,
    },
    #[error("workflow {workflow} failed at task {failed_task}{}", log_hint(.log_path))]
    TaskFailed {
        workflow: String,
        /// First task that failed (not a dependent that was skipped).
        failed_task: String,
        log_path: Option<PathBuf>,
        #[source]
        source: TaskError,
    },
}

fn log_hint(log_path: &Option<PathBuf>) -> String {
    match log_path {
        Some(path) => format!(" (job log: {})", path.display()),
        None => String::new(),
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
