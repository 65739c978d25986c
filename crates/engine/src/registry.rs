// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit table of job kinds.
//!
//! Every kind a task may submit is registered here once, and a workflow is
//! checked against the table before any job runs. A job process looks its
//! kind up in the same table.

use crate::error::{JobError, RegistryError};
use crate::ops;
use ct_core::{JobConfig, JobId};
use ct_storage::{JobLogger, VolumeStore};
use indexmap::IndexMap;

/// Everything a job function sees while it runs.
pub struct JobContext<'a> {
    pub task_name: &'a str,
    pub job_id: JobId,
    pub config: &'a JobConfig,
    pub store: &'a dyn VolumeStore,
    pub logger: &'a JobLogger,
}

impl JobContext<'_> {
    /// Record a progress line in the job log.
    pub fn log(&self, message: &str) {
        self.logger.append(message);
    }
}

/// Body of one job kind.
pub type JobFn = fn(&JobContext<'_>) -> Result<(), JobError>;

#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: IndexMap<String, JobFn>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every job kind shipped in this crate.
    pub fn builtin() -> Self {
        let mut jobs = IndexMap::new();
        for (kind, job) in ops::BUILTIN_JOBS {
            jobs.insert(kind.to_string(), *job);
        }
        Self { jobs }
    }

    pub fn register(&mut self, kind: &str, job: JobFn) -> Result<(), RegistryError> {
        if self.jobs.contains_key(kind) {
            return Err(RegistryError::DuplicateKind(kind.to_string()));
        }
        self.jobs.insert(kind.to_string(), job);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<JobFn, RegistryError> {
        self.jobs.get(kind).copied().ok_or_else(|| RegistryError::UnknownJobKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.jobs.contains_key(kind)
    }

    /// Registered kinds, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Check that every kind in `kinds` is registered.
    pub fn validate<'a>(&self, kinds: impl IntoIterator<Item = &'a str>) -> Result<(), RegistryError> {
        for kind in kinds {
            self.get(kind)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry").field("kinds", &self.jobs.keys().collect::<Vec<_>>()).finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
