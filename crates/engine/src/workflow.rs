// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A workflow is the dependency tree below one terminal task.

use crate::error::WorkflowError;
use crate::registry::JobRegistry;
use crate::task::{RunContext, Task, TaskStatus};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Per-task statuses and job count of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    /// Every task of the workflow in dependency-first order.
    pub statuses: IndexMap<String, TaskStatus>,
    pub submitted_jobs: usize,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    terminal: Arc<Task>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, terminal: Arc<Task>) -> Self {
        Self { name: name.into(), terminal }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terminal(&self) -> &Arc<Task> {
        &self.terminal
    }

    /// All tasks, dependencies before dependents, each name once.
    ///
    /// Two distinct task instances with the same name are rejected: they
    /// would share configs, logs and the completion marker.
    pub fn tasks(&self) -> Result<Vec<Arc<Task>>, WorkflowError> {
        let mut chain = Vec::new();
        let mut next = Some(&self.terminal);
        while let Some(task) = next {
            chain.push(Arc::clone(task));
            next = task.dependency();
        }
        chain.reverse();

        let mut seen: HashMap<&str, &Arc<Task>> = HashMap::new();
        let mut order = Vec::with_capacity(chain.len());
        for task in &chain {
            match seen.get(task.name()) {
                Some(existing) if Arc::ptr_eq(existing, task) => continue,
                Some(_) => {
                    return Err(WorkflowError::DuplicateTask {
                        workflow: self.name.clone(),
                        task: task.name().to_string(),
                    })
                }
                None => {
                    seen.insert(task.name(), task);
                    order.push(Arc::clone(task));
                }
            }
        }
        Ok(order)
    }

    /// Check task names and that every job kind is registered.
    pub fn validate(&self, registry: &JobRegistry) -> Result<(), WorkflowError> {
        let tasks = self.tasks()?;
        registry
            .validate(tasks.iter().map(|t| t.kind()))
            .map_err(|source| WorkflowError::Registry { workflow: self.name.clone(), source })
    }

    /// Resolve the terminal task.
    ///
    /// On failure the error names the first task that failed, not the
    /// dependents that were skipped because of it.
    pub async fn run(&self, ctx: &RunContext) -> Result<WorkflowReport, WorkflowError> {
        let tasks = self.tasks()?;
        tracing::info!(workflow = %self.name, n_tasks = tasks.len(), "running workflow");
        let start = Instant::now();

        if let Err(source) = self.terminal.resolve(ctx).await {
            let root = source.root_cause();
            let failed_task = root.task().to_string();
            let log_path = root.log_path().map(|p| p.to_path_buf());
            tracing::error!(
                workflow = %self.name,
                task = %failed_task,
                error = %root,
                "workflow failed"
            );
            return Err(WorkflowError::TaskFailed {
                workflow: self.name.clone(),
                failed_task,
                log_path,
                source,
            });
        }

        let statuses =
            tasks.iter().map(|t| (t.name().to_string(), ctx.status(t.name()))).collect();
        let report = WorkflowReport { statuses, submitted_jobs: ctx.submitted_jobs() };
        tracing::info!(
            workflow = %self.name,
            submitted_jobs = report.submitted_jobs,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "workflow succeeded"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
