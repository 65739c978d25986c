// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A block-parallel task followed by the scale alignment chain, with stub
//! jobs that only log.

use crate::prelude::Harness;
use ct_core::{Blocking, JobConfig, JobStatus, ScalePyramid, Shape};
use ct_engine::{
    aligner, JobContext, JobError, JobRegistry, OpError, Operation, Task, TaskContext, TaskError,
    TaskStatus, Workflow, WorkflowError,
};
use std::collections::HashSet;
use std::sync::Arc;

const STUB: &str = "stub";
const FLAKY: &str = "flaky";
const LEVEL0: Shape = [8, 8, 8];

fn stub_job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    ctx.log(&format!("stub job of {}", ctx.task_name));
    Ok(())
}

fn flaky_job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    match ctx.config.u64("block_begin")? {
        3 => Err(JobError::Invalid("block 3 is unreadable".to_string())),
        _ => Ok(()),
    }
}

fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register(STUB, stub_job).unwrap();
    registry.register(FLAKY, flaky_job).unwrap();
    registry
}

/// One job per block of level 0.
struct PerBlock {
    kind: &'static str,
}

impl Operation for PerBlock {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn n_required_jobs(&self, ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        Ok(Blocking::new(LEVEL0, ctx.block_shape())?.n_blocks())
    }

    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError> {
        let base = ctx.base_config();
        let n_blocks = self.n_required_jobs(ctx)?;
        Ok((0..n_blocks).map(|b| base.with("block_begin", b).with("block_end", b + 1)).collect())
    }
}

/// A single job per alignment step.
struct Step;

impl Operation for Step {
    fn kind(&self) -> &'static str {
        STUB
    }

    fn n_required_jobs(&self, _ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        Ok(1)
    }

    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError> {
        Ok(vec![ctx.base_config()])
    }
}

fn pyramid() -> ScalePyramid {
    ScalePyramid::new(vec![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0], [4.0, 4.0, 4.0]]).unwrap()
}

fn workflow(reference: usize, block_kind: &'static str) -> Workflow {
    let plan = aligner::plan(&pyramid(), reference).unwrap();
    let labels = Task::builder("make_labels", PerBlock { kind: block_kind }).build();
    let terminal = aligner::build_chain(&plan, Some(labels), |step, dependency| {
        Task::builder(format!("align_s{}", step.target), Step).depends_on(dependency).build()
    })
    .unwrap();
    Workflow::new("pyramid", terminal)
}

#[tokio::test]
async fn pyramid_runs_one_job_per_block_and_per_step() {
    let h = Harness::new(registry(), [4, 4, 4], 8);
    let workflow = workflow(0, STUB);
    workflow.validate(h.registry()).unwrap();

    let report = workflow.run(&h.context()).await.unwrap();

    assert!(report.statuses.values().all(|s| *s == TaskStatus::Success));
    let (n_up, n_down) = (0, 2);
    assert_eq!(report.submitted_jobs, 8 + n_up + n_down);

    let logs = h.job_logs();
    assert_eq!(logs.len(), 8 + n_up + n_down);
    assert!(logs.iter().all(|(_, _, status)| *status == JobStatus::Success));
    let unique: HashSet<(&str, u32)> = logs.iter().map(|(t, id, _)| (t.as_str(), *id)).collect();
    assert_eq!(unique.len(), logs.len());
    let blocks: Vec<u32> =
        logs.iter().filter(|(t, _, _)| t == "make_labels").map(|(_, id, _)| *id).collect();
    assert_eq!(blocks, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn every_reference_scale_aligns_the_other_two() {
    for reference in 0..3 {
        let h = Harness::new(registry(), [4, 4, 4], 8);
        let workflow = workflow(reference, STUB);

        let report = workflow.run(&h.context()).await.unwrap();

        let names: Vec<&str> = report.statuses.keys().map(String::as_str).collect();
        let expected: Vec<String> = std::iter::once("make_labels".to_string())
            .chain((0..reference).rev().map(|s| format!("align_s{s}")))
            .chain((reference + 1..3).map(|s| format!("align_s{s}")))
            .collect();
        assert_eq!(names, expected, "reference {reference}");
        assert_eq!(report.submitted_jobs, 10, "reference {reference}");
    }
}

#[tokio::test]
async fn second_run_submits_nothing() {
    let h = Harness::new(registry(), [4, 4, 4], 8);
    let workflow = workflow(0, STUB);
    workflow.run(&h.context()).await.unwrap();

    let report = workflow.run(&h.context()).await.unwrap();

    assert_eq!(report.submitted_jobs, 0);
    assert!(report.statuses.values().all(|s| *s == TaskStatus::Success));
}

#[tokio::test]
async fn failing_block_stops_the_chain() {
    let h = Harness::new(registry(), [4, 4, 4], 8);
    let workflow = workflow(0, FLAKY);

    let err = workflow.run(&h.context()).await.unwrap_err();

    let WorkflowError::TaskFailed { failed_task, log_path, source, .. } = err else {
        panic!("expected TaskFailed, got {err:?}");
    };
    assert_eq!(failed_task, "make_labels");
    assert_eq!(log_path, Some(h.layout.job_log_path("make_labels", 3)));
    let TaskError::JobFailed { job_ids, log_tail, .. } = source.root_cause() else {
        panic!("expected JobFailed, got {source:?}");
    };
    assert_eq!(job_ids, &vec![3]);
    assert!(log_tail.contains("block 3 is unreadable"), "{log_tail}");
    assert!(h.job_logs().iter().all(|(task, _, _)| task == "make_labels"));
}

#[tokio::test]
async fn unregistered_kinds_fail_validation() {
    let h = Harness::new(JobRegistry::new(), [4, 4, 4], 8);
    let err = workflow(0, STUB).validate(h.registry()).unwrap_err();
    assert!(matches!(err, WorkflowError::Registry { .. }));
}

#[test]
fn shared_task_instances_are_listed_once() {
    let labels: Arc<Task> = Task::builder("make_labels", PerBlock { kind: STUB }).build();
    let workflow = Workflow::new("single", labels);
    assert_eq!(workflow.tasks().unwrap().len(), 1);
}
