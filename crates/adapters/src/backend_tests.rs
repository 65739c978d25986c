// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ct_storage::JobLogger;
use tempfile::tempdir;

fn batch(layout: &LogLayout, task: &str, n: u32) -> SubmitBatch {
    SubmitBatch {
        task_name: task.to_string(),
        kind: "stub".to_string(),
        job_ids: (0..n).collect(),
        resources: Resources::default(),
        layout: layout.clone(),
    }
}

#[test]
fn batch_config_paths_follow_layout() {
    let layout = LogLayout::new("/scratch/tmp");
    let paths = batch(&layout, "upscaling_s0", 2).config_paths();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("/scratch/tmp/config/upscaling_s0_job_0.config"),
            PathBuf::from("/scratch/tmp/config/upscaling_s0_job_1.config"),
        ]
    );
}

#[test]
fn finished_worker_without_marker_is_failed() {
    let dir = tempdir().unwrap();
    let layout = LogLayout::new(dir.path());
    let handle = SubmitHandle::new(&batch(&layout, "t", 3));
    JobLogger::new(&layout, "t", 0).success();
    JobLogger::new(&layout, "t", 1).started();
    handle.mark_finished(0);
    handle.mark_finished(1);

    let statuses = handle.statuses();
    assert_eq!(statuses[&0], JobStatus::Success);
    assert_eq!(statuses[&1], JobStatus::Failed);
    assert_eq!(statuses[&2], JobStatus::Pending);
}

#[test]
fn outcome_helpers() {
    let statuses: BTreeMap<JobId, JobStatus> =
        [(0, JobStatus::Success), (1, JobStatus::Failed), (2, JobStatus::Success)].into();
    let outcome = WaitOutcome::Completed(statuses.clone());
    assert_eq!(outcome.unsuccessful(), vec![1]);
    assert!(!outcome.all_succeeded());

    let ok: BTreeMap<JobId, JobStatus> = [(0, JobStatus::Success)].into();
    assert!(WaitOutcome::Completed(ok.clone()).all_succeeded());
    assert!(!WaitOutcome::TimedOut(ok).all_succeeded());
}

#[tokio::test]
async fn fake_backend_records_and_completes() {
    let dir = tempdir().unwrap();
    let layout = LogLayout::new(dir.path());
    let backend = FakeBackend::new();
    backend.fail_jobs("t", &[2]);

    let handle = backend.submit(batch(&layout, "t", 4)).await.unwrap();
    let outcome = backend.wait(&handle, Some(Duration::from_secs(5))).await.unwrap();
    assert!(matches!(outcome, WaitOutcome::Completed(_)));
    assert_eq!(outcome.unsuccessful(), vec![2]);
    assert_eq!(backend.submitted_job_count(), 4);
    assert_eq!(backend.submitted_tasks(), vec!["t".to_string()]);
}

#[tokio::test]
async fn wait_times_out_on_silent_jobs() {
    let dir = tempdir().unwrap();
    let layout = LogLayout::new(dir.path());
    let backend = FakeBackend::new();
    backend.silence("t");

    let handle = backend.submit(batch(&layout, "t", 2)).await.unwrap();
    let outcome = backend.wait(&handle, Some(Duration::from_millis(20))).await.unwrap();
    assert!(outcome.is_timed_out());
    assert_eq!(outcome.statuses()[&0], JobStatus::Pending);
}
