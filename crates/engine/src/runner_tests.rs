// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ct_storage::{read_status, tail, MemoryVolumeStore, SharedStoreProvider, VolumeStore};

fn write_marker(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let key = ctx.config.str("output_key")?;
    ctx.store.require_group(key)?;
    ctx.log("wrote group");
    Ok(())
}

fn always_fails(_ctx: &JobContext<'_>) -> Result<(), JobError> {
    Err(JobError::Invalid("boom".to_string()))
}

fn setup() -> (tempfile::TempDir, LogLayout, Arc<MemoryVolumeStore>, JobRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let layout = LogLayout::new(dir.path());
    let store = Arc::new(MemoryVolumeStore::default());
    let mut registry = JobRegistry::new();
    registry.register("marker", write_marker).unwrap();
    registry.register("fails", always_fails).unwrap();
    (dir, layout, store, registry)
}

fn write_config(layout: &LogLayout, task: &str, config: JobConfig) -> std::path::PathBuf {
    let path = layout.config_path(task, 0);
    config.write_atomic(&path).unwrap();
    path
}

#[test]
fn successful_job_logs_success_last() {
    let (_dir, layout, store, registry) = setup();
    let config = JobConfig::builder()
        .set(STORE_PATH_KEY, "memory")
        .set("output_key", "out/group")
        .build();
    let path = write_config(&layout, "mark", config);
    let provider = SharedStoreProvider::new(store.clone());

    let status = run_job(&registry, &provider, "marker", &path).unwrap();

    assert_eq!(status, JobStatus::Success);
    assert!(store.contains("out/group").unwrap());
    let log = layout.job_log_path("mark", 0);
    assert_eq!(read_status(&log), JobStatus::Success);
    assert!(tail(&log, 1).ends_with("success"));
}

#[test]
fn job_error_is_logged_as_failure() {
    let (_dir, layout, store, registry) = setup();
    let path = write_config(&layout, "boom", JobConfig::builder().set(STORE_PATH_KEY, "m").build());

    let status = run_job(&registry, &SharedStoreProvider::new(store), "fails", &path).unwrap();

    assert_eq!(status, JobStatus::Failed);
    let log = layout.job_log_path("boom", 0);
    assert_eq!(read_status(&log), JobStatus::Failed);
    assert!(tail(&log, 1).contains("failed: boom"));
}

#[test]
fn missing_config_key_fails_the_job() {
    let (_dir, layout, store, registry) = setup();
    let path = write_config(&layout, "nokey", JobConfig::builder().set(STORE_PATH_KEY, "m").build());

    let status = run_job(&registry, &SharedStoreProvider::new(store), "marker", &path).unwrap();

    assert_eq!(status, JobStatus::Failed);
    assert!(tail(&layout.job_log_path("nokey", 0), 1).contains("output_key"));
}

#[test]
fn unknown_kind_still_writes_a_failure_marker() {
    let (_dir, layout, store, registry) = setup();
    let path = write_config(&layout, "odd", JobConfig::builder().set(STORE_PATH_KEY, "m").build());

    let status = run_job(&registry, &SharedStoreProvider::new(store), "watershed", &path).unwrap();

    assert_eq!(status, JobStatus::Failed);
    assert!(tail(&layout.job_log_path("odd", 0), 1).contains("unknown job kind"));
}

#[test]
fn unparseable_config_path_is_an_error() {
    let (_dir, _layout, store, registry) = setup();
    let err = run_job(
        &registry,
        &SharedStoreProvider::new(store),
        "marker",
        Path::new("/nowhere/config.json"),
    )
    .unwrap_err();
    assert!(matches!(err, RegistryError::BadConfigPath(_)));
}

#[test]
fn job_runner_executes_through_registry() {
    let (_dir, layout, store, registry) = setup();
    let config =
        JobConfig::builder().set(STORE_PATH_KEY, "memory").set("output_key", "runner").build();
    let path = write_config(&layout, "runner", config);
    let runner = JobRunner::new(Arc::new(registry), Arc::new(SharedStoreProvider::new(store)));

    assert_eq!(runner.execute("marker", &path), JobStatus::Success);
    assert_eq!(runner.execute("marker", Path::new("/bad/path")), JobStatus::Failed);
}
