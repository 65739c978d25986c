// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use yare::parameterized;

fn clear_env() {
    for name in ["CT_TMP_FOLDER", "CT_MAX_JOBS", "CT_BACKEND", "CT_POLL_INTERVAL_MS"] {
        std::env::remove_var(name);
    }
}

fn write(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("workflow.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn empty_file_yields_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = WorkflowConfig::load(&write(&dir, ""), &JobRegistry::builtin()).unwrap();
    assert_eq!(config, WorkflowConfig::default());
    assert_eq!(config.task("downscaling"), TaskSettings::default());
}

#[test]
#[serial]
fn sections_are_parsed_with_defaults_and_extras() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"
[global]
backend = "slurm"
block_shape = [32, 64, 64]
max_jobs = 100
partition = "gpu"

[tasks.downscaling]
mem_limit_gb = 4.5
retry = true
library = "vigra"

[workflow]
path = "/data/sample.n5"
label_scale = 2
"#,
    );

    let config = WorkflowConfig::load(&path, &JobRegistry::builtin()).unwrap();

    assert_eq!(config.global.backend, BackendKind::Slurm);
    assert_eq!(config.global.block_shape, [32, 64, 64]);
    assert_eq!(config.global.partition.as_deref(), Some("gpu"));
    assert_eq!(config.global.poll_interval_ms, 1000);
    let down = config.task("downscaling");
    assert_eq!(down.mem_limit_gb, 4.5);
    assert_eq!(down.threads_per_job, 1);
    assert!(down.retry);
    assert_eq!(down.extra.get("library"), Some(&Value::from("vigra")));
    assert_eq!(down.resources().mem_limit_mb(), 4608);
    assert_eq!(config.workflow.path, "/data/sample.n5");
    assert_eq!(config.workflow.label_scale, 2);
    assert_eq!(config.workflow.label_block_chunk, 10_000);
}

#[test]
#[serial]
fn unknown_task_section_is_rejected() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "[tasks.watershed]\nthreads_per_job = 4\n");
    let err = WorkflowConfig::load(&path, &JobRegistry::builtin()).unwrap_err();
    assert!(matches!(err, ConfigFileError::UnknownTaskType(kind) if kind == "watershed"));
}

#[test]
#[serial]
fn unknown_global_key_is_a_parse_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "[global]\nblock_size = [1, 2, 3]\n");
    let err = WorkflowConfig::load(&path, &JobRegistry::builtin()).unwrap_err();
    assert!(matches!(err, ConfigFileError::Parse { .. }));
}

#[test]
#[serial]
fn environment_overrides_file_values() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "[global]\nmax_jobs = 2\nbackend = \"local\"\n");
    std::env::set_var("CT_MAX_JOBS", "16");
    std::env::set_var("CT_BACKEND", "in_process");
    std::env::set_var("CT_TMP_FOLDER", "/scratch/tmp");

    let config = WorkflowConfig::load(&path, &JobRegistry::builtin());
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.global.max_jobs, 16);
    assert_eq!(config.global.backend, BackendKind::InProcess);
    assert_eq!(config.global.tmp_folder, PathBuf::from("/scratch/tmp"));
}

#[test]
#[serial]
fn bad_backend_in_environment_is_reported() {
    clear_env();
    std::env::set_var("CT_BACKEND", "kubernetes");
    let mut config = WorkflowConfig::default();
    let result = config.apply_env();
    clear_env();
    assert!(matches!(result, Err(ConfigFileError::UnknownBackend(name)) if name == "kubernetes"));
}

#[parameterized(
    local = { "local", BackendKind::Local },
    slurm = { "slurm", BackendKind::Slurm },
    lsf = { "lsf", BackendKind::Lsf },
    in_process = { "in_process", BackendKind::InProcess },
)]
fn backend_kind_round_trips_through_display(name: &str, kind: BackendKind) {
    assert_eq!(name.parse::<BackendKind>().unwrap(), kind);
    assert_eq!(kind.to_string(), name);
}

#[test]
fn default_config_lists_every_job_kind() {
    let registry = JobRegistry::builtin();
    let rendered = default_config_toml(&registry).unwrap();
    for kind in registry.kinds() {
        assert!(rendered.contains(&format!("[tasks.{}]", kind)), "{kind} missing:\n{rendered}");
    }
    let parsed: WorkflowConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.global, GlobalConfig::default());
    assert_eq!(parsed.task("upscaling"), TaskSettings::default());
}

#[test]
fn task_settings_flow_into_job_config() {
    let mut settings = TaskSettings { threads_per_job: 4, ..TaskSettings::default() };
    settings.extra.insert("sigma".to_string(), Value::from(2.0));
    let map = settings.to_config_map();
    assert_eq!(map.get("threads_per_job"), Some(&Value::from(4)));
    assert_eq!(map.get("sigma"), Some(&Value::from(2.0)));
    assert_eq!(map.get("time_limit_min"), Some(&Value::from(60)));
}

#[test]
fn run_settings_carry_global_values() {
    let mut config = WorkflowConfig::default();
    config.global.block_shape = [16, 32, 32];
    config.global.max_jobs = 3;
    config.global.timeout_s = Some(90);
    config.tasks.insert("downscaling".to_string(), TaskSettings { retry: true, ..TaskSettings::default() });

    let settings = config.run_settings();

    assert_eq!(settings.block_shape, [16, 32, 32]);
    assert_eq!(settings.max_jobs, 3);
    assert_eq!(settings.timeout, Some(Duration::from_secs(90)));
    assert!(settings.task("downscaling").retry);
    assert!(!settings.task("upscaling").retry);
}
