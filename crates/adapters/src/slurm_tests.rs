// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ct_core::Resources;
use ct_storage::LogLayout;
use std::path::PathBuf;

fn config(partition: Option<&str>) -> ClusterConfig {
    ClusterConfig {
        executable: PathBuf::from("/opt/ct/bin/ct"),
        partition: partition.map(str::to_string),
        poll_interval: Duration::from_secs(10),
        submit_timeout: Duration::from_secs(60),
        submit_program: None,
    }
}

fn batch(job_ids: Vec<JobId>) -> SubmitBatch {
    SubmitBatch {
        task_name: "downscaling_s2".to_string(),
        kind: "downscaling".to_string(),
        job_ids,
        resources: Resources { threads: 4, mem_limit_gb: 2.0, time_limit_min: 90 },
        layout: LogLayout::new("/scratch/tmp"),
    }
}

#[yare::parameterized(
    single     = { vec![3],                "3" },
    contiguous = { vec![0, 1, 2, 3],       "0-3" },
    mixed      = { vec![0, 1, 2, 5, 7, 8], "0-2,5,7-8" },
    unsorted   = { vec![4, 2, 3, 2],       "2-4" },
)]
fn compacts_array_spec(ids: Vec<JobId>, expected: &str) {
    assert_eq!(array_spec(&ids), expected);
}

#[test]
fn script_carries_resources_and_selects_config() {
    let script = array_script(&batch((0..8).collect()), &config(Some("gpu")));
    let expected = [
        "#SBATCH --job-name=downscaling_s2",
        "#SBATCH --array=0-7",
        "#SBATCH --cpus-per-task=4",
        "#SBATCH --mem=2048M",
        "#SBATCH --time=90",
        "#SBATCH --partition=gpu",
        "exec /opt/ct/bin/ct run-job downscaling /scratch/tmp/config/downscaling_s2_job_${SLURM_ARRAY_TASK_ID}.config",
    ];
    for line in expected {
        assert!(script.lines().any(|l| l == line), "missing {:?} in\n{}", line, script);
    }
    assert!(!script.contains("--output"));
}

#[test]
fn script_quotes_paths_with_shell_metacharacters() {
    let mut batch = batch(vec![0, 1]);
    batch.layout = LogLayout::new("/scratch/my tmp/$USER");
    let config = ClusterConfig {
        executable: PathBuf::from("/opt/ct tools/ct"),
        ..config(None)
    };
    let script = array_script(&batch, &config);

    let exec = script.lines().find(|l| l.starts_with("exec ")).unwrap();
    assert_eq!(
        exec,
        "exec '/opt/ct tools/ct' run-job downscaling \
         '/scratch/my tmp/$USER/config/downscaling_s2_job_'${SLURM_ARRAY_TASK_ID}.config"
    );
}

#[test]
fn log_paths_are_passed_as_single_arguments() {
    let mut batch = batch(vec![0, 1]);
    batch.layout = LogLayout::new("/scratch/my tmp/$USER");
    let args = sbatch_args(&batch, Path::new("/scratch/my tmp/$USER/downscaling_s2.sh"));
    assert_eq!(
        args,
        vec![
            "--parsable".to_string(),
            "--output=/scratch/my tmp/$USER/logs/downscaling_s2_%a.out".to_string(),
            "--error=/scratch/my tmp/$USER/logs/downscaling_s2_%a.err".to_string(),
            "/scratch/my tmp/$USER/downscaling_s2.sh".to_string(),
        ]
    );
}

#[test]
fn partition_is_optional() {
    let script = array_script(&batch(vec![0]), &config(None));
    assert!(!script.contains("--partition"));
}

#[yare::parameterized(
    plain   = { "12345\n",          Some("12345") },
    cluster = { "12345;cluster1\n", Some("12345") },
    garbage = { "Submitted batch",  None },
    empty   = { "",                 None },
)]
fn parses_sbatch_output(stdout: &str, expected: Option<&str>) {
    assert_eq!(parse_sbatch_output(stdout).as_deref(), expected);
}

#[tokio::test]
#[serial_test::serial]
async fn submit_runs_configured_program() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let fake_sbatch = dir.path().join("sbatch");
    std::fs::write(&fake_sbatch, "#!/bin/sh\necho 777\n").unwrap();
    std::fs::set_permissions(&fake_sbatch, std::fs::Permissions::from_mode(0o755)).unwrap();

    let backend = SlurmBackend::new(ClusterConfig {
        submit_program: Some(fake_sbatch),
        ..config(None)
    });
    let mut batch = batch(vec![0, 1]);
    batch.layout = LogLayout::new(dir.path().join("tmp"));
    let handle = backend.submit(batch.clone()).await.unwrap();

    assert_eq!(handle.external_ids, vec!["777".to_string()]);
    assert!(batch.layout.array_script_path("downscaling_s2").exists());
}
