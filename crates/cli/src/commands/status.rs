// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ct status`: job statuses of one task, read from the job logs.

use crate::output::{jobs_json, jobs_text, text_or_json, JobRow, OutputFormat};
use anyhow::Context;
use clap::Args;
use ct_core::JobId;
use ct_engine::{JobRegistry, WorkflowConfig};
use ct_storage::{read_status, LogLayout, TaskMarker};
use std::path::PathBuf;

#[derive(Args)]
pub struct StatusArgs {
    /// Workflow configuration file
    #[arg(long, short)]
    pub config: PathBuf,
    /// Task name, e.g. `downscaling_s1`
    #[arg(long, short)]
    pub task: String,
    /// Number of jobs of the task; defaults to the jobs with a config file
    #[arg(long, short)]
    pub jobs: Option<JobId>,
    #[arg(long = "output", short = 'o', value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub fn handle(args: StatusArgs) -> anyhow::Result<()> {
    let config = WorkflowConfig::load(&args.config, &JobRegistry::builtin())?;
    let layout = LogLayout::new(&config.global.tmp_folder);
    let job_ids: Vec<JobId> = match args.jobs {
        Some(n_jobs) => (0..n_jobs).collect(),
        None => layout.config_job_ids(&args.task).with_context(|| {
            format!("failed to list job configs in {}", layout.config_dir().display())
        })?,
    };
    let rows: Vec<JobRow> = job_ids
        .into_iter()
        .map(|job_id| {
            let log_path = layout.job_log_path(&args.task, job_id);
            JobRow { job_id, status: read_status(&log_path), log_path }
        })
        .collect();
    let done = TaskMarker::new(&layout, &args.task).is_done();

    text_or_json(
        args.format,
        &jobs_json(&args.task, done, &rows),
        &jobs_text(&args.task, done, &rows),
    )
}
