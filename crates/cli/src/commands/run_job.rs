// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ct run-job`: entry point of one job, invoked by the backends.

use crate::exit_error::ExitError;
use clap::Args;
use ct_core::JobStatus;
use ct_engine::{run_job, JobRegistry};
use ct_storage::N5Provider;
use std::path::PathBuf;

#[derive(Args)]
pub struct RunJobArgs {
    /// Registered job kind
    pub kind: String,
    /// Job config written by the orchestrator (`<task>_job_<id>.config`)
    pub config_path: PathBuf,
}

pub fn handle(args: RunJobArgs) -> anyhow::Result<()> {
    let registry = JobRegistry::builtin();
    match run_job(&registry, &N5Provider, &args.kind, &args.config_path)? {
        JobStatus::Success => Ok(()),
        status => Err(ExitError::new(
            1,
            format!("job {} ended as {}", args.config_path.display(), status),
        )
        .into()),
    }
}
