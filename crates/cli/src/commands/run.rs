// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ct run`: plan and run the conversion workflow of a config file.

use crate::exit_error::ExitError;
use crate::output::{report_json, report_text, text_or_json, OutputFormat};
use anyhow::{bail, Context};
use clap::Args;
use ct_engine::{
    ConversionWorkflow, JobRegistry, JobRunner, RunContext, WorkflowConfig, WorkflowError,
};
use ct_storage::{tail, LogLayout, N5Provider, N5Store, VolumeStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Log lines shown for a failed job.
const FAILURE_TAIL_LINES: usize = 5;

#[derive(Args)]
pub struct RunArgs {
    /// Workflow configuration file
    #[arg(long, short)]
    pub config: PathBuf,
    #[arg(long = "output", short = 'o', value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub async fn handle(args: RunArgs) -> anyhow::Result<()> {
    let registry = Arc::new(JobRegistry::builtin());
    let config = WorkflowConfig::load(&args.config, &registry)?;
    let settings = &config.workflow;
    if settings.path.is_empty() {
        bail!("[workflow] path is not set in {}", args.config.display());
    }

    let store: Arc<dyn VolumeStore> = Arc::new(
        N5Store::open(settings.path.as_str())
            .with_context(|| format!("failed to open container {}", settings.path))?,
    );
    let runner = Arc::new(JobRunner::new(Arc::clone(&registry), Arc::new(N5Provider)));
    let backend = config.global.build_backend(runner)?;
    let layout = LogLayout::new(&config.global.tmp_folder);

    let workflow = ConversionWorkflow::plan(settings, store.as_ref())?.into_workflow();
    workflow.validate(&registry)?;
    tracing::info!(
        workflow = workflow.name(),
        backend = %config.global.backend,
        tmp_folder = %config.global.tmp_folder.display(),
        "starting run"
    );

    let ctx = RunContext::new(backend, store, layout, config.run_settings());
    match workflow.run(&ctx).await {
        Ok(report) => text_or_json(
            args.format,
            &report_json(workflow.name(), &report),
            &report_text(workflow.name(), &report),
        ),
        Err(error) => Err(ExitError::new(1, failure_message(&error)).into()),
    }
}

fn failure_message(error: &WorkflowError) -> String {
    let WorkflowError::TaskFailed { failed_task, log_path, source, .. } = error else {
        return error.to_string();
    };
    let mut message = format!("workflow failed at task {}: {}", failed_task, source.root_cause());
    if let Some(path) = log_path {
        let lines = tail(path, FAILURE_TAIL_LINES);
        if !lines.is_empty() {
            message.push('\n');
            message.push_str(&lines);
        }
    }
    message
}
