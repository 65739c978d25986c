// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text and JSON rendering of workflow reports and job statuses.

use crate::color;
use clap::ValueEnum;
use ct_core::{JobId, JobStatus};
use ct_engine::{TaskStatus, WorkflowReport};
use serde_json::{json, Value};
use std::path::PathBuf;

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Status of one job as read from its log file.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub job_id: JobId,
    pub status: JobStatus,
    pub log_path: PathBuf,
}

/// Renders as pretty JSON when `format` is `Json`, otherwise prints `text`.
pub fn text_or_json(format: OutputFormat, json: &Value, text: &str) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(json)?),
        OutputFormat::Text => print!("{}", text),
    }
    Ok(())
}

fn status_cell(status: &str, failed: bool) -> String {
    let padded = format!("{:<8}", status);
    if failed {
        color::failure(&padded)
    } else {
        color::context(&padded)
    }
}

pub fn report_text(workflow: &str, report: &WorkflowReport) -> String {
    let mut out = String::new();
    for (task, status) in &report.statuses {
        let cell = status_cell(&status.to_string(), *status == TaskStatus::Failed);
        out.push_str(&format!("{}  {}\n", cell, color::header(task)));
    }
    out.push_str(&format!(
        "\nworkflow {} succeeded ({} jobs submitted)\n",
        workflow, report.submitted_jobs
    ));
    out
}

pub fn report_json(workflow: &str, report: &WorkflowReport) -> Value {
    let statuses: serde_json::Map<String, Value> = report
        .statuses
        .iter()
        .map(|(task, status)| (task.clone(), Value::String(status.to_string())))
        .collect();
    json!({
        "workflow": workflow,
        "statuses": statuses,
        "submitted_jobs": report.submitted_jobs,
    })
}

pub fn jobs_text(task: &str, done: bool, rows: &[JobRow]) -> String {
    let state = if done { "done" } else { "not done" };
    let mut out = format!("{} ({})\n", color::header(task), state);
    for row in rows {
        let cell = status_cell(&row.status.to_string(), row.status == JobStatus::Failed);
        out.push_str(&format!("  {:>4}  {}  {}\n", row.job_id, cell, row.log_path.display()));
    }
    out
}

pub fn jobs_json(task: &str, done: bool, rows: &[JobRow]) -> Value {
    let jobs: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "job_id": row.job_id,
                "status": row.status.to_string(),
                "log_path": row.log_path.to_string_lossy(),
            })
        })
        .collect();
    json!({ "task": task, "done": done, "jobs": jobs })
}
