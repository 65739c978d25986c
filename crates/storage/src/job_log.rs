// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only job logs and task markers.
//!
//! A job's log file is the only source of its status. Every line has the form
//! `2026-01-30T08:14:09Z [job 3] <message>`; the job writes `started` first and
//! `success` (or `failed: <reason>`) as its very last action, so a success line
//! implies all of the job's output is in the store.

use crate::log_paths::LogLayout;
use ct_core::{JobId, JobStatus};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const STARTED: &str = "started";
const SUCCESS: &str = "success";
const FAILED_PREFIX: &str = "failed:";
const TASK_DONE: &str = "done";

/// Current UTC time as `2026-01-30T08:14:09Z`.
pub fn format_utc_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn append_line(path: &Path, tag: &str, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let message = message.replace('\n', " ");
    writeln!(file, "{} [{}] {}", format_utc_now(), tag, message)
}

/// Message part of a log line (everything after the `[tag] `).
fn message_of(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once("] ")?;
    Some(rest)
}

/// Append-only logger for one job.
///
/// Each `append()` call opens, writes, and closes the file.
pub struct JobLogger {
    path: PathBuf,
    job_id: JobId,
}

impl JobLogger {
    pub fn new(layout: &LogLayout, task: &str, job_id: JobId) -> Self {
        Self { path: layout.job_log_path(task, job_id), job_id }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a free-form progress line.
    ///
    /// Failures are logged via tracing but do not propagate; logging must not
    /// break the job.
    pub fn append(&self, message: &str) {
        let tag = format!("job {}", self.job_id);
        if let Err(e) = append_line(&self.path, &tag, message) {
            tracing::warn!(
                job_id = self.job_id,
                path = %self.path.display(),
                error = %e,
                "failed to write job log"
            );
        }
    }

    pub fn started(&self) {
        self.append(STARTED);
    }

    /// Mark the job successful. Must be the job's last action.
    pub fn success(&self) {
        self.append(SUCCESS);
    }

    pub fn failure(&self, reason: &str) {
        self.append(&format!("{} {}", FAILED_PREFIX, reason));
    }

    /// Move an existing log aside before the job is resubmitted.
    ///
    /// The previous attempt is kept as `<name>.log.1`.
    pub fn rotate(&self) {
        if !self.path.exists() {
            return;
        }
        let rotated = self.path.with_extension("log.1");
        if let Err(e) = fs::rename(&self.path, &rotated) {
            tracing::warn!(job_id = self.job_id, error = %e, "failed to rotate job log");
        }
    }
}

/// Status of a job derived from its log file alone.
///
/// Absent file ⇒ `Pending`; any line ⇒ `Running`; the last terminal line
/// decides between `Success` and `Failed`.
pub fn read_status(path: &Path) -> JobStatus {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return JobStatus::Pending,
    };
    let mut status = JobStatus::Pending;
    for line in content.lines() {
        let Some(message) = message_of(line) else {
            continue;
        };
        if message == SUCCESS {
            status = JobStatus::Success;
        } else if message.starts_with(FAILED_PREFIX) {
            status = JobStatus::Failed;
        } else if !status.is_terminal() {
            status = JobStatus::Running;
        }
    }
    status
}

/// The last `n` lines of a log file, or an empty string if it is unreadable.
pub fn tail(path: &Path, n: usize) -> String {
    let Ok(content) = fs::read_to_string(path) else {
        return String::new();
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Completion marker of a task, written once all of its jobs succeeded.
pub struct TaskMarker {
    path: PathBuf,
    task: String,
}

impl TaskMarker {
    pub fn new(layout: &LogLayout, task: &str) -> Self {
        Self { path: layout.task_marker_path(task), task: task.to_string() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_done(&self) -> bool {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return false;
        };
        content
            .lines()
            .filter_map(message_of)
            .any(|message| message.split_whitespace().next() == Some(TASK_DONE))
    }

    pub fn mark_done(&self, n_jobs: usize) -> std::io::Result<()> {
        append_line(&self.path, &self.task, &format!("{} ({} jobs)", TASK_DONE, n_jobs))
    }

    /// Remove the marker so the task runs again.
    pub fn clear(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "job_log_tests.rs"]
mod tests;
