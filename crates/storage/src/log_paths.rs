// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layout of a workflow's tmp folder.
//!
//! ```text
//! <tmp>/config/<task>_job_<id>.config   serialized job config
//! <tmp>/logs/<task>_<id>.log            job log (status source of truth)
//! <tmp>/logs/<task>_<id>.{out,err}      captured process output
//! <tmp>/scripts/<task>[_<id>].sh        cluster submission scripts
//! <tmp>/tasks/<task>.log                task completion marker
//! ```

use ct_core::{config_file_name, parse_job_id, JobId};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    root: PathBuf,
}

impl LogLayout {
    pub fn new(tmp_folder: impl Into<PathBuf>) -> Self {
        Self { root: tmp_folder.into() }
    }

    /// Recover the layout, task name and job id from a config path.
    pub fn from_config_path(path: &Path) -> Option<(LogLayout, String, JobId)> {
        let job_id = parse_job_id(path)?;
        let file_name = path.file_name()?.to_str()?;
        let suffix = format!("_job_{}.config", job_id);
        let task = file_name.strip_suffix(&suffix)?;
        let root = path.parent()?.parent()?;
        Some((LogLayout::new(root), task.to_string(), job_id))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn config_path(&self, task: &str, job_id: JobId) -> PathBuf {
        self.config_dir().join(config_file_name(task, job_id))
    }

    pub fn job_log_path(&self, task: &str, job_id: JobId) -> PathBuf {
        self.logs_dir().join(format!("{}_{}.log", task, job_id))
    }

    pub fn stdout_path(&self, task: &str, job_id: JobId) -> PathBuf {
        self.logs_dir().join(format!("{}_{}.out", task, job_id))
    }

    pub fn stderr_path(&self, task: &str, job_id: JobId) -> PathBuf {
        self.logs_dir().join(format!("{}_{}.err", task, job_id))
    }

    pub fn job_script_path(&self, task: &str, job_id: JobId) -> PathBuf {
        self.scripts_dir().join(format!("{}_{}.sh", task, job_id))
    }

    /// Script of a whole array submission.
    pub fn array_script_path(&self, task: &str) -> PathBuf {
        self.scripts_dir().join(format!("{}.sh", task))
    }

    pub fn task_marker_path(&self, task: &str) -> PathBuf {
        self.tasks_dir().join(format!("{}.log", task))
    }

    /// Ids of the jobs of `task` that have a config file, ascending.
    pub fn config_job_ids(&self, task: &str) -> std::io::Result<Vec<JobId>> {
        let entries = match std::fs::read_dir(self.config_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            match Self::from_config_path(&path) {
                Some((_, name, job_id)) if name == task => ids.push(job_id),
                _ => {}
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Create every directory of the layout.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [self.config_dir(), self.logs_dir(), self.scripts_dir(), self.tasks_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "log_paths_tests.rs"]
mod tests;
