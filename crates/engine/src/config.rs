// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow configuration file.
//!
//! A TOML document with a `[global]` section (backend choice, tmp folder,
//! block shape, resource defaults), one optional `[tasks.<kind>]` section per
//! job kind, and a `[workflow]` section with the conversion parameters. Every
//! key has a default; unknown task sections are rejected.

use crate::env;
use crate::registry::JobRegistry;
use crate::runner::JobRunner;
use crate::task::RunSettings;
use ct_adapters::{
    Backend, ClusterConfig, InProcessBackend, LocalBackend, LocalConfig, LsfBackend, SlurmBackend,
};
use ct_core::{Resources, Shape};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown task section [tasks.{0}]")]
    UnknownTaskType(String),
    #[error("unknown backend `{0}` (expected local, slurm, lsf or in_process)")]
    UnknownBackend(String),
    #[error("cannot locate the job executable: {0}")]
    NoExecutable(std::io::Error),
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Local,
    Slurm,
    Lsf,
    InProcess,
}

impl FromStr for BackendKind {
    type Err = ConfigFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(BackendKind::Local),
            "slurm" => Ok(BackendKind::Slurm),
            "lsf" => Ok(BackendKind::Lsf),
            "in_process" | "inprocess" => Ok(BackendKind::InProcess),
            other => Err(ConfigFileError::UnknownBackend(other.to_string())),
        }
    }
}

ct_core::simple_display! {
    BackendKind {
        Local => "local",
        Slurm => "slurm",
        Lsf => "lsf",
        InProcess => "in_process",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    pub backend: BackendKind,
    pub tmp_folder: PathBuf,
    /// Block shape in `[z, y, x]`.
    pub block_shape: Shape,
    pub max_jobs: usize,
    /// Binary used for `run-job`; defaults to the running executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_executable: Option<PathBuf>,
    pub poll_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_s: Option<u64>,
    /// Slurm partition or LSF queue.
    #[serde(skip_serializing_if = "Option::is_none", alias = "queue")]
    pub partition: Option<String>,
    pub submit_timeout_s: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            tmp_folder: PathBuf::from("tmp"),
            block_shape: [64, 64, 64],
            max_jobs: 8,
            job_executable: None,
            poll_interval_ms: 1000,
            timeout_s: None,
            partition: None,
            submit_timeout_s: 60,
        }
    }
}

impl GlobalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_s.map(Duration::from_secs)
    }

    fn executable(&self) -> Result<PathBuf, ConfigFileError> {
        match &self.job_executable {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().map_err(ConfigFileError::NoExecutable),
        }
    }

    /// Build the configured backend.
    ///
    /// `runner` executes jobs when the backend is `in_process`.
    pub fn build_backend(&self, runner: Arc<JobRunner>) -> Result<Arc<dyn Backend>, ConfigFileError> {
        let backend: Arc<dyn Backend> = match self.backend {
            BackendKind::InProcess => {
                Arc::new(InProcessBackend::new(runner, self.max_jobs, self.poll_interval()))
            }
            BackendKind::Local => Arc::new(LocalBackend::new(LocalConfig {
                executable: self.executable()?,
                max_jobs: self.max_jobs,
                poll_interval: self.poll_interval(),
            })),
            BackendKind::Slurm => Arc::new(SlurmBackend::new(self.cluster_config()?)),
            BackendKind::Lsf => Arc::new(LsfBackend::new(self.cluster_config()?)),
        };
        Ok(backend)
    }

    fn cluster_config(&self) -> Result<ClusterConfig, ConfigFileError> {
        Ok(ClusterConfig {
            executable: self.executable()?,
            partition: self.partition.clone(),
            poll_interval: self.poll_interval(),
            submit_timeout: Duration::from_secs(self.submit_timeout_s),
            submit_program: None,
        })
    }
}

/// Settings of one task type, merged into each of its job configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub threads_per_job: u32,
    pub mem_limit_gb: f64,
    pub time_limit_min: u64,
    /// Resubmit failed jobs once before failing the task.
    pub retry: bool,
    /// Task-specific keys, passed through to the job config.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TaskSettings {
    fn default() -> Self {
        let resources = Resources::default();
        Self {
            threads_per_job: resources.threads,
            mem_limit_gb: resources.mem_limit_gb,
            time_limit_min: resources.time_limit_min,
            retry: false,
            extra: Map::new(),
        }
    }
}

impl TaskSettings {
    pub fn resources(&self) -> Resources {
        Resources {
            threads: self.threads_per_job,
            mem_limit_gb: self.mem_limit_gb,
            time_limit_min: self.time_limit_min,
        }
    }

    /// Job config entries for these settings.
    pub fn to_config_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert("threads_per_job".into(), self.threads_per_job.into());
        map.insert("mem_limit_gb".into(), self.mem_limit_gb.into());
        map.insert("time_limit_min".into(), self.time_limit_min.into());
        map
    }
}

/// Parameters of the label conversion workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionSettings {
    /// N5 container holding raw data, input labels and the output group.
    pub path: String,
    /// Multiscale group of the raw data (`s0`, `s1`, ...).
    pub raw_key: String,
    pub label_in_key: String,
    pub label_out_key: String,
    /// Raw scale level the input labels live at.
    pub label_scale: usize,
    /// Optional fragment to segment assignment (empty for none).
    pub assignment_key: String,
    /// Voxel size in `[z, y, x]`.
    pub resolution: [f64; 3],
    pub offset: [f64; 3],
    pub use_label_multiset: bool,
    /// Number of label ids per label-to-block chunk.
    pub label_block_chunk: u64,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            raw_key: "volumes/raw".to_string(),
            label_in_key: "volumes/labels".to_string(),
            label_out_key: "volumes/paintera".to_string(),
            label_scale: 0,
            assignment_key: String::new(),
            resolution: [1.0; 3],
            offset: [0.0; 3],
            use_label_multiset: false,
            label_block_chunk: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    pub global: GlobalConfig,
    pub tasks: BTreeMap<String, TaskSettings>,
    pub workflow: ConversionSettings,
}

impl WorkflowConfig {
    /// Load a config file, apply environment overrides and validate task
    /// sections against `registry`.
    pub fn load(path: &Path, registry: &JobRegistry) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigFileError::Io { path: path.to_path_buf(), source })?;
        let mut config: WorkflowConfig = toml::from_str(&content)
            .map_err(|source| ConfigFileError::Parse { path: path.to_path_buf(), source })?;
        config.apply_env()?;
        config.validate(registry)?;
        Ok(config)
    }

    /// Overlay `CT_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigFileError> {
        if let Some(dir) = env::tmp_folder() {
            self.global.tmp_folder = dir;
        }
        if let Some(n) = env::max_jobs() {
            self.global.max_jobs = n;
        }
        if let Some(name) = env::backend() {
            self.global.backend = name.parse()?;
        }
        if let Some(interval) = env::poll_interval() {
            self.global.poll_interval_ms = interval.as_millis() as u64;
        }
        Ok(())
    }

    pub fn validate(&self, registry: &JobRegistry) -> Result<(), ConfigFileError> {
        match self.tasks.keys().find(|kind| !registry.contains(kind)) {
            Some(kind) => Err(ConfigFileError::UnknownTaskType(kind.clone())),
            None => Ok(()),
        }
    }

    /// Settings of a task type, defaulted when the section is absent.
    pub fn task(&self, kind: &str) -> TaskSettings {
        self.tasks.get(kind).cloned().unwrap_or_default()
    }

    pub fn run_settings(&self) -> RunSettings {
        let settings = RunSettings::default()
            .block_shape(self.global.block_shape)
            .max_jobs(self.global.max_jobs)
            .tasks(self.tasks.clone());
        match self.global.timeout() {
            Some(timeout) => settings.timeout(timeout),
            None => settings,
        }
    }
}

/// The default configuration as TOML, with one section per job kind.
pub fn default_config_toml(registry: &JobRegistry) -> Result<String, ConfigFileError> {
    let config = WorkflowConfig {
        tasks: registry.kinds().map(|kind| (kind.to_string(), TaskSettings::default())).collect(),
        ..WorkflowConfig::default()
    };
    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
