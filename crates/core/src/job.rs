// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job status state machine and serialized job configuration.

use crate::blocking::Shape;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Integer id of a job within one task (`0..n_jobs`).
pub type JobId = u32;

/// Lifecycle state of a single job.
///
/// Observed externally from the job's log file; transitions only move forward:
/// `Pending → Running → {Success | Failed}`. A job that dies before logging
/// anything may go straight from `Pending` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Failed) | (Running, Success) | (Running, Failed)
        )
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
    }
}

/// Errors reading values out of a [`JobConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing config key `{0}`")]
    Missing(String),
    #[error("config key `{key}` has the wrong type: expected {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("failed to access job config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid job config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable key → value configuration of one job.
///
/// Built once by the owning task, written to disk once, and read back by the
/// job process. There is no mutating API: derive a new config with
/// [`JobConfig::with`] instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobConfig(Map<String, Value>);

impl JobConfig {
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder::default()
    }

    /// Copy of this config with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> JobConfig {
        let mut values = self.0.clone();
        values.insert(key.into(), value.into());
        JobConfig(values)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn require(&self, key: &str) -> Result<&Value, ConfigError> {
        self.0.get(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
        ConfigError::WrongType { key: key.to_string(), expected }
    }

    pub fn str(&self, key: &str) -> Result<&str, ConfigError> {
        self.require(key)?.as_str().ok_or_else(|| Self::wrong_type(key, "string"))
    }

    pub fn u64(&self, key: &str) -> Result<u64, ConfigError> {
        self.require(key)?.as_u64().ok_or_else(|| Self::wrong_type(key, "unsigned integer"))
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.0.get(key) {
            Some(_) => self.u64(key),
            None => Ok(default),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        match self.0.get(key) {
            Some(v) => v.as_f64().ok_or_else(|| Self::wrong_type(key, "number")),
            None => Ok(default),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.0.get(key) {
            Some(v) => v.as_bool().ok_or_else(|| Self::wrong_type(key, "boolean")),
            None => Ok(default),
        }
    }

    /// A `[z, y, x]` triple of unsigned integers.
    pub fn shape(&self, key: &str) -> Result<Shape, ConfigError> {
        let list = self.u64_list(key)?;
        <Shape>::try_from(list.as_slice()).map_err(|_| Self::wrong_type(key, "list of 3 integers"))
    }

    pub fn u64_list(&self, key: &str) -> Result<Vec<u64>, ConfigError> {
        let array = self.require(key)?.as_array().ok_or_else(|| Self::wrong_type(key, "list"))?;
        array
            .iter()
            .map(|v| v.as_u64().ok_or_else(|| Self::wrong_type(key, "list of integers")))
            .collect()
    }

    /// Contiguous id range assigned to this job (`block_begin..block_end`).
    pub fn block_range(&self) -> Result<Range<usize>, ConfigError> {
        let begin = self.u64("block_begin")? as usize;
        let end = self.u64("block_end")? as usize;
        Ok(begin..end)
    }

    /// Deserialize a structured value.
    pub fn parse<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.require(key)?.clone();
        serde_json::from_value(value).map_err(|_| Self::wrong_type(key, std::any::type_name::<T>()))
    }

    /// Write the config as JSON, atomically replacing any previous file.
    pub fn write_atomic(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.0)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        let tmp_path = path.with_extension("config.tmp");
        std::fs::write(&tmp_path, json.as_bytes()).map_err(io_err)?;
        std::fs::rename(&tmp_path, path).map_err(io_err)
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

/// Builder for [`JobConfig`].
#[derive(Debug, Default)]
pub struct JobConfigBuilder {
    values: Map<String, Value>,
}

impl JobConfigBuilder {
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Merge all entries of `other`, overwriting existing keys.
    pub fn merge(mut self, other: &Map<String, Value>) -> Self {
        for (k, v) in other {
            self.values.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn build(self) -> JobConfig {
        JobConfig(self.values)
    }
}

/// Resource hints carried in a job config and honoured by cluster backends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub threads: u32,
    pub mem_limit_gb: f64,
    pub time_limit_min: u64,
}

impl Default for Resources {
    fn default() -> Self {
        Self { threads: 1, mem_limit_gb: 1.0, time_limit_min: 60 }
    }
}

impl Resources {
    pub fn from_config(config: &JobConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            threads: config.u64_or("threads_per_job", defaults.threads as u64)? as u32,
            mem_limit_gb: config.f64_or("mem_limit_gb", defaults.mem_limit_gb)?,
            time_limit_min: config.u64_or("time_limit_min", defaults.time_limit_min)?,
        })
    }

    /// Memory limit in whole megabytes.
    pub fn mem_limit_mb(&self) -> u64 {
        (self.mem_limit_gb * 1024.0).ceil() as u64
    }
}

/// File name of the serialized config of job `job_id` of `task`.
pub fn config_file_name(task: &str, job_id: JobId) -> String {
    format!("{}_job_{}.config", task, job_id)
}

/// Recover the job id from a config file path written by [`config_file_name`].
pub fn parse_job_id(path: &Path) -> Option<JobId> {
    let stem = path.file_name()?.to_str()?.split('.').next()?;
    stem.rsplit('_').next()?.parse().ok()
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
