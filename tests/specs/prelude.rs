// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ct_adapters::InProcessBackend;
use ct_core::{JobId, JobStatus, Shape};
use ct_engine::{JobRegistry, JobRunner, RunContext, RunSettings};
use ct_storage::{read_status, LogLayout, MemoryVolumeStore, SharedStoreProvider};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Harness {
    _dir: TempDir,
    pub layout: LogLayout,
    pub store: Arc<MemoryVolumeStore>,
    registry: Arc<JobRegistry>,
    settings: RunSettings,
}

impl Harness {
    pub fn new(registry: JobRegistry, block_shape: Shape, max_jobs: usize) -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            layout: LogLayout::new(dir.path()),
            _dir: dir,
            store: Arc::new(MemoryVolumeStore::default()),
            registry: Arc::new(registry),
            settings: RunSettings::default()
                .block_shape(block_shape)
                .max_jobs(max_jobs)
                .timeout(Duration::from_secs(60)),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// A fresh run over the same store and log folder.
    pub fn context(&self) -> RunContext {
        let provider = Arc::new(SharedStoreProvider::new(self.store.clone()));
        let runner = Arc::new(JobRunner::new(Arc::clone(&self.registry), provider));
        let max_jobs = self.settings.max_jobs;
        let backend = Arc::new(InProcessBackend::new(runner, max_jobs, Duration::from_millis(2)));
        RunContext::new(backend, self.store.clone(), self.layout.clone(), self.settings.clone())
    }

    /// `(task, job id)` of every job log, sorted, with its status.
    pub fn job_logs(&self) -> Vec<(String, JobId, JobStatus)> {
        let mut logs: Vec<(String, JobId, JobStatus)> = std::fs::read_dir(self.layout.logs_dir())
            .unwrap()
            .filter_map(|entry| {
                let path = entry.unwrap().path();
                let stem = path.file_name()?.to_str()?.strip_suffix(".log")?.to_string();
                let (task, id) = stem.rsplit_once('_')?;
                Some((task.to_string(), id.parse().ok()?, read_status(&path)))
            })
            .collect();
        logs.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        logs
    }
}
