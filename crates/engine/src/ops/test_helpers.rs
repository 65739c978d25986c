// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs operations through the in-process backend against a memory store.

use crate::error::TaskError;
use crate::registry::JobRegistry;
use crate::runner::JobRunner;
use crate::task::{Operation, RunContext, RunSettings, Task, TaskOutcome};
use ct_adapters::InProcessBackend;
use ct_core::Shape;
use ct_storage::{LogLayout, MemoryVolumeStore, SharedStoreProvider, VolumeStore};
use ndarray::{ArrayD, IxDyn};
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct OpHarness {
    _dir: tempfile::TempDir,
    pub store: Arc<MemoryVolumeStore>,
    pub ctx: RunContext,
}

impl OpHarness {
    pub fn new(block_shape: Shape, max_jobs: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryVolumeStore::default());
        let provider = Arc::new(SharedStoreProvider::new(store.clone()));
        let runner = Arc::new(JobRunner::new(Arc::new(JobRegistry::builtin()), provider));
        let backend = Arc::new(InProcessBackend::new(runner, max_jobs, Duration::from_millis(2)));
        let settings = RunSettings::default()
            .block_shape(block_shape)
            .max_jobs(max_jobs)
            .timeout(Duration::from_secs(60));
        let ctx = RunContext::new(backend, store.clone(), LogLayout::new(dir.path()), settings);
        Self { _dir: dir, store, ctx }
    }

    pub async fn run(
        &self,
        name: &str,
        operation: impl Operation + 'static,
    ) -> Result<TaskOutcome, TaskError> {
        Task::builder(name, operation).build().resolve(&self.ctx).await
    }

    /// Write a whole 3D dataset with chunks of `chunks`.
    pub fn put(&self, key: &str, chunks: Shape, data: &ArrayD<u64>) {
        self.store.write_dataset(key, chunks.to_vec(), data.view()).unwrap();
    }
}

/// 3D array with voxel values from `f(z, y, x)`.
pub(crate) fn volume_from(shape: Shape, f: impl Fn(usize, usize, usize) -> u64) -> ArrayD<u64> {
    let dims: Vec<usize> = shape.iter().map(|&s| s as usize).collect();
    ArrayD::from_shape_fn(IxDyn(&dims), |idx| f(idx[0], idx[1], idx[2]))
}
