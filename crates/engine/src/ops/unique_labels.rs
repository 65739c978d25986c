// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sorted unique label ids of every block, one varlength chunk per block.

use super::volume;
use crate::error::{JobError, OpError};
use crate::registry::JobContext;
use crate::task::{Operation, OutputState, TaskContext};
use ct_core::{Blocking, JobConfig};
use ct_storage::{DatasetMeta, Roi};

pub(super) const KIND: &str = "unique_block_labels";

#[derive(Debug, Clone)]
pub struct UniqueBlockLabels {
    input_key: String,
    output_key: String,
}

impl UniqueBlockLabels {
    pub fn new(input_key: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self { input_key: input_key.into(), output_key: output_key.into() }
    }

    fn blocking(&self, ctx: &TaskContext<'_>) -> Result<Blocking, OpError> {
        let (_, shape) = volume(ctx.store(), &self.input_key)?;
        Ok(Blocking::new(shape, ctx.block_shape())?)
    }
}

impl Operation for UniqueBlockLabels {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn n_required_jobs(&self, ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        Ok(ctx.n_block_jobs(self.blocking(ctx)?.n_blocks()))
    }

    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError> {
        let n_blocks = self.blocking(ctx)?.n_blocks();
        let base = ctx
            .base_config()
            .with("input_key", self.input_key.as_str())
            .with("output_key", self.output_key.as_str());
        Ok(ctx.block_configs(n_blocks, &base))
    }

    /// The output mirrors the input's shape with one chunk per block.
    fn prepare(&self, ctx: &TaskContext<'_>) -> Result<(), OpError> {
        let blocking = self.blocking(ctx)?;
        let meta = DatasetMeta::uint64(blocking.shape().to_vec(), ctx.block_shape().to_vec());
        ctx.store().require_dataset(&self.output_key, &meta)?;
        Ok(())
    }

    fn verify_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        let Some(meta) = ctx.store().dataset_meta(&self.output_key)? else {
            return Ok(OutputState::Malformed(format!("{} is missing", self.output_key)));
        };
        if meta.chunks != ctx.block_shape() {
            return Ok(OutputState::Malformed(format!(
                "{} has chunks {:?}, blocks are {:?}",
                self.output_key,
                meta.chunks,
                ctx.block_shape()
            )));
        }
        Ok(OutputState::Complete)
    }
}

pub(super) fn job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let input_key = ctx.config.str("input_key")?;
    let output_key = ctx.config.str("output_key")?;
    let block_shape = ctx.config.shape("block_shape")?;
    let (_, shape) = volume(ctx.store, input_key)?;
    let blocking = Blocking::new(shape, block_shape)?;

    let range = ctx.config.block_range()?;
    for id in range.clone() {
        let block = blocking.block(id)?;
        let data = ctx.store.read(input_key, &Roi::from(block))?;
        let mut labels: Vec<u64> = data.iter().copied().collect();
        labels.sort_unstable();
        labels.dedup();
        let position = blocking.grid_position(id)?;
        ctx.store.write_varlen(output_key, &position, &labels)?;
    }
    ctx.log(&format!("unique labels of blocks {:?}", range));
    Ok(())
}

#[cfg(test)]
#[path = "unique_labels_tests.rs"]
mod tests;
