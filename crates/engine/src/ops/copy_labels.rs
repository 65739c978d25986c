// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialise the input labeling as the reference scale of the output group.

use super::{volume, MAX_ID_ATTR};
use crate::error::{JobError, OpError};
use crate::registry::JobContext;
use crate::task::{Operation, OutputState, TaskContext};
use ct_core::{Blocking, JobConfig};
use ct_storage::{DatasetMeta, Roi};

pub(super) const KIND: &str = "copy_labels";

#[derive(Debug, Clone)]
pub struct CopyLabels {
    input_key: String,
    output_key: String,
}

impl CopyLabels {
    pub fn new(input_key: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self { input_key: input_key.into(), output_key: output_key.into() }
    }

    fn blocking(&self, ctx: &TaskContext<'_>) -> Result<Blocking, OpError> {
        let (_, shape) = volume(ctx.store(), &self.input_key)?;
        Ok(Blocking::new(shape, ctx.block_shape())?)
    }
}

impl Operation for CopyLabels {
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

    fn prepare(&self, ctx: &TaskContext<'_>) -> Result<(), OpError> {
        let blocking = self.blocking(ctx)?;
        let meta = DatasetMeta::uint64(blocking.shape().to_vec(), ctx.block_shape().to_vec());
        ctx.store().require_dataset(&self.output_key, &meta)?;
        Ok(())
    }

    /// Labels placed at the output by the user carry their own `maxId` and
    /// are used as they are. Copies made by this task never set it.
    fn existing_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        let Some(existing) = ctx.store().dataset_meta(&self.output_key)? else {
            return Ok(OutputState::Missing);
        };
        let (input, _) = volume(ctx.store(), &self.input_key)?;
        if existing.shape != input.shape {
            return Ok(OutputState::Malformed(format!(
                "{} has shape {:?}, labels at {} have {:?}",
                self.output_key, existing.shape, self.input_key, input.shape
            )));
        }
        let attrs = ctx.store().get_attrs(&self.output_key)?;
        Ok(if attrs.contains_key(MAX_ID_ATTR) { OutputState::Complete } else { OutputState::Missing })
    }

    fn verify_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        let (input, _) = volume(ctx.store(), &self.input_key)?;
        match ctx.store().dataset_meta(&self.output_key)? {
            Some(meta) if meta.shape == input.shape => Ok(OutputState::Complete),
            Some(meta) => Ok(OutputState::Malformed(format!(
                "{} has shape {:?}, expected {:?}",
                self.output_key, meta.shape, input.shape
            ))),
            None => Ok(OutputState::Malformed(format!("{} is missing", self.output_key))),
        }
    }
}

pub(super) fn job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let input_key = ctx.config.str("input_key")?;
    let output_key = ctx.config.str("output_key")?;
    let (_, shape) = volume(ctx.store, input_key)?;
    let blocking = Blocking::new(shape, ctx.config.shape("block_shape")?)?;

    let range = ctx.config.block_range()?;
    for id in range.clone() {
        let block = blocking.block(id)?;
        let roi = Roi::from(block);
        let data = ctx.store.read(input_key, &roi)?;
        ctx.store.write(output_key, &roi.begin, data.view())?;
    }
    ctx.log(&format!("copied blocks {:?} to {}", range, output_key));
    Ok(())
}

#[cfg(test)]
#[path = "copy_labels_tests.rs"]
mod tests;
