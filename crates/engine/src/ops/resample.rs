// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Nearest-neighbour label resampling between adjacent scale levels.
//!
//! Jobs own disjoint ranges of output blocks. For every output block the job
//! reads the covering input region once and picks, per output voxel, the
//! input voxel its index maps to. Label values are never interpolated.

use super::volume;
use crate::aligner::Direction;
use crate::error::{JobError, OpError};
use crate::registry::JobContext;
use crate::task::{Operation, OutputState, TaskContext};
use ct_core::{BoundingBox, Blocking, JobConfig, Shape};
use ct_storage::{DatasetMeta, Roi};
use ndarray::{ArrayD, IxDyn};

pub(super) const DOWNSCALING: &str = "downscaling";
pub(super) const UPSCALING: &str = "upscaling";

#[derive(Debug, Clone)]
pub struct Resample {
    direction: Direction,
    input_key: String,
    output_key: String,
    factor: Shape,
    output_shape: Option<Shape>,
}

impl Resample {
    pub fn new(
        direction: Direction,
        input_key: impl Into<String>,
        output_key: impl Into<String>,
        factor: Shape,
    ) -> Self {
        Self {
            direction,
            input_key: input_key.into(),
            output_key: output_key.into(),
            factor,
            output_shape: None,
        }
    }

    /// Fix the output shape instead of deriving it from the input.
    ///
    /// Upsampling by `f` can overshoot the target level by up to `f - 1`
    /// voxels per axis; the target level's own shape wins.
    pub fn with_output_shape(mut self, shape: Shape) -> Self {
        self.output_shape = Some(shape);
        self
    }

    fn output_shape(&self, ctx: &TaskContext<'_>) -> Result<Shape, OpError> {
        if let Some(shape) = self.output_shape {
            return Ok(shape);
        }
        let (_, input) = volume(ctx.store(), &self.input_key)?;
        Ok(match self.direction {
            Direction::Downsample => std::array::from_fn(|d| input[d].div_ceil(self.factor[d])),
            Direction::Upsample => std::array::from_fn(|d| input[d] * self.factor[d]),
        })
    }

    fn blocking(&self, ctx: &TaskContext<'_>) -> Result<Blocking, OpError> {
        if self.factor.contains(&0) {
            return Err(OpError::Invalid(format!("scale factor {:?} must be positive", self.factor)));
        }
        Ok(Blocking::new(self.output_shape(ctx)?, ctx.block_shape())?)
    }
}

impl Operation for Resample {
    fn kind(&self) -> &'static str {
        match self.direction {
            Direction::Downsample => DOWNSCALING,
            Direction::Upsample => UPSCALING,
        }
    }

    fn n_required_jobs(&self, ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        Ok(ctx.n_block_jobs(self.blocking(ctx)?.n_blocks()))
    }

    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError> {
        let blocking = self.blocking(ctx)?;
        let base = ctx
            .base_config()
            .with("input_key", self.input_key.as_str())
            .with("output_key", self.output_key.as_str())
            .with("scale_factor", self.factor.to_vec());
        Ok(ctx.block_configs(blocking.n_blocks(), &base))
    }

    fn prepare(&self, ctx: &TaskContext<'_>) -> Result<(), OpError> {
        let shape = self.output_shape(ctx)?;
        let meta = DatasetMeta::uint64(shape.to_vec(), ctx.block_shape().to_vec());
        ctx.store().require_dataset(&self.output_key, &meta)?;
        Ok(())
    }

    fn existing_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        // A matching dataset without a marker may be partially written: recompute.
        self.check_output(ctx, OutputState::Missing, OutputState::Missing)
    }

    fn verify_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        let absent = OutputState::Malformed(format!("{} is missing", self.output_key));
        self.check_output(ctx, absent, OutputState::Complete)
    }
}

impl Resample {
    /// `absent` without output, `matching` when it has the expected shape.
    fn check_output(
        &self,
        ctx: &TaskContext<'_>,
        absent: OutputState,
        matching: OutputState,
    ) -> Result<OutputState, OpError> {
        let Some(meta) = ctx.store().dataset_meta(&self.output_key)? else {
            return Ok(absent);
        };
        let expected = self.output_shape(ctx)?;
        if meta.shape != expected {
            return Ok(OutputState::Malformed(format!(
                "{} has shape {:?}, expected {:?}",
                self.output_key, meta.shape, expected
            )));
        }
        Ok(matching)
    }
}

/// Input index an output index maps to along one axis.
fn source_index(direction: Direction, i: u64, factor: u64, input_len: u64) -> u64 {
    let mapped = match direction {
        Direction::Downsample => i * factor,
        Direction::Upsample => i / factor,
    };
    mapped.min(input_len.saturating_sub(1))
}

/// Input region needed to fill output `block`.
fn source_box(direction: Direction, block: &BoundingBox, factor: Shape, input: Shape) -> BoundingBox {
    BoundingBox {
        begin: std::array::from_fn(|d| source_index(direction, block.begin[d], factor[d], input[d])),
        end: std::array::from_fn(|d| {
            source_index(direction, block.end[d] - 1, factor[d], input[d]) + 1
        }),
    }
}

fn resample(ctx: &JobContext<'_>, direction: Direction) -> Result<(), JobError> {
    let config = ctx.config;
    let input_key = config.str("input_key")?;
    let output_key = config.str("output_key")?;
    let factor = config.shape("scale_factor")?;
    let block_shape = config.shape("block_shape")?;
    let (_, input_shape) = volume(ctx.store, input_key)?;
    let (_, output_shape) = volume(ctx.store, output_key)?;
    let blocking = Blocking::new(output_shape, block_shape)?;

    for id in config.block_range()? {
        let block = blocking.block(id)?;
        if block.is_empty() {
            continue;
        }
        let src = source_box(direction, &block, factor, input_shape);
        let data = ctx.store.read(input_key, &Roi::from(src))?;
        let dims: Vec<usize> = block.shape().iter().map(|&s| s as usize).collect();
        let out = ArrayD::from_shape_fn(IxDyn(&dims), |idx| {
            let at: Vec<usize> = (0..3)
                .map(|d| {
                    let i = block.begin[d] + idx[d] as u64;
                    (source_index(direction, i, factor[d], input_shape[d]) - src.begin[d]) as usize
                })
                .collect();
            data[IxDyn(&at)]
        });
        ctx.store.write(output_key, &block.begin, out.view())?;
    }
    ctx.log(&format!("{} blocks {:?} of {}", direction, config.block_range()?, output_key));
    Ok(())
}

pub(super) fn downscaling_job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    resample(ctx, Direction::Downsample)
}

pub(super) fn upscaling_job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    resample(ctx, Direction::Upsample)
}

#[cfg(test)]
#[path = "resample_tests.rs"]
mod tests;
