// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scale alignment: which levels to up- and downsample from a reference level.

use crate::task::Task;
use ct_core::{ScaleError, ScalePyramid, Shape};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upsample,
    Downsample,
}

ct_core::simple_display! {
    Direction {
        Upsample => "upsample",
        Downsample => "downsample",
    }
}

/// Materialise level `target` from level `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentStep {
    pub direction: Direction,
    pub source: usize,
    pub target: usize,
    /// Integer per-axis ratio between the coarser and the finer of the two.
    pub factor: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentPlan {
    pub reference: usize,
    /// Levels below the reference, finest last.
    pub upsample: Vec<AlignmentStep>,
    /// Levels above the reference, coarsest last.
    pub downsample: Vec<AlignmentStep>,
}

impl AlignmentPlan {
    /// Every step in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &AlignmentStep> {
        self.upsample.iter().chain(&self.downsample)
    }

    pub fn len(&self) -> usize {
        self.upsample.len() + self.downsample.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plan the resampling steps that derive every level from `reference`.
///
/// Each step reads the adjacent level that is closer to the reference, which
/// is either the reference itself or the output of the previous step. Any
/// non-integer ratio fails the whole plan.
pub fn plan(pyramid: &ScalePyramid, reference: usize) -> Result<AlignmentPlan, ScaleError> {
    let n_levels = pyramid.len();
    if reference >= n_levels {
        return Err(ScaleError::UnknownReference { reference, n_levels });
    }

    let upsample = (0..reference)
        .rev()
        .map(|target| {
            Ok(AlignmentStep {
                direction: Direction::Upsample,
                source: target + 1,
                target,
                factor: pyramid.relative_factor(target + 1, target)?,
            })
        })
        .collect::<Result<Vec<_>, ScaleError>>()?;

    let downsample = (reference + 1..n_levels)
        .map(|target| {
            Ok(AlignmentStep {
                direction: Direction::Downsample,
                source: target - 1,
                target,
                factor: pyramid.relative_factor(target, target - 1)?,
            })
        })
        .collect::<Result<Vec<_>, ScaleError>>()?;

    Ok(AlignmentPlan { reference, upsample, downsample })
}

/// Turn a plan into one linear chain of tasks hanging off `start`.
///
/// `factory` builds the task of a step given its dependency. Downsampling
/// starts after the last upsampling task so the chain stays linear; its first
/// step still reads the reference level.
pub fn build_chain<F>(plan: &AlignmentPlan, start: Option<Arc<Task>>, mut factory: F) -> Option<Arc<Task>>
where
    F: FnMut(&AlignmentStep, Option<Arc<Task>>) -> Arc<Task>,
{
    plan.steps().fold(start, |dep, step| Some(factory(step, dep)))
}

#[cfg(test)]
#[path = "aligner_tests.rs"]
mod tests;
