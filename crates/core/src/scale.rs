// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-resolution scale pyramid.
//!
//! Level `k` stores data down-sampled from level 0 by an absolute per-axis
//! factor. Level 0 is native resolution (`[1, 1, 1]`) and factors never
//! decrease with the level index. Resampling between levels is only supported
//! for exact integer ratios.

use crate::blocking::Shape;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Absolute per-axis scale factor in `[z, y, x]` order.
pub type ScaleFactor = [f64; 3];

const RATIO_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScaleError {
    #[error(
        "non-integer scale ratio between level {coarse} {coarse_factor:?} and level {fine} {fine_factor:?}"
    )]
    NonIntegerScaleRatio {
        coarse: usize,
        fine: usize,
        coarse_factor: ScaleFactor,
        fine_factor: ScaleFactor,
    },
    #[error("scale level 0 must be native resolution [1, 1, 1], got {0:?}")]
    InvalidBaseLevel(ScaleFactor),
    #[error("scale level {index} has factor {factor:?}: factors must be positive and non-decreasing")]
    NonMonotonic { index: usize, factor: ScaleFactor },
    #[error("reference scale {reference} is not one of the {n_levels} available levels")]
    UnknownReference { reference: usize, n_levels: usize },
    #[error("scale pyramid has no levels")]
    Empty,
}

/// One level of the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleLevel {
    pub index: usize,
    pub factor: ScaleFactor,
}

impl ScaleLevel {
    /// Dataset name of this level inside a multiscale group (`s0`, `s1`, ...).
    pub fn dataset_name(&self) -> String {
        format!("s{}", self.index)
    }
}

/// Validated, ordered list of scale levels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalePyramid {
    levels: Vec<ScaleLevel>,
}

impl ScalePyramid {
    pub fn new(factors: Vec<ScaleFactor>) -> Result<Self, ScaleError> {
        let Some(base) = factors.first() else {
            return Err(ScaleError::Empty);
        };
        if base.iter().any(|&f| (f - 1.0).abs() > RATIO_TOLERANCE) {
            return Err(ScaleError::InvalidBaseLevel(*base));
        }
        for (index, pair) in factors.windows(2).enumerate() {
            let (prev, next) = (pair[0], pair[1]);
            if (0..3).any(|d| !(next[d] > 0.0) || next[d] < prev[d]) {
                return Err(ScaleError::NonMonotonic { index: index + 1, factor: next });
            }
        }
        let levels = factors
            .into_iter()
            .enumerate()
            .map(|(index, factor)| ScaleLevel { index, factor })
            .collect();
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[ScaleLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> Option<&ScaleLevel> {
        self.levels.get(index)
    }

    /// All absolute factors, in level order.
    pub fn factors(&self) -> Vec<ScaleFactor> {
        self.levels.iter().map(|l| l.factor).collect()
    }

    /// Integer ratio between level `coarse` and level `fine`.
    pub fn relative_factor(&self, coarse: usize, fine: usize) -> Result<Shape, ScaleError> {
        let n_levels = self.levels.len();
        let lookup = |reference: usize| {
            self.levels.get(reference).ok_or(ScaleError::UnknownReference { reference, n_levels })
        };
        relative_factor(lookup(coarse)?, lookup(fine)?)
    }
}

/// Integer per-axis ratio `coarse / fine`.
///
/// Fails with [`ScaleError::NonIntegerScaleRatio`] unless every axis ratio is
/// a positive integer.
pub fn relative_factor(coarse: &ScaleLevel, fine: &ScaleLevel) -> Result<Shape, ScaleError> {
    let error = || ScaleError::NonIntegerScaleRatio {
        coarse: coarse.index,
        fine: fine.index,
        coarse_factor: coarse.factor,
        fine_factor: fine.factor,
    };
    let mut out = [0u64; 3];
    for d in 0..3 {
        let ratio = coarse.factor[d] / fine.factor[d];
        if !ratio.is_finite() || ratio < 1.0 - RATIO_TOLERANCE {
            return Err(error());
        }
        let rounded = ratio.round();
        if (ratio - rounded).abs() > RATIO_TOLERANCE {
            return Err(error());
        }
        out[d] = rounded as u64;
    }
    Ok(out)
}

/// Flip a `[z, y, x]` triple to the viewer's `[x, y, z]` axis order.
pub fn to_viewer_order<T: Copy>(v: [T; 3]) -> [T; 3] {
    [v[2], v[1], v[0]]
}

/// Flip a viewer `[x, y, z]` triple back to `[z, y, x]`.
pub fn from_viewer_order<T: Copy>(v: [T; 3]) -> [T; 3] {
    [v[2], v[1], v[0]]
}

#[cfg(test)]
#[path = "scale_tests.rs"]
mod tests;
