// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Block partition of a 3D volume.
//!
//! A [`Blocking`] tiles a volume of shape `[z, y, x]` with blocks of a fixed
//! shape. Block ids are dense (`0..n_blocks`) and enumerated in C order (axis 0
//! slowest), so the same inputs always yield the same ids. Boundary blocks are
//! clipped to the volume; no padding is created.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// Per-axis extent or coordinate in `[z, y, x]` order.
pub type Shape = [u64; 3];

/// Errors raised while partitioning a volume.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("invalid block shape {block_shape:?} for volume {shape:?}: block dimensions must be positive")]
    InvalidShape { shape: Shape, block_shape: Shape },
    #[error("block id {id} out of range (volume has {n_blocks} blocks)")]
    BlockOutOfRange { id: usize, n_blocks: usize },
}

/// Axis-aligned half-open box `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub begin: Shape,
    pub end: Shape,
}

impl BoundingBox {
    pub fn new(begin: Shape, end: Shape) -> Self {
        Self { begin, end }
    }

    /// Box covering a whole volume.
    pub fn from_shape(shape: Shape) -> Self {
        Self { begin: [0; 3], end: shape }
    }

    pub fn shape(&self) -> Shape {
        std::array::from_fn(|d| self.end[d].saturating_sub(self.begin[d]))
    }

    /// Number of voxels in the box.
    pub fn size(&self) -> u64 {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// True when `other` lies completely inside `self`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        (0..3).all(|d| self.begin[d] <= other.begin[d] && other.end[d] <= self.end[d])
    }

    /// True when the two boxes share at least one voxel.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        (0..3).all(|d| self.begin[d] < other.end[d] && other.begin[d] < self.end[d])
    }

    /// Grow by `halo` on every side, clipped to `[0, limit)`.
    pub fn grow(&self, halo: Shape, limit: Shape) -> BoundingBox {
        BoundingBox {
            begin: std::array::from_fn(|d| self.begin[d].saturating_sub(halo[d])),
            end: std::array::from_fn(|d| (self.end[d] + halo[d]).min(limit[d])),
        }
    }

    /// Map this box to a grid that is `factor` times coarser.
    ///
    /// The end is rounded up so that every fine voxel maps into the result;
    /// the result is clipped to `limit` (the coarse volume shape).
    pub fn scaled_down(&self, factor: Shape, limit: Shape) -> BoundingBox {
        BoundingBox {
            begin: std::array::from_fn(|d| (self.begin[d] / factor[d]).min(limit[d])),
            end: std::array::from_fn(|d| self.end[d].div_ceil(factor[d]).min(limit[d])),
        }
    }

    /// Map this box to a grid that is `factor` times finer, clipped to `limit`.
    pub fn scaled_up(&self, factor: Shape, limit: Shape) -> BoundingBox {
        BoundingBox {
            begin: std::array::from_fn(|d| (self.begin[d] * factor[d]).min(limit[d])),
            end: std::array::from_fn(|d| (self.end[d] * factor[d]).min(limit[d])),
        }
    }
}

/// One block of a partition: the inner box plus its halo-grown outer box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub id: usize,
    pub begin: Shape,
    pub end: Shape,
    pub halo_begin: Shape,
    pub halo_end: Shape,
}

impl BlockDescriptor {
    pub fn inner(&self) -> BoundingBox {
        BoundingBox::new(self.begin, self.end)
    }

    pub fn outer(&self) -> BoundingBox {
        BoundingBox::new(self.halo_begin, self.halo_end)
    }

    /// Inner box expressed in coordinates local to the outer box.
    pub fn local_inner(&self) -> BoundingBox {
        BoundingBox {
            begin: std::array::from_fn(|d| self.begin[d] - self.halo_begin[d]),
            end: std::array::from_fn(|d| self.end[d] - self.halo_begin[d]),
        }
    }
}

/// Regular block grid over a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocking {
    shape: Shape,
    block_shape: Shape,
    grid: Shape,
}

impl Blocking {
    pub fn new(shape: Shape, block_shape: Shape) -> Result<Self, ShapeError> {
        if block_shape.iter().any(|&b| b == 0) {
            return Err(ShapeError::InvalidShape { shape, block_shape });
        }
        let grid = std::array::from_fn(|d| shape[d].div_ceil(block_shape[d]));
        Ok(Self { shape, block_shape, grid })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn block_shape(&self) -> Shape {
        self.block_shape
    }

    /// Number of blocks along each axis.
    pub fn grid_shape(&self) -> Shape {
        self.grid
    }

    pub fn n_blocks(&self) -> usize {
        self.grid.iter().product::<u64>() as usize
    }

    /// Grid coordinate of a block id (C order).
    pub fn grid_position(&self, id: usize) -> Result<Shape, ShapeError> {
        self.check(id)?;
        let id = id as u64;
        let x = id % self.grid[2];
        let y = (id / self.grid[2]) % self.grid[1];
        let z = id / (self.grid[2] * self.grid[1]);
        Ok([z, y, x])
    }

    /// Block id of a grid coordinate.
    pub fn block_id(&self, position: Shape) -> usize {
        ((position[0] * self.grid[1] + position[1]) * self.grid[2] + position[2]) as usize
    }

    /// Inner box of a block, clipped to the volume.
    pub fn block(&self, id: usize) -> Result<BoundingBox, ShapeError> {
        let pos = self.grid_position(id)?;
        let begin: Shape = std::array::from_fn(|d| pos[d] * self.block_shape[d]);
        let end: Shape = std::array::from_fn(|d| (begin[d] + self.block_shape[d]).min(self.shape[d]));
        Ok(BoundingBox::new(begin, end))
    }

    /// Block with an outer box grown by `halo` and clipped to the volume.
    pub fn block_with_halo(&self, id: usize, halo: Shape) -> Result<BlockDescriptor, ShapeError> {
        let inner = self.block(id)?;
        let outer = inner.grow(halo, self.shape);
        Ok(BlockDescriptor {
            id,
            begin: inner.begin,
            end: inner.end,
            halo_begin: outer.begin,
            halo_end: outer.end,
        })
    }

    /// All blocks in id order.
    pub fn blocks(&self, halo: Shape) -> impl Iterator<Item = BlockDescriptor> + '_ {
        (0..self.n_blocks()).filter_map(move |id| self.block_with_halo(id, halo).ok())
    }

    /// Ids of all blocks that intersect `roi`.
    pub fn blocks_overlapping(&self, roi: &BoundingBox) -> Vec<usize> {
        (0..self.n_blocks())
            .filter(|&id| self.block(id).map(|b| b.intersects(roi)).unwrap_or(false))
            .collect()
    }

    fn check(&self, id: usize) -> Result<(), ShapeError> {
        let n_blocks = self.n_blocks();
        if id >= n_blocks {
            return Err(ShapeError::BlockOutOfRange { id, n_blocks });
        }
        Ok(())
    }
}

/// Partition `shape` into blocks of `block_shape` with a `halo` margin.
pub fn partition(
    shape: Shape,
    block_shape: Shape,
    halo: Shape,
) -> Result<Vec<BlockDescriptor>, ShapeError> {
    let blocking = Blocking::new(shape, block_shape)?;
    Ok(blocking.blocks(halo).collect())
}

/// Split `n_blocks` block ids into at most `n_jobs` contiguous ranges.
///
/// Ranges cover `0..n_blocks` without gaps or overlaps and differ in length by
/// at most one. Never returns an empty range.
pub fn assign_blocks(n_blocks: usize, n_jobs: usize) -> Vec<Range<usize>> {
    let n_jobs = n_jobs.min(n_blocks);
    if n_jobs == 0 {
        return Vec::new();
    }
    let base = n_blocks / n_jobs;
    let remainder = n_blocks % n_jobs;
    let mut ranges = Vec::with_capacity(n_jobs);
    let mut start = 0;
    for job in 0..n_jobs {
        let len = base + usize::from(job < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

#[cfg(test)]
#[path = "blocking_tests.rs"]
mod tests;
