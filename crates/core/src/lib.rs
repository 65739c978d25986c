// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ct-core: data model for block-parallel volume tasks.
//!
//! Pure types only: block partitions, scale pyramids, job status and job
//! configuration. Nothing here touches a backend or a volume store.

pub mod macros;

pub mod blocking;
pub mod job;
pub mod scale;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use blocking::{assign_blocks, partition, BlockDescriptor, Blocking, BoundingBox, Shape, ShapeError};
pub use job::{
    config_file_name, parse_job_id, ConfigError, JobConfig, JobConfigBuilder, JobId, JobStatus,
    Resources,
};
pub use scale::{
    from_viewer_order, relative_factor, to_viewer_order, ScaleError, ScaleFactor, ScaleLevel,
    ScalePyramid,
};
