// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core types.
pub mod strategies {
    use crate::blocking::Shape;
    use crate::job::JobStatus;
    use proptest::prelude::*;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Pending),
            Just(JobStatus::Running),
            Just(JobStatus::Success),
            Just(JobStatus::Failed),
        ]
    }

    /// Small volume shapes paired with positive block shapes, including block
    /// shapes larger than the volume (clipped single blocks).
    pub fn arb_shape_and_block_shape() -> impl Strategy<Value = (Shape, Shape)> {
        (
            [1u64..24, 1u64..24, 1u64..24],
            [1u64..30, 1u64..30, 1u64..30],
        )
    }

    pub fn arb_halo() -> impl Strategy<Value = Shape> {
        [0u64..6, 0u64..6, 0u64..6]
    }
}
