// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fragment to segment lookup table for the viewer.
//!
//! Only fragments that share their segment with at least one other fragment
//! are listed. Segment ids are shifted past the fragment id range so the two
//! id spaces never collide.

use super::MAX_ID_ATTR;
use crate::error::{JobError, OpError};
use crate::registry::JobContext;
use crate::task::{Operation, OutputState, TaskContext};
use ct_core::JobConfig;
use ct_storage::{Attrs, DatasetMeta};
use ndarray::Array2;
use serde_json::Value;
use std::collections::HashMap;

pub(super) const KIND: &str = "fragment_segment_assignment";

/// Non-trivial fragment → segment pairs and the largest id in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSegments {
    pub fragments: Vec<u64>,
    /// Already offset by the number of fragments.
    pub segments: Vec<u64>,
    pub max_id: u64,
}

impl FragmentSegments {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Build the table from `assignments[fragment] = segment`.
///
/// Without any multi-fragment segment the max id is the largest fragment id.
pub fn assign_fragments(assignments: &[u64]) -> FragmentSegments {
    let n_fragments = assignments.len() as u64;
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for &segment in assignments {
        *counts.entry(segment).or_default() += 1;
    }

    let (fragments, segments): (Vec<u64>, Vec<u64>) = assignments
        .iter()
        .enumerate()
        .filter(|(_, segment)| counts.get(*segment).copied().unwrap_or(0) > 1)
        .map(|(fragment, &segment)| (fragment as u64, segment + n_fragments))
        .unzip();
    let max_id = segments.iter().copied().max().unwrap_or(n_fragments.saturating_sub(1));
    FragmentSegments { fragments, segments, max_id }
}

#[derive(Debug, Clone)]
pub struct FragmentSegmentAssignment {
    assignment_key: String,
    output_key: String,
}

impl FragmentSegmentAssignment {
    pub fn new(assignment_key: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self { assignment_key: assignment_key.into(), output_key: output_key.into() }
    }
}

impl Operation for FragmentSegmentAssignment {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn n_required_jobs(&self, _ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        Ok(1)
    }

    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError> {
        ctx.store().require_meta(&self.assignment_key)?;
        Ok(vec![ctx
            .base_config()
            .with("assignment_key", self.assignment_key.as_str())
            .with("output_key", self.output_key.as_str())])
    }

    fn verify_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        if ctx.store().dataset_meta(&self.output_key)?.is_none() {
            return Ok(OutputState::Malformed(format!("{} is missing", self.output_key)));
        }
        if ctx.store().get_attrs(&self.output_key)?.get(MAX_ID_ATTR).and_then(Value::as_u64).is_none() {
            return Ok(OutputState::Malformed(format!(
                "{} has no {} attribute",
                self.output_key, MAX_ID_ATTR
            )));
        }
        Ok(OutputState::Complete)
    }
}

pub(super) fn job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let assignment_key = ctx.config.str("assignment_key")?;
    let output_key = ctx.config.str("output_key")?;

    let assignments: Vec<u64> = ctx.store.read_all(assignment_key)?.iter().copied().collect();
    let table = assign_fragments(&assignments);
    let n = table.len() as u64;

    let meta = DatasetMeta::uint64(vec![2, n], vec![1, n.max(1)]);
    ctx.store.require_dataset(output_key, &meta)?;
    if !table.is_empty() {
        let mut data = table.fragments.clone();
        data.extend_from_slice(&table.segments);
        let data = Array2::from_shape_vec((2, table.len()), data)?.into_dyn();
        ctx.store.write(output_key, &[0, 0], data.view())?;
    }
    let mut attrs = Attrs::new();
    attrs.insert(MAX_ID_ATTR.to_string(), table.max_id.into());
    ctx.store.set_attrs(output_key, attrs)?;

    ctx.log(&format!(
        "{} of {} fragments assigned, max id {}",
        n,
        assignments.len(),
        table.max_id
    ));
    Ok(())
}

#[cfg(test)]
#[path = "fragment_segment_tests.rs"]
mod tests;
