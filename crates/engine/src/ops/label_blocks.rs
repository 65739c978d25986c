// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inverse of the per-block unique labels: for each label, the blocks that
//! contain it.
//!
//! The output is a 1D dataset over label ids, chunked by `label_block_chunk`.
//! Each varlength chunk holds, for every label of the chunk that occurs at
//! all, the entry `[label, n_blocks, block_id...]`. Jobs own disjoint ranges
//! of chunks and scan every block of the unique-labels dataset once.

use super::{read_max_id, to_shape};
use crate::error::{JobError, OpError};
use crate::registry::JobContext;
use crate::task::{Operation, OutputState, TaskContext};
use ct_core::{assign_blocks, Blocking, JobConfig};
use ct_storage::{DatasetMeta, VolumeStore};
use std::collections::BTreeMap;

pub(super) const KIND: &str = "label_block_mapping";

#[derive(Debug, Clone)]
pub struct LabelBlockMapping {
    input_key: String,
    output_key: String,
    /// Dataset whose `maxId` attribute bounds the label ids.
    labels_key: String,
    chunk: u64,
}

impl LabelBlockMapping {
    pub fn new(
        input_key: impl Into<String>,
        output_key: impl Into<String>,
        labels_key: impl Into<String>,
        chunk: u64,
    ) -> Self {
        Self {
            input_key: input_key.into(),
            output_key: output_key.into(),
            labels_key: labels_key.into(),
            chunk,
        }
    }

    fn number_of_labels(&self, ctx: &TaskContext<'_>) -> Result<u64, OpError> {
        Ok(read_max_id(ctx.store(), &self.labels_key)? + 1)
    }

    fn n_chunks(&self, ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        if self.chunk == 0 {
            return Err(OpError::Invalid("label_block_chunk must be positive".to_string()));
        }
        Ok(self.number_of_labels(ctx)?.div_ceil(self.chunk) as usize)
    }
}

impl Operation for LabelBlockMapping {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn n_required_jobs(&self, ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        Ok(ctx.n_block_jobs(self.n_chunks(ctx)?))
    }

    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError> {
        let n_chunks = self.n_chunks(ctx)?;
        let base = ctx
            .base_config()
            .with("input_key", self.input_key.as_str())
            .with("output_key", self.output_key.as_str())
            .with("number_of_labels", self.number_of_labels(ctx)?)
            .with("label_block_chunk", self.chunk);
        Ok(assign_blocks(n_chunks, ctx.n_block_jobs(n_chunks))
            .into_iter()
            .map(|range| base.with("chunk_begin", range.start).with("chunk_end", range.end))
            .collect())
    }

    fn prepare(&self, ctx: &TaskContext<'_>) -> Result<(), OpError> {
        let meta = DatasetMeta::uint64(vec![self.number_of_labels(ctx)?], vec![self.chunk]);
        ctx.store().require_dataset(&self.output_key, &meta)?;
        Ok(())
    }

    fn verify_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        match ctx.store().dataset_meta(&self.output_key)? {
            Some(meta) if meta.shape == [self.number_of_labels(ctx)?] => Ok(OutputState::Complete),
            Some(meta) => Ok(OutputState::Malformed(format!(
                "{} covers {:?} labels, maxId changed since it was written",
                self.output_key, meta.shape
            ))),
            None => Ok(OutputState::Malformed(format!("{} is missing", self.output_key))),
        }
    }
}

/// Label → ids of the blocks containing it, for labels in `lo..hi`.
fn collect_blocks(
    store: &dyn VolumeStore,
    key: &str,
    lo: u64,
    hi: u64,
) -> Result<BTreeMap<u64, Vec<u64>>, JobError> {
    let meta = store.require_meta(key)?;
    let blocking = Blocking::new(to_shape(key, &meta.shape)?, to_shape(key, &meta.chunks)?)?;
    let mut blocks: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for id in 0..blocking.n_blocks() {
        let Some(labels) = store.read_varlen(key, &blocking.grid_position(id)?)? else {
            continue;
        };
        for label in labels.into_iter().filter(|l| (lo..hi).contains(l)) {
            blocks.entry(label).or_default().push(id as u64);
        }
    }
    Ok(blocks)
}

/// Flatten entries into `[label, n_blocks, block_id...]` records.
fn encode(entries: impl Iterator<Item = (u64, Vec<u64>)>) -> Vec<u64> {
    let mut out = Vec::new();
    for (label, blocks) in entries {
        out.push(label);
        out.push(blocks.len() as u64);
        out.extend(blocks);
    }
    out
}

pub(super) fn job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let config = ctx.config;
    let input_key = config.str("input_key")?;
    let output_key = config.str("output_key")?;
    let n_labels = config.u64("number_of_labels")?;
    let chunk = config.u64("label_block_chunk")?;
    let chunk_begin = config.u64("chunk_begin")?;
    let chunk_end = config.u64("chunk_end")?;

    let lo = chunk_begin * chunk;
    let hi = (chunk_end * chunk).min(n_labels);
    let mut blocks = collect_blocks(ctx.store, input_key, lo, hi)?;

    for c in chunk_begin..chunk_end {
        let upper = ((c + 1) * chunk).min(n_labels);
        let rest = blocks.split_off(&upper);
        let entries = std::mem::replace(&mut blocks, rest);
        if !entries.is_empty() {
            ctx.store.write_varlen(output_key, &[c], &encode(entries.into_iter()))?;
        }
    }
    ctx.log(&format!("label chunks {}..{} of {}", chunk_begin, chunk_end, output_key));
    Ok(())
}

/// Decode one varlength chunk of a label-to-block mapping.
pub fn decode(data: &[u64]) -> Result<BTreeMap<u64, Vec<u64>>, String> {
    let mut out = BTreeMap::new();
    let mut rest = data;
    while let [label, n, tail @ ..] = rest {
        let n = *n as usize;
        if tail.len() < n {
            return Err(format!("entry for label {} is truncated", label));
        }
        out.insert(*label, tail[..n].to_vec());
        rest = &tail[n..];
    }
    if !rest.is_empty() {
        return Err("trailing data".to_string());
    }
    Ok(out)
}

#[cfg(test)]
#[path = "label_blocks_tests.rs"]
mod tests;
