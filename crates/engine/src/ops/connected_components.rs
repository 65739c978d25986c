// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connected components of a region graph under an existing node labeling.
//!
//! Graph connectivity is global, so the whole edge list is processed by a
//! single job. Edges whose endpoints carry different labels are cut; the
//! remaining edges merge their endpoints.

use crate::error::{JobError, OpError};
use crate::registry::JobContext;
use crate::task::{Operation, OutputState, TaskContext};
use ct_core::JobConfig;
use ct_storage::{DatasetMeta, VolumeStore};
use ndarray::{ArrayD, Ix2, IxDyn};

pub(super) const KIND: &str = "graph_connected_components";

#[derive(Debug, Clone)]
pub struct GraphConnectedComponents {
    /// Edge list as a `[n_edges, 2]` dataset of node ids.
    graph_key: String,
    /// Node labeling, one entry per node.
    assignment_key: String,
    output_key: String,
}

impl GraphConnectedComponents {
    pub fn new(
        graph_key: impl Into<String>,
        assignment_key: impl Into<String>,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            graph_key: graph_key.into(),
            assignment_key: assignment_key.into(),
            output_key: output_key.into(),
        }
    }
}

impl Operation for GraphConnectedComponents {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn n_required_jobs(&self, _ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        Ok(1)
    }

    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError> {
        let assignments = ctx.store().require_meta(&self.assignment_key)?;
        if assignments.ndim() != 1 {
            return Err(OpError::Invalid(format!(
                "{} must be one-dimensional, has shape {:?}",
                self.assignment_key, assignments.shape
            )));
        }
        let config = ctx
            .base_config()
            .with("graph_key", self.graph_key.as_str())
            .with("assignment_key", self.assignment_key.as_str())
            .with("output_key", self.output_key.as_str());
        Ok(vec![config])
    }

    fn verify_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        let expected = ctx.store().require_meta(&self.assignment_key)?.shape;
        match ctx.store().dataset_meta(&self.output_key)? {
            Some(meta) if meta.shape == expected => Ok(OutputState::Complete),
            Some(meta) => Ok(OutputState::Malformed(format!(
                "{} has shape {:?}, expected {:?}",
                self.output_key, meta.shape, expected
            ))),
            None => Ok(OutputState::Malformed(format!("{} is missing", self.output_key))),
        }
    }
}

/// `true` for every edge whose endpoints carry different labels.
pub fn edge_cut_vector(assignments: &[u64], uv: &[[u64; 2]]) -> Result<Vec<bool>, String> {
    let label = |node: u64| {
        assignments
            .get(node as usize)
            .copied()
            .ok_or_else(|| format!("node {} outside of {} assigned nodes", node, assignments.len()))
    };
    uv.iter().map(|&[u, v]| Ok(label(u)? != label(v)?)).collect()
}

/// Component id per node, merging across every edge that is not cut.
///
/// Ids are consecutive and numbered by the first node of each component.
/// Edge endpoints must be below `n_nodes`.
pub fn connected_components(n_nodes: usize, uv: &[[u64; 2]], cut: &[bool]) -> Vec<u64> {
    let mut parent: Vec<usize> = (0..n_nodes).collect();

    fn find(parent: &mut [usize], mut node: usize) -> usize {
        while parent[node] != node {
            parent[node] = parent[parent[node]];
            node = parent[node];
        }
        node
    }

    for (&[u, v], _) in uv.iter().zip(cut).filter(|(_, is_cut)| !**is_cut) {
        let ru = find(&mut parent, u as usize);
        let rv = find(&mut parent, v as usize);
        if ru != rv {
            parent[ru.max(rv)] = ru.min(rv);
        }
    }

    let mut ids = vec![u64::MAX; n_nodes];
    let mut next = 0;
    let mut out = Vec::with_capacity(n_nodes);
    for node in 0..n_nodes {
        let root = find(&mut parent, node);
        if ids[root] == u64::MAX {
            ids[root] = next;
            next += 1;
        }
        out.push(ids[root]);
    }
    out
}

fn read_edges(store: &dyn VolumeStore, key: &str) -> Result<Vec<[u64; 2]>, JobError> {
    let data = store.read_all(key)?;
    if !matches!(data.shape(), [_, 2]) {
        return Err(JobError::Invalid(format!(
            "{} must have shape [n_edges, 2], has {:?}",
            key,
            data.shape()
        )));
    }
    let data = data.into_dimensionality::<Ix2>()?;
    Ok(data.rows().into_iter().map(|row| [row[0], row[1]]).collect())
}

pub(super) fn job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let graph_key = ctx.config.str("graph_key")?;
    let assignment_key = ctx.config.str("assignment_key")?;
    let output_key = ctx.config.str("output_key")?;

    let uv = read_edges(ctx.store, graph_key)?;
    let assignment_meta = ctx.store.require_meta(assignment_key)?;
    let assignments: Vec<u64> = ctx.store.read_all(assignment_key)?.iter().copied().collect();
    let n_nodes = assignments.len();
    if let Some(&[u, v]) = uv.iter().find(|[u, v]| *u as usize >= n_nodes || *v as usize >= n_nodes) {
        return Err(JobError::Invalid(format!("edge ({}, {}) exceeds {} nodes", u, v, n_nodes)));
    }

    let cut = edge_cut_vector(&assignments, &uv).map_err(JobError::Invalid)?;
    let n_cut = cut.iter().filter(|c| **c).count();
    ctx.log(&format!("{} of {} edges cut", n_cut, uv.len()));

    let components = connected_components(n_nodes, &uv, &cut);
    let n_components = components.iter().max().map_or(0, |m| m + 1);
    let output = ArrayD::from_shape_vec(IxDyn(&[n_nodes]), components)?;
    let meta = DatasetMeta::uint64(assignment_meta.shape.clone(), assignment_meta.chunks.clone());
    ctx.store.require_dataset(output_key, &meta)?;
    ctx.store.write(output_key, &[0], output.view())?;
    ctx.log(&format!("{} components over {} nodes", n_components, n_nodes));
    Ok(())
}

#[cfg(test)]
#[path = "connected_components_tests.rs"]
mod tests;
