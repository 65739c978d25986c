// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph connected components as a one-task workflow with the shipped jobs.

use crate::prelude::Harness;
use ct_engine::ops::GraphConnectedComponents;
use ct_engine::{JobRegistry, Task, TaskStatus, Workflow};
use ct_storage::VolumeStore;
use ndarray::{arr1, arr2};

fn seed(h: &Harness, uv: &[[u64; 2]], assignments: &[u64]) {
    let edges = arr2(uv).into_dyn();
    h.store.write_dataset("graph/edges", vec![uv.len() as u64, 2], edges.view()).unwrap();
    let nodes = arr1(assignments).into_dyn();
    let chunks = vec![assignments.len() as u64];
    h.store.write_dataset("graph/assignments", chunks, nodes.view()).unwrap();
}

fn components_workflow() -> Workflow {
    let op = GraphConnectedComponents::new("graph/edges", "graph/assignments", "graph/components");
    Workflow::new("components", Task::builder("graph_connected_components", op).build())
}

#[tokio::test]
async fn chain_is_split_where_assignments_differ() {
    let h = Harness::new(JobRegistry::builtin(), [4, 4, 4], 4);
    seed(&h, &[[0, 1], [1, 2], [2, 3], [3, 4]], &[0, 0, 1, 1, 1]);

    let report = components_workflow().run(&h.context()).await.unwrap();

    assert_eq!(report.statuses["graph_connected_components"], TaskStatus::Success);
    assert_eq!(report.submitted_jobs, 1);
    let components: Vec<u64> =
        h.store.read_all("graph/components").unwrap().iter().copied().collect();
    assert_eq!(components, vec![0, 0, 1, 1, 1]);
}

#[tokio::test]
async fn nodes_without_edges_stay_alone() {
    let h = Harness::new(JobRegistry::builtin(), [4, 4, 4], 4);
    seed(&h, &[[0, 2]], &[5, 9, 5, 9]);

    components_workflow().run(&h.context()).await.unwrap();

    let components: Vec<u64> =
        h.store.read_all("graph/components").unwrap().iter().copied().collect();
    assert_eq!(components, vec![0, 1, 0, 2]);
}
