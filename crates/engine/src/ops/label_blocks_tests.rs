// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::TaskError;
use crate::ops::test_helpers::{volume_from, OpHarness};
use crate::ops::UniqueBlockLabels;
use crate::task::TaskOutcome;
use serde_json::json;

fn max_id(store: &dyn VolumeStore, key: &str, max_id: u64) {
    let attrs = json!({ "maxId": max_id });
    store.set_attrs(key, attrs.as_object().unwrap().clone()).unwrap();
}

/// Labels 0 and 1 fill the low-x blocks by z half, label 5 fills the high-x half.
fn seeded() -> OpHarness {
    let h = OpHarness::new([2, 2, 2], 2);
    let labels = volume_from([4, 4, 4], |z, _, x| if x < 2 { (z / 2) as u64 } else { 5 });
    h.put("labels", [4, 4, 4], &labels);
    max_id(&*h.store, "labels", 6);
    h
}

#[tokio::test]
async fn labels_map_to_the_blocks_containing_them() {
    let h = seeded();
    h.run("uniques", UniqueBlockLabels::new("labels", "uniques")).await.unwrap();

    let op = LabelBlockMapping::new("uniques", "mapping", "labels", 3);
    let outcome = h.run("mapping", op).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Completed { n_jobs: 2 });
    let meta = h.store.require_meta("mapping").unwrap();
    assert_eq!(meta.shape, vec![7]);
    assert_eq!(meta.chunks, vec![3]);

    let first = decode(&h.store.read_varlen("mapping", &[0]).unwrap().unwrap()).unwrap();
    assert_eq!(first, BTreeMap::from([(0, vec![0, 2]), (1, vec![4, 6])]));
    let second = decode(&h.store.read_varlen("mapping", &[1]).unwrap().unwrap()).unwrap();
    assert_eq!(second, BTreeMap::from([(5, vec![1, 3, 5, 7])]));
    assert_eq!(h.store.read_varlen("mapping", &[2]).unwrap(), None);
}

#[tokio::test]
async fn missing_max_id_fails_before_submission() {
    let h = OpHarness::new([2, 2, 2], 2);
    h.put("labels", [2, 2, 2], &volume_from([2, 2, 2], |_, _, _| 1));
    h.run("uniques", UniqueBlockLabels::new("labels", "uniques")).await.unwrap();
    let submitted = h.ctx.submitted_jobs();

    let err = h
        .run("mapping", LabelBlockMapping::new("uniques", "mapping", "labels", 10))
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Config { ref message, .. } if message.contains("maxId")));
    assert_eq!(h.ctx.submitted_jobs(), submitted);
}

#[tokio::test]
async fn zero_chunk_is_rejected() {
    let h = seeded();
    let err = h
        .run("mapping", LabelBlockMapping::new("uniques", "mapping", "labels", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Config { .. }));
}

#[test]
fn decode_rejects_truncated_entries() {
    assert_eq!(decode(&[]).unwrap(), BTreeMap::new());
    assert_eq!(decode(&[4, 2, 0, 1]).unwrap(), BTreeMap::from([(4, vec![0, 1])]));
    assert!(decode(&[4, 3, 0, 1]).unwrap_err().contains("label 4"));
    assert!(decode(&[4, 0, 9]).is_err());
}
