// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ops::decode_label_blocks;
use crate::ops::test_helpers::{volume_from, OpHarness};
use crate::task::RunContext;
use ct_core::ScaleError;
use serde_json::json;

fn label(z: usize, _y: usize, x: usize) -> u64 {
    ((z / 4) * 2 + x / 4 + 1) as u64
}

fn set_attrs(h: &OpHarness, key: &str, value: serde_json::Value) {
    h.store.set_attrs(key, value.as_object().unwrap().clone()).unwrap();
}

/// Raw levels with viewer-order factors; `None` for `s0`.
fn seed_raw(h: &OpHarness, levels: &[(Shape, Option<[f64; 3]>)]) {
    for (index, (shape, factors)) in levels.iter().enumerate() {
        let key = format!("raw/s{index}");
        h.put(&key, [4, 4, 4], &volume_from(*shape, |_, _, _| 0));
        if let Some(factors) = factors {
            set_attrs(h, &key, json!({ "downsamplingFactors": factors }));
        }
    }
}

/// Three levels: `[8, 8, 8]`, then halved in y and x, then halved again in all axes.
fn seeded() -> OpHarness {
    let h = OpHarness::new([4, 4, 4], 4);
    seed_raw(
        &h,
        &[([8, 8, 8], None), ([8, 4, 4], Some([2.0, 2.0, 1.0])), ([4, 2, 2], Some([4.0, 4.0, 2.0]))],
    );
    h.put("labels", [4, 4, 4], &volume_from([8, 8, 8], label));
    set_attrs(&h, "labels", json!({ "maxId": 4 }));
    h
}

fn settings() -> ConversionSettings {
    ConversionSettings {
        raw_key: "raw".to_string(),
        label_in_key: "labels".to_string(),
        label_out_key: "paintera".to_string(),
        resolution: [40.0, 4.0, 4.0],
        ..ConversionSettings::default()
    }
}

#[test]
fn raw_scales_are_read_in_store_axis_order() {
    let h = seeded();
    let scales = discover_raw_scales(&*h.store, "raw").unwrap();
    assert_eq!(scales.pyramid.factors(), vec![[1.0, 1.0, 1.0], [1.0, 2.0, 2.0], [2.0, 4.0, 4.0]]);
    assert_eq!(scales.shapes, vec![[8, 8, 8], [8, 4, 4], [4, 2, 2]]);
}

#[test]
fn gaps_in_raw_scales_are_rejected() {
    let h = OpHarness::new([4, 4, 4], 4);
    seed_raw(&h, &[([8, 8, 8], None)]);
    h.put("raw/s2", [4, 4, 4], &volume_from([2, 2, 2], |_, _, _| 0));

    let err = discover_raw_scales(&*h.store, "raw").unwrap_err();
    assert!(err.to_string().contains("without gaps"), "{err}");
}

#[test]
fn plan_orders_tasks_along_the_pipeline() {
    let h = seeded();
    let conversion = ConversionWorkflow::plan(&settings(), &*h.store).unwrap();

    let names: Vec<String> =
        conversion.workflow().tasks().unwrap().iter().map(|t| t.name().to_string()).collect();
    assert_eq!(
        names,
        vec![
            "copy_labels",
            "downscaling_s1",
            "downscaling_s2",
            "unique_block_labels_s0",
            "unique_block_labels_s1",
            "unique_block_labels_s2",
            "label_block_mapping_s0",
            "label_block_mapping_s1",
            "label_block_mapping_s2",
            "write_paintera_metadata",
        ]
    );
}

#[test]
fn labels_at_a_coarser_scale_are_upsampled_first() {
    let h = seeded();
    h.put("labels_s1", [4, 4, 4], &volume_from([8, 4, 4], |_, _, _| 1));
    set_attrs(&h, "labels_s1", json!({ "maxId": 1 }));
    let settings = ConversionSettings {
        label_in_key: "labels_s1".to_string(),
        label_scale: 1,
        ..settings()
    };

    let conversion = ConversionWorkflow::plan(&settings, &*h.store).unwrap();

    let names: Vec<String> =
        conversion.workflow().tasks().unwrap().iter().map(|t| t.name().to_string()).collect();
    assert_eq!(&names[..3], ["copy_labels", "upscaling_s0", "downscaling_s2"]);
}

#[test]
fn non_integer_scale_ratio_fails_planning() {
    let h = OpHarness::new([4, 4, 4], 4);
    seed_raw(
        &h,
        &[([6, 6, 6], None), ([3, 3, 3], Some([2.0, 2.0, 2.0])), ([2, 2, 2], Some([3.0, 3.0, 3.0]))],
    );
    h.put("labels", [4, 4, 4], &volume_from([6, 6, 6], |_, _, _| 1));

    let err = ConversionWorkflow::plan(&settings(), &*h.store).unwrap_err();

    assert!(matches!(err, OpError::Scale(ScaleError::NonIntegerScaleRatio { coarse: 2, fine: 1, .. })));
}

#[test]
fn label_multisets_are_rejected() {
    let h = seeded();
    let settings = ConversionSettings { use_label_multiset: true, ..settings() };
    let err = ConversionWorkflow::plan(&settings, &*h.store).unwrap_err();
    assert!(err.to_string().contains("multiset"));
}

#[test]
fn labels_must_match_the_raw_reference_scale() {
    let h = seeded();
    h.put("small", [4, 4, 4], &volume_from([4, 4, 4], |_, _, _| 1));
    let settings = ConversionSettings { label_in_key: "small".to_string(), ..settings() };
    let err = ConversionWorkflow::plan(&settings, &*h.store).unwrap_err();
    assert!(matches!(err, OpError::Invalid(ref message) if message.contains("raw scale s0")));
}

#[tokio::test]
async fn full_conversion_produces_viewer_group() {
    let h = seeded();
    let workflow = ConversionWorkflow::plan(&settings(), &*h.store).unwrap().into_workflow();

    let report = workflow.run(&h.ctx).await.unwrap();

    assert_eq!(report.statuses.len(), 10);
    assert!(report.statuses.values().all(|s| *s == crate::task::TaskStatus::Success));
    let s1 = h.store.read_all("paintera/data/s1").unwrap();
    assert_eq!(s1, volume_from([8, 4, 4], |z, y, x| label(z, 2 * y, 2 * x)));
    let s2 = h.store.read_all("paintera/data/s2").unwrap();
    assert_eq!(s2, volume_from([4, 2, 2], |z, y, x| label(2 * z, 4 * y, 4 * x)));

    let coarsest = h.store.read_varlen("paintera/label-to-block-mapping/s2", &[0]).unwrap().unwrap();
    let mapping = decode_label_blocks(&coarsest).unwrap();
    assert_eq!(mapping.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert!(mapping.values().all(|blocks| blocks == &vec![0]));

    let data = h.store.get_attrs("paintera/data").unwrap();
    assert_eq!(data["maxId"], 4);
    assert_eq!(data["resolution"], json!([4.0, 4.0, 40.0]));
    let s1_attrs = h.store.get_attrs("paintera/data/s1").unwrap();
    assert_eq!(s1_attrs["downsamplingFactors"], json!([2.0, 2.0, 1.0]));
}

#[tokio::test]
async fn second_run_submits_no_jobs() {
    let h = seeded();
    let workflow = ConversionWorkflow::plan(&settings(), &*h.store).unwrap().into_workflow();
    workflow.run(&h.ctx).await.unwrap();

    let fresh = RunContext::new(
        Arc::new(ct_adapters::FakeBackend::new()),
        h.store.clone(),
        h.ctx.layout().clone(),
        h.ctx.settings().clone(),
    );
    let report = workflow.run(&fresh).await.unwrap();

    assert_eq!(report.submitted_jobs, 0);
}

#[tokio::test]
async fn assignment_sets_the_viewer_max_id() {
    let h = seeded();
    let assignments = ndarray::arr1(&[0u64, 1, 1, 2, 2]).into_dyn();
    h.store.write_dataset("assignments", vec![5], assignments.view()).unwrap();
    let settings = ConversionSettings { assignment_key: "assignments".to_string(), ..settings() };

    let workflow = ConversionWorkflow::plan(&settings, &*h.store).unwrap().into_workflow();
    let report = workflow.run(&h.ctx).await.unwrap();

    assert!(report.statuses.contains_key("fragment_segment_assignment"));
    assert_eq!(h.store.get_attrs("paintera").unwrap()["maxId"], 7);
    let table = h.store.read_all("paintera/fragment-segment-assignment").unwrap();
    assert_eq!(table, ndarray::arr2(&[[1u64, 2, 3, 4], [6, 6, 7, 7]]).into_dyn());
}
