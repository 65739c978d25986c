// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Viewer metadata for a converted label group.
//!
//! Attribute names and layout follow what the viewer reads. The viewer uses
//! `[x, y, z]` axis order, so every per-axis list is reversed on the way out.

use super::{read_max_id, MAX_ID_ATTR};
use crate::error::{JobError, OpError};
use crate::registry::JobContext;
use crate::task::{Operation, OutputState, TaskContext};
use ct_core::{to_viewer_order, JobConfig, ScaleFactor};
use ct_storage::{join_key, Attrs, VolumeStore};
use serde_json::{json, Value};

pub(super) const KIND: &str = "write_paintera_metadata";

/// Type tag of the label-to-block lookup stored next to the labels.
pub const LABEL_BLOCK_LOOKUP_TYPE: &str = "n5-filesystem";

const PAINTERA_DATA_ATTR: &str = "painteraData";
const DOWNSAMPLING_FACTORS_ATTR: &str = "downsamplingFactors";

#[derive(Debug, Clone)]
pub struct WritePainteraMetadata {
    label_group: String,
    /// Per-scale factors in store axis order, scale 0 first.
    scale_factors: Vec<ScaleFactor>,
    resolution: [f64; 3],
    offset: [f64; 3],
    is_label_multiset: bool,
    /// Dataset whose `maxId` becomes the max id of the label group.
    max_id_key: String,
}

impl WritePainteraMetadata {
    pub fn new(
        label_group: impl Into<String>,
        scale_factors: Vec<ScaleFactor>,
        max_id_key: impl Into<String>,
    ) -> Self {
        Self {
            label_group: label_group.into(),
            scale_factors,
            resolution: [1.0; 3],
            offset: [0.0; 3],
            is_label_multiset: false,
            max_id_key: max_id_key.into(),
        }
    }

    ct_core::setters! {
        set {
            resolution: [f64; 3],
            offset: [f64; 3],
            is_label_multiset: bool,
        }
    }

    fn check_group(&self, store: &dyn VolumeStore) -> Result<OutputState, OpError> {
        if !store.contains(&self.label_group)? {
            return Ok(OutputState::Missing);
        }
        let attrs = store.get_attrs(&self.label_group)?;
        Ok(match (attrs.contains_key(PAINTERA_DATA_ATTR), attrs.contains_key(MAX_ID_ATTR)) {
            (true, true) => OutputState::Complete,
            (true, false) => OutputState::Malformed(format!(
                "{} is marked as viewer data but has no {}",
                self.label_group, MAX_ID_ATTR
            )),
            (false, _) => OutputState::Missing,
        })
    }
}

impl Operation for WritePainteraMetadata {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn n_required_jobs(&self, _ctx: &TaskContext<'_>) -> Result<usize, OpError> {
        Ok(1)
    }

    fn build_configs(&self, ctx: &TaskContext<'_>) -> Result<Vec<JobConfig>, OpError> {
        if self.scale_factors.is_empty() {
            return Err(OpError::Invalid("metadata needs at least one scale".to_string()));
        }
        read_max_id(ctx.store(), &self.max_id_key)?;
        Ok(vec![ctx
            .base_config()
            .with("label_group", self.label_group.as_str())
            .with("scale_factors", json!(self.scale_factors))
            .with("resolution", json!(self.resolution))
            .with("offset", json!(self.offset))
            .with("is_label_multiset", self.is_label_multiset)
            .with("max_id_key", self.max_id_key.as_str())])
    }

    fn existing_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        self.check_group(ctx.store())
    }

    fn verify_output(&self, ctx: &TaskContext<'_>) -> Result<OutputState, OpError> {
        match self.check_group(ctx.store())? {
            OutputState::Missing => Ok(OutputState::Malformed(format!(
                "{} has no viewer metadata",
                self.label_group
            ))),
            state => Ok(state),
        }
    }
}

fn attrs(value: Value) -> Attrs {
    match value {
        Value::Object(map) => map,
        _ => Attrs::new(),
    }
}

/// `downsamplingFactors` on every `s<k>` below `group`.
fn write_factors(store: &dyn VolumeStore, group: &str, factors: &[ScaleFactor]) -> Result<(), JobError> {
    for (scale, factor) in factors.iter().enumerate() {
        let key = join_key(group, &format!("s{}", scale));
        store.set_attrs(&key, attrs(json!({ DOWNSAMPLING_FACTORS_ATTR: to_viewer_order(*factor) })))?;
    }
    Ok(())
}

pub(super) fn job(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let config = ctx.config;
    let label_group = config.str("label_group")?;
    let factors: Vec<ScaleFactor> = config.parse("scale_factors")?;
    let resolution: [f64; 3] = config.parse("resolution")?;
    let offset: [f64; 3] = config.parse("offset")?;
    let is_label_multiset = config.bool_or("is_label_multiset", false)?;
    let max_id = read_max_id(ctx.store, config.str("max_id_key")?)?;
    let store = ctx.store;

    store.require_group(label_group)?;
    store.set_attrs(
        label_group,
        attrs(json!({ PAINTERA_DATA_ATTR: { "type": "label" }, MAX_ID_ATTR: max_id })),
    )?;

    let data_group = join_key(label_group, "data");
    store.set_attrs(
        &data_group,
        attrs(json!({
            MAX_ID_ATTR: max_id,
            "multiScale": true,
            "offset": to_viewer_order(offset),
            "resolution": to_viewer_order(resolution),
            "isLabelMultiset": is_label_multiset,
            "labelBlockLookup": {
                "type": LABEL_BLOCK_LOOKUP_TYPE,
                "root": store.path(),
                "scaleDatasetPattern": format!("{}/label-to-block-mapping/s%d", label_group),
            },
        })),
    )?;
    write_factors(store, &data_group, &factors)?;

    let unique_group = join_key(label_group, "unique-labels");
    store.set_attrs(&unique_group, attrs(json!({ "multiScale": true })))?;
    write_factors(store, &unique_group, &factors)?;

    ctx.log(&format!("viewer metadata for {} scales of {}, max id {}", factors.len(), label_group, max_id));
    Ok(())
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
