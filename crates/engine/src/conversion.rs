// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Label conversion pipeline: turn a labeling plus a raw multiscale pyramid
//! into a viewer-ready multiscale label group.
//!
//! Task chain, each step depending on the previous one:
//!
//! 1. copy the input labels to `data/s<label_scale>`
//! 2. resample them to every other raw scale
//! 3. unique labels per block, per scale
//! 4. label to block mapping, per scale
//! 5. fragment to segment assignment, when an assignment is given
//! 6. viewer metadata

use crate::aligner::{self, Direction};
use crate::config::ConversionSettings;
use crate::error::OpError;
use crate::ops::{
    self, CopyLabels, FragmentSegmentAssignment, LabelBlockMapping, Resample, UniqueBlockLabels,
    WritePainteraMetadata,
};
use crate::task::Task;
use crate::workflow::Workflow;
use ct_core::{from_viewer_order, ScaleFactor, ScalePyramid, Shape};
use ct_storage::{join_key, VolumeStore};
use std::sync::Arc;

const DOWNSAMPLING_FACTORS_ATTR: &str = "downsamplingFactors";

/// Scale levels found under the raw multiscale group.
#[derive(Debug, Clone)]
pub struct RawScales {
    pub pyramid: ScalePyramid,
    /// Shape of every level, in level order.
    pub shapes: Vec<Shape>,
}

/// Discover `s0`, `s1`, ... below `raw_key`.
///
/// Level factors come from each level's `downsamplingFactors`, stored in
/// viewer axis order; `s0` is always native resolution.
pub fn discover_raw_scales(store: &dyn VolumeStore, raw_key: &str) -> Result<RawScales, OpError> {
    let mut indices: Vec<usize> = store
        .list(raw_key)?
        .iter()
        .filter_map(|name| name.strip_prefix('s')?.parse().ok())
        .collect();
    indices.sort_unstable();
    if indices.iter().enumerate().any(|(position, &index)| position != index) {
        return Err(OpError::Invalid(format!(
            "scales of {} must be s0..s{} without gaps, found {:?}",
            raw_key,
            indices.len().saturating_sub(1),
            indices
        )));
    }

    let mut factors: Vec<ScaleFactor> = Vec::with_capacity(indices.len());
    let mut shapes = Vec::with_capacity(indices.len());
    for index in indices {
        let key = join_key(raw_key, &format!("s{}", index));
        let (_, shape) = ops::volume(store, &key)?;
        shapes.push(shape);
        if index == 0 {
            factors.push([1.0; 3]);
            continue;
        }
        let attrs = store.get_attrs(&key)?;
        let viewer: [f64; 3] = attrs
            .get(DOWNSAMPLING_FACTORS_ATTR)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .ok_or_else(|| {
                OpError::Invalid(format!(
                    "{} has no {} attribute with 3 numbers",
                    key, DOWNSAMPLING_FACTORS_ATTR
                ))
            })?;
        factors.push(from_viewer_order(viewer));
    }
    Ok(RawScales { pyramid: ScalePyramid::new(factors)?, shapes })
}

/// Keys of the output label group.
#[derive(Debug, Clone)]
struct OutputKeys<'a> {
    group: &'a str,
}

impl OutputKeys<'_> {
    fn data(&self, scale: usize) -> String {
        join_key(self.group, &format!("data/s{}", scale))
    }

    fn unique_labels(&self, scale: usize) -> String {
        join_key(self.group, &format!("unique-labels/s{}", scale))
    }

    fn label_to_block(&self, scale: usize) -> String {
        join_key(self.group, &format!("label-to-block-mapping/s{}", scale))
    }

    fn fragment_segment_assignment(&self) -> String {
        join_key(self.group, "fragment-segment-assignment")
    }
}

/// The conversion workflow together with what it was planned from.
#[derive(Debug, Clone)]
pub struct ConversionWorkflow {
    workflow: Workflow,
    scales: RawScales,
}

impl ConversionWorkflow {
    pub const NAME: &'static str = "conversion";

    /// Plan the whole chain against the current store contents.
    ///
    /// Scale and shape problems surface here, before any task runs.
    pub fn plan(settings: &ConversionSettings, store: &dyn VolumeStore) -> Result<Self, OpError> {
        if settings.use_label_multiset {
            return Err(OpError::Invalid("label multisets are not supported".to_string()));
        }
        let scales = discover_raw_scales(store, &settings.raw_key)?;
        let reference = settings.label_scale;
        let alignment = aligner::plan(&scales.pyramid, reference)?;

        let (_, label_shape) = ops::volume(store, &settings.label_in_key)?;
        if label_shape != scales.shapes[reference] {
            return Err(OpError::Invalid(format!(
                "labels at {} have shape {:?}, raw scale s{} has {:?}",
                settings.label_in_key, label_shape, reference, scales.shapes[reference]
            )));
        }

        let keys = OutputKeys { group: &settings.label_out_key };
        let copy = Task::builder(
            "copy_labels",
            CopyLabels::new(settings.label_in_key.as_str(), keys.data(reference)),
        )
        .build();

        let aligned = aligner::build_chain(&alignment, Some(copy), |step, dependency| {
            let name = match step.direction {
                Direction::Upsample => format!("upscaling_s{}", step.target),
                Direction::Downsample => format!("downscaling_s{}", step.target),
            };
            let op = Resample::new(
                step.direction,
                keys.data(step.source),
                keys.data(step.target),
                step.factor,
            )
            .with_output_shape(scales.shapes[step.target]);
            Task::builder(name, op).depends_on(dependency).build()
        });

        let n_scales = scales.pyramid.len();
        let mut chain = aligned;
        for scale in 0..n_scales {
            let op = UniqueBlockLabels::new(keys.data(scale), keys.unique_labels(scale));
            let name = format!("unique_block_labels_s{}", scale);
            chain = Some(Task::builder(name, op).depends_on(chain).build());
        }
        for scale in 0..n_scales {
            let op = LabelBlockMapping::new(
                keys.unique_labels(scale),
                keys.label_to_block(scale),
                settings.label_in_key.as_str(),
                settings.label_block_chunk,
            );
            let name = format!("label_block_mapping_s{}", scale);
            chain = Some(Task::builder(name, op).depends_on(chain).build());
        }

        let max_id_key = if settings.assignment_key.is_empty() {
            settings.label_in_key.clone()
        } else {
            let output = keys.fragment_segment_assignment();
            let op =
                FragmentSegmentAssignment::new(settings.assignment_key.as_str(), output.as_str());
            let task = Task::builder("fragment_segment_assignment", op).depends_on(chain).build();
            chain = Some(task);
            output
        };

        let metadata = WritePainteraMetadata::new(
            settings.label_out_key.as_str(),
            scales.pyramid.factors(),
            max_id_key,
        )
        .resolution(settings.resolution)
        .offset(settings.offset)
        .is_label_multiset(settings.use_label_multiset);
        let terminal: Arc<Task> =
            Task::builder("write_paintera_metadata", metadata).depends_on(chain).build();

        Ok(Self { workflow: Workflow::new(Self::NAME, terminal), scales })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn scales(&self) -> &RawScales {
        &self.scales
    }

    pub fn into_workflow(self) -> Workflow {
        self.workflow
    }
}

#[cfg(test)]
#[path = "conversion_tests.rs"]
mod tests;
