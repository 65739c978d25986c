// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations and job bodies of the label conversion pipeline.
//!
//! Each operation plans its jobs on the orchestrator side; the matching job
//! function runs inside a job process and talks to the store only.

mod connected_components;
mod copy_labels;
mod fragment_segment;
mod label_blocks;
mod metadata;
mod resample;
mod unique_labels;

pub use connected_components::{connected_components, edge_cut_vector, GraphConnectedComponents};
pub use copy_labels::CopyLabels;
pub use fragment_segment::{assign_fragments, FragmentSegmentAssignment, FragmentSegments};
pub use label_blocks::{decode as decode_label_blocks, LabelBlockMapping};
pub use metadata::{WritePainteraMetadata, LABEL_BLOCK_LOOKUP_TYPE};
pub use resample::Resample;
pub use unique_labels::UniqueBlockLabels;

use crate::error::OpError;
use crate::registry::JobFn;
use ct_core::Shape;
use ct_storage::{DatasetMeta, VolumeStore};

/// Attribute holding the largest label id of a labeling.
pub const MAX_ID_ATTR: &str = "maxId";

/// Every job kind shipped with the engine.
pub const BUILTIN_JOBS: &[(&str, JobFn)] = &[
    (resample::DOWNSCALING, resample::downscaling_job),
    (resample::UPSCALING, resample::upscaling_job),
    (unique_labels::KIND, unique_labels::job),
    (label_blocks::KIND, label_blocks::job),
    (connected_components::KIND, connected_components::job),
    (fragment_segment::KIND, fragment_segment::job),
    (copy_labels::KIND, copy_labels::job),
    (metadata::KIND, metadata::job),
];

/// A `[z, y, x]` triple from store dimensions.
pub(crate) fn to_shape(key: &str, dims: &[u64]) -> Result<Shape, OpError> {
    Shape::try_from(dims)
        .map_err(|_| OpError::Invalid(format!("{} has {} dimensions, expected 3", key, dims.len())))
}

/// Metadata and shape of a 3D dataset that must exist.
pub(crate) fn volume(store: &dyn VolumeStore, key: &str) -> Result<(DatasetMeta, Shape), OpError> {
    let meta = store.require_meta(key)?;
    let shape = to_shape(key, &meta.shape)?;
    Ok((meta, shape))
}

/// The `maxId` attribute of `key`.
pub(crate) fn read_max_id(store: &dyn VolumeStore, key: &str) -> Result<u64, OpError> {
    store
        .get_attrs(key)?
        .get(MAX_ID_ATTR)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| OpError::Invalid(format!("{} has no integer {} attribute", key, MAX_ID_ATTR)))
}

#[cfg(test)]
pub(crate) mod test_helpers;
