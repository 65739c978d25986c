// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunked volume store interface.
//!
//! A store is a tree of groups and datasets addressed by `/`-separated keys.
//! Every node carries a JSON attribute map. Datasets hold `uint64` voxels in a
//! regular chunk grid; chunks that were never written read back as zero.
//! Ragged per-chunk data (e.g. per-block label lists) goes through the
//! varlength chunk API.

use ct_core::BoundingBox;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Attribute map of a group or dataset.
pub type Attrs = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid attributes at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no such group or dataset: {0}")]
    MissingKey(String),
    #[error("{0} is not a dataset")]
    NotADataset(String),
    #[error("{0} is a dataset, not a group")]
    NotAGroup(String),
    #[error("dataset {key} exists with shape {existing:?}, requested {requested:?}")]
    ShapeMismatch { key: String, existing: Vec<u64>, requested: Vec<u64> },
    #[error("region {begin:?}..{end:?} is outside dataset {key} of shape {shape:?}")]
    OutOfBounds { key: String, begin: Vec<u64>, end: Vec<u64>, shape: Vec<u64> },
    #[error("dataset {key} has data type {data_type}, only uint64 is supported")]
    UnsupportedDataType { key: String, data_type: String },
    #[error("dataset {key} uses compression `{compression}`, only raw and gzip are supported")]
    UnsupportedCompression { key: String, compression: String },
    #[error("corrupt chunk {path}: {reason}")]
    Codec { path: String, reason: String },
}

/// Structural metadata of a dataset, in store axis order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    pub data_type: String,
}

impl DatasetMeta {
    pub const UINT64: &'static str = "uint64";

    pub fn uint64(shape: Vec<u64>, chunks: Vec<u64>) -> Self {
        Self { shape, chunks, data_type: Self::UINT64.to_string() }
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of chunks along each axis.
    pub fn grid(&self) -> Vec<u64> {
        self.shape.iter().zip(&self.chunks).map(|(s, c)| s.div_ceil(*c)).collect()
    }

    /// Region covered by the chunk at grid position `chunk`, clipped to the shape.
    pub fn chunk_roi(&self, chunk: &[u64]) -> Roi {
        let begin: Vec<u64> = chunk.iter().zip(&self.chunks).map(|(p, c)| p * c).collect();
        let end = begin
            .iter()
            .zip(&self.chunks)
            .zip(&self.shape)
            .map(|((b, c), s)| (b + c).min(*s))
            .collect();
        Roi { begin, end }
    }

    /// Grid positions of every chunk intersecting `roi`, in C order.
    pub fn chunks_overlapping(&self, roi: &Roi) -> Vec<Vec<u64>> {
        if self.ndim() == 0 || roi.begin.iter().zip(&roi.end).any(|(b, e)| b >= e) {
            return Vec::new();
        }
        let ranges: Vec<(u64, u64)> = (0..self.ndim())
            .map(|d| {
                let first = roi.begin[d] / self.chunks[d];
                let last = roi.end[d].div_ceil(self.chunks[d]);
                (first, last)
            })
            .collect();
        if ranges.iter().any(|(first, last)| first >= last) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut position: Vec<u64> = ranges.iter().map(|(first, _)| *first).collect();
        loop {
            out.push(position.clone());
            let mut axis = self.ndim();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                position[axis] += 1;
                if position[axis] < ranges[axis].1 {
                    break;
                }
                position[axis] = ranges[axis].0;
            }
        }
    }

    /// Fail unless `chunk` is a grid position of this dataset.
    pub fn check_chunk(&self, key: &str, chunk: &[u64]) -> Result<(), StoreError> {
        let grid = self.grid();
        if chunk.len() != grid.len() || chunk.iter().zip(&grid).any(|(c, g)| c >= g) {
            return Err(StoreError::OutOfBounds {
                key: key.to_string(),
                begin: chunk.to_vec(),
                end: chunk.iter().map(|c| c + 1).collect(),
                shape: grid,
            });
        }
        Ok(())
    }

    pub fn check_roi(&self, key: &str, roi: &Roi) -> Result<(), StoreError> {
        let valid = roi.begin.len() == self.ndim()
            && roi.end.len() == self.ndim()
            && (0..self.ndim()).all(|d| roi.begin[d] <= roi.end[d] && roi.end[d] <= self.shape[d]);
        if valid {
            Ok(())
        } else {
            Err(StoreError::OutOfBounds {
                key: key.to_string(),
                begin: roi.begin.clone(),
                end: roi.end.clone(),
                shape: self.shape.clone(),
            })
        }
    }
}

/// N-dimensional half-open region `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roi {
    pub begin: Vec<u64>,
    pub end: Vec<u64>,
}

impl Roi {
    pub fn new(begin: Vec<u64>, end: Vec<u64>) -> Self {
        Self { begin, end }
    }

    /// Region covering a full array of `shape`.
    pub fn full(shape: &[u64]) -> Self {
        Self { begin: vec![0; shape.len()], end: shape.to_vec() }
    }

    pub fn shape(&self) -> Vec<usize> {
        self.begin.iter().zip(&self.end).map(|(b, e)| e.saturating_sub(*b) as usize).collect()
    }

    /// Intersection with `other`, or `None` when disjoint.
    pub fn intersect(&self, other: &Roi) -> Option<Roi> {
        let begin: Vec<u64> = self.begin.iter().zip(&other.begin).map(|(a, b)| *a.max(b)).collect();
        let end: Vec<u64> = self.end.iter().zip(&other.end).map(|(a, b)| *a.min(b)).collect();
        if begin.iter().zip(&end).any(|(b, e)| b >= e) {
            return None;
        }
        Some(Roi { begin, end })
    }

    /// This region expressed relative to `origin`.
    pub fn relative_to(&self, origin: &[u64]) -> Roi {
        Roi {
            begin: self.begin.iter().zip(origin).map(|(b, o)| b - o).collect(),
            end: self.end.iter().zip(origin).map(|(e, o)| e - o).collect(),
        }
    }
}

impl From<BoundingBox> for Roi {
    fn from(bb: BoundingBox) -> Self {
        Roi { begin: bb.begin.to_vec(), end: bb.end.to_vec() }
    }
}

/// Copy `src` into the `region` of `dst` (region relative to `dst`'s origin).
pub(crate) fn copy_region(dst: &mut ArrayD<u64>, region: &Roi, src: ArrayViewD<'_, u64>) {
    let mut view = dst.slice_each_axis_mut(|ax| {
        let d = ax.axis.index();
        ndarray::Slice::from(region.begin[d] as usize..region.end[d] as usize)
    });
    view.assign(&src);
}

/// View of the `region` of `src` (region relative to `src`'s origin).
pub(crate) fn view_region<'a>(src: ArrayViewD<'a, u64>, region: &Roi) -> ArrayViewD<'a, u64> {
    let mut view = src;
    view.slice_each_axis_inplace(|ax| {
        let d = ax.axis.index();
        ndarray::Slice::from(region.begin[d] as usize..region.end[d] as usize)
    });
    view
}

pub(crate) fn zeros(shape: &[usize]) -> ArrayD<u64> {
    ArrayD::zeros(IxDyn(shape))
}

/// Normalise a key: strip leading/trailing slashes and empty segments.
pub fn normalize_key(key: &str) -> String {
    key.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/")
}

/// Join two key fragments with `/`.
pub fn join_key(parent: &str, child: &str) -> String {
    normalize_key(&format!("{}/{}", parent, child))
}

/// Chunked, attribute-carrying volume storage.
///
/// Implementations must tolerate concurrent writes to *different* chunks from
/// different threads or processes; writes to the same chunk are the caller's
/// responsibility to avoid.
pub trait VolumeStore: Send + Sync {
    /// Location of the store (filesystem path or an in-memory label).
    fn path(&self) -> &str;

    /// Create a group and all missing parents.
    fn require_group(&self, key: &str) -> Result<(), StoreError>;

    /// Create a dataset if it does not exist; an existing dataset must match
    /// the requested shape.
    fn require_dataset(&self, key: &str, meta: &DatasetMeta) -> Result<(), StoreError>;

    /// Metadata of the dataset at `key`, or `None` when `key` is not a dataset.
    fn dataset_meta(&self, key: &str) -> Result<Option<DatasetMeta>, StoreError>;

    fn contains(&self, key: &str) -> Result<bool, StoreError>;

    /// Names of the direct children of a group, sorted.
    fn list(&self, key: &str) -> Result<Vec<String>, StoreError>;

    fn read(&self, key: &str, roi: &Roi) -> Result<ArrayD<u64>, StoreError>;

    /// Write `data` with its origin at `begin`.
    fn write(&self, key: &str, begin: &[u64], data: ArrayViewD<'_, u64>) -> Result<(), StoreError>;

    /// Ragged contents of one chunk, or `None` if it was never written.
    fn read_varlen(&self, key: &str, chunk: &[u64]) -> Result<Option<Vec<u64>>, StoreError>;

    fn write_varlen(&self, key: &str, chunk: &[u64], data: &[u64]) -> Result<(), StoreError>;

    fn get_attrs(&self, key: &str) -> Result<Attrs, StoreError>;

    /// Merge `attrs` into the existing attributes of `key`.
    fn set_attrs(&self, key: &str, attrs: Attrs) -> Result<(), StoreError>;

    /// Metadata of a dataset that must exist.
    fn require_meta(&self, key: &str) -> Result<DatasetMeta, StoreError> {
        match self.dataset_meta(key)? {
            Some(meta) => Ok(meta),
            None if self.contains(key)? => Err(StoreError::NotADataset(key.to_string())),
            None => Err(StoreError::MissingKey(key.to_string())),
        }
    }

    /// Create a dataset sized to `data` and write all of it.
    fn write_dataset(
        &self,
        key: &str,
        chunks: Vec<u64>,
        data: ArrayViewD<'_, u64>,
    ) -> Result<(), StoreError> {
        let shape = data.shape().iter().map(|&s| s as u64).collect();
        self.require_dataset(key, &DatasetMeta::uint64(shape, chunks))?;
        self.write(key, &vec![0; data.ndim()], data)
    }

    /// Read a whole dataset.
    fn read_all(&self, key: &str) -> Result<ArrayD<u64>, StoreError> {
        let meta = self.require_meta(key)?;
        self.read(key, &Roi::full(&meta.shape))
    }
}

/// Opens the store named in a job config.
pub trait StoreProvider: Send + Sync {
    fn open(&self, path: &str) -> Result<Arc<dyn VolumeStore>, StoreError>;
}

/// Provider that hands out one shared store regardless of the requested path.
///
/// Used by in-process execution where jobs and orchestrator share memory.
#[derive(Clone)]
pub struct SharedStoreProvider {
    store: Arc<dyn VolumeStore>,
}

impl SharedStoreProvider {
    pub fn new(store: Arc<dyn VolumeStore>) -> Self {
        Self { store }
    }
}

impl StoreProvider for SharedStoreProvider {
    fn open(&self, _path: &str) -> Result<Arc<dyn VolumeStore>, StoreError> {
        Ok(self.store.clone())
    }
}

#[cfg(test)]
#[path = "volume_tests.rs"]
mod tests;
