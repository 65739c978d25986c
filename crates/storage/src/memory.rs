// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory volume store for tests and in-process runs.

use crate::volume::{
    copy_region, normalize_key, view_region, zeros, Attrs, DatasetMeta, Roi, StoreError,
    VolumeStore,
};
use ndarray::{ArrayD, ArrayViewD};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

struct DatasetNode {
    meta: DatasetMeta,
    data: ArrayD<u64>,
    varlen: HashMap<Vec<u64>, Vec<u64>>,
}

enum Node {
    Group,
    Dataset(DatasetNode),
}

#[derive(Default)]
struct MemoryState {
    nodes: BTreeMap<String, Node>,
    attrs: HashMap<String, Attrs>,
}

impl MemoryState {
    fn exists(&self, key: &str) -> bool {
        key.is_empty() || self.nodes.contains_key(key)
    }

    fn dataset(&self, key: &str) -> Result<&DatasetNode, StoreError> {
        match self.nodes.get(key) {
            Some(Node::Dataset(ds)) => Ok(ds),
            Some(Node::Group) => Err(StoreError::NotADataset(key.to_string())),
            None if key.is_empty() => Err(StoreError::NotADataset(key.to_string())),
            None => Err(StoreError::MissingKey(key.to_string())),
        }
    }

    fn dataset_mut(&mut self, key: &str) -> Result<&mut DatasetNode, StoreError> {
        match self.nodes.get_mut(key) {
            Some(Node::Dataset(ds)) => Ok(ds),
            Some(Node::Group) => Err(StoreError::NotADataset(key.to_string())),
            None if key.is_empty() => Err(StoreError::NotADataset(key.to_string())),
            None => Err(StoreError::MissingKey(key.to_string())),
        }
    }

    /// Create `key` and every missing ancestor as groups.
    fn create_groups(&mut self, key: &str) -> Result<(), StoreError> {
        let mut prefix = String::new();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            match self.nodes.get(&prefix) {
                Some(Node::Group) => {}
                Some(Node::Dataset(_)) => return Err(StoreError::NotAGroup(prefix)),
                None => {
                    self.nodes.insert(prefix.clone(), Node::Group);
                }
            }
        }
        Ok(())
    }
}

fn parent_of(key: &str) -> &str {
    key.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Volume store backed by dense arrays held in memory.
///
/// Cheap to share behind an `Arc`; all state sits behind a single lock.
pub struct MemoryVolumeStore {
    label: String,
    state: Mutex<MemoryState>,
}

impl MemoryVolumeStore {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), state: Mutex::new(MemoryState::default()) }
    }
}

impl Default for MemoryVolumeStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl VolumeStore for MemoryVolumeStore {
    fn path(&self) -> &str {
        &self.label
    }

    fn require_group(&self, key: &str) -> Result<(), StoreError> {
        self.state.lock().create_groups(&normalize_key(key))
    }

    fn require_dataset(&self, key: &str, meta: &DatasetMeta) -> Result<(), StoreError> {
        let key = normalize_key(key);
        if meta.data_type != DatasetMeta::UINT64 {
            return Err(StoreError::UnsupportedDataType { key, data_type: meta.data_type.clone() });
        }
        let mut state = self.state.lock();
        match state.nodes.get(&key) {
            Some(Node::Dataset(existing)) if existing.meta.shape == meta.shape => return Ok(()),
            Some(Node::Dataset(existing)) => {
                return Err(StoreError::ShapeMismatch {
                    key,
                    existing: existing.meta.shape.clone(),
                    requested: meta.shape.clone(),
                })
            }
            Some(Node::Group) => return Err(StoreError::NotADataset(key)),
            None if key.is_empty() => return Err(StoreError::NotADataset(key)),
            None => {}
        }
        state.create_groups(parent_of(&key))?;
        let shape: Vec<usize> = meta.shape.iter().map(|&s| s as usize).collect();
        let node =
            DatasetNode { meta: meta.clone(), data: zeros(&shape), varlen: HashMap::new() };
        state.nodes.insert(key, Node::Dataset(node));
        Ok(())
    }

    fn dataset_meta(&self, key: &str) -> Result<Option<DatasetMeta>, StoreError> {
        let state = self.state.lock();
        match state.nodes.get(&normalize_key(key)) {
            Some(Node::Dataset(ds)) => Ok(Some(ds.meta.clone())),
            _ => Ok(None),
        }
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().exists(&normalize_key(key)))
    }

    fn list(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let key = normalize_key(key);
        let state = self.state.lock();
        match state.nodes.get(&key) {
            Some(Node::Dataset(_)) => return Err(StoreError::NotAGroup(key)),
            None if !key.is_empty() => return Err(StoreError::MissingKey(key)),
            _ => {}
        }
        Ok(state
            .nodes
            .keys()
            .filter(|k| parent_of(k) == key && !k.is_empty())
            .map(|k| k.rsplit('/').next().unwrap_or(k).to_string())
            .collect())
    }

    fn read(&self, key: &str, roi: &Roi) -> Result<ArrayD<u64>, StoreError> {
        let key = normalize_key(key);
        let state = self.state.lock();
        let ds = state.dataset(&key)?;
        ds.meta.check_roi(&key, roi)?;
        Ok(view_region(ds.data.view(), roi).to_owned())
    }

    fn write(&self, key: &str, begin: &[u64], data: ArrayViewD<'_, u64>) -> Result<(), StoreError> {
        let key = normalize_key(key);
        let mut state = self.state.lock();
        let ds = state.dataset_mut(&key)?;
        let end = begin.iter().zip(data.shape()).map(|(b, s)| b + *s as u64).collect();
        let roi = Roi::new(begin.to_vec(), end);
        ds.meta.check_roi(&key, &roi)?;
        copy_region(&mut ds.data, &roi, data);
        Ok(())
    }

    fn read_varlen(&self, key: &str, chunk: &[u64]) -> Result<Option<Vec<u64>>, StoreError> {
        let key = normalize_key(key);
        let state = self.state.lock();
        let ds = state.dataset(&key)?;
        ds.meta.check_chunk(&key, chunk)?;
        Ok(ds.varlen.get(chunk).cloned())
    }

    fn write_varlen(&self, key: &str, chunk: &[u64], data: &[u64]) -> Result<(), StoreError> {
        let key = normalize_key(key);
        let mut state = self.state.lock();
        let ds = state.dataset_mut(&key)?;
        ds.meta.check_chunk(&key, chunk)?;
        ds.varlen.insert(chunk.to_vec(), data.to_vec());
        Ok(())
    }

    fn get_attrs(&self, key: &str) -> Result<Attrs, StoreError> {
        let key = normalize_key(key);
        let state = self.state.lock();
        if !state.exists(&key) {
            return Err(StoreError::MissingKey(key));
        }
        Ok(state.attrs.get(&key).cloned().unwrap_or_default())
    }

    fn set_attrs(&self, key: &str, attrs: Attrs) -> Result<(), StoreError> {
        let key = normalize_key(key);
        let mut state = self.state.lock();
        if !state.exists(&key) {
            return Err(StoreError::MissingKey(key));
        }
        state.attrs.entry(key).or_default().extend(attrs);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
