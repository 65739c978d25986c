// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem volume store in the N5 layout.
//!
//! Every group and dataset is a directory with an `attributes.json`. Dataset
//! attributes carry `dimensions`, `blockSize`, `dataType` and `compression`
//! in reversed (x-fastest) axis order; user attributes live in the same file.
//! A chunk at grid position `[z, y, x]` is stored at `<dataset>/x/y/z` as a
//! big-endian block:
//!
//! ```text
//! u16 mode (0 = default, 1 = varlength) | u16 ndim | u32 dims[ndim] (reversed)
//! [u32 element count, varlength only] | u64 values
//! ```
//!
//! The header is never compressed. With `gzip` compression the value payload
//! is a gzip stream.
//!
//! Chunk writes go through a temporary file and a rename so concurrent jobs
//! writing different chunks never observe partial files.

use crate::volume::{
    copy_region, normalize_key, view_region, zeros, Attrs, DatasetMeta, Roi, StoreError,
    StoreProvider, VolumeStore,
};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const N5_VERSION: &str = "2.5.1";

const ATTRIBUTES_FILE: &str = "attributes.json";
const MODE_DEFAULT: u16 = 0;
const MODE_VARLENGTH: u16 = 1;

/// Keys reserved for dataset structure; never exposed as user attributes.
const RESERVED_KEYS: [&str; 4] = ["dimensions", "blockSize", "dataType", "compression"];

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.display().to_string(), source }
}

fn codec_err(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::Codec { path: path.display().to_string(), reason: reason.into() }
}

/// Chunk payload codec named by a dataset's `compression.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Raw,
    Gzip,
}

impl Compression {
    fn from_attributes(key: &str, attrs: &Attrs) -> Result<Self, StoreError> {
        let name = attrs
            .get("compression")
            .and_then(|c| c.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("raw");
        match name {
            "raw" => Ok(Self::Raw),
            "gzip" => Ok(Self::Gzip),
            other => Err(StoreError::UnsupportedCompression {
                key: key.to_string(),
                compression: other.to_string(),
            }),
        }
    }
}

/// N5 container rooted at a directory.
pub struct N5Store {
    root: PathBuf,
    label: String,
}

impl N5Store {
    /// Open an existing container or create a new one at `root`.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(io_err(&root))?;
        let store = Self::at(root);
        let mut attrs = store.read_attributes(&store.root)?;
        if !attrs.contains_key("n5") {
            attrs.insert("n5".into(), json!(N5_VERSION));
            store.write_attributes(&store.root, &attrs)?;
        }
        Ok(store)
    }

    /// Open an existing container.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::MissingKey(root.display().to_string()));
        }
        Ok(Self::at(root))
    }

    fn at(root: PathBuf) -> Self {
        let label = root.display().to_string();
        Self { root, label }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn node_dir(&self, key: &str) -> PathBuf {
        let key = normalize_key(key);
        if key.is_empty() {
            self.root.clone()
        } else {
            self.root.join(key)
        }
    }

    fn chunk_path(&self, key: &str, chunk: &[u64]) -> PathBuf {
        let mut path = self.node_dir(key);
        for position in chunk.iter().rev() {
            path.push(position.to_string());
        }
        path
    }

    fn read_attributes(&self, dir: &Path) -> Result<Attrs, StoreError> {
        let path = dir.join(ATTRIBUTES_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|source| StoreError::Json { path: path.display().to_string(), source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Attrs::new()),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    fn write_attributes(&self, dir: &Path, attrs: &Attrs) -> Result<(), StoreError> {
        let path = dir.join(ATTRIBUTES_FILE);
        let json = serde_json::to_vec_pretty(attrs)
            .map_err(|source| StoreError::Json { path: path.display().to_string(), source })?;
        write_atomic(&path, &json)
    }

    fn meta_from_attributes(key: &str, attrs: &Attrs) -> Result<Option<DatasetMeta>, StoreError> {
        let Some(dimensions) = attrs.get("dimensions") else {
            return Ok(None);
        };
        let bad = |field: &str| StoreError::Codec {
            path: key.to_string(),
            reason: format!("invalid `{}` attribute", field),
        };
        let shape: Vec<u64> =
            serde_json::from_value(dimensions.clone()).map_err(|_| bad("dimensions"))?;
        let chunks: Vec<u64> = attrs
            .get("blockSize")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| bad("blockSize"))?;
        let data_type = attrs
            .get("dataType")
            .and_then(Value::as_str)
            .ok_or_else(|| bad("dataType"))?
            .to_string();
        if chunks.len() != shape.len() || chunks.contains(&0) {
            return Err(bad("blockSize"));
        }
        Ok(Some(DatasetMeta {
            shape: reversed(&shape),
            chunks: reversed(&chunks),
            data_type,
        }))
    }

    fn dataset(&self, key: &str) -> Result<(DatasetMeta, Compression), StoreError> {
        let meta = self.require_meta(key)?;
        if meta.data_type != DatasetMeta::UINT64 {
            return Err(StoreError::UnsupportedDataType {
                key: key.to_string(),
                data_type: meta.data_type,
            });
        }
        let attrs = self.read_attributes(&self.node_dir(key))?;
        let compression = Compression::from_attributes(&normalize_key(key), &attrs)?;
        Ok((meta, compression))
    }

    /// Decode the default-mode chunk at `chunk`, or `None` if never written.
    fn read_chunk(
        &self,
        key: &str,
        meta: &DatasetMeta,
        compression: Compression,
        chunk: &[u64],
    ) -> Result<Option<ArrayD<u64>>, StoreError> {
        let path = self.chunk_path(key, chunk);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        let decoded = decode_chunk(&path, &bytes, compression)?;
        if decoded.varlength {
            return Err(codec_err(&path, "expected a default-mode chunk"));
        }
        let expected = meta.chunk_roi(chunk).shape();
        if decoded.shape != expected {
            return Err(codec_err(
                &path,
                format!("chunk shape {:?} does not match {:?}", decoded.shape, expected),
            ));
        }
        ArrayD::from_shape_vec(IxDyn(&decoded.shape), decoded.values)
            .map(Some)
            .map_err(|e| codec_err(&path, e.to_string()))
    }

    fn write_chunk(
        &self,
        key: &str,
        compression: Compression,
        chunk: &[u64],
        data: ArrayViewD<'_, u64>,
    ) -> Result<(), StoreError> {
        let path = self.chunk_path(key, chunk);
        let bytes =
            encode_chunk(&path, data.shape(), data.iter().copied(), data.len(), false, compression)?;
        write_atomic(&path, &bytes)
    }
}

impl VolumeStore for N5Store {
    fn path(&self) -> &str {
        &self.label
    }

    fn require_group(&self, key: &str) -> Result<(), StoreError> {
        let key = normalize_key(key);
        let mut dir = self.root.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            dir.push(segment);
            if dir.is_dir() {
                let attrs = self.read_attributes(&dir)?;
                if attrs.contains_key("dimensions") {
                    return Err(StoreError::NotAGroup(dir.display().to_string()));
                }
            } else {
                std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;
            }
        }
        Ok(())
    }

    fn require_dataset(&self, key: &str, meta: &DatasetMeta) -> Result<(), StoreError> {
        let key = normalize_key(key);
        if meta.data_type != DatasetMeta::UINT64 {
            return Err(StoreError::UnsupportedDataType { key, data_type: meta.data_type.clone() });
        }
        if key.is_empty() {
            return Err(StoreError::NotADataset(key));
        }
        match self.dataset_meta(&key)? {
            Some(existing) if existing.shape == meta.shape => return Ok(()),
            Some(existing) => {
                return Err(StoreError::ShapeMismatch {
                    key,
                    existing: existing.shape,
                    requested: meta.shape.clone(),
                })
            }
            None if self.node_dir(&key).is_dir() => return Err(StoreError::NotADataset(key)),
            None => {}
        }
        if let Some((parent, _)) = key.rsplit_once('/') {
            self.require_group(parent)?;
        }
        let dir = self.node_dir(&key);
        std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let mut attrs = Attrs::new();
        attrs.insert("dimensions".into(), json!(reversed(&meta.shape)));
        attrs.insert("blockSize".into(), json!(reversed(&meta.chunks)));
        attrs.insert("dataType".into(), json!(meta.data_type));
        attrs.insert("compression".into(), json!({ "type": "raw" }));
        self.write_attributes(&dir, &attrs)
    }

    fn dataset_meta(&self, key: &str) -> Result<Option<DatasetMeta>, StoreError> {
        let dir = self.node_dir(key);
        if !dir.is_dir() {
            return Ok(None);
        }
        let attrs = self.read_attributes(&dir)?;
        Self::meta_from_attributes(key, &attrs)
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.node_dir(key).is_dir())
    }

    fn list(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.node_dir(key);
        if !dir.is_dir() {
            return Err(StoreError::MissingKey(normalize_key(key)));
        }
        if self.dataset_meta(key)?.is_some() {
            return Err(StoreError::NotAGroup(normalize_key(key)));
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(io_err(&dir))? {
            let entry = entry.map_err(io_err(&dir))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, key: &str, roi: &Roi) -> Result<ArrayD<u64>, StoreError> {
        let (meta, compression) = self.dataset(key)?;
        meta.check_roi(key, roi)?;
        let mut out = zeros(&roi.shape());
        for chunk in meta.chunks_overlapping(roi) {
            let Some(data) = self.read_chunk(key, &meta, compression, &chunk)? else {
                continue;
            };
            let chunk_roi = meta.chunk_roi(&chunk);
            let Some(overlap) = chunk_roi.intersect(roi) else {
                continue;
            };
            let src = view_region(data.view(), &overlap.relative_to(&chunk_roi.begin));
            copy_region(&mut out, &overlap.relative_to(&roi.begin), src);
        }
        Ok(out)
    }

    fn write(&self, key: &str, begin: &[u64], data: ArrayViewD<'_, u64>) -> Result<(), StoreError> {
        let (meta, compression) = self.dataset(key)?;
        let end = begin.iter().zip(data.shape()).map(|(b, s)| b + *s as u64).collect();
        let roi = Roi::new(begin.to_vec(), end);
        meta.check_roi(key, &roi)?;
        for chunk in meta.chunks_overlapping(&roi) {
            let chunk_roi = meta.chunk_roi(&chunk);
            let Some(overlap) = chunk_roi.intersect(&roi) else {
                continue;
            };
            let src = view_region(data.view(), &overlap.relative_to(&roi.begin));
            if overlap == chunk_roi {
                self.write_chunk(key, compression, &chunk, src)?;
                continue;
            }
            let mut existing = match self.read_chunk(key, &meta, compression, &chunk)? {
                Some(existing) => existing,
                None => zeros(&chunk_roi.shape()),
            };
            copy_region(&mut existing, &overlap.relative_to(&chunk_roi.begin), src);
            self.write_chunk(key, compression, &chunk, existing.view())?;
        }
        Ok(())
    }

    fn read_varlen(&self, key: &str, chunk: &[u64]) -> Result<Option<Vec<u64>>, StoreError> {
        let (meta, compression) = self.dataset(key)?;
        meta.check_chunk(key, chunk)?;
        let path = self.chunk_path(key, chunk);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        let decoded = decode_chunk(&path, &bytes, compression)?;
        if !decoded.varlength {
            return Err(codec_err(&path, "expected a varlength chunk"));
        }
        Ok(Some(decoded.values))
    }

    fn write_varlen(&self, key: &str, chunk: &[u64], data: &[u64]) -> Result<(), StoreError> {
        let (meta, compression) = self.dataset(key)?;
        meta.check_chunk(key, chunk)?;
        let path = self.chunk_path(key, chunk);
        let shape = meta.chunk_roi(chunk).shape();
        let bytes =
            encode_chunk(&path, &shape, data.iter().copied(), data.len(), true, compression)?;
        write_atomic(&path, &bytes)
    }

    fn get_attrs(&self, key: &str) -> Result<Attrs, StoreError> {
        let dir = self.node_dir(key);
        if !dir.is_dir() {
            return Err(StoreError::MissingKey(normalize_key(key)));
        }
        let mut attrs = self.read_attributes(&dir)?;
        if attrs.contains_key("dimensions") {
            for reserved in RESERVED_KEYS {
                attrs.remove(reserved);
            }
        }
        Ok(attrs)
    }

    fn set_attrs(&self, key: &str, attrs: Attrs) -> Result<(), StoreError> {
        let dir = self.node_dir(key);
        if !dir.is_dir() {
            return Err(StoreError::MissingKey(normalize_key(key)));
        }
        let mut current = self.read_attributes(&dir)?;
        let is_dataset = current.contains_key("dimensions");
        for (name, value) in attrs {
            if is_dataset && RESERVED_KEYS.contains(&name.as_str()) {
                tracing::warn!(key, attribute = %name, "ignoring reserved dataset attribute");
                continue;
            }
            current.insert(name, value);
        }
        self.write_attributes(&dir, &current)
    }
}

/// Opens [`N5Store`] containers by path.
#[derive(Debug, Clone, Copy, Default)]
pub struct N5Provider;

impl StoreProvider for N5Provider {
    fn open(&self, path: &str) -> Result<Arc<dyn VolumeStore>, StoreError> {
        Ok(Arc::new(N5Store::open(path)?))
    }
}

fn reversed(values: &[u64]) -> Vec<u64> {
    values.iter().rev().copied().collect()
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path)(e)),
    }
}

/// Write `bytes` to a uniquely named sibling and rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("chunk");
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
    std::fs::write(&tmp_path, bytes).map_err(io_err(&tmp_path))?;
    std::fs::rename(&tmp_path, path).map_err(io_err(path))
}

struct DecodedChunk {
    /// Block shape in store (zyx) order.
    shape: Vec<usize>,
    varlength: bool,
    values: Vec<u64>,
}

fn encode_chunk(
    path: &Path,
    shape: &[usize],
    values: impl Iterator<Item = u64>,
    len: usize,
    varlength: bool,
    compression: Compression,
) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::with_capacity(4 + 4 * shape.len() + 4 + 8 * len);
    let mode = if varlength { MODE_VARLENGTH } else { MODE_DEFAULT };
    out.extend_from_slice(&mode.to_be_bytes());
    out.extend_from_slice(&(shape.len() as u16).to_be_bytes());
    for dim in shape.iter().rev() {
        out.extend_from_slice(&(*dim as u32).to_be_bytes());
    }
    if varlength {
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
    let mut payload = Vec::with_capacity(8 * len);
    for value in values {
        payload.extend_from_slice(&value.to_be_bytes());
    }
    match compression {
        Compression::Raw => out.extend_from_slice(&payload),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(out, flate2::Compression::default());
            encoder.write_all(&payload).map_err(io_err(path))?;
            out = encoder.finish().map_err(io_err(path))?;
        }
    }
    Ok(out)
}

struct Cursor<'a> {
    path: &'a Path,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], StoreError> {
        let end = self.offset + N;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| codec_err(self.path, "truncated chunk"))?;
        self.offset = end;
        <[u8; N]>::try_from(slice).map_err(|_| codec_err(self.path, "truncated chunk"))
    }

    fn u16(&mut self) -> Result<u16, StoreError> {
        self.take::<2>().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32, StoreError> {
        self.take::<4>().map(u32::from_be_bytes)
    }

    fn u64(&mut self) -> Result<u64, StoreError> {
        self.take::<8>().map(u64::from_be_bytes)
    }
}

fn decode_chunk(
    path: &Path,
    bytes: &[u8],
    compression: Compression,
) -> Result<DecodedChunk, StoreError> {
    let mut cursor = Cursor { path, bytes, offset: 0 };
    let varlength = match cursor.u16()? {
        MODE_DEFAULT => false,
        MODE_VARLENGTH => true,
        mode => return Err(codec_err(path, format!("unknown block mode {}", mode))),
    };
    let ndim = cursor.u16()? as usize;
    let mut shape = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        shape.push(cursor.u32()? as usize);
    }
    shape.reverse();
    let len = if varlength {
        cursor.u32()? as usize
    } else {
        shape.iter().product()
    };
    let payload: Cow<'_, [u8]> = match compression {
        Compression::Raw => Cow::Borrowed(&bytes[cursor.offset..]),
        Compression::Gzip => {
            let mut inflated = Vec::new();
            GzDecoder::new(&bytes[cursor.offset..])
                .read_to_end(&mut inflated)
                .map_err(|e| codec_err(path, format!("gzip payload: {}", e)))?;
            Cow::Owned(inflated)
        }
    };
    if payload.len() != len * 8 {
        return Err(codec_err(
            path,
            format!("expected {} values, found {} bytes", len, payload.len()),
        ));
    }
    let mut cursor = Cursor { path, bytes: &payload[..], offset: 0 };
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(cursor.u64()?);
    }
    Ok(DecodedChunk { shape, varlength, values })
}

#[cfg(test)]
#[path = "n5_tests.rs"]
mod tests;
