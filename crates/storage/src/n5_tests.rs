// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ndarray::{Array, Array3};
use tempfile::tempdir;

fn ramp(shape: (usize, usize, usize)) -> ArrayD<u64> {
    let n = shape.0 * shape.1 * shape.2;
    Array::from_iter(1..=n as u64).into_shape_with_order(shape).unwrap().into_dyn()
}

#[test]
fn create_writes_root_version() {
    let dir = tempdir().unwrap();
    let store = N5Store::create(dir.path().join("data.n5")).unwrap();
    let attrs = store.get_attrs("").unwrap();
    assert_eq!(attrs["n5"], json!(N5_VERSION));
}

#[test]
fn open_missing_container_fails() {
    let dir = tempdir().unwrap();
    assert!(matches!(N5Store::open(dir.path().join("nope.n5")), Err(StoreError::MissingKey(_))));
}

#[test]
fn dataset_attributes_use_reversed_axes() {
    let dir = tempdir().unwrap();
    let store = N5Store::create(dir.path().join("data.n5")).unwrap();
    store.require_dataset("labels/s0", &DatasetMeta::uint64(vec![10, 20, 30], vec![2, 4, 8])).unwrap();

    let raw = std::fs::read_to_string(store.root().join("labels/s0/attributes.json")).unwrap();
    let attrs: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(attrs["dimensions"], json!([30, 20, 10]));
    assert_eq!(attrs["blockSize"], json!([8, 4, 2]));
    assert_eq!(attrs["dataType"], json!("uint64"));
    assert_eq!(attrs["compression"]["type"], json!("raw"));

    let meta = store.dataset_meta("labels/s0").unwrap().unwrap();
    assert_eq!(meta.shape, vec![10, 20, 30]);
    assert_eq!(meta.chunks, vec![2, 4, 8]);
    assert_eq!(store.list("labels").unwrap(), vec!["s0".to_string()]);
}

#[test]
fn round_trips_unaligned_regions() {
    let dir = tempdir().unwrap();
    let store = N5Store::create(dir.path().join("data.n5")).unwrap();
    store.require_dataset("vol", &DatasetMeta::uint64(vec![5, 6, 7], vec![2, 4, 3])).unwrap();

    let data = ramp((3, 4, 5));
    store.write("vol", &[1, 1, 1], data.view()).unwrap();
    assert_eq!(store.read("vol", &Roi::new(vec![1, 1, 1], vec![4, 5, 6])).unwrap(), data);

    let full = store.read_all("vol").unwrap();
    assert_eq!(full[[0, 0, 0]], 0);
    assert_eq!(full[[1, 1, 1]], 1);
    assert_eq!(full[[4, 5, 6]], 0);
}

#[test]
fn chunk_files_are_laid_out_x_first_and_big_endian() {
    let dir = tempdir().unwrap();
    let store = N5Store::create(dir.path().join("data.n5")).unwrap();
    store.require_dataset("vol", &DatasetMeta::uint64(vec![2, 2, 4], vec![2, 2, 2])).unwrap();
    let data = Array3::<u64>::from_elem((2, 2, 2), 258).into_dyn();
    store.write("vol", &[0, 0, 2], data.view()).unwrap();

    let bytes = std::fs::read(store.root().join("vol/1/0/0")).unwrap();
    assert_eq!(&bytes[0..4], &[0, 0, 0, 3]);
    assert_eq!(&bytes[4..16], &[0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 2]);
    assert_eq!(&bytes[16..24], &258u64.to_be_bytes());
    assert_eq!(bytes.len(), 16 + 8 * 8);
    assert!(!store.root().join("vol/0/0/0").exists());
}

#[test]
fn edge_chunks_are_clipped() {
    let dir = tempdir().unwrap();
    let store = N5Store::create(dir.path().join("data.n5")).unwrap();
    store.require_dataset("vol", &DatasetMeta::uint64(vec![3, 3, 3], vec![2, 2, 2])).unwrap();
    store.write("vol", &[0, 0, 0], ramp((3, 3, 3)).view()).unwrap();

    let bytes = std::fs::read(store.root().join("vol/1/1/1")).unwrap();
    assert_eq!(bytes.len(), 16 + 8);
    assert_eq!(store.read_all("vol").unwrap(), ramp((3, 3, 3)));
}

#[test]
fn varlen_chunks_round_trip() {
    let dir = tempdir().unwrap();
    let store = N5Store::create(dir.path().join("data.n5")).unwrap();
    store.require_dataset("uniques", &DatasetMeta::uint64(vec![4, 4, 4], vec![2, 2, 2])).unwrap();
    store.write_varlen("uniques", &[0, 1, 0], &[0, 5, 17]).unwrap();

    assert_eq!(store.read_varlen("uniques", &[0, 1, 0]).unwrap(), Some(vec![0, 5, 17]));
    assert_eq!(store.read_varlen("uniques", &[1, 1, 1]).unwrap(), None);
    let bytes = std::fs::read(store.root().join("uniques/0/1/0")).unwrap();
    assert_eq!(&bytes[0..2], &[0, 1]);
    assert!(matches!(store.read_all("uniques"), Err(StoreError::Codec { .. })));
}

#[test]
fn truncated_chunk_is_a_codec_error() {
    let dir = tempdir().unwrap();
    let store = N5Store::create(dir.path().join("data.n5")).unwrap();
    store.require_dataset("vol", &DatasetMeta::uint64(vec![2, 2, 2], vec![2, 2, 2])).unwrap();
    std::fs::create_dir_all(store.root().join("vol/0/0")).unwrap();
    std::fs::write(store.root().join("vol/0/0/0"), [0u8, 0, 0]).unwrap();
    assert!(matches!(store.read_all("vol"), Err(StoreError::Codec { .. })));
}

#[test]
fn user_attrs_hide_structure() {
    let dir = tempdir().unwrap();
    let store = N5Store::create(dir.path().join("data.n5")).unwrap();
    store.require_dataset("labels/s1", &DatasetMeta::uint64(vec![2, 2, 2], vec![2, 2, 2])).unwrap();
    let mut attrs = Attrs::new();
    attrs.insert("downsamplingFactors".into(), json!([2, 2, 2]));
    attrs.insert("dimensions".into(), json!([1, 1, 1]));
    store.set_attrs("labels/s1", attrs).unwrap();

    let attrs = store.get_attrs("labels/s1").unwrap();
    assert_eq!(attrs.get("downsamplingFactors"), Some(&json!([2, 2, 2])));
    assert!(!attrs.contains_key("dimensions"));
    assert_eq!(store.dataset_meta("labels/s1").unwrap().unwrap().shape, vec![2, 2, 2]);
}

#[test]
fn non_uint64_datasets_expose_meta_but_refuse_io() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("data.n5");
    let store = N5Store::create(&root).unwrap();
    std::fs::create_dir_all(root.join("raw/s0")).unwrap();
    std::fs::write(
        root.join("raw/s0/attributes.json"),
        r#"{"dimensions":[8,8,8],"blockSize":[4,4,4],"dataType":"uint8","compression":{"type":"raw"}}"#,
    )
    .unwrap();

    assert_eq!(store.dataset_meta("raw/s0").unwrap().unwrap().data_type, "uint8");
    assert!(matches!(store.read_all("raw/s0"), Err(StoreError::UnsupportedDataType { .. })));
}

fn write_dataset_attributes(root: &Path, key: &str, compression: &str) {
    std::fs::create_dir_all(root.join(key)).unwrap();
    let attrs = json!({
        "dimensions": [6, 4, 4],
        "blockSize": [4, 2, 2],
        "dataType": "uint64",
        "compression": { "type": compression, "level": -1 },
    });
    std::fs::write(root.join(key).join("attributes.json"), attrs.to_string()).unwrap();
}

#[test]
fn gzip_datasets_round_trip() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("data.n5");
    let store = N5Store::create(&root).unwrap();
    write_dataset_attributes(&root, "seg/s0", "gzip");

    let data = ramp((4, 4, 6));
    store.write("seg/s0", &[0, 0, 0], data.view()).unwrap();
    assert_eq!(store.read_all("seg/s0").unwrap(), data);

    let bytes = std::fs::read(root.join("seg/s0/1/0/0")).unwrap();
    assert_eq!(&bytes[0..4], &[0, 0, 0, 3]);
    assert_eq!(&bytes[4..16], &[0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 2]);
    assert_eq!(&bytes[16..18], &[0x1f, 0x8b]);
    let mut payload = Vec::new();
    GzDecoder::new(&bytes[16..]).read_to_end(&mut payload).unwrap();
    assert_eq!(payload.len(), 8 * 8);
    assert_eq!(&payload[0..8], &data[[0, 0, 4]].to_be_bytes());

    store.write_varlen("seg/s0", &[1, 1, 0], &[3, 9, 27]).unwrap();
    assert_eq!(store.read_varlen("seg/s0", &[1, 1, 0]).unwrap(), Some(vec![3, 9, 27]));
}

#[test]
fn corrupt_gzip_payload_is_a_codec_error() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("data.n5");
    let store = N5Store::create(&root).unwrap();
    write_dataset_attributes(&root, "seg", "gzip");
    std::fs::create_dir_all(root.join("seg/0/0")).unwrap();
    let mut bytes = vec![0u8, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0, 2, 0, 0, 0, 2];
    bytes.extend_from_slice(b"not gzip");
    std::fs::write(root.join("seg/0/0/0"), bytes).unwrap();

    assert!(matches!(store.read_all("seg"), Err(StoreError::Codec { .. })));
}

#[test]
fn unknown_compression_is_unsupported() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("data.n5");
    let store = N5Store::create(&root).unwrap();
    write_dataset_attributes(&root, "seg", "blosc");

    match store.read_all("seg") {
        Err(StoreError::UnsupportedCompression { key, compression }) => {
            assert_eq!(key, "seg");
            assert_eq!(compression, "blosc");
        }
        other => panic!("expected unsupported compression, got {:?}", other),
    }
    assert!(store.dataset_meta("seg").unwrap().is_some());
}

#[test]
fn provider_opens_existing_containers() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("data.n5");
    N5Store::create(&root).unwrap().require_group("a/b").unwrap();
    let store = N5Provider.open(root.to_str().unwrap()).unwrap();
    assert!(store.contains("a/b").unwrap());
}
