// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ct-storage: volume stores and the persisted job log layout.

pub mod job_log;
pub mod log_paths;
mod memory;
mod n5;
pub mod volume;

pub use job_log::{format_utc_now, read_status, tail, JobLogger, TaskMarker};
pub use log_paths::LogLayout;
pub use memory::MemoryVolumeStore;
pub use n5::{N5Provider, N5Store, N5_VERSION};
pub use volume::{
    join_key, normalize_key, Attrs, DatasetMeta, Roi, SharedStoreProvider, StoreError,
    StoreProvider, VolumeStore,
};
