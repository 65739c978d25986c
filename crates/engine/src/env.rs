// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::path::PathBuf;
use std::time::Duration;

/// Tmp folder override (`CT_TMP_FOLDER`)
pub fn tmp_folder() -> Option<PathBuf> {
    std::env::var("CT_TMP_FOLDER").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Upper bound on jobs per task (`CT_MAX_JOBS`). Zero is ignored.
pub fn max_jobs() -> Option<usize> {
    std::env::var("CT_MAX_JOBS").ok().and_then(|s| s.parse::<usize>().ok()).filter(|&n| n > 0)
}

/// Backend name override (`CT_BACKEND`), parsed by the config layer.
pub fn backend() -> Option<String> {
    std::env::var("CT_BACKEND").ok().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

/// Marker poll interval override (`CT_POLL_INTERVAL_MS`)
pub fn poll_interval() -> Option<Duration> {
    std::env::var("CT_POLL_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
