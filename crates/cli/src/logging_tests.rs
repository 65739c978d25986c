// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn ct_log_takes_precedence_over_rust_log() {
    std::env::set_var("CT_LOG", "debug");
    std::env::set_var("RUST_LOG", "warn");

    assert_eq!(env_filter().to_string(), "debug");

    std::env::remove_var("CT_LOG");
    std::env::remove_var("RUST_LOG");
}

#[test]
#[serial]
fn rust_log_is_the_fallback() {
    std::env::remove_var("CT_LOG");
    std::env::set_var("RUST_LOG", "ct_engine=trace");

    assert_eq!(env_filter().to_string(), "ct_engine=trace");

    std::env::remove_var("RUST_LOG");
}

#[test]
#[serial]
fn defaults_to_info() {
    std::env::remove_var("CT_LOG");
    std::env::remove_var("RUST_LOG");

    assert_eq!(env_filter().to_string(), "info");
}
