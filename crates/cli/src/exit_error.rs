// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! so that `main()` owns process termination and log flushing.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Exit code and message for any command error.
    ///
    /// Errors that are not an `ExitError` exit with 1 and print their whole
    /// source chain.
    pub fn from_anyhow(error: &anyhow::Error) -> (i32, String) {
        match error.downcast_ref::<ExitError>() {
            Some(exit) => (exit.code, exit.message.clone()),
            None => (1, format!("error: {:#}", error)),
        }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
