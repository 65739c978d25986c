// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ct-adapters: execution backends for block jobs.

pub mod backend;
pub mod cluster;
pub mod inprocess;
pub mod local;
pub mod lsf;
pub mod slurm;
pub mod subprocess;

pub use backend::{Backend, BackendError, SubmitBatch, SubmitHandle, WaitOutcome};
pub use cluster::ClusterConfig;
pub use inprocess::{InProcessBackend, JobExecutor};
pub use local::{LocalBackend, LocalConfig};
pub use lsf::LsfBackend;
pub use slurm::SlurmBackend;

#[cfg(any(test, feature = "test-support"))]
pub use backend::FakeBackend;
