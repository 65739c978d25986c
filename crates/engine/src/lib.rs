// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ct-engine: task resolution, workflows, scale alignment and the job
//! implementations of the label conversion pipeline.

pub mod aligner;
pub mod config;
pub mod conversion;
pub mod env;
pub mod error;
pub mod ops;
pub mod registry;
pub mod runner;
pub mod task;
pub mod workflow;

pub use aligner::{build_chain, plan, AlignmentPlan, AlignmentStep, Direction};
pub use config::{
    default_config_toml, BackendKind, ConfigFileError, ConversionSettings, GlobalConfig,
    TaskSettings, WorkflowConfig,
};
pub use conversion::{discover_raw_scales, ConversionWorkflow, RawScales};
pub use error::{JobError, OpError, RegistryError, TaskError, WorkflowError};
pub use registry::{JobContext, JobFn, JobRegistry};
pub use runner::{run_job, JobRunner, STORE_PATH_KEY};
pub use task::{
    Operation, OutputState, RunContext, RunSettings, Task, TaskBuilder, TaskContext, TaskOutcome,
    TaskStatus,
};
pub use workflow::{Workflow, WorkflowReport};
