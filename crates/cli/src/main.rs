// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ct: block-parallel label conversion for chunked multiscale volumes.

mod color;
mod commands;
mod exit_error;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ct",
    version,
    about = "Block-parallel label conversion for chunked multiscale volumes",
    styles = color::styles()
)]
struct Cli {
    /// Also append log events to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversion workflow of a config file
    Run(commands::run::RunArgs),
    /// Run one job (invoked by the backends)
    RunJob(commands::run_job::RunJobArgs),
    /// Show the job statuses of a task
    Status(commands::status::StatusArgs),
    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(error) => {
            let (code, message) = ExitError::from_anyhow(&error);
            eprintln!("{}", message);
            code
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let _guard = logging::init(cli.log_file.as_deref())?;
    match cli.command {
        Commands::Run(args) => commands::run::handle(args).await,
        Commands::RunJob(args) => commands::run_job::handle(args),
        Commands::Status(args) => commands::status::handle(args),
        Commands::Config => commands::config::handle(),
    }
}
