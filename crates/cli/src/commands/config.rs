// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ct config`: print the default workflow configuration.

use ct_engine::{default_config_toml, JobRegistry};

pub fn handle() -> anyhow::Result<()> {
    print!("{}", default_config_toml(&JobRegistry::builtin())?);
    Ok(())
}
