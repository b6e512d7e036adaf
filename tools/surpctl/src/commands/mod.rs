// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subcommand implementations.

pub mod get;
pub mod list;
pub mod provide;
pub mod set;

use crate::env::Environment;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// `surpctl env`: report how the environment resolves.
pub fn run_env() -> CommandResult {
    let env = Environment::from_env()?;
    println!("SURP_IF={}", env.interface);
    println!("SURP_GROUP={}", env.group);
    Ok(())
}
