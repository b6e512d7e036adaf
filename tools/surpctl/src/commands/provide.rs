// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `surpctl provide`: serve a register from the command line.
//!
//! The register is advertised until the process exits; further values are
//! read from stdin, and accepted sets are echoed to stdout.

use super::CommandResult;
use crate::env::Environment;
use clap::Args;
use std::io::BufRead;
use std::sync::{Arc, OnceLock};
use surp::protocol::value::TYPE_INT;
use surp::register::{provider, Metadata, Provider, META_TYPE};
use surp::{Optional, RegisterGroup, Value};

#[derive(Args)]
pub struct ProvideArgs {
    /// Register name
    pub name: String,

    /// Initial value, parsed per the `type` metadata (default type: int)
    pub value: String,

    /// Additional metadata as key:value pairs
    pub metadata: Vec<String>,

    /// Make the register read-only
    #[arg(short, long)]
    pub read_only: bool,
}

fn parse_metadata(pairs: &[String]) -> Result<Metadata, String> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once(':') else {
            return Err(format!("metadata must be key:value, got '{}'", pair));
        };
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(metadata)
}

pub fn run(args: &ProvideArgs) -> CommandResult {
    let env = Environment::from_env()?;

    let metadata = parse_metadata(&args.metadata)?;
    let typ = metadata
        .get(META_TYPE)
        .cloned()
        .unwrap_or_else(|| TYPE_INT.to_string());
    let initial = Value::parse(&args.value, &typ)
        .ok_or_else(|| format!("cannot parse '{}' as {}", args.value, typ))?;

    let group = RegisterGroup::join(&env.interface, &env.group)?;

    // Accepted sets are echoed back as the new value and printed.
    let slot: Arc<OnceLock<Arc<provider::Register<Value>>>> = Arc::new(OnceLock::new());
    let echo = Arc::clone(&slot);
    let register = provider::Register::any(
        args.name.as_str(),
        Optional::Defined(initial),
        &typ,
        !args.read_only,
        Some(metadata),
        Some(Box::new(move |value| {
            if let Some(register) = echo.get() {
                register.sync_value(value.clone());
            }
            println!("{}", value);
        })),
    );
    let _ = slot.set(Arc::clone(&register));

    group.add_providers([register.clone() as Arc<dyn Provider>])?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match Value::parse(line.trim(), &typ) {
            Some(value) => register.sync_value(Optional::Defined(value)),
            None => eprintln!("cannot parse '{}' as {}", line.trim(), typ),
        }
    }

    group.close();
    Ok(())
}
