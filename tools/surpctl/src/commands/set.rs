// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `surpctl set`: write one register and wait for the provider to confirm.
//!
//! Set is best-effort unicast, so the command re-sends the desired value on
//! every observed sync until the register reports it back (or the timeout
//! runs out).

use super::CommandResult;
use crate::env::Environment;
use clap::Args;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::io::BufRead;
use std::sync::Arc;
use std::time::{Duration, Instant};
use surp::register::{consumer, Consumer, META_TYPE};
use surp::{Optional, RegisterGroup, Value};

#[derive(Args)]
pub struct SetArgs {
    /// Register name
    pub register: String,

    /// Value, parsed per the register's `type` metadata
    pub value: String,

    /// Stay connected, read further values from stdin
    #[arg(short, long)]
    pub stay: bool,

    /// Seconds to wait for the register to take the value
    #[arg(short = 'o', long, default_value_t = 30)]
    pub timeout: u64,
}

/// Drive one set to completion: on every observed sync, parse the desired
/// text against the register's current type and re-send until it matches.
fn set_register_value(
    register: &Arc<consumer::Register<Value>>,
    desired_text: &str,
    timeout: Duration,
    updates: &Receiver<Optional<Value>>,
) -> CommandResult {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or("timeout waiting for register to be set")?;
        let actual = match updates.recv_timeout(remaining) {
            Ok(actual) => actual,
            Err(RecvTimeoutError::Timeout) => {
                return Err("timeout waiting for register to be set".into())
            }
            Err(RecvTimeoutError::Disconnected) => return Err("group closed".into()),
        };

        let Optional::Defined(metadata) = register.metadata() else {
            continue;
        };
        let Some(typ) = metadata.get(META_TYPE) else {
            continue;
        };
        let desired = Value::parse(desired_text, typ)
            .ok_or_else(|| format!("cannot parse '{}' as {}", desired_text, typ))?;

        if actual == Optional::Defined(desired.clone()) {
            return Ok(());
        }
        register.set_value(Optional::Defined(desired));
    }
}

pub fn run(args: &SetArgs) -> CommandResult {
    let env = Environment::from_env()?;
    let group = RegisterGroup::join(&env.interface, &env.group)?;
    let timeout = Duration::from_secs(args.timeout);

    let (tx, rx) = crossbeam::channel::unbounded();
    let register = consumer::Register::any(
        args.register.as_str(),
        vec![Box::new(move |value| {
            let _ = tx.send(value);
        })],
    );
    group.add_consumers([register.clone() as Arc<dyn Consumer>])?;

    set_register_value(&register, &args.value, timeout, &rx)?;

    if args.stay {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if let Err(err) = set_register_value(&register, line.trim(), timeout, &rx) {
                eprintln!("{}", err);
            }
        }
    }

    group.close();
    Ok(())
}
