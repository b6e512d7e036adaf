// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `surpctl get`: read one register through an any-typed consumer.

use super::CommandResult;
use crate::env::Environment;
use clap::Args;
use crossbeam::channel;
use std::sync::Arc;
use std::time::Duration;
use surp::config::SYNC_TIMEOUT;
use surp::register::{consumer, Consumer};
use surp::RegisterGroup;

#[derive(Args)]
pub struct GetArgs {
    /// Register name
    pub register: String,

    /// Stay connected and write changes to stdout
    #[arg(short, long)]
    pub stay: bool,
}

pub fn run(args: &GetArgs) -> CommandResult {
    let env = Environment::from_env()?;
    let group = RegisterGroup::join(&env.interface, &env.group)?;

    let (tx, rx) = channel::unbounded();
    let register = consumer::Register::any(
        args.register.as_str(),
        vec![Box::new(move |value| {
            let _ = tx.send(value);
        })],
    );
    group.add_consumers([register as Arc<dyn Consumer>])?;

    if args.stay {
        loop {
            let value = rx.recv()?;
            println!("{}", value);
        }
    }

    let value = rx
        .recv_timeout(SYNC_TIMEOUT + Duration::from_secs(1))
        .map_err(|_| "timeout")?;
    println!("{}", value);
    group.close();
    Ok(())
}
