// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `surpctl list`: observe every register in the group via the catch-all
//! multicast subscription and the group's sync observer.

use super::CommandResult;
use crate::env::Environment;
use clap::Args;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use surp::register::META_TYPE;
use surp::{GroupConfig, JoinMode, Optional, RegisterGroup, Value};

#[derive(Args)]
pub struct ListArgs {
    /// Only list registers whose name contains one of these substrings
    pub filters: Vec<String>,

    /// Stay connected and write changes to stdout
    #[arg(short, long)]
    pub stay: bool,

    /// Seconds to wait for registers before exiting
    #[arg(short, long, default_value_t = 10)]
    pub timeout: u64,

    /// Do not print values
    #[arg(long)]
    pub no_values: bool,

    /// Do not print metadata
    #[arg(long)]
    pub no_meta: bool,
}

fn passes_filter(name: &str, filters: &[String]) -> bool {
    filters.is_empty() || filters.iter().any(|f| name.contains(f.as_str()))
}

pub fn run(args: &ListArgs) -> CommandResult {
    let env = Environment::from_env()?;
    let group = RegisterGroup::join_with_config(
        &env.interface,
        &env.group,
        GroupConfig::with_mode(JoinMode::CatchAll),
    )?;

    let seen: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
    let filters = args.filters.clone();
    let stay = args.stay;
    let no_values = args.no_values;
    let no_meta = args.no_meta;

    group.on_sync(move |msg| {
        let mut seen = seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !passes_filter(&msg.name, &filters) || (seen.contains(&msg.name) && !stay) {
            return;
        }

        let mut line = msg.name.clone();
        if !no_values {
            let value = match (&msg.value, msg.metadata.get(META_TYPE)) {
                (Optional::Defined(bytes), Some(typ)) => match Value::decode(bytes, typ) {
                    Some(v) => Optional::Defined(v),
                    None => return,
                },
                _ => Optional::Undefined,
            };
            line.push_str(&format!("={}", value));
        }
        if !no_meta {
            let mut pairs: Vec<String> = msg
                .metadata
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect();
            pairs.sort();
            line.push_str(&format!(" \t[{}]", pairs.join(" ")));
        }
        println!("{}", line);
        seen.insert(msg.name.clone());
    });

    if args.stay {
        loop {
            std::thread::sleep(Duration::from_secs(3600));
        }
    }

    std::thread::sleep(Duration::from_secs(args.timeout));
    group.close();
    Ok(())
}
