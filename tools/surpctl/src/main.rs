// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! surpctl - command line for SURP register groups.
//!
//! The interface and group come from the environment:
//!
//! ```bash
//! export SURP_IF=eth0
//! export SURP_GROUP=plant
//!
//! surpctl list                 # print every register in the group
//! surpctl get boiler.temp -s   # follow one register
//! surpctl set boiler.target 55 # write a register
//! surpctl provide door true type:bool rw:true
//! ```

use clap::{Parser, Subcommand};

mod commands;
mod env;

#[derive(Parser)]
#[command(name = "surpctl", version = surp::VERSION, about = "SURP register group CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all known registers
    List(commands::list::ListArgs),
    /// Read a register
    Get(commands::get::GetArgs),
    /// Write a register
    Set(commands::set::SetArgs),
    /// Provide a register
    Provide(commands::provide::ProvideArgs),
    /// Show the SURP environment
    Env,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::List(args) => commands::list::run(&args),
        Command::Get(args) => commands::get::run(&args),
        Command::Set(args) => commands::set::run(&args),
        Command::Provide(args) => commands::provide::run(&args),
        Command::Env => commands::run_env(),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
