// Copyright (c) 2026 GridLedger Contributors. MIT License.
// See LICENSE for details.

//! # GridLedger Operator Node
//!
//! Entry point for the `gridledger-node` binary. Parses CLI arguments,
//! initializes logging, and runs exactly one command against the local
//! world state.
//!
//! The binary supports four subcommands:
//!
//! - `init`: create a data directory and its `policy.json`
//! - `invoke`: run one contract function, commit on success
//! - `events`: print committed events
//! - `version`: print build version information
//!
//! Results are printed to stdout as JSON. A failed invocation exits non-zero
//! with the error kind and message on stderr.

mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use cli::{Commands, GridLedgerCli};
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = GridLedgerCli::parse();
    logging::init_logging(LogFormat::from_str_lossy(&cli.log_format))?;

    match cli.command {
        Commands::Init(args) => print_json(&commands::init(&args)?),
        Commands::Invoke(args) => print_json(&commands::invoke(&args)?),
        Commands::Events(args) => {
            for record in commands::events(&args)? {
                let line = serde_json::to_string(&record).context("failed to encode event")?;
                println!("{line}");
            }
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to encode result")?;
    println!("{rendered}");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("gridledger-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc           {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
