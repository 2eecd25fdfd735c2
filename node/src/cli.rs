//! # CLI Interface
//!
//! Defines the command-line argument structure for `gridledger-node` using
//! `clap` derive. Supports four subcommands: `init`, `invoke`, `events`,
//! and `version`.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GridLedger operator node.
///
/// Executes energy-market contract operations against a local world state,
/// one invocation per process. Results go to stdout as JSON; logs go to
/// stderr.
#[derive(Parser, Debug)]
#[command(
    name = "gridledger-node",
    about = "GridLedger energy market operator node",
    version,
    propagate_version = true
)]
pub struct GridLedgerCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "GRIDLEDGER_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a data directory and write its deployment policy.
    Init(InitArgs),
    /// Run one contract function and commit its writes if it succeeds.
    Invoke(InvokeArgs),
    /// Print committed events, oldest first.
    Events(EventsArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "GRIDLEDGER_DATA_DIR", default_value = "./gridledger-data")]
    pub data_dir: PathBuf,

    /// MSP ID that approves supply orders and checks auctions.
    #[arg(long)]
    pub approver_org: Option<String>,

    /// MSP ID allowed to burn directly.
    #[arg(long)]
    pub burner_org: Option<String>,

    /// Overwrite an existing policy file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `invoke` subcommand.
#[derive(Parser, Debug)]
pub struct InvokeArgs {
    /// Path to the node data directory.
    #[arg(long, short = 'd', env = "GRIDLEDGER_DATA_DIR", default_value = "./gridledger-data")]
    pub data_dir: PathBuf,

    /// Policy file. Defaults to `policy.json` in the data directory.
    #[arg(long, env = "GRIDLEDGER_POLICY")]
    pub policy: Option<PathBuf>,

    /// Principal ID of the caller.
    #[arg(long, env = "GRIDLEDGER_CALLER")]
    pub caller: String,

    /// MSP ID of the caller's organization.
    #[arg(long, env = "GRIDLEDGER_ORG")]
    pub org: String,

    /// Transaction ID. A random UUID when omitted.
    #[arg(long)]
    pub tx_id: Option<String>,

    /// Invocation timestamp (RFC 3339). The current time when omitted.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Contract function, e.g. `CreateAccount` or `SubmitBid`.
    pub function: String,

    /// Positional arguments for the function.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the `events` subcommand.
#[derive(Parser, Debug)]
pub struct EventsArgs {
    /// Path to the node data directory.
    #[arg(long, short = 'd', env = "GRIDLEDGER_DATA_DIR", default_value = "./gridledger-data")]
    pub data_dir: PathBuf,

    /// Show at most this many of the most recent events.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Only show the events of this transaction.
    #[arg(long)]
    pub tx_id: Option<String>,
}
