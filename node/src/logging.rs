//! # Logging
//!
//! `gridledger-node` runs one invocation per process, so the subscriber is
//! installed once at startup and torn down with the process. Stdout belongs
//! to the command's JSON result; every log line goes to stderr, which lets
//! callers pipe the result without filtering.
//!
//! The filter comes from `RUST_LOG` when it is set and parses, and from
//! [`DEFAULT_DIRECTIVES`] otherwise. The format comes from `--log-format`
//! (or `GRIDLEDGER_LOG_FORMAT`).

use std::io::IsTerminal;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: contract decisions at info, store
/// plumbing only when something is off.
pub const DEFAULT_DIRECTIVES: &str =
    "gridledger_node=info,gridledger_contracts=info,gridledger_protocol=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One human-readable line per event.
    Pretty,
    /// One JSON object per event, for shipping an invocation's trail
    /// alongside its result.
    Json,
}

impl LogFormat {
    /// "json" in any case selects [`LogFormat::Json`]; anything else is
    /// [`LogFormat::Pretty`].
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Build the filter for this run. An unparsable `override_directives` falls
/// back to [`DEFAULT_DIRECTIVES`] rather than silencing the run.
fn build_filter(override_directives: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = override_directives.filter(|d| !d.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(DEFAULT_DIRECTIVES).context("invalid default log directives")
}

/// Install the stderr subscriber for this invocation. Fails if one is
/// already installed.
pub fn init_logging(format: LogFormat) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(rust_log.as_deref())?;
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init(),
    }
    .context("logging already initialized")?;

    tracing::debug!(?format, "logging initialized");
    Ok(())
}
