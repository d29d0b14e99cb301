//! Opt-in tracing setup for binaries and tests embedding the crate.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the verbosity-derived filter.
pub const LOG_ENV: &str = "SHELLPIPE_LOG";

/// Filter directive for a `-v` count.
pub fn filter_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "shellpipe=debug",
        2 => "shellpipe=trace",
        _ => "trace",
    }
}

/// Install a stderr `fmt` subscriber. [`LOG_ENV`] wins over `verbose`
/// when set. Fails if a global subscriber is already installed.
pub fn init_logging(verbose: u8) -> Result<()> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::new(filter_for_verbosity(verbose)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 3)
        .with_line_number(verbose >= 3)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
