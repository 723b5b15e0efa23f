//! Diagnostic logging for the CLI
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! picks those records up and writes them to stderr. `RUST_LOG` wins over
//! the `--verbose` default.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

pub(crate) fn init(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}
