//! # gitsnap
//!
//! **CLI Binary**
//!
//! Entry point for the `gitsnap` command-line application: argument parsing,
//! directory validation, logging setup, and exit-code mapping. The snapshot
//! work itself lives in `gitsnap-snapshot`.
//!
//! This crate should contain minimal business logic.

use anyhow::Result;
use clap::Parser;
use gitsnap_types::SnapError;
use tracing::info;

mod cli;

pub use cli::Cli;

/// Parse arguments, run the snapshot, log the outcome.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.into_config()?;
    let summary = gitsnap_snapshot::snapshot(&config)?;

    if config.stats_only {
        info!("completed stats for commit '{}'", summary.commit);
    } else {
        info!(
            "completed successfully at '{}'",
            config.output_path.display()
        );
    }
    Ok(())
}

/// The process exit code for a failed run.
///
/// Coded errors carry their own status; anything else exits 1.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<SnapError>()
        .map_or(1, SnapError::exit_code)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
