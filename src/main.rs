//! racesim CLI.
//!
//! Logging goes to stderr and is filtered with `RUST_LOG` (default `info`).

use std::process::ExitCode;

use racesim::cli::{run_cli, Args};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run_cli(Args::parse())
}
