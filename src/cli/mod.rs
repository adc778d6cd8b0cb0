//! Command-line interface.
//!
//! All CLI logic lives here rather than in `main.rs` so it can be tested.
//! The entry point [`run_cli`] is called from `main.rs` with parsed
//! arguments.

mod args;
mod commands;
mod output;

pub use args::{Args, Command};
pub use commands::{diagnose, load_engine, run_cli, season, simulate};
pub use output::{format_aggregate, format_projection, format_report, print_help, print_version};
