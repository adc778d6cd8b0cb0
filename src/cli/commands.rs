//! CLI command handlers.

use std::path::Path;
use std::process::ExitCode;

use tracing::error;

use crate::config::EngineConfig;
use crate::engine::RaceEngine;
use crate::error::SimResult;
use crate::model::Season;

use super::output::{format_aggregate, format_projection, format_report, print_help, print_version};
use super::{Args, Command};

/// Main CLI entry point.
///
/// Dispatches to the appropriate command handler based on parsed arguments.
#[must_use]
pub fn run_cli(args: Args) -> ExitCode {
    match args.command {
        Command::Simulate {
            season_path,
            round,
            seed_override,
            trials_override,
            json,
            config_path,
        } => simulate(&season_path, round, seed_override, trials_override, json, config_path.as_deref()),
        Command::Season {
            season_path,
            seed_override,
            config_path,
        } => season(&season_path, seed_override, config_path.as_deref()),
        Command::Diagnose {
            season_path,
            config_path,
        } => diagnose(&season_path, config_path.as_deref()),
        Command::Help => {
            print_help();
            ExitCode::SUCCESS
        }
        Command::Version => {
            print_version();
            ExitCode::SUCCESS
        }
    }
}

/// Load a season and configuration and apply command-line overrides.
///
/// # Errors
///
/// Returns an input error for unreadable or invalid files.
pub fn load_engine(
    season_path: &Path,
    config_path: Option<&Path>,
    seed_override: Option<u64>,
    trials_override: Option<usize>,
) -> SimResult<RaceEngine> {
    let season = Season::load(season_path)?;
    let mut config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = seed_override {
        config.reproducibility.seed = seed;
    }
    if let Some(trials) = trials_override {
        config.monte_carlo.trials = trials.max(1);
    }
    RaceEngine::new(season, config)
}

fn report_error(e: &crate::error::SimError) -> ExitCode {
    error!(error = %e, "command failed");
    eprintln!("Error: {e}");
    if e.is_input_error() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

/// Simulate one round and print the aggregate.
#[must_use]
pub fn simulate(
    season_path: &Path,
    round: u32,
    seed_override: Option<u64>,
    trials_override: Option<usize>,
    json: bool,
    config_path: Option<&Path>,
) -> ExitCode {
    let run = || -> SimResult<String> {
        let engine = load_engine(season_path, config_path, seed_override, trials_override)?;
        let event = engine.season().event_by_round(round)?.clone();
        let result = engine.simulate(&event.id)?;
        if json {
            result.to_json()
        } else {
            Ok(format_aggregate(&result, &event))
        }
    };
    match run() {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

/// Project the championship and print standings.
#[must_use]
pub fn season(season_path: &Path, seed_override: Option<u64>, config_path: Option<&Path>) -> ExitCode {
    let run = || -> SimResult<String> {
        let engine = load_engine(season_path, config_path, seed_override, None)?;
        Ok(format_projection(&engine.project_season()?))
    };
    match run() {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

/// Run the validator battery. Failed checks are advisory and do not change
/// the exit code.
#[must_use]
pub fn diagnose(season_path: &Path, config_path: Option<&Path>) -> ExitCode {
    let run = || -> SimResult<String> {
        let engine = load_engine(season_path, config_path, None, None)?;
        Ok(format_report(&engine.diagnose()?))
    };
    match run() {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}
