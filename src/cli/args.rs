//! CLI argument parsing.
//!
//! Accepts any iterator of strings so parsing can be tested without a
//! process environment.

use std::path::PathBuf;

/// CLI arguments container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// The command to execute.
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Simulate one round of a season.
    Simulate {
        season_path: PathBuf,
        round: u32,
        seed_override: Option<u64>,
        trials_override: Option<usize>,
        /// Print the aggregate as JSON.
        json: bool,
        config_path: Option<PathBuf>,
    },
    /// Project the championship.
    Season {
        season_path: PathBuf,
        seed_override: Option<u64>,
        config_path: Option<PathBuf>,
    },
    /// Run the validator battery.
    Diagnose {
        season_path: PathBuf,
        config_path: Option<PathBuf>,
    },
    /// Show help
    Help,
    /// Show version
    Version,
}

/// Options shared by every season command.
#[derive(Debug, Default)]
struct Options {
    round: Option<u32>,
    seed: Option<u64>,
    trials: Option<usize>,
    json: bool,
    config: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments from an iterator. The first item is the
    /// program name.
    #[must_use]
    pub fn parse_from<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::parse_from_vec(&args)
    }

    /// Parse command-line arguments from the environment.
    #[must_use]
    pub fn parse() -> Self {
        Self::parse_from(std::env::args())
    }

    fn parse_from_vec(args: &[String]) -> Self {
        let Some(name) = args.get(1) else {
            return Self { command: Command::Help };
        };

        let command = match name.as_str() {
            "simulate" => Self::parse_simulate(args),
            "season" => Self::parse_season(args),
            "diagnose" => Self::parse_diagnose(args),
            "-h" | "--help" | "help" => Command::Help,
            "-V" | "--version" | "version" => Command::Version,
            unknown => {
                eprintln!("Unknown command: {unknown}");
                Command::Help
            }
        };

        Self { command }
    }

    /// Season path at index 2, then flags. Unknown flags are ignored;
    /// flags with a missing or unparsable value keep their default.
    fn season_path_and_options(args: &[String], command: &str) -> Option<(PathBuf, Options)> {
        let Some(path) = args.get(2).filter(|p| !p.starts_with("--")) else {
            eprintln!("Error: '{command}' command requires a season file");
            return None;
        };

        let mut options = Options::default();
        let mut i = 3;
        while i < args.len() {
            let value = args.get(i + 1);
            match args[i].as_str() {
                "--round" => {
                    options.round = value.and_then(|v| v.parse().ok());
                    i += 2;
                }
                "--seed" => {
                    options.seed = value.and_then(|v| v.parse().ok());
                    i += 2;
                }
                "--trials" => {
                    options.trials = value.and_then(|v| v.parse().ok());
                    i += 2;
                }
                "--config" => {
                    options.config = value.map(PathBuf::from);
                    i += 2;
                }
                "--json" => {
                    options.json = true;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        Some((PathBuf::from(path), options))
    }

    fn parse_simulate(args: &[String]) -> Command {
        let Some((season_path, options)) = Self::season_path_and_options(args, "simulate") else {
            return Command::Help;
        };
        let Some(round) = options.round else {
            eprintln!("Error: 'simulate' command requires --round <N>");
            return Command::Help;
        };
        Command::Simulate {
            season_path,
            round,
            seed_override: options.seed,
            trials_override: options.trials,
            json: options.json,
            config_path: options.config,
        }
    }

    fn parse_season(args: &[String]) -> Command {
        match Self::season_path_and_options(args, "season") {
            Some((season_path, options)) => Command::Season {
                season_path,
                seed_override: options.seed,
                config_path: options.config,
            },
            None => Command::Help,
        }
    }

    fn parse_diagnose(args: &[String]) -> Command {
        match Self::season_path_and_options(args, "diagnose") {
            Some((season_path, options)) => Command::Diagnose {
                season_path,
                config_path: options.config,
            },
            None => Command::Help,
        }
    }
}
