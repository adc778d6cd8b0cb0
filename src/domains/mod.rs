//! Race simulation domains.
//!
//! Each domain models one part of a race weekend:
//! - Weather, qualifying, pace, reliability and strategy
//! - The single-trial race model and the lap-by-lap model
//! - Monte Carlo orchestration over both
//! - Rolling feedback: ratings, form, track history, accuracy
//! - Championship standings and season projection

pub mod accuracy;
pub mod championship;
pub mod form;
pub mod history;
pub mod markov;
pub mod monte_carlo;
pub mod pace;
pub mod qualifying;
pub mod race;
pub mod rating;
pub mod reliability;
pub mod strategy;
pub mod tyre;
pub mod weather;

pub use accuracy::{AccuracyStats, AccuracyTracker, PredictionSnapshot};
pub use championship::{project_season, DriverProjection, SeasonProjection, TeamProjection};
pub use form::{FormState, TeamState};
pub use monte_carlo::{AggregateResult, CancelToken, CompetitorOutcome, MonteCarloEngine, RunHandle, RunRequest};
pub use qualifying::{GridEntry, SessionFormat};
pub use race::{RaceEvent, Retirement, SimulationRun};
pub use rating::RatingSystem;
pub use reliability::WearState;
pub use tyre::{Compound, DegradationModel, FuelModel, TireModel};
pub use weather::Weather;
