//! # racesim
//!
//! Deterministic race outcome simulation engine.
//!
//! Predicts finishing-order probabilities for motorsport events by running
//! many independent seeded trials of a single-event race model, blending a
//! share of them with a lap-by-lap model, and aggregating the results:
//! - Reproducible: every trial draws from a stream derived from
//!   (master seed, event, trial)
//! - Explicit state: ratings, form, wear and penalties live in
//!   [`engine::EngineState`] and change only when a confirmed result is
//!   ingested
//! - Advisory validation: a battery of plausibility checks flags
//!   miscalibration without ever failing a run
//!
//! ## Example
//!
//! ```rust,no_run
//! use racesim::prelude::*;
//!
//! # fn main() -> SimResult<()> {
//! let season = Season::load("seasons/sample_season.yaml")?;
//! let config = EngineConfig::builder().seed(42).trials(2000).build();
//! let mut engine = RaceEngine::new(season, config)?;
//!
//! let prediction = engine.predict_round(1)?;
//! if let Some(favourite) = prediction.favourite() {
//!     println!("{} wins {:.1}%", favourite.competitor, favourite.win_probability * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suspicious_operation_groupings,
    clippy::suboptimal_flops,
    clippy::imprecise_flops,
    clippy::no_effect_underscore_binding,
    clippy::too_many_lines,
    clippy::missing_const_for_fn,
    clippy::needless_range_loop,
    clippy::manual_midpoint,
)]

pub mod cli;
pub mod config;
pub mod domains;
pub mod engine;
pub mod error;
pub mod model;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{EngineConfig, EngineConfigBuilder};
    pub use crate::domains::championship::SeasonProjection;
    pub use crate::domains::monte_carlo::{AggregateResult, CompetitorOutcome, MonteCarloEngine};
    pub use crate::engine::capabilities::{Capabilities, LiveOverrideProvider};
    pub use crate::engine::rng::SimRng;
    pub use crate::engine::state::{EngineState, Ingestion};
    pub use crate::engine::validator::{CheckOutcome, ValidationReport};
    pub use crate::engine::RaceEngine;
    pub use crate::error::{SimError, SimResult};
    pub use crate::model::{ConfirmedResult, EventDescriptor, Season};
}

/// Re-export for public API
pub use error::{SimError, SimResult};
