//! Core prediction engine.
//!
//! Ties the pieces of a season together:
//! - Deterministic RNG (PCG with blake3-derived streams)
//! - Explicit rolling state, mutated only by confirmed results
//! - Injected optional capabilities (tyre model, live data)
//! - Advisory validator battery

pub mod capabilities;
pub mod rng;
pub mod state;
pub mod validator;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;
use ::validator::Validate;

pub use capabilities::{Capabilities, LiveOverrideProvider, LiveSession, PitSamples, StaticLiveData};
pub use rng::SimRng;
pub use state::{EngineState, Ingestion};
pub use validator::{CheckOutcome, Severity, ValidationReport, Validator};

use crate::config::EngineConfig;
use crate::domains::accuracy::PredictionSnapshot;
use crate::domains::championship::{project_season, standings_before, SeasonProjection};
use crate::domains::monte_carlo::{AggregateResult, MonteCarloEngine, RunHandle, RunRequest};
use crate::error::SimResult;
use crate::model::{ConfirmedResult, Season};

/// Season-level prediction engine.
///
/// Owns the rolling state of one season. Predictions read it; only
/// [`RaceEngine::ingest`] writes it.
#[derive(Debug, Clone)]
pub struct RaceEngine {
    season: Arc<Season>,
    state: EngineState,
    config: EngineConfig,
    capabilities: Capabilities,
}

impl RaceEngine {
    /// Create an engine with fresh rolling state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails field or cross-field
    /// validation.
    pub fn new(season: Season, config: EngineConfig) -> SimResult<Self> {
        config.validate()?;
        config.validate_semantic()?;
        let state = EngineState::for_season(&season);
        Ok(Self {
            season: Arc::new(season),
            state,
            config,
            capabilities: Capabilities::none(),
        })
    }

    /// Resume from previously persisted state.
    #[must_use]
    pub fn with_state(mut self, state: EngineState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn season(&self) -> &Season {
        &self.season
    }

    #[must_use]
    pub const fn state(&self) -> &EngineState {
        &self.state
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn monte_carlo(&self) -> MonteCarloEngine<'_> {
        MonteCarloEngine::new(&self.season, &self.state, &self.config, &self.capabilities)
    }

    /// Simulate an event without touching the rolling state.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEvent`, an input error for a malformed event, or a
    /// concurrency error from the orchestrator.
    pub fn simulate(&self, event_id: &str) -> SimResult<AggregateResult> {
        self.monte_carlo().run(event_id)
    }

    /// Simulate an event and keep the result as the pre-race prediction
    /// that its confirmed result will be scored against.
    ///
    /// # Errors
    ///
    /// See [`RaceEngine::simulate`].
    pub fn predict(&mut self, event_id: &str) -> SimResult<AggregateResult> {
        let result = self.simulate(event_id)?;
        self.state.record_prediction(PredictionSnapshot::from_aggregate(&result));
        Ok(result)
    }

    /// [`RaceEngine::predict`] by round number.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEvent` when no event has that round.
    pub fn predict_round(&mut self, round: u32) -> SimResult<AggregateResult> {
        let id = self.season.event_by_round(round)?.id.clone();
        self.predict(&id)
    }

    /// Run an event on a background thread against a snapshot of the
    /// current state. Dropping the handle cancels the run.
    #[must_use]
    pub fn spawn(&self, event_id: &str) -> RunHandle {
        RunHandle::spawn(RunRequest {
            season: Arc::clone(&self.season),
            state: Arc::new(self.state.clone()),
            config: self.config.clone(),
            capabilities: self.capabilities.clone(),
            event_id: event_id.to_string(),
        })
    }

    /// Fold a confirmed result into the rolling state.
    ///
    /// # Errors
    ///
    /// See [`EngineState::ingest`].
    pub fn ingest(&mut self, result: &ConfirmedResult) -> SimResult<Ingestion> {
        self.state.ingest(&self.season, self.config.reproducibility.seed, result)
    }

    /// Driver points from every confirmed result.
    #[must_use]
    pub fn standings(&self) -> BTreeMap<String, f64> {
        standings_before(&self.season, self.state.results(), u32::MAX)
    }

    /// Project the championship over the whole calendar.
    ///
    /// # Errors
    ///
    /// Propagates simulation errors of any projected event.
    pub fn project_season(&self) -> SimResult<SeasonProjection> {
        project_season(&self.season, &self.state, &self.config, &self.capabilities)
    }

    /// Run the advisory validator battery.
    ///
    /// # Errors
    ///
    /// Propagates simulation errors; failed checks are reported, not raised.
    pub fn diagnose(&self) -> SimResult<ValidationReport> {
        let report = Validator::new(&self.season, &self.state, &self.config, &self.capabilities).run()?;
        info!(
            checks = report.checks.len(),
            failed = report.failures().count(),
            worst = ?report.worst(),
            "validator battery finished"
        );
        Ok(report)
    }
}
