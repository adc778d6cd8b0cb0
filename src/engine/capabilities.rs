//! Optional strategy objects injected into the engine.
//!
//! Absence is `None`; the engine never probes for features at runtime.
//! Providers are sampled once when a run is prepared, so every trial of a
//! run sees the same snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::PaceWeights;
use crate::domains::tyre::{Compound, TireModel};

/// Snapshot of a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSession {
    /// Current race lap (1-based).
    pub current_lap: u32,
    /// Laps run behind the safety car so far.
    #[serde(default)]
    pub sc_laps: u32,
    /// Track temperature (°C).
    pub track_temp: f64,
    /// Wind speed (km/h).
    #[serde(default)]
    pub wind: f64,
    /// Relative humidity (%).
    #[serde(default)]
    pub humidity: f64,
    /// Rain currently falling.
    #[serde(default)]
    pub rainfall: bool,
    /// Compound in use per competitor.
    #[serde(default)]
    pub compounds: BTreeMap<String, Compound>,
    /// Laps on the current set per competitor.
    #[serde(default)]
    pub laps_on_tyre: BTreeMap<String, u32>,
}

impl LiveSession {
    /// Pace multiplier from track temperature.
    #[must_use]
    pub fn deg_temp_multiplier(&self) -> f64 {
        1.0 + (self.track_temp - 35.0) * 0.012
    }

    /// Race noise multiplier from wind.
    #[must_use]
    pub fn mistake_multiplier(&self) -> f64 {
        1.0 + self.wind / 60.0
    }

    /// Compound in use, defaulting to medium.
    #[must_use]
    pub fn compound_of(&self, competitor: &str) -> Compound {
        self.compounds.get(competitor).copied().unwrap_or(Compound::Medium)
    }

    /// Laps on the current set, if reported.
    #[must_use]
    pub fn laps_on_tyre_of(&self, competitor: &str) -> Option<u32> {
        self.laps_on_tyre.get(competitor).copied()
    }
}

/// Observed pit stop distribution of a team.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitSamples {
    /// Number of stops observed.
    pub count: u32,
    /// Mean stationary time (seconds).
    pub mean: f64,
    /// Standard deviation (seconds).
    pub sigma: f64,
}

/// Minimum observed stops before live data replaces the static crew model.
pub const MIN_PIT_SAMPLES: u32 = 3;

/// Source of live overrides read opportunistically by the pace, strategy
/// and qualifying models.
pub trait LiveOverrideProvider: Send + Sync + std::fmt::Debug {
    /// Current live session, if one is running.
    fn session(&self) -> Option<LiveSession> {
        None
    }

    /// Observed pit stops of a team.
    fn pit_samples(&self, _team: &str) -> Option<PitSamples> {
        None
    }

    /// Real qualifying order (competitor ids, pole first).
    fn qualifying_grid(&self) -> Option<Vec<String>> {
        None
    }
}

/// Fixed live data, e.g. deserialized from a telemetry snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticLiveData {
    #[serde(default)]
    pub session: Option<LiveSession>,
    #[serde(default)]
    pub pit_samples: BTreeMap<String, PitSamples>,
    #[serde(default)]
    pub qualifying_grid: Option<Vec<String>>,
}

impl LiveOverrideProvider for StaticLiveData {
    fn session(&self) -> Option<LiveSession> {
        self.session.clone()
    }

    fn pit_samples(&self, team: &str) -> Option<PitSamples> {
        self.pit_samples.get(team).copied()
    }

    fn qualifying_grid(&self) -> Option<Vec<String>> {
        self.qualifying_grid.clone()
    }
}

/// Injected strategy objects.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// Tyre degradation model for the race-mode tyre term.
    pub tire_model: Option<Arc<dyn TireModel>>,
    /// Live override source.
    pub live: Option<Arc<dyn LiveOverrideProvider>>,
    /// Externally learned pace weights, replacing the configured ones.
    pub learned_weights: Option<PaceWeights>,
}

impl Capabilities {
    /// No optional capabilities.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a tyre model.
    #[must_use]
    pub fn with_tire_model(mut self, model: Arc<dyn TireModel>) -> Self {
        self.tire_model = Some(model);
        self
    }

    /// Add a live override provider.
    #[must_use]
    pub fn with_live(mut self, provider: Arc<dyn LiveOverrideProvider>) -> Self {
        self.live = Some(provider);
        self
    }

    /// Replace the configured pace weights.
    #[must_use]
    pub fn with_learned_weights(mut self, weights: PaceWeights) -> Self {
        self.learned_weights = Some(weights);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(temp: f64, wind: f64) -> LiveSession {
        LiveSession {
            current_lap: 20,
            sc_laps: 0,
            track_temp: temp,
            wind,
            humidity: 50.0,
            rainfall: false,
            compounds: BTreeMap::new(),
            laps_on_tyre: BTreeMap::new(),
        }
    }

    #[test]
    fn test_session_modifiers() {
        let s = session(45.0, 30.0);
        assert!((s.deg_temp_multiplier() - 1.12).abs() < 1e-12);
        assert!((s.mistake_multiplier() - 1.5).abs() < 1e-12);
        assert_eq!(s.compound_of("anyone"), Compound::Medium);
    }

    #[test]
    fn test_default_provider_supplies_nothing() {
        let data = StaticLiveData::default();
        assert!(data.session().is_none());
        assert!(data.pit_samples("ferrari").is_none());
        assert!(data.qualifying_grid().is_none());
    }

    #[test]
    fn test_static_data_from_yaml() {
        let yaml = r"
session:
  current_lap: 12
  track_temp: 41.0
  compounds: { leclerc: soft }
pit_samples:
  ferrari: { count: 4, mean: 2.4, sigma: 0.2 }
";
        let data: Result<StaticLiveData, _> = serde_yaml::from_str(yaml);
        assert!(data.is_ok());
        if let Ok(data) = data {
            assert_eq!(data.session().map(|s| s.compound_of("leclerc")), Some(Compound::Soft));
            assert_eq!(data.pit_samples("ferrari").map(|p| p.count), Some(4));
        }
    }
}
