//! Engine configuration with YAML schema and validation.
//!
//! Mistake-proofing through:
//! - Type-safe configuration structs
//! - Schema validation via serde and `validator`
//! - Runtime semantic validation

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::error::{SimError, SimResult};

/// Top-level engine configuration.
///
/// Loaded from YAML files with full schema validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Reproducibility settings.
    #[validate(nested)]
    #[serde(default)]
    pub reproducibility: ReproducibilityConfig,

    /// Monte Carlo orchestration.
    #[validate(nested)]
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,

    /// Lap-model blending.
    #[validate(nested)]
    #[serde(default)]
    pub markov: MarkovConfig,

    /// Pace model weights.
    #[validate(nested)]
    #[serde(default)]
    pub pace: PaceConfig,

    /// Qualifying format.
    #[validate(nested)]
    #[serde(default)]
    pub qualifying: QualifyingConfig,

    /// Validator thresholds.
    #[validate(nested)]
    #[serde(default)]
    pub validator: ValidatorConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        config.validate_semantic()?;
        Ok(config)
    }

    /// Create a builder for configuration.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate semantic constraints beyond schema.
    ///
    /// # Errors
    ///
    /// Returns error on constraints that span several fields.
    pub fn validate_semantic(&self) -> SimResult<()> {
        let w = &self.pace.weights;
        if w.driver + w.car + w.track <= 0.0 {
            return Err(SimError::config("Pace weights must not all be zero"));
        }
        if self.monte_carlo.workers == Some(0) {
            return Err(SimError::config("Worker count must be at least 1"));
        }
        let v = &self.validator;
        if v.pit_band_low >= v.pit_band_high {
            return Err(SimError::config(format!(
                "Pit band is empty: {} >= {}",
                v.pit_band_low, v.pit_band_high
            )));
        }
        if v.wear_increase_min >= v.wear_increase_max {
            return Err(SimError::config("Wear escalation band is empty"));
        }
        Ok(())
    }

    /// Worker count to use for the parallel share of a run.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.monte_carlo.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        })
    }
}

/// Configuration builder for programmatic construction.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    seed: Option<u64>,
    trials: Option<usize>,
    sync_trials: Option<usize>,
    workers: Option<usize>,
    worker_share: Option<f64>,
    partition_size: Option<usize>,
    markov: Option<MarkovConfig>,
}

impl EngineConfigBuilder {
    /// Set the master seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the trial count of a full run.
    #[must_use]
    pub const fn trials(mut self, trials: usize) -> Self {
        self.trials = Some(trials);
        self
    }

    /// Set the trial count of the synchronous variant.
    #[must_use]
    pub const fn sync_trials(mut self, trials: usize) -> Self {
        self.sync_trials = Some(trials);
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the fraction of trials handed to the worker pool.
    #[must_use]
    pub const fn worker_share(mut self, share: f64) -> Self {
        self.worker_share = Some(share);
        self
    }

    /// Set trials per work-stealing partition.
    #[must_use]
    pub const fn partition_size(mut self, size: usize) -> Self {
        self.partition_size = Some(size);
        self
    }

    /// Set lap-model blending.
    #[must_use]
    pub const fn markov(mut self, markov: MarkovConfig) -> Self {
        self.markov = Some(markov);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        let mut config = EngineConfig::default();

        if let Some(seed) = self.seed {
            config.reproducibility.seed = seed;
        }
        if let Some(trials) = self.trials {
            config.monte_carlo.trials = trials.max(1);
        }
        if let Some(trials) = self.sync_trials {
            config.monte_carlo.sync_trials = trials.max(1);
        }
        if let Some(workers) = self.workers {
            config.monte_carlo.workers = Some(workers.max(1));
        }
        if let Some(share) = self.worker_share {
            config.monte_carlo.worker_share = share.clamp(0.0, 1.0);
        }
        if let Some(size) = self.partition_size {
            config.monte_carlo.partition_size = size.max(1);
        }
        if let Some(markov) = self.markov {
            config.markov = markov;
        }

        config
    }
}

/// Reproducibility settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReproducibilityConfig {
    /// Master seed for all RNG streams.
    pub seed: u64,
}

impl Default for ReproducibilityConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

/// Monte Carlo orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MonteCarloConfig {
    /// Trials in a full run.
    #[validate(range(min = 1))]
    #[serde(default = "default_trials")]
    pub trials: usize,
    /// Trials in the synchronous variant used by nested computations.
    #[validate(range(min = 1))]
    #[serde(default = "default_sync_trials")]
    pub sync_trials: usize,
    /// Fraction of trials handed to the worker pool; the caller runs the rest.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_worker_share")]
    pub worker_share: f64,
    /// Worker pool size (defaults to available parallelism).
    #[serde(default)]
    pub workers: Option<usize>,
    /// Trials per work-stealing partition.
    #[validate(range(min = 1))]
    #[serde(default = "default_partition_size")]
    pub partition_size: usize,
}

const fn default_trials() -> usize {
    1000
}

const fn default_sync_trials() -> usize {
    200
}

const fn default_worker_share() -> f64 {
    0.4
}

const fn default_partition_size() -> usize {
    50
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            sync_trials: default_sync_trials(),
            worker_share: default_worker_share(),
            workers: None,
            partition_size: default_partition_size(),
        }
    }
}

/// Lap-by-lap model blending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MarkovConfig {
    /// Whether any trial runs the lap model.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Share of trials that also run the lap model.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_blend_fraction")]
    pub blend_fraction: f64,
    /// Weight of the lap-model outcome in a blended trial.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_blend_weight")]
    pub blend_weight: f64,
}

const fn default_true() -> bool {
    true
}

const fn default_blend_fraction() -> f64 {
    0.2
}

const fn default_blend_weight() -> f64 {
    0.3
}

impl MarkovConfig {
    /// Configuration with blending switched off.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            blend_fraction: 0.0,
            blend_weight: 0.0,
        }
    }

    /// Whether trial `t` (0-based) runs the lap model.
    ///
    /// Selected trials are spread evenly: trial `t` is chosen iff
    /// `floor((t+1)*f) > floor(t*f)`, which picks exactly `floor(N*f)`
    /// of the first `N` trials regardless of partitioning.
    #[must_use]
    pub fn selects(&self, trial: u64) -> bool {
        if !self.enabled || self.blend_fraction <= 0.0 || self.blend_weight <= 0.0 {
            return false;
        }
        let f = self.blend_fraction;
        ((trial + 1) as f64 * f).floor() > (trial as f64 * f).floor()
    }
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blend_fraction: default_blend_fraction(),
            blend_weight: default_blend_weight(),
        }
    }
}

/// Pace model settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaceConfig {
    /// Component weights.
    #[validate(nested)]
    #[serde(default)]
    pub weights: PaceWeights,
}

/// Weights of the three pace components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaceWeights {
    /// Driver skill weight.
    #[validate(range(min = 0.0, max = 1.0))]
    pub driver: f64,
    /// Equipment weight.
    #[validate(range(min = 0.0, max = 1.0))]
    pub car: f64,
    /// Track suitability weight.
    #[validate(range(min = 0.0, max = 1.0))]
    pub track: f64,
}

impl Default for PaceWeights {
    fn default() -> Self {
        Self {
            driver: 0.40,
            car: 0.42,
            track: 0.18,
        }
    }
}

/// Qualifying format.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct QualifyingConfig {
    /// Competitors knocked out at each of the first two stages.
    #[validate(range(min = 1))]
    #[serde(default = "default_eliminated")]
    pub eliminated_per_stage: usize,
}

const fn default_eliminated() -> usize {
    5
}

impl Default for QualifyingConfig {
    fn default() -> Self {
        Self {
            eliminated_per_stage: default_eliminated(),
        }
    }
}

/// Thresholds of the advisory validator battery.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Trials per diagnostic run.
    #[validate(range(min = 10))]
    #[serde(default = "default_diagnostic_trials")]
    pub diagnostic_trials: usize,
    /// Maximum share of wins any single team may take.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_max_team_win_share")]
    pub max_team_win_share: f64,
    /// Minimum pole conversion on the hardest overtaking event.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_min_pole_conversion")]
    pub min_pole_conversion: f64,
    /// Plausible pit stop band (seconds).
    #[serde(default = "default_pit_band_low")]
    pub pit_band_low: f64,
    /// Plausible pit stop band (seconds).
    #[serde(default = "default_pit_band_high")]
    pub pit_band_high: f64,
    /// Minimum relative failure increase from early to late season wear.
    #[serde(default = "default_wear_increase_min")]
    pub wear_increase_min: f64,
    /// Maximum relative failure increase from early to late season wear.
    #[serde(default = "default_wear_increase_max")]
    pub wear_increase_max: f64,
    /// Maximum projected points gap between champion and runner-up.
    #[serde(default = "default_max_title_gap")]
    pub max_title_gap: f64,
    /// Minimum projected podiums for midfield teams across a season.
    #[serde(default = "default_min_midfield_podiums")]
    pub min_midfield_podiums: f64,
}

const fn default_diagnostic_trials() -> usize {
    200
}
const fn default_max_team_win_share() -> f64 {
    0.8
}
const fn default_min_pole_conversion() -> f64 {
    0.5
}
const fn default_pit_band_low() -> f64 {
    2.1
}
const fn default_pit_band_high() -> f64 {
    2.9
}
const fn default_wear_increase_min() -> f64 {
    0.2
}
const fn default_wear_increase_max() -> f64 {
    2.0
}
const fn default_max_title_gap() -> f64 {
    200.0
}
const fn default_min_midfield_podiums() -> f64 {
    1.0
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            diagnostic_trials: default_diagnostic_trials(),
            max_team_win_share: default_max_team_win_share(),
            min_pole_conversion: default_min_pole_conversion(),
            pit_band_low: default_pit_band_low(),
            pit_band_high: default_pit_band_high(),
            wear_increase_min: default_wear_increase_min(),
            wear_increase_max: default_wear_increase_max(),
            max_title_gap: default_max_title_gap(),
            min_midfield_podiums: default_min_midfield_podiums(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.reproducibility.seed, 42);
        assert_eq!(config.monte_carlo.trials, 1000);
        assert_eq!(config.monte_carlo.sync_trials, 200);
        assert!((config.monte_carlo.worker_share - 0.4).abs() < f64::EPSILON);
        assert!(config.markov.enabled);
        assert_eq!(config.qualifying.eliminated_per_stage, 5);
        assert!(config.validate().is_ok());
        assert!(config.validate_semantic().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::builder()
            .seed(7)
            .trials(300)
            .workers(2)
            .partition_size(25)
            .markov(MarkovConfig::disabled())
            .build();
        assert_eq!(config.reproducibility.seed, 7);
        assert_eq!(config.monte_carlo.trials, 300);
        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.monte_carlo.partition_size, 25);
        assert!(!config.markov.enabled);
    }

    #[test]
    fn test_builder_clamps_zero_trials() {
        let config = EngineConfig::builder().trials(0).build();
        assert_eq!(config.monte_carlo.trials, 1);
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r"
reproducibility:
  seed: 99
monte_carlo:
  trials: 500
markov:
  blend_fraction: 0.25
";
        let config = EngineConfig::from_yaml(yaml);
        assert!(config.is_ok());
        if let Ok(config) = config {
            assert_eq!(config.reproducibility.seed, 99);
            assert_eq!(config.monte_carlo.trials, 500);
            assert_eq!(config.monte_carlo.sync_trials, 200);
            assert!((config.markov.blend_fraction - 0.25).abs() < f64::EPSILON);
            assert!((config.markov.blend_weight - 0.3).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_from_yaml_rejects_unknown_fields() {
        let yaml = "monte_carlo:\n  samples: 10\n";
        assert!(EngineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_yaml_rejects_zero_trials() {
        let yaml = "monte_carlo:\n  trials: 0\n";
        let result = EngineConfig::from_yaml(yaml);
        assert!(matches!(result, Err(SimError::Validation(_))));
    }

    #[test]
    fn test_from_yaml_rejects_blend_out_of_range() {
        let yaml = "markov:\n  blend_weight: 1.5\n";
        assert!(EngineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_semantic_rejects_zero_weights() {
        let yaml = "pace:\n  weights: { driver: 0.0, car: 0.0, track: 0.0 }\n";
        let result = EngineConfig::from_yaml(yaml);
        assert!(matches!(result, Err(SimError::Config { .. })));
    }

    #[test]
    fn test_semantic_rejects_empty_pit_band() {
        let yaml = "validator:\n  pit_band_low: 3.0\n  pit_band_high: 2.0\n";
        assert!(EngineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_markov_selection_count() {
        let markov = MarkovConfig::default();
        let selected = (0..1000).filter(|&t| markov.selects(t)).count();
        assert_eq!(selected, 200);
    }

    #[test]
    fn test_markov_selection_spread() {
        let markov = MarkovConfig::default();
        // Every block of five trials holds exactly one lap-model trial.
        for block in 0..20u64 {
            let n = (block * 5..block * 5 + 5).filter(|&t| markov.selects(t)).count();
            assert_eq!(n, 1);
        }
    }

    #[test]
    fn test_markov_disabled_selects_nothing() {
        let markov = MarkovConfig::disabled();
        assert!((0..100).all(|t| !markov.selects(t)));
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load("/nonexistent/engine.yaml");
        assert!(matches!(result, Err(SimError::Io(_))));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: lap-model selection count is floor(N * f).
        #[test]
        fn prop_selection_count(f in 0.01..1.0f64, n in 1u64..2000) {
            let markov = MarkovConfig { enabled: true, blend_fraction: f, blend_weight: 0.3 };
            let selected = (0..n).filter(|&t| markov.selects(t)).count() as u64;
            prop_assert_eq!(selected, (n as f64 * f).floor() as u64);
        }
    }
}
