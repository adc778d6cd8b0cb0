//! Team equipment, reliability and pit crew descriptors.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Competitive tier; biases wear and power unit replacement decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamTier {
    /// Front-running works team.
    Elite,
    /// Midfield.
    #[default]
    Midfield,
    /// Back of the grid.
    Lower,
}

/// Power unit and chassis components that wear and fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Engine,
    Gearbox,
    Cooling,
    Hybrid,
}

impl Component {
    /// All components in roll order.
    pub const ALL: [Self; 4] = [Self::Engine, Self::Gearbox, Self::Cooling, Self::Hybrid];
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Engine => "engine",
            Self::Gearbox => "gearbox",
            Self::Cooling => "cooling",
            Self::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Base per-event failure probability per component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ComponentRates {
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_engine_rate")]
    pub engine: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_gearbox_rate")]
    pub gearbox: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_cooling_rate")]
    pub cooling: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_hybrid_rate")]
    pub hybrid: f64,
}

const fn default_engine_rate() -> f64 {
    0.025
}
const fn default_gearbox_rate() -> f64 {
    0.020
}
const fn default_cooling_rate() -> f64 {
    0.018
}
const fn default_hybrid_rate() -> f64 {
    0.022
}

impl ComponentRates {
    /// Base rate of one component.
    #[must_use]
    pub const fn get(&self, component: Component) -> f64 {
        match component {
            Component::Engine => self.engine,
            Component::Gearbox => self.gearbox,
            Component::Cooling => self.cooling,
            Component::Hybrid => self.hybrid,
        }
    }
}

impl Default for ComponentRates {
    fn default() -> Self {
        Self {
            engine: default_engine_rate(),
            gearbox: default_gearbox_rate(),
            cooling: default_cooling_rate(),
            hybrid: default_hybrid_rate(),
        }
    }
}

/// Static pit crew distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PitCrew {
    /// Mean stationary time (seconds).
    #[validate(range(min = 1.0, max = 10.0))]
    #[serde(default = "default_base_time")]
    pub base_time: f64,
    /// Standard deviation (seconds).
    #[validate(range(min = 0.0, max = 5.0))]
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// Probability of a slow stop.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,
    /// Probability of a sub-two-second stop.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_perfect_rate")]
    pub perfect_rate: f64,
}

const fn default_base_time() -> f64 {
    2.7
}
const fn default_sigma() -> f64 {
    0.25
}
const fn default_error_rate() -> f64 {
    0.06
}
const fn default_perfect_rate() -> f64 {
    0.06
}

impl Default for PitCrew {
    fn default() -> Self {
        Self {
            base_time: default_base_time(),
            sigma: default_sigma(),
            error_rate: default_error_rate(),
            perfect_rate: default_perfect_rate(),
        }
    }
}

/// A constructor entry.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Team {
    /// Stable identifier.
    #[validate(length(min = 1))]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Starting equipment rating (0-100).
    #[validate(range(min = 0.0, max = 100.0))]
    pub base_rating: f64,
    /// Competitive tier.
    #[serde(default)]
    pub tier: TeamTier,
    /// Component failure base rates.
    #[validate(nested)]
    #[serde(default)]
    pub component_rates: ComponentRates,
    /// Pit crew distribution.
    #[validate(nested)]
    #[serde(default)]
    pub pit_crew: PitCrew,
    /// Pit wall decision quality (0-1).
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_strategy_efficiency")]
    pub strategy_efficiency: f64,
    /// Cornering aero efficiency.
    #[validate(range(min = 0.5, max = 1.2))]
    #[serde(default = "default_efficiency")]
    pub aero_efficiency: f64,
    /// Energy recovery on straight-heavy tracks (0 = worst, 1 = best).
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_efficiency")]
    pub energy_recovery: f64,
    /// Historical development boost, clamped to 0.92-1.08 on use.
    #[serde(default = "default_one")]
    pub development_boost: f64,
    /// Historical reliability, clamped to 0.92-1.08 on use.
    #[serde(default = "default_one")]
    pub historical_reliability: f64,
}

const fn default_strategy_efficiency() -> f64 {
    0.83
}
const fn default_efficiency() -> f64 {
    0.88
}
const fn default_one() -> f64 {
    1.0
}

impl Team {
    /// Minimal team with default equipment characteristics.
    #[must_use]
    pub fn new(id: impl Into<String>, base_rating: f64, tier: TeamTier) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            base_rating,
            tier,
            component_rates: ComponentRates::default(),
            pit_crew: PitCrew::default(),
            strategy_efficiency: default_strategy_efficiency(),
            aero_efficiency: default_efficiency(),
            energy_recovery: default_efficiency(),
            development_boost: 1.0,
            historical_reliability: 1.0,
        }
    }

    /// Development boost within its allowed band.
    #[must_use]
    pub fn development_factor(&self) -> f64 {
        self.development_boost.clamp(0.92, 1.08)
    }

    /// Historical reliability within its allowed band.
    #[must_use]
    pub fn reliability_factor(&self) -> f64 {
        self.historical_reliability.clamp(0.92, 1.08)
    }
}
