//! Static per-event attributes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Circuit classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    /// Tight harbour street circuit.
    Monaco,
    Street,
    StreetHybrid,
    Technical,
    /// Twisty, tyre-limited permanent circuit.
    Twisty,
    Power,
    Highspeed,
    Balanced,
    Highaltitude,
}

impl TrackType {
    /// Street-like circuits (walls, fast rubbering-in, heavy traffic).
    #[must_use]
    pub const fn is_street(self) -> bool {
        matches!(self, Self::Monaco | Self::Street | Self::StreetHybrid)
    }
}

/// Overtaking difficulty class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overtaking {
    VeryLow,
    Low,
    LowMedium,
    Medium,
    MediumHigh,
    High,
}

impl Overtaking {
    /// Race-model grid-position stickiness (higher = harder to pass).
    #[must_use]
    pub const fn difficulty(self) -> f64 {
        match self {
            Self::VeryLow => 0.95,
            Self::Low => 0.6,
            Self::LowMedium | Self::Medium => 0.35,
            Self::MediumHigh => 0.2,
            Self::High => 0.10,
        }
    }

    /// Low or very low overtaking.
    #[must_use]
    pub const fn is_restrictive(self) -> bool {
        matches!(self, Self::VeryLow | Self::Low)
    }
}

/// Tyre degradation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TyreDeg {
    Low,
    LowMedium,
    Medium,
    MediumHigh,
    High,
    VeryHigh,
}

impl TyreDeg {
    /// Degradation multiplier applied by the tyre model.
    #[must_use]
    pub const fn wear_multiplier(self) -> f64 {
        match self {
            Self::Low => 0.70,
            Self::LowMedium => 0.85,
            Self::Medium => 1.0,
            Self::MediumHigh => 1.18,
            Self::High => 1.35,
            Self::VeryHigh => 1.5,
        }
    }

    /// High or medium-high degradation.
    #[must_use]
    pub const fn is_demanding(self) -> bool {
        matches!(self, Self::MediumHigh | Self::High | Self::VeryHigh)
    }
}

/// Aero downforce level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Downforce {
    Low,
    LowMedium,
    #[default]
    Medium,
    MediumHigh,
    High,
}

/// Tuning of the lap-by-lap model for one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LapProfile {
    /// DRS activation zones.
    #[validate(range(max = 6))]
    pub drs_zones: u32,
    /// Overtaking difficulty (0 = trivial, 1 = impossible).
    #[validate(range(min = 0.0, max = 1.0))]
    pub difficulty: f64,
    /// Per-lap safety car probability before event scaling.
    #[validate(range(min = 0.0, max = 1.0))]
    pub sc_probability_per_lap: f64,
}

impl Default for LapProfile {
    fn default() -> Self {
        Self {
            drs_zones: 2,
            difficulty: 0.40,
            sc_probability_per_lap: 0.018,
        }
    }
}

/// A race weekend on the calendar.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EventDescriptor {
    /// Stable identifier.
    #[validate(length(min = 1))]
    pub id: String,
    /// Calendar round (1-based).
    #[validate(range(min = 1))]
    pub round: u32,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Race distance in laps.
    #[validate(range(min = 1, max = 200))]
    pub laps: u32,
    pub track_type: TrackType,
    pub overtaking: Overtaking,
    pub tire_deg: TyreDeg,
    #[serde(default)]
    pub downforce: Downforce,
    /// Probability of at least one safety car.
    #[validate(range(min = 0.0, max = 1.0))]
    pub sc_probability: f64,
    /// Probability of rain.
    #[validate(range(min = 0.0, max = 1.0))]
    pub rain_probability: f64,
    #[validate(range(max = 6))]
    #[serde(default = "default_drs_zones")]
    pub drs_zones: u32,
    /// Planned pit stops.
    #[validate(range(min = 1, max = 4))]
    #[serde(default = "default_stops")]
    pub strategy_stops: u32,
    /// Sprint weekend (sprint qualifying and sprint points).
    #[serde(default)]
    pub is_sprint: bool,
    /// Hot climate; grip fades over the race.
    #[serde(default)]
    pub hot_climate: bool,
    /// Multiplier on the prediction confidence score.
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default)]
    pub confidence_modifier: Option<f64>,
    /// Per-team equipment multipliers.
    #[serde(default)]
    pub team_mult: BTreeMap<String, f64>,
    /// Per-competitor equipment multipliers.
    #[serde(default)]
    pub driver_specials: BTreeMap<String, f64>,
    /// Lap model tuning; derived from the event when absent.
    #[validate(nested)]
    #[serde(default)]
    pub lap_profile: Option<LapProfile>,
    /// What-if: competitors forced to retire in every trial.
    #[serde(default)]
    pub forced_retirements: Vec<String>,
    /// What-if: per-competitor pace multipliers.
    #[serde(default)]
    pub pace_overrides: BTreeMap<String, f64>,
}

const fn default_drs_zones() -> u32 {
    2
}

const fn default_stops() -> u32 {
    1
}

impl EventDescriptor {
    /// Street-like circuit.
    #[must_use]
    pub const fn is_street(&self) -> bool {
        self.track_type.is_street()
    }

    /// Straight-heavy circuit where energy recovery matters.
    #[must_use]
    pub fn is_power_track(&self) -> bool {
        self.track_type == TrackType::Power || self.downforce == Downforce::Low
    }

    /// Lap model tuning, derived from the descriptor when not given.
    #[must_use]
    pub fn lap_profile(&self) -> LapProfile {
        self.lap_profile.unwrap_or_else(|| LapProfile {
            drs_zones: self.drs_zones,
            difficulty: (self.overtaking.difficulty() * 0.6).clamp(0.05, 0.75),
            ..LapProfile::default()
        })
    }

    /// Equipment multiplier for a team at this event.
    #[must_use]
    pub fn team_multiplier(&self, team: &str) -> f64 {
        self.team_mult.get(team).copied().unwrap_or(1.0)
    }

    /// Equipment multiplier for a competitor at this event.
    #[must_use]
    pub fn driver_special(&self, competitor: &str) -> f64 {
        self.driver_specials.get(competitor).copied().unwrap_or(1.0)
    }

    /// Whether a what-if retirement is forced for this competitor.
    #[must_use]
    pub fn is_forced_retirement(&self, competitor: &str) -> bool {
        self.forced_retirements.iter().any(|c| c == competitor)
    }
}

#[cfg(test)]
pub(crate) fn test_event(id: &str, round: u32) -> EventDescriptor {
    EventDescriptor {
        id: id.to_string(),
        round,
        name: String::new(),
        laps: 57,
        track_type: TrackType::Balanced,
        overtaking: Overtaking::Medium,
        tire_deg: TyreDeg::Medium,
        downforce: Downforce::Medium,
        sc_probability: 0.4,
        rain_probability: 0.1,
        drs_zones: 2,
        strategy_stops: 1,
        is_sprint: false,
        hot_climate: false,
        confidence_modifier: None,
        team_mult: BTreeMap::new(),
        driver_specials: BTreeMap::new(),
        lap_profile: None,
        forced_retirements: Vec::new(),
        pace_overrides: BTreeMap::new(),
    }
}
