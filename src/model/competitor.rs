//! Competitor identity, personality and skill traits.

use serde::{Deserialize, Serialize};
use validator::Validate;

const fn one() -> f64 {
    1.0
}

/// A driver on the roster.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Competitor {
    /// Stable identifier.
    #[validate(length(min = 1))]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Owning team id.
    #[validate(length(min = 1))]
    pub team: String,
    /// Car number.
    #[serde(default)]
    pub number: Option<u32>,
    /// Base skill rating (0-100).
    #[validate(range(min = 0.0, max = 100.0))]
    pub base_skill: f64,
    /// Presentation metadata, ignored by the engine.
    #[serde(default)]
    pub color: Option<String>,
    /// Racing personality.
    #[validate(nested)]
    #[serde(default)]
    pub personality: Personality,
    /// Track-type skill traits.
    #[validate(nested)]
    #[serde(default)]
    pub traits: SkillTraits,
    /// Pressure-moment multiplier.
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub clutch_factor: f64,
    /// Events this competitor historically dominates.
    #[serde(default)]
    pub dominant_events: Vec<String>,
}

impl Competitor {
    /// Minimal competitor with neutral personality and traits.
    #[must_use]
    pub fn new(id: impl Into<String>, team: impl Into<String>, base_skill: f64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            team: team.into(),
            number: None,
            base_skill,
            color: None,
            personality: Personality::default(),
            traits: SkillTraits::default(),
            clutch_factor: 1.0,
            dominant_events: Vec::new(),
        }
    }
}

/// Racing personality multipliers (1.0 = neutral).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Personality {
    /// Wheel-to-wheel aggression.
    #[validate(range(min = 0.1, max = 3.0))]
    #[serde(default = "one")]
    pub aggression: f64,
    /// Tyre management.
    #[validate(range(min = 0.1, max = 3.0))]
    #[serde(default = "one")]
    pub tire_smoothness: f64,
    /// Defensive ability.
    #[validate(range(min = 0.1, max = 3.0))]
    #[serde(default = "one")]
    pub defense: f64,
    /// Error proneness.
    #[validate(range(min = 0.1, max = 3.0))]
    #[serde(default = "one")]
    pub mistake_rate: f64,
    /// Willingness to take strategic and overtaking risks.
    #[validate(range(min = 0.1, max = 3.0))]
    #[serde(default = "one")]
    pub overtake_risk: f64,
    /// Safety car restart skill.
    #[validate(range(min = 0.1, max = 3.0))]
    #[serde(default = "one")]
    pub restart_skill: f64,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            aggression: 1.0,
            tire_smoothness: 1.0,
            defense: 1.0,
            mistake_rate: 1.0,
            overtake_risk: 1.0,
            restart_skill: 1.0,
        }
    }
}

/// Track-type specialisation traits (1.0 = neutral).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SkillTraits {
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub street: f64,
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub technical: f64,
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub high_speed: f64,
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub wet: f64,
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub tire: f64,
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub racecraft: f64,
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub qualifying: f64,
    #[validate(range(min = 0.5, max = 1.5))]
    #[serde(default = "one")]
    pub consistency: f64,
}

impl Default for SkillTraits {
    fn default() -> Self {
        Self {
            street: 1.0,
            technical: 1.0,
            high_speed: 1.0,
            wet: 1.0,
            tire: 1.0,
            racecraft: 1.0,
            qualifying: 1.0,
            consistency: 1.0,
        }
    }
}
