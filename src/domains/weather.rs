//! Race weather draw and its effect parameters.

use serde::{Deserialize, Serialize};

use crate::engine::rng::SimRng;
use crate::model::{EventDescriptor, TrackType};

/// Race-day conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Dry,
    LightRain,
    Mixed,
    Wet,
    HeavyRain,
}

/// Effect parameters of a weather state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherParams {
    /// Failure probability multiplier.
    pub dnf_multiplier: f64,
    /// Pace noise standard deviation before confidence scaling.
    pub noise: f64,
}

impl Weather {
    /// Draw conditions for an event with rain probability `p`.
    ///
    /// Consumes exactly one uniform draw.
    pub fn draw(rain_probability: f64, rng: &mut SimRng) -> Self {
        let r = rng.next();
        let p = rain_probability;
        if r < p * 0.15 {
            Self::HeavyRain
        } else if r < p * 0.45 {
            Self::Wet
        } else if r < p * 0.70 {
            Self::LightRain
        } else if r < p * 0.85 {
            Self::Mixed
        } else {
            Self::Dry
        }
    }

    /// Effect parameters.
    #[must_use]
    pub const fn params(self) -> WeatherParams {
        let (dnf_multiplier, noise) = match self {
            Self::Dry => (1.0, 0.06),
            Self::LightRain => (1.2, 0.09),
            Self::Mixed => (1.6, 0.15),
            Self::Wet => (2.2, 0.22),
            Self::HeavyRain => (3.5, 0.35),
        };
        WeatherParams {
            dnf_multiplier,
            noise,
        }
    }

    /// Any amount of rain.
    #[must_use]
    pub const fn is_rain(self) -> bool {
        !matches!(self, Self::Dry)
    }

    /// Standing water: wet or heavy rain.
    #[must_use]
    pub const fn is_wet(self) -> bool {
        matches!(self, Self::Wet | Self::HeavyRain)
    }
}

impl std::fmt::Display for Weather {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Dry => "dry",
            Self::LightRain => "light rain",
            Self::Mixed => "mixed",
            Self::Wet => "wet",
            Self::HeavyRain => "heavy rain",
        };
        f.write_str(label)
    }
}

/// Prediction confidence score for an event (28-94).
///
/// Falls with rain and safety car likelihood, rises as more confirmed
/// results have been scored.
#[must_use]
pub fn confidence_score(event: &EventDescriptor, races_scored: usize) -> f64 {
    let mut conf = 72.0;
    conf -= event.rain_probability * 28.0;
    conf -= (event.sc_probability - 0.4) * 18.0;
    if let Some(modifier) = event.confidence_modifier {
        conf *= modifier;
    }
    if event.track_type == TrackType::Monaco {
        conf -= 10.0;
    }
    conf += (races_scored as f64 * 0.5).min(12.0);
    conf.round().clamp(28.0, 94.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::test_event;

    #[test]
    fn test_zero_rain_is_always_dry() {
        let mut rng = SimRng::new(1);
        assert!((0..500).all(|_| Weather::draw(0.0, &mut rng) == Weather::Dry));
    }

    #[test]
    fn test_certain_rain_frequencies() {
        let mut rng = SimRng::new(2);
        let n = 20_000;
        let heavy = (0..n)
            .filter(|_| Weather::draw(1.0, &mut rng) == Weather::HeavyRain)
            .count();
        let share = heavy as f64 / f64::from(n);
        assert!((share - 0.15).abs() < 0.02, "heavy rain share {share}");
    }

    #[test]
    fn test_params_monotone_in_severity() {
        let order = [
            Weather::Dry,
            Weather::LightRain,
            Weather::Mixed,
            Weather::Wet,
            Weather::HeavyRain,
        ];
        for w in order.windows(2) {
            assert!(w[0].params().dnf_multiplier < w[1].params().dnf_multiplier);
            assert!(w[0].params().noise < w[1].params().noise);
        }
    }

    #[test]
    fn test_confidence_baseline() {
        let mut event = test_event("x", 1);
        event.rain_probability = 0.0;
        event.sc_probability = 0.4;
        assert!((confidence_score(&event, 0) - 72.0).abs() < f64::EPSILON);
        assert!((confidence_score(&event, 100) - 84.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_monaco_and_clamp() {
        let mut event = test_event("x", 1);
        event.track_type = TrackType::Monaco;
        event.rain_probability = 1.0;
        event.sc_probability = 1.0;
        event.confidence_modifier = Some(0.5);
        assert!((confidence_score(&event, 0) - 28.0).abs() < f64::EPSILON);
    }
}
