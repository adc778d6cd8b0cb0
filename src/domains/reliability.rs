//! Component reliability and seasonal wear.
//!
//! Four independent failure channels per competitor per trial. Wear
//! accumulates only when confirmed results are ingested; a trial reads the
//! wear snapshot and never writes it.

use serde::{Deserialize, Serialize};

use crate::domains::weather::WeatherParams;
use crate::engine::rng::SimRng;
use crate::model::{Component, ComponentRates, EventDescriptor, TeamTier};

/// Wear (0-100) above which the engine is a replacement candidate.
pub const ENGINE_REPLACEMENT_THRESHOLD: f64 = 85.0;
const MAX_WEAR: f64 = 100.0;
/// Failure multiplier gained at full wear.
const WEAR_FAILURE_GAIN: f64 = 1.5;
/// Failure multiplier for competitors with fewer than three results.
pub const ROOKIE_FAILURE_MULTIPLIER: f64 = 1.10;

/// Accumulated wear of one team's components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WearState {
    pub engine: f64,
    pub gearbox: f64,
    pub cooling: f64,
    pub hybrid: f64,
    /// Power units replaced this season.
    pub replacements: u32,
}

impl WearState {
    /// Wear of a component.
    #[must_use]
    pub const fn get(&self, component: Component) -> f64 {
        match component {
            Component::Engine => self.engine,
            Component::Gearbox => self.gearbox,
            Component::Cooling => self.cooling,
            Component::Hybrid => self.hybrid,
        }
    }

    fn get_mut(&mut self, component: Component) -> &mut f64 {
        match component {
            Component::Engine => &mut self.engine,
            Component::Gearbox => &mut self.gearbox,
            Component::Cooling => &mut self.cooling,
            Component::Hybrid => &mut self.hybrid,
        }
    }

    /// Failure multiplier of a component (1.0 new, 2.5 at full wear).
    #[must_use]
    pub fn wear_multiplier(&self, component: Component) -> f64 {
        1.0 + self.get(component) / MAX_WEAR * WEAR_FAILURE_GAIN
    }

    /// Failure multiplier of the average wear.
    #[must_use]
    pub fn average_multiplier(&self) -> f64 {
        let avg = Component::ALL.iter().map(|&c| self.get(c)).sum::<f64>() / 4.0;
        1.0 + avg / MAX_WEAR * WEAR_FAILURE_GAIN
    }

    /// Accumulate one event's wear.
    pub fn advance(&mut self, event: &EventDescriptor, tier: TeamTier, rng: &mut SimRng) {
        let scale = match tier {
            TeamTier::Elite => 0.8,
            TeamTier::Midfield => 1.0,
            TeamTier::Lower => 1.2,
        };
        let power = if event.is_power_track() { 1.3 } else { 1.0 };
        let wet = if event.rain_probability > 0.4 { 1.25 } else { 1.0 };

        self.engine += rng.range(4.0, 7.0) * scale * power;
        self.gearbox += rng.range(3.0, 5.0) * scale;
        self.hybrid += rng.range(3.0, 6.0) * scale;
        self.cooling += rng.range(2.0, 4.0) * scale * wet;

        for c in Component::ALL {
            let w = self.get_mut(c);
            *w = w.min(MAX_WEAR);
        }
    }

    /// Decide whether a worn engine is replaced before the next event.
    ///
    /// Returns true when it was replaced; the caller queues the grid
    /// penalties with [`draw_grid_penalty`] on the same generator.
    pub fn check_replacement(&mut self, round: u32, total_rounds: u32, tier: TeamTier, rng: &mut SimRng) -> bool {
        if self.engine <= ENGINE_REPLACEMENT_THRESHOLD {
            return false;
        }
        let late = f64::from(round) > f64::from(total_rounds) * 2.0 / 3.0;
        let chance = match tier {
            TeamTier::Elite => 0.8,
            _ if late => 0.35,
            _ => 0.5,
        };
        if rng.next() < chance {
            self.engine = 5.0 + rng.range(0.0, 10.0);
            self.replacements += 1;
            true
        } else {
            false
        }
    }
}

/// Grid places lost for a power unit change or an engine failure (5-10).
pub fn draw_grid_penalty(rng: &mut SimRng) -> u32 {
    rng.range(5.0, 11.0).floor() as u32
}

/// Everything a failure roll depends on, snapshotted before the trials.
#[derive(Debug, Clone, Copy)]
pub struct FailureInputs<'a> {
    pub rates: &'a ComponentRates,
    pub wear: &'a WearState,
    pub weather: WeatherParams,
    /// Rolling team reliability index (0.9-1.1).
    pub team_reliability: f64,
    /// Static historical reliability factor (0.92-1.08).
    pub historical_reliability: f64,
    pub rookie: bool,
    /// Pressure-adjusted aggression.
    pub aggression: f64,
    /// Effective mistake rate (pressure, track phase and confidence applied).
    pub mistake_rate: f64,
}

impl FailureInputs<'_> {
    /// Per-trial failure probability of one channel.
    #[must_use]
    pub fn probability(&self, component: Component) -> f64 {
        let w = self.weather.dnf_multiplier;
        let rel = 2.0 - self.team_reliability;
        let rookie = if self.rookie { ROOKIE_FAILURE_MULTIPLIER } else { 1.0 };
        let base = self.rates.get(component) * rel * self.wear.wear_multiplier(component);
        match component {
            Component::Engine => base * w * (2.0 - self.historical_reliability) * rookie,
            Component::Gearbox => base * w * (1.0 + (self.aggression - 1.0) * 0.5) * rookie,
            Component::Cooling => base * if w > 1.5 { w * 1.3 } else { w },
            Component::Hybrid => base * w * self.mistake_rate,
        }
    }

    /// Roll all four channels (always four draws) and return the first failure.
    pub fn roll(&self, rng: &mut SimRng) -> Option<Component> {
        let mut failed = None;
        for c in Component::ALL {
            if rng.next() < self.probability(c) && failed.is_none() {
                failed = Some(c);
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::weather::Weather;
    use crate::model::event::test_event;

    fn inputs<'a>(rates: &'a ComponentRates, wear: &'a WearState) -> FailureInputs<'a> {
        FailureInputs {
            rates,
            wear,
            weather: Weather::Dry.params(),
            team_reliability: 1.0,
            historical_reliability: 1.0,
            rookie: false,
            aggression: 1.0,
            mistake_rate: 1.0,
        }
    }

    #[test]
    fn test_new_component_neutral() {
        let rates = ComponentRates::default();
        let wear = WearState::default();
        let p = inputs(&rates, &wear).probability(Component::Engine);
        assert!((p - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_full_wear_raises_probability() {
        let rates = ComponentRates::default();
        let fresh = WearState::default();
        let worn = WearState {
            engine: 100.0,
            gearbox: 100.0,
            cooling: 100.0,
            hybrid: 100.0,
            replacements: 0,
        };
        for c in Component::ALL {
            let a = inputs(&rates, &fresh).probability(c);
            let b = inputs(&rates, &worn).probability(c);
            assert!(b > a, "{c}");
            assert!((b / a - 2.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_heavy_rain_cooling_extra() {
        let rates = ComponentRates::default();
        let wear = WearState::default();
        let mut i = inputs(&rates, &wear);
        i.weather = Weather::HeavyRain.params();
        let p = i.probability(Component::Cooling);
        assert!((p - 0.018 * 3.5 * 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_roll_certain_failure() {
        let rates = ComponentRates {
            engine: 0.0,
            gearbox: 2.0,
            cooling: 0.0,
            hybrid: 2.0,
        };
        let wear = WearState::default();
        let mut rng = SimRng::new(5);
        assert_eq!(inputs(&rates, &wear).roll(&mut rng), Some(Component::Gearbox));
    }

    #[test]
    fn test_roll_consumes_four_draws() {
        let rates = ComponentRates::default();
        let wear = WearState::default();
        let mut a = SimRng::new(9);
        let mut b = SimRng::new(9);
        let _ = inputs(&rates, &wear).roll(&mut a);
        for _ in 0..4 {
            let _ = b.next();
        }
        assert!((a.next() - b.next()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_advance_wear_by_tier() {
        let event = test_event("r1", 1);
        let mut elite = WearState::default();
        let mut lower = WearState::default();
        elite.advance(&event, TeamTier::Elite, &mut SimRng::new(1));
        lower.advance(&event, TeamTier::Lower, &mut SimRng::new(1));
        assert!(lower.engine > elite.engine);
        assert!((4.0 * 0.8..7.0 * 0.8).contains(&elite.engine));
    }

    #[test]
    fn test_wear_capped() {
        let event = test_event("r1", 1);
        let mut w = WearState::default();
        let mut rng = SimRng::new(2);
        for _ in 0..50 {
            w.advance(&event, TeamTier::Lower, &mut rng);
        }
        for c in Component::ALL {
            assert!(w.get(c) <= MAX_WEAR);
        }
    }

    #[test]
    fn test_replacement_resets_engine() {
        let mut w = WearState {
            engine: 95.0,
            ..WearState::default()
        };
        let mut rng = SimRng::new(0);
        let replaced = (0..20).any(|_| w.check_replacement(10, 24, TeamTier::Elite, &mut rng));
        assert!(replaced);
        assert!((5.0..15.0).contains(&w.engine));
        assert_eq!(w.replacements, 1);
    }

    #[test]
    fn test_no_replacement_below_threshold() {
        let mut w = WearState {
            engine: 80.0,
            ..WearState::default()
        };
        assert!(!w.check_replacement(10, 24, TeamTier::Elite, &mut SimRng::new(0)));
    }

    #[test]
    fn test_grid_penalty_range() {
        let mut rng = SimRng::new(4);
        for _ in 0..200 {
            assert!((5..=10).contains(&draw_grid_penalty(&mut rng)));
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: failure probability is monotone in wear for every channel.
        #[test]
        fn prop_wear_monotone(low in 0.0f64..100.0, extra in 0.001f64..100.0) {
            let high = (low + extra).min(100.0);
            prop_assume!(high > low);
            let rates = ComponentRates::default();
            let a = WearState { engine: low, gearbox: low, cooling: low, hybrid: low, replacements: 0 };
            let b = WearState { engine: high, gearbox: high, cooling: high, hybrid: high, replacements: 0 };
            for c in Component::ALL {
                let mk = |w| FailureInputs {
                    rates: &rates,
                    wear: w,
                    weather: crate::domains::weather::Weather::Dry.params(),
                    team_reliability: 1.0,
                    historical_reliability: 1.0,
                    rookie: false,
                    aggression: 1.0,
                    mistake_rate: 1.0,
                };
                prop_assert!(mk(&a).probability(c) < mk(&b).probability(c));
            }
        }
    }
}
