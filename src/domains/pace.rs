//! Per-competitor pace score.
//!
//! Pace is strength-like: higher is faster. The race converts it to a
//! time-like value as `2 - pace`. The same function serves qualifying
//! (no race-only effects, reduced noise) and the race (full stack).
//!
//! ```text
//! pace = w_driver * skill + w_car * (0.65 + 0.35 * car) + w_track * suitability
//!        + rating term, * track history, + strategy window, - tyre, + fuel,
//!        live overrides, what-if override, + N(0, noise)
//! ```

use crate::config::PaceWeights;
use crate::domains::strategy::{pit_success_probability, undercut_delta, REFERENCE_TRACK_TEMP};
use crate::domains::tyre::{Compound, FuelModel, TireModel};
use crate::domains::weather::Weather;
use crate::engine::capabilities::LiveSession;
use crate::engine::rng::SimRng;
use crate::model::{Competitor, EventDescriptor, Overtaking, Team, TrackType, TyreDeg};

const SPECIALIZATION_MIN: f64 = 0.85;
const SPECIALIZATION_MAX: f64 = 1.15;
const DOMINANCE_BOOST: f64 = 1.05;
const WET_TRAIT_GAIN: f64 = 1.3;
const CAR_FLOOR: f64 = 0.65;
const CAR_SPREAD: f64 = 0.35;
const RATING_SCALE: f64 = 0.015;
const STRATEGY_WINDOW_GAIN: f64 = 0.003;
const TYRE_TERM_SCALE: f64 = 0.15;
const FUEL_TERM_SCALE: f64 = 0.2;
const QUALIFYING_NOISE: f64 = 0.6;
/// Fuel mass assumed for the offline tyre estimate (kg).
const REFERENCE_FUEL: f64 = 50.0;

/// Session the pace is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceMode {
    /// Single-lap pace: no strategy, tyre, fuel or live effects.
    Qualifying,
    /// Full race stack; `late` models late-race pressure.
    Race { late: bool },
}

/// Everything the pace of one competitor at one event depends on.
///
/// Built once per run; trials only add their own draws.
#[derive(Debug, Clone, Copy)]
pub struct PaceContext<'a> {
    pub competitor: &'a Competitor,
    pub team: &'a Team,
    pub event: &'a EventDescriptor,
    /// Base skill after rating recalibration (0-100).
    pub skill: f64,
    /// Rolling team rating with development applied (0-100 scale).
    pub team_rating: f64,
    /// Momentum times weekend form (rookie discount included).
    pub form: f64,
    /// Morale multiplier (0.90-1.10).
    pub confidence: f64,
    /// Normalized cross-race rating (0-1).
    pub rating_norm: f64,
    /// Track history multiplier.
    pub track_history: f64,
    pub weights: PaceWeights,
    /// Event confidence score (28-94).
    pub confidence_score: f64,
    pub tire_model: Option<&'a dyn TireModel>,
    pub live: Option<&'a LiveSession>,
}

/// Track-type fit of a competitor, before dominance (0.85-1.15).
#[must_use]
pub fn specialization(competitor: &Competitor, event: &EventDescriptor, weather: Weather) -> f64 {
    let t = &competitor.traits;
    let mut s = match event.track_type {
        TrackType::Monaco => (t.qualifying * 1.5 + t.street * 1.5 + t.consistency) / 4.0,
        TrackType::Twisty => (t.qualifying * 1.2 + t.tire * 1.2 + t.consistency) / 3.4,
        TrackType::Highspeed => (t.high_speed * 1.5 + t.technical * 1.2) / 2.7,
        other => {
            let mut s = 1.0;
            match other {
                TrackType::Technical => s *= t.technical,
                TrackType::Street | TrackType::StreetHybrid => s *= (t.street + t.racecraft) / 2.0,
                TrackType::Power => s *= t.high_speed,
                _ => {}
            }
            if matches!(event.tire_deg, TyreDeg::High | TyreDeg::MediumHigh) {
                s *= t.tire;
            }
            if matches!(event.overtaking, Overtaking::Low | Overtaking::VeryLow) {
                s *= (t.qualifying + t.racecraft) / 2.0;
            }
            s
        }
    };
    if weather.is_rain() {
        s *= t.wet * WET_TRAIT_GAIN;
    }
    s.clamp(SPECIALIZATION_MIN, SPECIALIZATION_MAX)
}

/// Boost at a competitor's dominant events, capped so the product with
/// `specialization` stays within the specialization ceiling.
#[must_use]
pub fn dominance(competitor: &Competitor, event_id: &str, specialization: f64) -> f64 {
    if !competitor.dominant_events.iter().any(|e| e == event_id) {
        return 1.0;
    }
    if specialization * DOMINANCE_BOOST > SPECIALIZATION_MAX {
        SPECIALIZATION_MAX / specialization
    } else {
        DOMINANCE_BOOST
    }
}

/// Energy-recovery derate on power tracks (never below 0.96).
#[must_use]
pub fn energy_recovery_modifier(team: &Team, event: &EventDescriptor) -> f64 {
    if !event.is_power_track() {
        return 1.0;
    }
    (1.0 - (1.0 - team.energy_recovery) * 0.5).max(0.96)
}

/// Aero efficiency fit of a team at a track type.
#[must_use]
pub fn aero_modifier(team: &Team, track_type: TrackType) -> f64 {
    match track_type {
        TrackType::Technical => 1.0 + (team.aero_efficiency - 0.88) * 0.6,
        TrackType::StreetHybrid => 1.0 + (team.aero_efficiency - 0.88) * 0.3,
        _ => 1.0,
    }
}

/// Clutch multiplier: full effect late in a race, half effect otherwise.
#[must_use]
pub fn clutch_modifier(clutch_factor: f64, late: bool) -> f64 {
    if late {
        clutch_factor
    } else {
        1.0 + (clutch_factor - 1.0) * 0.5
    }
}

/// Laps into a stint used by the offline tyre and strategy estimates.
fn stint_length(event: &EventDescriptor) -> u32 {
    event.laps / (event.strategy_stops + 1)
}

impl PaceContext<'_> {
    /// Pace before race-only terms and noise.
    #[must_use]
    pub fn base(&self, mode: PaceMode, weather: Weather) -> f64 {
        let c = self.competitor;
        let spec = specialization(c, self.event, weather);
        let dom = dominance(c, &self.event.id, spec);

        let late = matches!(mode, PaceMode::Race { late: true });
        let mut clutch = clutch_modifier(c.clutch_factor, late);
        if mode == PaceMode::Qualifying {
            clutch *= c.traits.qualifying;
        }

        let skill = self.skill / 100.0 * spec * clutch * self.form * dom * self.confidence;
        let car = self.team_rating / 100.0
            * energy_recovery_modifier(self.team, self.event)
            * self.event.team_multiplier(&self.team.id)
            * self.event.driver_special(&c.id);
        let suitability = aero_modifier(self.team, self.event.track_type) * spec;

        let w = self.weights;
        let pace = skill * w.driver + (CAR_FLOOR + car * CAR_SPREAD) * w.car + suitability * w.track;
        (pace + (self.rating_norm - 0.5) * RATING_SCALE) * self.track_history
    }

    /// Full pace draw.
    pub fn pace(&self, mode: PaceMode, weather: Weather, rng: &mut SimRng) -> f64 {
        let mut pace = self.base(mode, weather);
        let noise = weather.params().noise * (1.2 - self.confidence_score / 100.0);

        if mode == PaceMode::Qualifying {
            return pace + rng.normal(0.0, noise * QUALIFYING_NOISE);
        }

        let smoothness = self.competitor.personality.tire_smoothness;
        let stint = stint_length(self.event);

        let window = undercut_delta(Compound::Medium, stint.max(5), Compound::Hard, REFERENCE_TRACK_TEMP);
        if rng.chance(pit_success_probability(window) * self.team.strategy_efficiency) {
            pace += STRATEGY_WINDOW_GAIN;
        }

        if let Some(model) = self.tire_model {
            let laps = (f64::from(stint) * 0.6) as u32;
            pace -= model.pace_modifier(
                Compound::Medium,
                laps,
                REFERENCE_TRACK_TEMP,
                smoothness,
                self.event.tire_deg,
                REFERENCE_FUEL,
            ) * TYRE_TERM_SCALE;
        }

        let fuel = FuelModel::default();
        pace += fuel.pace_modifier(self.event.laps / 2, 0) * FUEL_TERM_SCALE;

        let mut noise = noise;
        if let Some(live) = self.live {
            pace += fuel.pace_modifier(live.current_lap, live.sc_laps);
            if let Some(model) = self.tire_model {
                let id = &self.competitor.id;
                let laps = live.laps_on_tyre_of(id).unwrap_or(live.current_lap % 20);
                pace -= model.pace_modifier(
                    live.compound_of(id),
                    laps,
                    live.track_temp,
                    smoothness,
                    self.event.tire_deg,
                    fuel.remaining(live.current_lap, live.sc_laps),
                );
            }
            pace *= live.deg_temp_multiplier();
            noise *= live.mistake_multiplier();
        }

        if let Some(m) = self.event.pace_overrides.get(&self.competitor.id) {
            pace *= m;
        }

        pace + rng.normal(0.0, noise)
    }
}
