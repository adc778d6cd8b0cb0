//! Pit stops, undercut timing and the per-race strategy delta.

use serde::{Deserialize, Serialize};

use crate::domains::tyre::Compound;
use crate::engine::capabilities::{PitSamples, MIN_PIT_SAMPLES};
use crate::engine::rng::SimRng;
use crate::model::{PitCrew, TyreDeg};

/// Stationary time floor (seconds).
const MIN_STOP: f64 = 1.8;
/// Observed stops are clamped to this ceiling before error surcharges.
const MAX_LIVE_STOP: f64 = 10.0;
const UNSAFE_RELEASE_PENALTY: f64 = 5.0;
const LIVE_ERROR_RATE: f64 = 0.03;
const LIVE_UNSAFE_RATE: f64 = 0.008;
/// Reference stop the strategy delta is measured against.
const IDEAL_STOP: f64 = 2.2;
/// Track temperature assumed when no live session runs.
pub const REFERENCE_TRACK_TEMP: f64 = 35.0;

/// One simulated stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitStop {
    /// Stationary time including surcharges (seconds).
    pub time: f64,
    pub unsafe_release: bool,
}

/// Simulate a stop, from observed samples when there are enough of them.
pub fn simulate_stop(crew: &PitCrew, observed: Option<PitSamples>, rng: &mut SimRng) -> PitStop {
    if let Some(s) = observed.filter(|s| s.count >= MIN_PIT_SAMPLES) {
        let mut time = rng.normal(s.mean, s.sigma).clamp(MIN_STOP, MAX_LIVE_STOP);
        if rng.chance(LIVE_ERROR_RATE) {
            time += 2.0 + rng.next() * 8.0;
        }
        let unsafe_release = rng.chance(LIVE_UNSAFE_RATE);
        if unsafe_release {
            time += UNSAFE_RELEASE_PENALTY;
        }
        return PitStop { time, unsafe_release };
    }

    let mut time = rng.normal(crew.base_time, crew.sigma).max(MIN_STOP);
    if rng.chance(crew.error_rate) {
        time += rng.range(1.5, 5.0);
    }
    let unsafe_release = rng.chance(crew.error_rate * 0.3);
    if unsafe_release {
        time += UNSAFE_RELEASE_PENALTY;
    } else if rng.chance(crew.perfect_rate) {
        time = time.min(1.9 + rng.next() * 0.15);
    }
    PitStop { time, unsafe_release }
}

/// Total stationary time of `stops` stops.
pub fn total_pit_time(crew: &PitCrew, observed: Option<PitSamples>, stops: u32, rng: &mut SimRng) -> f64 {
    (0..stops).map(|_| simulate_stop(crew, observed, rng).time).sum()
}

/// Net time gained by pitting onto `new` from `current` after `laps_on_tyre` laps.
#[must_use]
pub fn undercut_delta(current: Compound, laps_on_tyre: u32, new: Compound, track_temp: f64) -> f64 {
    let laps = f64::from(laps_on_tyre);
    let in_lap_loss = if current == Compound::Hard {
        0.02 + laps * 0.001
    } else {
        0.05 + laps * 0.003
    };
    let grip_bonus = match new {
        Compound::Soft => 1.8,
        Compound::Hard => 0.8,
        _ => 1.2,
    };
    let out_lap_gain = 0.85 + (track_temp - 30.0) * 0.01;
    out_lap_gain + grip_bonus - in_lap_loss
}

/// Chance that a stop with the given undercut delta pays off.
#[must_use]
pub fn pit_success_probability(delta: f64) -> f64 {
    if delta > 1.5 {
        0.85
    } else if delta > 0.5 {
        0.65
    } else if delta > 0.0 {
        0.50
    } else {
        0.20
    }
}

/// Live tyre situation of one competitor, enabling the undercut term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveTyre {
    pub compound: Compound,
    pub laps_on_tyre: u32,
    pub track_temp: f64,
}

/// Inputs of [`strategy_delta`].
#[derive(Debug, Clone, Copy)]
pub struct StrategyInputs<'a> {
    pub crew: &'a PitCrew,
    pub observed: Option<PitSamples>,
    pub efficiency: f64,
    pub stops: u32,
    pub tire_deg: TyreDeg,
    pub tire_smoothness: f64,
    /// Pressure-adjusted overtake risk.
    pub overtake_risk: f64,
    pub live: Option<LiveTyre>,
}

fn strategy_deg_multiplier(deg: TyreDeg) -> f64 {
    match deg {
        TyreDeg::High | TyreDeg::VeryHigh => 1.4,
        TyreDeg::Low => 0.7,
        _ => 1.0,
    }
}

/// Race strategy cost in strategy units (higher = slower; the race divides by 50).
pub fn strategy_delta(inputs: &StrategyInputs<'_>, rng: &mut SimRng) -> f64 {
    let eff = inputs.efficiency;
    let tyre_penalty = (1.2 - inputs.tire_smoothness) * strategy_deg_multiplier(inputs.tire_deg) * 2.5;

    let pit = total_pit_time(inputs.crew, inputs.observed, inputs.stops, rng);
    let pit_norm = (pit - f64::from(inputs.stops) * IDEAL_STOP) * 0.8;

    let mut delta = rng.normal((1.0 - eff) * 5.0, (1.0 - eff) * 2.0);

    if let Some(live) = inputs.live {
        let new = if live.compound == Compound::Medium { Compound::Hard } else { Compound::Medium };
        let undercut = undercut_delta(live.compound, live.laps_on_tyre, new, live.track_temp);
        if rng.chance(pit_success_probability(undercut)) {
            delta -= undercut * eff * 0.5;
        } else {
            delta += 2.0;
        }
    }

    if inputs.overtake_risk > 1.1 {
        delta += rng.normal(0.0, 4.0);
    }

    let upset = if rng.chance(0.05 * eff) { rng.range(3.0, 8.0) } else { 0.0 };

    delta + tyre_penalty + pit_norm - upset
}
