//! Lap-by-lap race model.
//!
//! A finer-grained alternative to the single-event race: every lap is a
//! state transition over gaps, tyre age and fuel load. Pairwise overtakes
//! are resolved on the running order, which is kept as a persistent index
//! vector and repaired by insertion after each lap instead of re-sorted.
//!
//! Cars start from the standard trial's grid and race pace, so the lap
//! model diversifies a trial rather than replacing it.

use serde::{Deserialize, Serialize};

use crate::domains::race::{RaceSetup, SimulationRun};
use crate::domains::strategy::simulate_stop;
use crate::domains::tyre::Compound;
use crate::domains::weather::Weather;
use crate::engine::capabilities::{PitSamples, MIN_PIT_SAMPLES};
use crate::engine::rng::SimRng;
use crate::model::{LapProfile, PitCrew};

const START_FUEL: f64 = 110.0;
const FUEL_PER_LAP: f64 = 1.55;
const FUEL_TIME_PER_KG: f64 = 0.035;
const GRID_GAP: f64 = 1.2;
const SC_GAP: f64 = 0.8;
const SC_LAP_TIME: f64 = 1.4;
const LAP_NOISE: f64 = 0.015;
const STATIC_PIT_LOSS: f64 = 22.0;
/// Pit lane transit added to an observed stationary time.
const PIT_LANE_TRANSIT: f64 = 18.0;
const PIT_LAP_SHARE: f64 = 0.4;

const OVERTAKE_BASE: f64 = 0.08;
const PACE_DELTA_WEIGHT: f64 = 2.5;
const DRS_GAP: f64 = 1.0;
const DRS_ZONE_GAIN: f64 = 0.12;
const FRESH_TYRE_GAIN: f64 = 0.05;
const PASS_MARGIN: f64 = 0.3;
const BATTLE_GAP: f64 = 0.5;
const BATTLE_LOSS_CHANCE: f64 = 0.015;

const DNF_PER_LAP: f64 = 0.0008;
const LATE_DNF_PER_LAP: f64 = 0.0004;
const LATE_RACE: f64 = 0.7;

/// Grip curve of a compound: base grip, wear rate, cliff lap, peak lap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct GripCurve {
    base: f64,
    rate: f64,
    cliff: u32,
    peak: u32,
}

const fn grip_curve(compound: Compound) -> GripCurve {
    match compound {
        Compound::Soft => GripCurve {
            base: 1.00,
            rate: 0.045,
            cliff: 18,
            peak: 2,
        },
        Compound::Medium => GripCurve {
            base: 0.97,
            rate: 0.028,
            cliff: 28,
            peak: 3,
        },
        Compound::Hard => GripCurve {
            base: 0.93,
            rate: 0.018,
            cliff: 40,
            peak: 5,
        },
        Compound::Intermediate => GripCurve {
            base: 0.88,
            rate: 0.035,
            cliff: 25,
            peak: 2,
        },
        Compound::Wet => GripCurve {
            base: 0.80,
            rate: 0.020,
            cliff: 35,
            peak: 3,
        },
    }
}

/// Grip of a set after `laps` laps: warm-up, wear, then a cliff.
#[must_use]
pub fn tyre_grip(compound: Compound, laps: u32, smoothness: f64) -> f64 {
    let c = grip_curve(compound);
    let smooth = if smoothness > 0.0 { smoothness } else { 1.0 };
    let deg = if laps <= c.peak {
        -0.02 * f64::from(c.peak - laps)
    } else if laps < c.cliff {
        c.rate * f64::from(laps - c.peak).powf(1.15) / smooth
    } else {
        c.rate * f64::from(c.cliff - c.peak).powf(1.15) / smooth + f64::from(laps - c.cliff) * 0.12
    };
    c.base - (deg * 0.01).min(0.15)
}

fn weather_grip(weather: Weather) -> f64 {
    match weather {
        Weather::Wet | Weather::HeavyRain => 0.92,
        Weather::Mixed => 0.96,
        _ => 1.0,
    }
}

/// Starting compound for the conditions.
#[must_use]
pub const fn start_compound(weather: Weather) -> Compound {
    match weather {
        Weather::HeavyRain => Compound::Wet,
        Weather::LightRain => Compound::Intermediate,
        _ => Compound::Medium,
    }
}

/// One car entering the lap model.
#[derive(Debug, Clone, Copy)]
pub struct LapEntrant<'a> {
    /// Profile index of the competitor.
    pub profile: usize,
    /// Race pace (higher is better).
    pub base_pace: f64,
    pub smoothness: f64,
    pub crew: &'a PitCrew,
    pub observed: Option<PitSamples>,
    pub compound: Compound,
    pub laps_on_tyre: u32,
    /// Already out of the standard trial; never takes the start.
    pub retired: bool,
}

/// Final line of one car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapResult {
    pub profile: usize,
    pub total_time: f64,
    /// Lap of retirement.
    pub retired_on: Option<u32>,
    pub pit_stops: u32,
    pub overtakes: u32,
}

/// Outcome of one lap-model race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRun {
    /// Classification, winner first, retirements last.
    pub order: Vec<LapResult>,
    pub safety_car_laps: u32,
    pub overtakes: u32,
}

impl LapRun {
    /// 0-based classified position of a profile.
    #[must_use]
    pub fn position_of(&self, profile: usize) -> Option<usize> {
        self.order.iter().position(|r| r.profile == profile)
    }
}

#[derive(Debug, Clone)]
struct Car {
    total: f64,
    lap_time: f64,
    compound: Compound,
    laps_on_tyre: u32,
    fuel: f64,
    pit_stops: u32,
    overtakes: u32,
    retired_on: Option<u32>,
}

/// Lap-model race over a fixed field.
#[derive(Debug, Clone)]
pub struct LapRace<'a> {
    /// Entrants in starting order.
    pub entrants: Vec<LapEntrant<'a>>,
    pub laps: u32,
    /// First lap to simulate (1, or the live lap).
    pub start_lap: u32,
    /// Single planned stop onto hards.
    pub pit_lap: u32,
    pub profile: LapProfile,
    pub weather: Weather,
    /// Whole-race safety car probability of the event.
    pub sc_probability: f64,
}

impl<'a> LapRace<'a> {
    /// Build the lap race that continues a standard trial.
    ///
    /// Retired cars of the standard trial stay retired and are classified
    /// behind every finisher. A running live session sets the start lap and
    /// tyre state.
    #[must_use]
    pub fn from_trial(setup: &'a RaceSetup<'_>, run: &SimulationRun) -> Self {
        let event = setup.event;
        let laps = event.laps.max(1);
        let compound = start_compound(run.weather);
        let live = setup.live.as_ref().filter(|s| s.current_lap > 1);

        let entrants = run
            .grid
            .iter()
            .filter_map(|g| setup.index_of(&g.competitor))
            .map(|idx| {
                let p = &setup.profiles[idx];
                let running = run.order.iter().find(|e| e.profile == idx).filter(|e| !e.is_retired());
                LapEntrant {
                    profile: idx,
                    base_pace: running.map_or(0.0, |e| 2.0 - e.time),
                    smoothness: p.competitor.personality.tire_smoothness,
                    crew: &p.team.pit_crew,
                    observed: p.observed_pits,
                    compound: live.map_or(compound, |s| s.compound_of(&p.competitor.id)),
                    laps_on_tyre: live.and_then(|s| s.laps_on_tyre_of(&p.competitor.id)).unwrap_or(0),
                    retired: running.is_none(),
                }
            })
            .collect();

        Self {
            entrants,
            laps,
            start_lap: live.map_or(1, |s| s.current_lap.min(laps)),
            pit_lap: ((f64::from(laps) * PIT_LAP_SHARE) as u32).max(1),
            profile: event.lap_profile(),
            weather: run.weather,
            sc_probability: event.sc_probability,
        }
    }

    fn pit_loss(entrant: &LapEntrant<'_>, rng: &mut SimRng) -> f64 {
        match entrant.observed {
            Some(samples) if samples.count >= MIN_PIT_SAMPLES => {
                simulate_stop(entrant.crew, Some(samples), rng).time + PIT_LANE_TRANSIT + rng.next() * 4.0
            }
            _ => STATIC_PIT_LOSS + (rng.next() - 0.5) * 3.0,
        }
    }

    /// Race the field to the flag.
    pub fn run(&self, rng: &mut SimRng) -> LapRun {
        let laps_done = f64::from(self.start_lap.saturating_sub(1));
        let mut cars: Vec<Car> = self
            .entrants
            .iter()
            .enumerate()
            .map(|(i, e)| Car {
                total: i as f64 * GRID_GAP,
                lap_time: 0.0,
                compound: e.compound,
                laps_on_tyre: e.laps_on_tyre,
                fuel: (START_FUEL - laps_done * FUEL_PER_LAP).max(0.0),
                pit_stops: 0,
                overtakes: 0,
                retired_on: e.retired.then_some(self.start_lap),
            })
            .collect();

        let (mut running, out_at_start): (Vec<usize>, Vec<usize>) =
            (0..cars.len()).partition(|&c| !self.entrants[c].retired);
        let mut retired: Vec<usize> = Vec::new();
        let mut sc_remaining = 0u32;
        let mut sc_laps = 0u32;
        let mut overtakes = 0u32;
        let sc_rate = self.profile.sc_probability_per_lap * (self.sc_probability / 0.4);
        let wmod = weather_grip(self.weather);

        for lap in self.start_lap..=self.laps {
            if sc_remaining == 0 && rng.chance(sc_rate) {
                sc_remaining = (rng.next() * 4.0) as u32 + 2;
                if let Some(&leader) = running.first() {
                    let lead = cars[leader].total;
                    for (p, &c) in running.iter().enumerate() {
                        cars[c].total = lead + p as f64 * SC_GAP;
                    }
                }
            }
            let safety_car = sc_remaining > 0;
            if safety_car {
                sc_remaining -= 1;
                sc_laps += 1;
            }

            for &c in &running {
                let entrant = &self.entrants[c];
                let car = &mut cars[c];
                if lap == self.pit_lap {
                    car.total += Self::pit_loss(entrant, rng);
                    car.compound = Compound::Hard;
                    car.laps_on_tyre = 0;
                    car.pit_stops += 1;
                }
                car.laps_on_tyre += 1;
                car.fuel = (car.fuel - FUEL_PER_LAP).max(0.0);

                car.lap_time = if safety_car {
                    SC_LAP_TIME
                } else {
                    let grip = tyre_grip(car.compound, car.laps_on_tyre, entrant.smoothness);
                    (2.0 - entrant.base_pace * grip * wmod)
                        + car.fuel * FUEL_TIME_PER_KG * 0.001
                        + (rng.next() - 0.5) * LAP_NOISE
                };
                car.total += car.lap_time;
            }
            repair_order(&mut running, &cars);

            if !safety_car {
                overtakes += self.resolve_overtakes(&mut running, &mut cars, rng);
                repair_order(&mut running, &cars);
            }

            let late = f64::from(lap) / f64::from(self.laps) > LATE_RACE;
            let dnf_rate = DNF_PER_LAP + if late { LATE_DNF_PER_LAP } else { 0.0 };
            running.retain(|&c| {
                if rng.chance(dnf_rate) {
                    cars[c].retired_on = Some(lap);
                    retired.push(c);
                    false
                } else {
                    true
                }
            });
        }

        // later retirements rank higher
        retired.reverse();
        let order = running
            .iter()
            .chain(retired.iter())
            .chain(out_at_start.iter())
            .map(|&c| LapResult {
                profile: self.entrants[c].profile,
                total_time: cars[c].total,
                retired_on: cars[c].retired_on,
                pit_stops: cars[c].pit_stops,
                overtakes: cars[c].overtakes,
            })
            .collect();

        LapRun {
            order,
            safety_car_laps: sc_laps,
            overtakes,
        }
    }

    fn resolve_overtakes(&self, running: &mut [usize], cars: &mut [Car], rng: &mut SimRng) -> u32 {
        let mut passes = 0;
        for i in 1..running.len() {
            let (a, b) = (running[i - 1], running[i]);
            let gap = cars[b].total - cars[a].total;
            let delta = cars[a].lap_time - cars[b].lap_time;
            if delta <= 0.0 {
                continue;
            }

            let drs = gap > 0.0 && gap < DRS_GAP;
            let mut chance = OVERTAKE_BASE + delta * PACE_DELTA_WEIGHT;
            if drs {
                chance += DRS_ZONE_GAIN * f64::from(self.profile.drs_zones.max(1));
            }
            chance *= 1.0 - self.profile.difficulty;
            if self.weather.is_wet() {
                chance *= 0.6;
            }
            if f64::from(cars[b].laps_on_tyre) < f64::from(cars[a].laps_on_tyre) * 0.5 {
                chance += FRESH_TYRE_GAIN;
            }

            if rng.chance(chance.clamp(0.01, 0.65)) {
                let ahead_total = cars[a].total;
                cars[a].total = cars[b].total + PASS_MARGIN;
                cars[b].total = ahead_total;
                cars[b].overtakes += 1;
                running.swap(i - 1, i);
                passes += 1;
            } else if gap < BATTLE_GAP && rng.chance(BATTLE_LOSS_CHANCE) {
                cars[a].total += 0.5 + rng.next() * 1.5;
            }
        }
        passes
    }
}

/// Insertion repair of a nearly sorted running order.
fn repair_order(running: &mut [usize], cars: &[Car]) {
    for i in 1..running.len() {
        let mut j = i;
        while j > 0 && cars[running[j]].total < cars[running[j - 1]].total {
            running.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Run the lap model as a continuation of a standard trial.
pub fn simulate(setup: &RaceSetup<'_>, run: &SimulationRun, rng: &mut SimRng) -> LapRun {
    LapRace::from_trial(setup, run).run(rng)
}
