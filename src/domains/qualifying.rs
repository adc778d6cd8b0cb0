//! Three-stage knockout qualifying.
//!
//! Each stage redraws every remaining competitor's lap, ranks them and
//! knocks out the slowest `k`. The grid is the final stage in pace order
//! followed by the stage-two and stage-one eliminations. Queued grid
//! penalties are applied last and positions renumbered 1..=N.

use serde::{Deserialize, Serialize};

use crate::domains::pace::{PaceContext, PaceMode};
use crate::domains::weather::Weather;
use crate::engine::rng::SimRng;

/// Stage a grid entry was classified in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifyingStage {
    Q1,
    Q2,
    Q3,
    /// Field too small for knockouts: one session, direct ranking.
    Single,
    /// Taken from the real qualifying order.
    Official,
}

/// One starting position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEntry {
    pub competitor: String,
    /// Starting position (1-based).
    pub position: u32,
    /// Lap pace of the last stage the competitor ran.
    pub qualifying_pace: f64,
    pub stage: QualifyingStage,
    /// Grid places added by queued penalties.
    pub penalty: u32,
}

/// Qualifying weekend format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFormat {
    /// Two runs per stage.
    Standard,
    /// Sprint shootout: one run per stage, less track evolution.
    Sprint,
}

/// A competitor entering qualifying.
#[derive(Debug, Clone, Copy)]
pub struct Entrant<'a> {
    pub pace: PaceContext<'a>,
    pub rookie: bool,
    /// Queued grid penalty (places).
    pub penalty: u32,
}

struct SessionParams {
    evolution_street: [f64; 3],
    evolution: [f64; 3],
    traffic: (f64, f64),
    traffic_cost: (f64, f64),
    improve_base: f64,
    improve_skill: f64,
    improve_gain: (f64, f64),
    yellow: Option<((f64, f64), (f64, f64))>,
    rookie_mistake: f64,
    rookie_cost: (f64, f64),
    aggressive_mistake: f64,
    aggressive_cost: (f64, f64),
}

const STANDARD: SessionParams = SessionParams {
    evolution_street: [1.0, 1.012, 1.022],
    evolution: [1.0, 1.006, 1.012],
    traffic: (0.18, 0.08),
    traffic_cost: (0.005, 0.02),
    improve_base: 0.55,
    improve_skill: 0.2,
    improve_gain: (0.002, 0.008),
    yellow: Some(((0.06, 0.03), (0.015, 0.04))),
    rookie_mistake: 0.12,
    rookie_cost: (0.01, 0.03),
    aggressive_mistake: 0.06,
    aggressive_cost: (0.005, 0.015),
};

const SPRINT: SessionParams = SessionParams {
    evolution_street: [1.0, 1.008, 1.015],
    evolution: [1.0, 1.004, 1.008],
    traffic: (0.12, 0.05),
    traffic_cost: (0.003, 0.015),
    improve_base: 0.30,
    improve_skill: 0.15,
    improve_gain: (0.001, 0.005),
    yellow: None,
    rookie_mistake: 0.15,
    rookie_cost: (0.008, 0.025),
    aggressive_mistake: 0.08,
    aggressive_cost: (0.004, 0.012),
};

/// Aggression above which a lock-up mistake becomes possible.
const AGGRESSIVE_THRESHOLD: f64 = 1.05;

impl SessionFormat {
    const fn params(self) -> &'static SessionParams {
        match self {
            Self::Standard => &STANDARD,
            Self::Sprint => &SPRINT,
        }
    }
}

/// One lap of one entrant in a stage.
fn run_lap(entrant: &Entrant<'_>, p: &SessionParams, stage: usize, street: bool, weather: Weather, rng: &mut SimRng) -> f64 {
    let pick = |(street_v, other_v): (f64, f64)| if street { street_v } else { other_v };
    let evolution = if street { p.evolution_street[stage] } else { p.evolution[stage] };

    let mut lap = entrant.pace.pace(PaceMode::Qualifying, weather, rng) * evolution;

    if rng.chance(pick(p.traffic)) {
        lap -= rng.range(p.traffic_cost.0, p.traffic_cost.1);
    }
    if rng.chance(p.improve_base + entrant.pace.skill / 100.0 * p.improve_skill) {
        lap += rng.range(p.improve_gain.0, p.improve_gain.1);
    }
    if let Some((chance, (lo, hi))) = p.yellow {
        if rng.chance(pick(chance)) {
            lap -= rng.range(lo, hi);
        }
    }
    if entrant.rookie {
        if rng.chance(p.rookie_mistake) {
            lap -= rng.range(p.rookie_cost.0, p.rookie_cost.1);
        }
    } else if entrant.pace.competitor.personality.aggression > AGGRESSIVE_THRESHOLD && rng.chance(p.aggressive_mistake) {
        lap -= rng.range(p.aggressive_cost.0, p.aggressive_cost.1);
    }
    lap
}

/// Run a stage over `field` (indices into `entrants`), fastest first.
fn run_stage(
    entrants: &[Entrant<'_>],
    field: &[usize],
    p: &SessionParams,
    stage: usize,
    street: bool,
    weather: Weather,
    rng: &mut SimRng,
) -> Vec<(usize, f64)> {
    let mut laps: Vec<(usize, f64)> = field
        .iter()
        .map(|&i| (i, run_lap(&entrants[i], p, stage, street, weather, rng)))
        .collect();
    laps.sort_by(|a, b| b.1.total_cmp(&a.1));
    laps
}

/// Simulate qualifying and return the penalised, renumbered grid.
pub fn simulate(
    entrants: &[Entrant<'_>],
    format: SessionFormat,
    eliminated_per_stage: usize,
    weather: Weather,
    rng: &mut SimRng,
) -> Vec<GridEntry> {
    let p = format.params();
    let street = entrants.first().is_some_and(|e| e.pace.event.is_street());
    let n = entrants.len();
    let k = eliminated_per_stage;
    let everyone: Vec<usize> = (0..n).collect();

    let entry = |(i, pace): (usize, f64), stage| GridEntry {
        competitor: entrants[i].pace.competitor.id.clone(),
        position: 0,
        qualifying_pace: pace,
        stage,
        penalty: entrants[i].penalty,
    };

    let mut grid: Vec<GridEntry> = if n <= 2 * k + 1 {
        run_stage(entrants, &everyone, p, 0, street, weather, rng)
            .into_iter()
            .map(|lap| entry(lap, QualifyingStage::Single))
            .collect()
    } else {
        let q1 = run_stage(entrants, &everyone, p, 0, street, weather, rng);
        let (q2_field, q1_out) = q1.split_at(n - k);
        let q2_field: Vec<usize> = q2_field.iter().map(|(i, _)| *i).collect();

        let q2 = run_stage(entrants, &q2_field, p, 1, street, weather, rng);
        let (q3_field, q2_out) = q2.split_at(n - 2 * k);
        let q3_field: Vec<usize> = q3_field.iter().map(|(i, _)| *i).collect();

        let q3 = run_stage(entrants, &q3_field, p, 2, street, weather, rng);

        q3.into_iter()
            .map(|lap| entry(lap, QualifyingStage::Q3))
            .chain(q2_out.iter().map(|&lap| entry(lap, QualifyingStage::Q2)))
            .chain(q1_out.iter().map(|&lap| entry(lap, QualifyingStage::Q1)))
            .collect()
    };

    apply_penalties(&mut grid);
    grid
}

/// Move penalised entries back (capped at the last place) and renumber.
pub fn apply_penalties(grid: &mut [GridEntry]) {
    let n = grid.len() as u32;
    let mut keyed: Vec<(u32, usize)> = grid
        .iter()
        .enumerate()
        .map(|(i, g)| ((i as u32 + 1 + g.penalty).min(n), i))
        .collect();
    keyed.sort_by_key(|&(pos, i)| (pos, i));
    let mut reordered: Vec<GridEntry> = keyed.iter().map(|&(_, i)| grid[i].clone()).collect();
    for (i, g) in reordered.iter_mut().enumerate() {
        g.position = i as u32 + 1;
    }
    grid.clone_from_slice(&reordered);
}

/// Replace the simulated order with a real one.
///
/// Unknown ids are dropped; competitors missing from the real order keep
/// their simulated relative order behind it.
#[must_use]
pub fn apply_official_grid(official: &[String], simulated: Vec<GridEntry>) -> Vec<GridEntry> {
    let mut grid: Vec<GridEntry> = Vec::with_capacity(simulated.len());
    for id in official {
        if grid.iter().any(|g| &g.competitor == id) {
            continue;
        }
        if let Some(sim) = simulated.iter().find(|g| &g.competitor == id) {
            grid.push(GridEntry {
                stage: QualifyingStage::Official,
                penalty: 0,
                ..sim.clone()
            });
        }
    }
    for sim in simulated {
        if !grid.iter().any(|g| g.competitor == sim.competitor) {
            grid.push(sim);
        }
    }
    for (i, g) in grid.iter_mut().enumerate() {
        g.position = i as u32 + 1;
    }
    grid
}
