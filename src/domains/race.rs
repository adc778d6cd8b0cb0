//! Single-event race simulation.
//!
//! [`RaceSetup::prepare`] snapshots everything a trial reads (rolling state,
//! standings, live data) once per run. [`RaceSetup::simulate`] then plays one
//! trial from its own generator:
//!
//! ```text
//! weather -> grid -> safety car / late race / upset draws
//!   -> per competitor (grid order): failure roll, race pace, dirty air,
//!      grid decay, safety car bunching, upset, strategy
//!   -> sort -> restart adjustment -> team orders -> incidents -> final order
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, PaceWeights};
use crate::domains::championship::{self, PressureModifiers};
use crate::domains::form::{weekend_form, TeamState};
use crate::domains::pace::{PaceContext, PaceMode};
use crate::domains::qualifying::{self, Entrant, GridEntry, SessionFormat};
use crate::domains::reliability::{draw_grid_penalty, FailureInputs, WearState};
use crate::domains::strategy::{strategy_delta, LiveTyre, StrategyInputs};
use crate::domains::tyre::TireModel;
use crate::domains::weather::{confidence_score, Weather};
use crate::engine::capabilities::{Capabilities, LiveSession, PitSamples};
use crate::engine::rng::SimRng;
use crate::engine::state::EngineState;
use crate::error::{SimError, SimResult};
use crate::model::{Competitor, Component, EventDescriptor, Personality, Season, Team};

/// Finish time of a retired competitor (plus a uniform tiebreak).
pub const DNF_TIME: f64 = 9999.0;
/// Times at or above this are retirements.
pub const CLASSIFIED_LIMIT: f64 = 9900.0;

const ROOKIE_FORM: f64 = 0.98;
/// A uniform draw above this puts the decisive phase late in the race.
const LATE_RACE_DRAW: f64 = 0.6;
const EARLY_PHASE: f64 = 0.4;
const LATE_PHASE: f64 = 0.8;
const STREET_EVOLUTION: f64 = 0.025;
const TRACK_EVOLUTION: f64 = 0.012;
const WET_EVOLUTION: f64 = 0.3;
const HEAT_GRIP_LOSS: f64 = 0.008;
const ELITE_WET_TRAIT: f64 = 1.06;
const ELITE_WET_GAIN: f64 = 0.05;
const DIRTY_AIR: f64 = 0.005;
const GRID_DECAY: f64 = 0.06;
const STRATEGY_SCALE: f64 = 50.0;
const UPSET_SHARE: f64 = 0.2;
const TEAM_ORDER_GAP: f64 = 25.0;
const TEAM_ORDER_CHANCE: f64 = 0.8;
const INCIDENT_GAP: f64 = 0.015;
const MAX_INCIDENT_CHANCE: f64 = 0.04;

/// Why a competitor did not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retirement {
    Failure(Component),
    /// What-if retirement from the event descriptor.
    Forced,
    Collision,
}

/// Consequence of an incident between two adjacent finishers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentOutcome {
    Retirement,
    Damage,
    PositionLoss,
}

/// Trial log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RaceEvent {
    SafetyCar { chaos: f64 },
    Retirement { competitor: String, cause: Retirement },
    /// Engine failure penalty; recorded only, never carried across trials.
    EnginePenalty { competitor: String, places: u32 },
    Upset { competitor: String, gain: f64 },
    TeamOrder { promoted: String, demoted: String },
    Incident { ahead: String, behind: String, outcome: IncidentOutcome },
}

/// One competitor's line in a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    /// Index into [`RaceSetup::profiles`] (roster order).
    pub profile: usize,
    pub grid_position: u32,
    /// Race time in pace units (lower is better).
    pub time: f64,
    pub retirement: Option<Retirement>,
}

impl RunEntry {
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retirement.is_some()
    }
}

/// Outcome of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub weather: Weather,
    pub grid: Vec<GridEntry>,
    pub safety_car: bool,
    /// Final classification, winner first, retirements last.
    pub order: Vec<RunEntry>,
    pub log: Vec<RaceEvent>,
}

impl SimulationRun {
    /// Profile index of the winner.
    #[must_use]
    pub fn winner(&self) -> Option<usize> {
        self.order.first().map(|e| e.profile)
    }

    /// Profile index of the pole sitter.
    #[must_use]
    pub fn pole_profile(&self) -> Option<usize> {
        self.order
            .iter()
            .find(|e| e.grid_position == 1)
            .map(|e| e.profile)
    }
}

/// Per-competitor snapshot read by every trial of a run.
#[derive(Debug, Clone)]
pub struct CompetitorProfile<'a> {
    pub competitor: &'a Competitor,
    pub team: &'a Team,
    /// Recalibrated skill (0-100).
    pub skill: f64,
    pub team_rating: f64,
    /// Momentum, weekend form and rookie discount combined.
    pub form: f64,
    pub confidence: f64,
    pub rating_norm: f64,
    pub track_history: f64,
    pub rookie: bool,
    /// Queued grid penalty (places).
    pub penalty: u32,
    /// Championship points before this event.
    pub points: f64,
    pub pressure: PressureModifiers,
    pub wear: WearState,
    pub team_reliability: f64,
    pub observed_pits: Option<PitSamples>,
    pub live_tyre: Option<LiveTyre>,
}

impl CompetitorProfile<'_> {
    /// Personality with title pressure applied.
    #[must_use]
    pub fn active_personality(&self) -> Personality {
        let base = self.competitor.personality;
        let p = self.pressure;
        Personality {
            aggression: base.aggression * p.risk,
            overtake_risk: base.overtake_risk * p.risk,
            defense: base.defense * p.defense,
            mistake_rate: base.mistake_rate * p.error,
            ..base
        }
    }
}

/// Immutable inputs of every trial of one event.
#[derive(Debug, Clone)]
pub struct RaceSetup<'a> {
    pub event: &'a EventDescriptor,
    /// One profile per rostered competitor, roster order.
    pub profiles: Vec<CompetitorProfile<'a>>,
    pub total_rounds: u32,
    pub confidence_score: f64,
    pub weights: PaceWeights,
    pub format: SessionFormat,
    pub eliminated_per_stage: usize,
    pub tire_model: Option<Arc<dyn TireModel>>,
    pub live: Option<LiveSession>,
    pub official_grid: Option<Vec<String>>,
}

impl<'a> RaceSetup<'a> {
    /// Snapshot rolling state, standings and capabilities for `event`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoster` if a competitor's team is missing.
    pub fn prepare(
        season: &'a Season,
        state: &EngineState,
        config: &EngineConfig,
        capabilities: &Capabilities,
        event: &'a EventDescriptor,
    ) -> SimResult<Self> {
        let seed = config.reproducibility.seed;
        let total_rounds = season.total_rounds();
        let standings = championship::standings_before(season, state.results(), event.round);
        let leader = standings.values().copied().fold(0.0, f64::max);
        let live = capabilities.live.as_ref().and_then(|p| p.session());

        let mut profiles = Vec::with_capacity(season.competitors().len());
        for c in season.competitors() {
            let team = season
                .team(&c.team)
                .ok_or_else(|| SimError::invalid_roster(format!("competitor '{}' has no team '{}'", c.id, c.team)))?;
            let form = state.form(&c.id).cloned().unwrap_or_default();
            let team_state = state
                .team_state(&team.id)
                .cloned()
                .unwrap_or_else(|| TeamState::new(team.base_rating));

            let momentum = form.multiplier();
            let rookie = form.is_rookie();
            let weekend = weekend_form(seed, &event.id, &c.id, momentum);
            let points = standings.get(&c.id).copied().unwrap_or(0.0);

            profiles.push(CompetitorProfile {
                competitor: c,
                team,
                skill: state.skill_of(c),
                team_rating: team_state.effective_rating() * team.development_factor() * team_state.development_trend(),
                form: momentum * weekend * if rookie { ROOKIE_FORM } else { 1.0 },
                confidence: form.confidence,
                rating_norm: state.ratings().normalized(&c.id),
                track_history: state.history().pace_modifier(&c.id, &event.id, event.track_type),
                rookie,
                penalty: state.queued_penalty(&c.id),
                points,
                pressure: championship::pressure(points, leader, event.round, total_rounds),
                wear: state.wear(&team.id).cloned().unwrap_or_default(),
                team_reliability: team_state.reliability(),
                observed_pits: capabilities.live.as_ref().and_then(|p| p.pit_samples(&team.id)),
                live_tyre: live.as_ref().map(|s| LiveTyre {
                    compound: s.compound_of(&c.id),
                    laps_on_tyre: s.laps_on_tyre_of(&c.id).unwrap_or(15),
                    track_temp: s.track_temp,
                }),
            });
        }

        Ok(Self {
            event,
            profiles,
            total_rounds,
            confidence_score: confidence_score(event, state.accuracy().races_scored()),
            weights: capabilities.learned_weights.unwrap_or(config.pace.weights),
            format: if event.is_sprint { SessionFormat::Sprint } else { SessionFormat::Standard },
            eliminated_per_stage: config.qualifying.eliminated_per_stage,
            tire_model: capabilities.tire_model.clone(),
            live,
            official_grid: capabilities.live.as_ref().and_then(|p| p.qualifying_grid()),
        })
    }

    /// Pace inputs of a profile.
    #[must_use]
    pub fn pace_context<'s>(&'s self, p: &'s CompetitorProfile<'a>) -> PaceContext<'s> {
        PaceContext {
            competitor: p.competitor,
            team: p.team,
            event: self.event,
            skill: p.skill,
            team_rating: p.team_rating,
            form: p.form,
            confidence: p.confidence,
            rating_norm: p.rating_norm,
            track_history: p.track_history,
            weights: self.weights,
            confidence_score: self.confidence_score,
            tire_model: self.tire_model.as_deref(),
            live: self.live.as_ref(),
        }
    }

    /// Profile index of a competitor id.
    #[must_use]
    pub fn index_of(&self, competitor: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.competitor.id == competitor)
    }

    /// Simulated (or official) starting grid.
    pub fn grid(&self, weather: Weather, rng: &mut SimRng) -> Vec<GridEntry> {
        let entrants: Vec<Entrant<'_>> = self
            .profiles
            .iter()
            .map(|p| Entrant {
                pace: self.pace_context(p),
                rookie: p.rookie,
                penalty: p.penalty,
            })
            .collect();
        let grid = qualifying::simulate(&entrants, self.format, self.eliminated_per_stage, weather, rng);
        match &self.official_grid {
            Some(official) => qualifying::apply_official_grid(official, grid),
            None => grid,
        }
    }

    fn track_grip(&self, weather: Weather, phase: f64) -> f64 {
        let mut rate = if self.event.is_street() { STREET_EVOLUTION } else { TRACK_EVOLUTION };
        if weather.is_wet() {
            rate *= WET_EVOLUTION;
        }
        let heat = if self.event.hot_climate { -HEAT_GRIP_LOSS * phase } else { 0.0 };
        1.0 + rate * phase + heat
    }

    fn strategy_inputs<'s>(&'s self, p: &'s CompetitorProfile<'a>, active: &Personality) -> StrategyInputs<'s> {
        StrategyInputs {
            crew: &p.team.pit_crew,
            observed: p.observed_pits,
            efficiency: p.team.strategy_efficiency,
            stops: self.event.strategy_stops,
            tire_deg: self.event.tire_deg,
            tire_smoothness: p.competitor.personality.tire_smoothness,
            overtake_risk: active.overtake_risk,
            live: p.live_tyre,
        }
    }

    /// Play one trial.
    pub fn simulate(&self, rng: &mut SimRng) -> SimulationRun {
        let event = self.event;
        let weather = Weather::draw(event.rain_probability, rng);
        let grid = self.grid(weather, rng);
        let mut log = Vec::new();

        let safety_car = rng.chance(event.sc_probability);
        let chaos = if safety_car { rng.range(0.05, 0.25) } else { 0.0 };
        if safety_car {
            log.push(RaceEvent::SafetyCar { chaos });
        }
        let late = rng.next() > LATE_RACE_DRAW;
        let mut upset_rate = 0.05 + event.rain_probability * 0.05 + event.sc_probability * 0.05;
        if weather == Weather::HeavyRain {
            upset_rate += 0.15;
        }
        let upset_race = rng.chance(upset_rate);

        let phase = if late { LATE_PHASE } else { EARLY_PHASE };
        let grip = self.track_grip(weather, phase);
        let mistake_phase = 1.0 + (1.0 - phase) * 0.15;
        let mut difficulty = event.overtaking.difficulty();
        if phase > 0.7 {
            difficulty *= 0.9;
        }

        let mut order: Vec<RunEntry> = Vec::with_capacity(grid.len());
        for g in &grid {
            let Some(idx) = self.index_of(&g.competitor) else {
                continue;
            };
            let p = &self.profiles[idx];
            let id = &p.competitor.id;
            let active = p.active_personality();

            let retirement = if event.is_forced_retirement(id) {
                Some(Retirement::Forced)
            } else {
                let failure = FailureInputs {
                    rates: &p.team.component_rates,
                    wear: &p.wear,
                    weather: weather.params(),
                    team_reliability: p.team_reliability,
                    historical_reliability: p.team.reliability_factor(),
                    rookie: p.rookie,
                    aggression: active.aggression,
                    mistake_rate: active.mistake_rate * mistake_phase / p.confidence,
                };
                failure.roll(rng).map(|component| {
                    if component == Component::Engine {
                        log.push(RaceEvent::EnginePenalty {
                            competitor: id.clone(),
                            places: draw_grid_penalty(rng),
                        });
                    }
                    Retirement::Failure(component)
                })
            };
            if let Some(cause) = retirement {
                log.push(RaceEvent::Retirement {
                    competitor: id.clone(),
                    cause,
                });
                order.push(RunEntry {
                    profile: idx,
                    grid_position: g.position,
                    time: DNF_TIME + rng.next(),
                    retirement: Some(cause),
                });
                continue;
            }

            let pos = f64::from(g.position);
            let mut pace = self.pace_context(p).pace(PaceMode::Race { late }, weather, rng) * grip;
            if weather == Weather::HeavyRain && p.competitor.traits.wet >= ELITE_WET_TRAIT {
                pace += ELITE_WET_GAIN;
            }
            let dirty_air = pos.powf(1.1) * DIRTY_AIR * difficulty;
            let grid_decay = (pos - 1.0) * GRID_DECAY * difficulty / active.overtake_risk;
            let bunching = if safety_car { -(pos / 20.0) * chaos } else { 0.0 };
            let upset = if upset_race && rng.chance(UPSET_SHARE) {
                let gain = rng.range(0.05, 0.25);
                log.push(RaceEvent::Upset {
                    competitor: id.clone(),
                    gain,
                });
                gain
            } else {
                0.0
            };
            let strategy = strategy_delta(&self.strategy_inputs(p, &active), rng) / STRATEGY_SCALE;

            order.push(RunEntry {
                profile: idx,
                grid_position: g.position,
                time: (2.0 - (pace - dirty_air).max(0.1)) + grid_decay + bunching + strategy - upset,
                retirement: None,
            });
        }
        sort_by_time(&mut order);

        if safety_car {
            for entry in order.iter_mut().filter(|e| !e.is_retired()) {
                let restart = self.profiles[entry.profile].competitor.personality.restart_skill;
                entry.time -= rng.normal(0.0, (restart - 1.0) * 0.4);
            }
            sort_by_time(&mut order);
        }

        self.apply_team_orders(&mut order, &mut log, rng);
        self.resolve_incidents(&mut order, &mut log, weather, rng);

        SimulationRun {
            weather,
            grid,
            safety_car,
            order,
            log,
        }
    }

    /// Swap adjacent teammates when the one behind leads the other by
    /// more than 25 points in the second half of the season.
    fn apply_team_orders(&self, order: &mut [RunEntry], log: &mut Vec<RaceEvent>, rng: &mut SimRng) {
        if f64::from(self.event.round) <= f64::from(self.total_rounds) * 0.5 {
            return;
        }
        for j in 0..order.len().saturating_sub(1) {
            if order[j].is_retired() || order[j + 1].is_retired() {
                continue;
            }
            let ahead = &self.profiles[order[j].profile];
            let behind = &self.profiles[order[j + 1].profile];
            if ahead.team.id != behind.team.id || behind.points <= ahead.points + TEAM_ORDER_GAP {
                continue;
            }
            if rng.chance(TEAM_ORDER_CHANCE) {
                let t = order[j].time;
                order[j].time = order[j + 1].time;
                order[j + 1].time = t;
                log.push(RaceEvent::TeamOrder {
                    promoted: behind.competitor.id.clone(),
                    demoted: ahead.competitor.id.clone(),
                });
            }
        }
        sort_by_time(order);
    }

    fn resolve_incidents(&self, order: &mut [RunEntry], log: &mut Vec<RaceEvent>, weather: Weather, rng: &mut SimRng) {
        for k in 0..order.len().saturating_sub(1) {
            let (t1, t2) = (order[k].time, order[k + 1].time);
            if t1 >= CLASSIFIED_LIMIT || t2 >= CLASSIFIED_LIMIT || (t2 - t1).abs() >= INCIDENT_GAP {
                continue;
            }
            let first = &self.profiles[order[k].profile];
            let second = &self.profiles[order[k + 1].profile];
            let a1 = first.competitor.personality.aggression;
            let a2 = second.competitor.personality.aggression;

            let mut chance = 0.005 + ((a1 - 1.0) + (a2 - 1.0)) * 0.04;
            if first.team.id == second.team.id {
                chance *= 0.4;
            }
            if weather.is_wet() {
                chance *= 1.6;
            }
            if !rng.chance(chance.min(MAX_INCIDENT_CHANCE)) {
                continue;
            }

            let severity = rng.next();
            let outcome = if severity < 0.3 {
                let victim = if a2 > a1 { k + 1 } else { k };
                order[victim].time = DNF_TIME + rng.next();
                order[victim].retirement = Some(Retirement::Collision);
                log.push(RaceEvent::Retirement {
                    competitor: self.profiles[order[victim].profile].competitor.id.clone(),
                    cause: Retirement::Collision,
                });
                IncidentOutcome::Retirement
            } else if severity < 0.6 {
                order[k + 1].time += rng.range(0.05, 0.15);
                IncidentOutcome::Damage
            } else {
                order[k + 1].time += rng.range(0.01, 0.04);
                IncidentOutcome::PositionLoss
            };
            log.push(RaceEvent::Incident {
                ahead: first.competitor.id.clone(),
                behind: second.competitor.id.clone(),
                outcome,
            });
        }
        sort_by_time(order);
    }
}

fn sort_by_time(order: &mut [RunEntry]) {
    order.sort_by(|a, b| a.time.total_cmp(&b.time));
}
