//! Points, standings, title pressure and season projection.
//!
//! Standings are summed from confirmed results only. The projection runs
//! the synchronous Monte Carlo variant for every event without a confirmed
//! result and accumulates expected points from the position table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EngineConfig;
use crate::domains::monte_carlo::MonteCarloEngine;
use crate::engine::capabilities::Capabilities;
use crate::engine::state::EngineState;
use crate::error::SimResult;
use crate::model::{ConfirmedResult, EventDescriptor, Season, TeamTier};

/// Grand prix points, P1 first.
pub const RACE_POINTS: [u32; 10] = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1];
/// Sprint points, P1 first.
pub const SPRINT_POINTS: [u32; 8] = [8, 7, 6, 5, 4, 3, 2, 1];

/// Share of the season after which title pressure applies.
const PRESSURE_PHASE: f64 = 0.4;
const CONTENDER_GAP: f64 = 25.0;
const CONTENDER_RACES_LEFT: u32 = 6;
const CHASER_GAP: f64 = 50.0;

/// Points for a 1-based finishing position.
#[must_use]
pub fn points_for(position: usize, sprint: bool) -> u32 {
    let table: &[u32] = if sprint { &SPRINT_POINTS } else { &RACE_POINTS };
    position.checked_sub(1).and_then(|i| table.get(i)).copied().unwrap_or(0)
}

/// Whether an event's result is scored with the sprint table.
#[must_use]
pub fn uses_sprint_points(event: &EventDescriptor, result: Option<&ConfirmedResult>) -> bool {
    event.is_sprint || result.is_some_and(|r| r.sprint)
}

/// Driver points from confirmed results of rounds before `round`.
#[must_use]
pub fn standings_before(season: &Season, results: &BTreeMap<u32, ConfirmedResult>, round: u32) -> BTreeMap<String, f64> {
    let mut points: BTreeMap<String, f64> = season.competitors().iter().map(|c| (c.id.clone(), 0.0)).collect();
    for (_, result) in results.range(..round) {
        let sprint = season
            .event(&result.event_id)
            .map_or(result.sprint, |e| uses_sprint_points(e, Some(result)));
        for (i, id) in result.positions.iter().enumerate() {
            if let Some(p) = points.get_mut(id) {
                *p += f64::from(points_for(i + 1, sprint));
            }
        }
    }
    points
}

/// Personality multipliers from the title fight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureModifiers {
    /// Applied to aggression and overtake risk.
    pub risk: f64,
    pub defense: f64,
    /// Applied to the mistake rate.
    pub error: f64,
}

impl PressureModifiers {
    pub const NEUTRAL: Self = Self {
        risk: 1.0,
        defense: 1.0,
        error: 1.0,
    };
}

impl Default for PressureModifiers {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Pressure on a competitor with `points` when the leader has `leader_points`.
#[must_use]
pub fn pressure(points: f64, leader_points: f64, round: u32, total_rounds: u32) -> PressureModifiers {
    if f64::from(round) <= f64::from(total_rounds) * PRESSURE_PHASE {
        return PressureModifiers::NEUTRAL;
    }
    let gap = leader_points - points;
    let races_left = (total_rounds + 1).saturating_sub(round);

    if gap <= 0.0 {
        PressureModifiers {
            risk: 0.95,
            defense: 1.1,
            error: 0.95,
        }
    } else if gap <= CONTENDER_GAP && races_left < CONTENDER_RACES_LEFT {
        PressureModifiers {
            risk: 1.15,
            defense: 1.05,
            error: 1.12,
        }
    } else if gap > CHASER_GAP {
        PressureModifiers {
            risk: 1.2,
            defense: 0.9,
            error: 1.05,
        }
    } else {
        PressureModifiers::NEUTRAL
    }
}

/// Projected season of one competitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProjection {
    pub competitor: String,
    pub team: String,
    /// Confirmed points.
    pub confirmed_points: f64,
    /// Confirmed plus expected points.
    pub projected_points: f64,
    pub expected_wins: f64,
    pub expected_podiums: f64,
}

/// Projected season of one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProjection {
    pub team: String,
    pub tier: TeamTier,
    pub projected_points: f64,
    pub expected_podiums: f64,
}

/// Championship projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonProjection {
    /// Drivers by projected points, highest first.
    pub drivers: Vec<DriverProjection>,
    /// Teams by projected points, highest first.
    pub teams: Vec<TeamProjection>,
    /// Events simulated (calendar minus confirmed rounds).
    pub events_simulated: usize,
}

impl SeasonProjection {
    /// Projected points gap between the top two drivers.
    #[must_use]
    pub fn title_gap(&self) -> f64 {
        match self.drivers.as_slice() {
            [first, second, ..] => first.projected_points - second.projected_points,
            _ => 0.0,
        }
    }

    /// Expected podiums of all midfield teams together.
    #[must_use]
    pub fn midfield_podiums(&self) -> f64 {
        self.teams
            .iter()
            .filter(|t| t.tier == TeamTier::Midfield)
            .map(|t| t.expected_podiums)
            .sum()
    }
}

/// Project the championship over the whole calendar.
///
/// Confirmed rounds contribute their real points; every other event runs
/// the synchronous Monte Carlo variant on the calling thread.
pub fn project_season(
    season: &Season,
    state: &EngineState,
    config: &EngineConfig,
    capabilities: &Capabilities,
) -> SimResult<SeasonProjection> {
    let engine = MonteCarloEngine::new(season, state, config, capabilities);
    let mut rows: Vec<DriverProjection> = season
        .competitors()
        .iter()
        .map(|c| DriverProjection {
            competitor: c.id.clone(),
            team: c.team.clone(),
            confirmed_points: 0.0,
            projected_points: 0.0,
            expected_wins: 0.0,
            expected_podiums: 0.0,
        })
        .collect();

    let mut events_simulated = 0;
    for event in season.calendar() {
        if let Some(result) = state.results().get(&event.round) {
            let sprint = uses_sprint_points(event, Some(result));
            for (i, id) in result.positions.iter().enumerate() {
                if let Some(row) = season.competitor_index(id).and_then(|idx| rows.get_mut(idx)) {
                    let pts = f64::from(points_for(i + 1, sprint));
                    row.confirmed_points += pts;
                    row.projected_points += pts;
                    if i == 0 {
                        row.expected_wins += 1.0;
                    }
                    if i < 3 {
                        row.expected_podiums += 1.0;
                    }
                }
            }
            continue;
        }

        let aggregate = engine.run_sync_event(event)?;
        events_simulated += 1;
        for outcome in &aggregate.outcomes {
            let Some(row) = season.competitor_index(&outcome.competitor).and_then(|idx| rows.get_mut(idx)) else {
                continue;
            };
            row.projected_points += outcome
                .positions
                .iter()
                .enumerate()
                .map(|(i, p)| p * f64::from(points_for(i + 1, event.is_sprint)))
                .sum::<f64>();
            row.expected_wins += outcome.win_probability;
            row.expected_podiums += outcome.podium_probability;
        }
    }

    let mut teams: Vec<TeamProjection> = season
        .teams()
        .iter()
        .map(|t| {
            let members = rows.iter().filter(|r| r.team == t.id);
            let (points, podiums) = members.fold((0.0, 0.0), |(p, q), r| (p + r.projected_points, q + r.expected_podiums));
            TeamProjection {
                team: t.id.clone(),
                tier: t.tier,
                projected_points: points,
                expected_podiums: podiums,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.projected_points.total_cmp(&a.projected_points));
    teams.sort_by(|a, b| b.projected_points.total_cmp(&a.projected_points));

    let projection = SeasonProjection {
        drivers: rows,
        teams,
        events_simulated,
    };
    info!(
        events = projection.events_simulated,
        leader = projection.drivers.first().map_or("", |d| d.competitor.as_str()),
        gap = projection.title_gap(),
        "season projected"
    );
    Ok(projection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::season::fixtures::small_season;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_points_tables() {
        assert_eq!(points_for(1, false), 25);
        assert_eq!(points_for(10, false), 1);
        assert_eq!(points_for(11, false), 0);
        assert_eq!(points_for(1, true), 8);
        assert_eq!(points_for(9, true), 0);
        assert_eq!(points_for(0, false), 0);
    }

    #[test]
    fn test_standings_only_count_earlier_rounds() {
        let season = small_season();
        let mut results = BTreeMap::new();
        results.insert(1, ConfirmedResult::new("r1", ids(&["alpha_2", "alpha_1", "bravo_1"])));
        results.insert(2, ConfirmedResult::new("r2", ids(&["alpha_1", "alpha_2", "bravo_1"])));

        let before_two = standings_before(&season, &results, 2);
        assert!((before_two["alpha_2"] - 25.0).abs() < f64::EPSILON);
        assert!((before_two["alpha_1"] - 18.0).abs() < f64::EPSILON);
        assert!((before_two["delta_1"]).abs() < f64::EPSILON);

        let before_three = standings_before(&season, &results, 3);
        assert!((before_three["alpha_1"] - 43.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_pressure_early() {
        assert_eq!(pressure(0.0, 100.0, 2, 24), PressureModifiers::NEUTRAL);
    }

    #[test]
    fn test_pressure_profiles() {
        let leader = pressure(200.0, 200.0, 15, 24);
        assert!((leader.defense - 1.1).abs() < f64::EPSILON);

        let contender = pressure(180.0, 200.0, 20, 24);
        assert!((contender.error - 1.12).abs() < f64::EPSILON);

        // within 25 but too many races left
        assert_eq!(pressure(180.0, 200.0, 12, 24), PressureModifiers::NEUTRAL);

        let chaser = pressure(100.0, 200.0, 12, 24);
        assert!((chaser.risk - 1.2).abs() < f64::EPSILON);
        assert!((chaser.defense - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_projection_sums_team_points() {
        let season = small_season();
        let state = EngineState::for_season(&season);
        let config = EngineConfig::builder().seed(3).sync_trials(40).build();
        let projection = project_season(&season, &state, &config, &Capabilities::none());
        assert!(projection.is_ok());
        if let Ok(p) = projection {
            assert_eq!(p.events_simulated, 3);
            assert_eq!(p.drivers.len(), 8);
            let driver_total: f64 = p.drivers.iter().map(|d| d.projected_points).sum();
            let team_total: f64 = p.teams.iter().map(|t| t.projected_points).sum();
            assert!((driver_total - team_total).abs() < 1e-6);
            assert!(driver_total > 0.0);
            let wins: f64 = p.drivers.iter().map(|d| d.expected_wins).sum();
            assert!((wins - 3.0).abs() < 1e-6);
            assert!(p.title_gap() >= 0.0);
        }
    }
}
