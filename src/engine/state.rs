//! Rolling engine state.
//!
//! Everything that changes between events lives here: ratings, team and
//! driver form, component wear, queued penalties, track history, accuracy
//! records and the confirmed results themselves. Monte Carlo trials only
//! read a snapshot of it; the single mutation path is
//! [`EngineState::ingest`], which is idempotent per confirmed result.
//!
//! The whole struct round-trips through JSON so an external persistence
//! layer can store it as an opaque blob.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domains::accuracy::{AccuracyTracker, PredictionSnapshot};
use crate::domains::form::{FormState, TeamState};
use crate::domains::history::TrackHistory;
use crate::domains::rating::RatingSystem;
use crate::domains::reliability::{draw_grid_penalty, WearState};
use crate::engine::rng::SimRng;
use crate::error::{SimError, SimResult};
use crate::model::{Competitor, ConfirmedResult, Season};

/// Position assumed for a team's competitor missing from a result.
const MISSING_POSITION: f64 = 20.0;
/// Form position recorded for a retirement.
const RETIRED_POSITION: u32 = 20;
const SKILL_STEP: f64 = 0.3;
const MAX_SKILL_STEP: f64 = 2.0;
const MIN_SKILL: f64 = 60.0;
const MAX_SKILL: f64 = 99.0;

/// What an ingestion did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Ingestion {
    Applied {
        /// A stored prediction was scored.
        scored: bool,
        /// Teams that took a new power unit.
        replacements: Vec<String>,
    },
    /// The same result was already ingested; nothing changed.
    Duplicate,
}

/// Rolling state of one season.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    ratings: RatingSystem,
    teams: BTreeMap<String, TeamState>,
    form: BTreeMap<String, FormState>,
    /// Component wear per team.
    wear: BTreeMap<String, WearState>,
    /// Grid places queued per competitor for the next event.
    penalties: BTreeMap<String, u32>,
    /// Recalibrated skill per competitor.
    adjusted_skill: BTreeMap<String, f64>,
    history: TrackHistory,
    accuracy: AccuracyTracker,
    predictions: BTreeMap<String, PredictionSnapshot>,
    /// Confirmed results by round.
    results: BTreeMap<u32, ConfirmedResult>,
    /// Fingerprints of ingested results.
    ingested: BTreeSet<String>,
}

impl EngineState {
    /// Fresh state: base ratings, neutral form, new components.
    #[must_use]
    pub fn for_season(season: &Season) -> Self {
        let mut state = Self::default();
        for c in season.competitors() {
            state.ratings.initialize(&c.id, c.base_skill);
            state.form.insert(c.id.clone(), FormState::default());
        }
        for t in season.teams() {
            state.teams.insert(t.id.clone(), TeamState::new(t.base_rating));
            state.wear.insert(t.id.clone(), WearState::default());
        }
        state
    }

    #[must_use]
    pub const fn ratings(&self) -> &RatingSystem {
        &self.ratings
    }

    #[must_use]
    pub fn team_state(&self, team: &str) -> Option<&TeamState> {
        self.teams.get(team)
    }

    #[must_use]
    pub fn form(&self, competitor: &str) -> Option<&FormState> {
        self.form.get(competitor)
    }

    #[must_use]
    pub fn wear(&self, team: &str) -> Option<&WearState> {
        self.wear.get(team)
    }

    /// Grid places the competitor serves at the next event.
    #[must_use]
    pub fn queued_penalty(&self, competitor: &str) -> u32 {
        self.penalties.get(competitor).copied().unwrap_or(0)
    }

    /// Skill after recalibration, or the base skill.
    #[must_use]
    pub fn skill_of(&self, competitor: &Competitor) -> f64 {
        self.adjusted_skill
            .get(&competitor.id)
            .copied()
            .unwrap_or(competitor.base_skill)
    }

    #[must_use]
    pub const fn history(&self) -> &TrackHistory {
        &self.history
    }

    #[must_use]
    pub const fn accuracy(&self) -> &AccuracyTracker {
        &self.accuracy
    }

    /// Confirmed results by round.
    #[must_use]
    pub const fn results(&self) -> &BTreeMap<u32, ConfirmedResult> {
        &self.results
    }

    /// Keep the pre-race prediction of an event for later scoring.
    pub fn record_prediction(&mut self, snapshot: PredictionSnapshot) {
        self.predictions.insert(snapshot.event_id.clone(), snapshot);
    }

    #[must_use]
    pub fn prediction(&self, event_id: &str) -> Option<&PredictionSnapshot> {
        self.predictions.get(event_id)
    }

    /// Fit a new power unit to a team now, queueing grid penalties for its
    /// competitors. Returns the number of competitors penalised.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoster` for an unknown team.
    pub fn replace_power_unit(&mut self, season: &Season, team: &str, rng: &mut SimRng) -> SimResult<usize> {
        if season.team(team).is_none() {
            return Err(SimError::invalid_roster(format!("unknown team '{team}'")));
        }
        let wear = self.wear.entry(team.to_string()).or_default();
        wear.engine = 5.0 + rng.range(0.0, 10.0);
        wear.replacements += 1;

        let mut penalised = 0;
        for c in season.competitors_of(team) {
            self.penalties.insert(c.id.clone(), draw_grid_penalty(rng));
            penalised += 1;
        }
        Ok(penalised)
    }

    /// Fold a confirmed result into the rolling state.
    ///
    /// Replaying a result already ingested is a no-op. All randomness is
    /// seeded from (`master_seed`, event, purpose), so ingestion is
    /// deterministic.
    ///
    /// # Errors
    ///
    /// - `UnknownEvent` if the event is not on the calendar
    /// - `UnknownCompetitor` for ids not on the roster
    /// - `InvalidEvent` for duplicate ids or a conflicting result for a
    ///   round that already has one
    pub fn ingest(&mut self, season: &Season, master_seed: u64, result: &ConfirmedResult) -> SimResult<Ingestion> {
        let event = season.event(&result.event_id)?;
        let context = format!("result for '{}'", event.id);
        let mut seen = BTreeSet::new();
        for id in &result.positions {
            if season.competitor(id).is_none() {
                return Err(SimError::unknown_competitor(id, &context));
            }
            if !seen.insert(id.as_str()) {
                return Err(SimError::invalid_event(&event.id, format!("'{id}' classified twice")));
            }
        }
        if let Some(id) = result.retired.iter().find(|id| season.competitor(id).is_none()) {
            return Err(SimError::unknown_competitor(id, &context));
        }

        let fingerprint = result.fingerprint();
        if self.ingested.contains(&fingerprint) {
            warn!(event = %event.id, "confirmed result already ingested");
            return Ok(Ingestion::Duplicate);
        }
        if self.results.contains_key(&event.round) {
            return Err(SimError::invalid_event(
                &event.id,
                "a different result is already recorded for this round",
            ));
        }

        let expected_ranks = self.expected_ranks(season, result);

        let scored = match self.predictions.get(&event.id) {
            Some(prediction) => self.accuracy.score(prediction, result).is_some(),
            None => false,
        };

        for (i, id) in result.positions.iter().enumerate() {
            let retired = result.is_retired(id);
            let position = if retired { RETIRED_POSITION } else { i as u32 + 1 };
            let form = self.form.entry(id.clone()).or_default();
            form.push(position);
            form.update_confidence(position, retired);
        }

        for team in season.teams() {
            let finishes: Vec<f64> = season
                .competitors_of(&team.id)
                .map(|c| result.position_of(&c.id).map_or(MISSING_POSITION, |p| p as f64))
                .collect();
            if finishes.is_empty() {
                continue;
            }
            let avg = finishes.iter().sum::<f64>() / finishes.len() as f64;
            let mut rng = SimRng::for_purpose(master_seed, &event.id, &format!("development/{}", team.id));
            self.teams
                .entry(team.id.clone())
                .or_insert_with(|| TeamState::new(team.base_rating))
                .apply_result(&event.id, avg, &mut rng);
        }

        // penalties queued before this event were served at it
        self.penalties.clear();
        let total_rounds = season.total_rounds();
        let mut replacements = Vec::new();
        for team in season.teams() {
            let mut rng = SimRng::for_purpose(master_seed, &event.id, &format!("wear/{}", team.id));
            let wear = self.wear.entry(team.id.clone()).or_default();
            wear.advance(event, team.tier, &mut rng);
            if wear.check_replacement(event.round, total_rounds, team.tier, &mut rng) {
                for c in season.competitors_of(&team.id) {
                    self.penalties.insert(c.id.clone(), draw_grid_penalty(&mut rng));
                }
                replacements.push(team.id.clone());
            }
        }

        self.ratings.update(&event.id, &result.positions);

        let field = result.positions.len() as f64;
        for (i, id) in result.positions.iter().enumerate() {
            let expected = self
                .predictions
                .get(&event.id)
                .and_then(|p| p.order.iter().position(|c| c == id))
                .map_or((field + 1.0) / 2.0, |rank| rank as f64 + 1.0);
            self.history
                .record(id, &event.id, event.track_type, i as u32 + 1, expected);
        }

        for (i, id) in result.positions.iter().enumerate() {
            let Some(competitor) = season.competitor(id) else {
                continue;
            };
            let Some(&expected) = expected_ranks.get(id.as_str()) else {
                continue;
            };
            let actual = (i + 1) as f64;
            let step = ((expected - actual) * SKILL_STEP).clamp(-MAX_SKILL_STEP, MAX_SKILL_STEP);
            let skill = (self.skill_of(competitor) + step).clamp(MIN_SKILL, MAX_SKILL);
            self.adjusted_skill.insert(id.clone(), skill);
        }

        self.results.insert(event.round, result.clone());
        self.ingested.insert(fingerprint);
        info!(
            event = %event.id,
            classified = result.positions.len(),
            scored,
            replacements = replacements.len(),
            "confirmed result ingested"
        );
        Ok(Ingestion::Applied { scored, replacements })
    }

    /// Rank each classified competitor would have by skill and car alone.
    fn expected_ranks<'r>(&self, season: &Season, result: &'r ConfirmedResult) -> BTreeMap<&'r str, f64> {
        let mut scored: Vec<(&str, f64)> = result
            .positions
            .iter()
            .filter_map(|id| {
                let c = season.competitor(id)?;
                let car = self
                    .teams
                    .get(&c.team)
                    .map_or_else(|| season.team(&c.team).map_or(50.0, |t| t.base_rating), TeamState::effective_rating);
                Some((id.as_str(), self.skill_of(c) / 100.0 * 0.4 + car / 100.0 * 0.6))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .enumerate()
            .map(|(rank, (id, _))| (id, (rank + 1) as f64))
            .collect()
    }

    /// Serialize for the persistence layer.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore from [`EngineState::to_json`] output.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed input.
    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::season::fixtures::small_season;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    fn full_order() -> Vec<String> {
        ids(&[
            "bravo_1", "alpha_1", "alpha_2", "charlie_1", "bravo_2", "charlie_2", "delta_1", "delta_2",
        ])
    }

    #[test]
    fn test_fresh_state() {
        let season = small_season();
        let state = EngineState::for_season(&season);
        assert!(state.ratings().rating("alpha_1").is_some());
        assert!(state.form("delta_2").is_some_and(FormState::is_rookie));
        assert_eq!(state.queued_penalty("alpha_1"), 0);
        assert!(state.results().is_empty());
    }

    #[test]
    fn test_ingest_updates_state() {
        let season = small_season();
        let mut state = EngineState::for_season(&season);
        let before = state.ratings().rating("bravo_1");
        let outcome = state.ingest(&season, 42, &ConfirmedResult::new("r1", full_order()));
        assert!(matches!(outcome, Ok(Ingestion::Applied { .. })));
        assert_ne!(state.ratings().rating("bravo_1"), before);
        assert_eq!(state.form("bravo_1").map(|f| f.recent.clone()), Some(vec![1]));
        assert!(state.wear("alpha").is_some_and(|w| w.engine > 0.0));
        assert!(state.results().contains_key(&1));
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let season = small_season();
        let result = ConfirmedResult::new("r1", full_order());
        let mut once = EngineState::for_season(&season);
        assert!(once.ingest(&season, 7, &result).is_ok());

        let mut twice = once.clone();
        let replay = twice.ingest(&season, 7, &result);
        assert!(matches!(replay, Ok(Ingestion::Duplicate)));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_conflicting_result_rejected() {
        let season = small_season();
        let mut state = EngineState::for_season(&season);
        assert!(state.ingest(&season, 1, &ConfirmedResult::new("r1", full_order())).is_ok());
        let mut other = full_order();
        other.swap(0, 1);
        let outcome = state.ingest(&season, 1, &ConfirmedResult::new("r1", other));
        assert!(matches!(outcome, Err(SimError::InvalidEvent { .. })));
    }

    #[test]
    fn test_unknown_and_duplicate_ids_rejected() {
        let season = small_season();
        let mut state = EngineState::for_season(&season);
        let ghost = state.ingest(&season, 1, &ConfirmedResult::new("r1", ids(&["ghost"])));
        assert!(matches!(ghost, Err(SimError::UnknownCompetitor { .. })));
        let twice = state.ingest(&season, 1, &ConfirmedResult::new("r1", ids(&["alpha_1", "alpha_1"])));
        assert!(matches!(twice, Err(SimError::InvalidEvent { .. })));
        let nowhere = state.ingest(&season, 1, &ConfirmedResult::new("r9", full_order()));
        assert!(matches!(nowhere, Err(SimError::UnknownEvent(_))));
        assert_eq!(state, EngineState::for_season(&season));
    }

    #[test]
    fn test_retirement_hurts_confidence() {
        let season = small_season();
        let mut state = EngineState::for_season(&season);
        let result = ConfirmedResult::new("r1", full_order()).with_retired(ids(&["delta_2"]));
        assert!(state.ingest(&season, 3, &result).is_ok());
        assert!(state.form("delta_2").is_some_and(|f| f.confidence < 1.0));
        assert_eq!(state.form("delta_2").map(|f| f.recent.clone()), Some(vec![20]));
    }

    #[test]
    fn test_skill_recalibration_bounded() {
        let season = small_season();
        let mut state = EngineState::for_season(&season);
        // slowest car wins: largest possible upward step
        let mut order = full_order();
        order.reverse();
        assert!(state.ingest(&season, 3, &ConfirmedResult::new("r1", order)).is_ok());
        let delta_2 = season.competitor("delta_2");
        assert!(delta_2.is_some_and(|c| (state.skill_of(c) - (c.base_skill + 2.0)).abs() < 1e-9));
        let alpha_1 = season.competitor("alpha_1");
        assert!(alpha_1.is_some_and(|c| state.skill_of(c) < c.base_skill));
    }

    #[test]
    fn test_power_unit_replacement_queues_penalties() {
        let season = small_season();
        let mut state = EngineState::for_season(&season);
        let mut rng = SimRng::new(4);
        assert_eq!(state.replace_power_unit(&season, "charlie", &mut rng).ok(), Some(2));
        assert!((5..=10).contains(&state.queued_penalty("charlie_1")));
        assert!(state.wear("charlie").is_some_and(|w| w.replacements == 1));
        assert!(state.replace_power_unit(&season, "ghost", &mut rng).is_err());

        // served and cleared at the next confirmed event
        assert!(state.ingest(&season, 4, &ConfirmedResult::new("r1", full_order())).is_ok());
        assert_eq!(state.queued_penalty("charlie_1"), 0);
    }

    #[test]
    fn test_prediction_is_scored() {
        let season = small_season();
        let mut state = EngineState::for_season(&season);
        state.record_prediction(PredictionSnapshot {
            event_id: "r1".to_string(),
            order: full_order(),
            win_probability: full_order().into_iter().map(|id| (id, 0.125)).collect(),
            expected_finish: BTreeMap::new(),
        });
        let outcome = state.ingest(&season, 5, &ConfirmedResult::new("r1", full_order()));
        assert!(matches!(outcome, Ok(Ingestion::Applied { scored: true, .. })));
        assert_eq!(state.accuracy().races_scored(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let season = small_season();
        let mut state = EngineState::for_season(&season);
        assert!(state.ingest(&season, 9, &ConfirmedResult::new("r2", full_order())).is_ok());
        let json = state.to_json();
        assert!(json.is_ok());
        let restored = json.and_then(|j| EngineState::from_json(&j));
        assert_eq!(restored.ok(), Some(state));
    }
}
