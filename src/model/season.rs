//! Season data: roster, teams and calendar, validated as a unit.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Competitor, EventDescriptor, Team};
use crate::error::{SimError, SimResult};

/// Raw season document as loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SeasonData {
    /// Season label.
    #[serde(default)]
    pub name: String,
    /// Constructors.
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub teams: Vec<Team>,
    /// Driver roster.
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub competitors: Vec<Competitor>,
    /// Calendar.
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub events: Vec<EventDescriptor>,
}

/// A validated season with id lookups.
#[derive(Debug, Clone)]
pub struct Season {
    data: SeasonData,
    competitor_index: BTreeMap<String, usize>,
    team_index: BTreeMap<String, usize>,
    event_index: BTreeMap<String, usize>,
}

impl Season {
    /// Load a season from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a season from YAML.
    ///
    /// # Errors
    ///
    /// Returns error if parsing, schema validation or cross-reference
    /// validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let data: SeasonData = serde_yaml::from_str(yaml)?;
        Self::new(data)
    }

    /// Validate season data and build lookups.
    ///
    /// # Errors
    ///
    /// Rejects duplicate ids, dangling team or competitor references and
    /// duplicate rounds.
    pub fn new(data: SeasonData) -> SimResult<Self> {
        data.validate()?;

        let team_index = unique_index(data.teams.iter().map(|t| t.id.as_str()))
            .map_err(|id| SimError::invalid_roster(format!("duplicate team id '{id}'")))?;
        let competitor_index = unique_index(data.competitors.iter().map(|c| c.id.as_str()))
            .map_err(|id| SimError::invalid_roster(format!("duplicate competitor id '{id}'")))?;
        let event_index = unique_index(data.events.iter().map(|e| e.id.as_str()))
            .map_err(|id| SimError::invalid_event(id, "duplicate event id"))?;

        for c in &data.competitors {
            if !team_index.contains_key(&c.team) {
                return Err(SimError::invalid_roster(format!(
                    "competitor '{}' references unknown team '{}'",
                    c.id, c.team
                )));
            }
            if let Some(e) = c.dominant_events.iter().find(|e| !event_index.contains_key(*e)) {
                return Err(SimError::invalid_roster(format!(
                    "competitor '{}' lists unknown dominant event '{e}'",
                    c.id
                )));
            }
        }

        let mut rounds = BTreeSet::new();
        for e in &data.events {
            if !rounds.insert(e.round) {
                return Err(SimError::invalid_event(&e.id, format!("duplicate round {}", e.round)));
            }
            if let Some(t) = e.team_mult.keys().find(|t| !team_index.contains_key(*t)) {
                return Err(SimError::invalid_event(&e.id, format!("team_mult names unknown team '{t}'")));
            }
            let referenced = e
                .driver_specials
                .keys()
                .chain(e.pace_overrides.keys())
                .chain(e.forced_retirements.iter());
            for c in referenced {
                if !competitor_index.contains_key(c) {
                    return Err(SimError::unknown_competitor(c, format!("event '{}'", e.id)));
                }
            }
        }

        Ok(Self {
            data,
            competitor_index,
            team_index,
            event_index,
        })
    }

    /// Underlying season document.
    #[must_use]
    pub const fn data(&self) -> &SeasonData {
        &self.data
    }

    /// All competitors in roster order.
    #[must_use]
    pub fn competitors(&self) -> &[Competitor] {
        &self.data.competitors
    }

    /// All teams.
    #[must_use]
    pub fn teams(&self) -> &[Team] {
        &self.data.teams
    }

    /// Calendar in document order.
    #[must_use]
    pub fn events(&self) -> &[EventDescriptor] {
        &self.data.events
    }

    /// Calendar sorted by round.
    #[must_use]
    pub fn calendar(&self) -> Vec<&EventDescriptor> {
        let mut events: Vec<&EventDescriptor> = self.data.events.iter().collect();
        events.sort_by_key(|e| e.round);
        events
    }

    /// Number of rounds in the season.
    #[must_use]
    pub fn total_rounds(&self) -> u32 {
        self.data.events.len() as u32
    }

    /// Competitor by id.
    #[must_use]
    pub fn competitor(&self, id: &str) -> Option<&Competitor> {
        self.competitor_index.get(id).map(|&i| &self.data.competitors[i])
    }

    /// Roster index of a competitor.
    #[must_use]
    pub fn competitor_index(&self, id: &str) -> Option<usize> {
        self.competitor_index.get(id).copied()
    }

    /// Team by id.
    #[must_use]
    pub fn team(&self, id: &str) -> Option<&Team> {
        self.team_index.get(id).map(|&i| &self.data.teams[i])
    }

    /// Competitors driving for a team.
    pub fn competitors_of<'a>(&'a self, team: &'a str) -> impl Iterator<Item = &'a Competitor> + 'a {
        self.data.competitors.iter().filter(move |c| c.team == team)
    }

    /// Event by id.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownEvent`] if the id is not on the calendar.
    pub fn event(&self, id: &str) -> SimResult<&EventDescriptor> {
        self.event_index
            .get(id)
            .map(|&i| &self.data.events[i])
            .ok_or_else(|| SimError::UnknownEvent(id.to_string()))
    }

    /// Event by round number.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownEvent`] if no event has that round.
    pub fn event_by_round(&self, round: u32) -> SimResult<&EventDescriptor> {
        self.data
            .events
            .iter()
            .find(|e| e.round == round)
            .ok_or_else(|| SimError::UnknownEvent(format!("round {round}")))
    }
}

fn unique_index<'a>(ids: impl Iterator<Item = &'a str>) -> Result<BTreeMap<String, usize>, String> {
    let mut index = BTreeMap::new();
    for (i, id) in ids.enumerate() {
        if index.insert(id.to_string(), i).is_some() {
            return Err(id.to_string());
        }
    }
    Ok(index)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) mod fixtures {
    use super::*;
    use crate::model::event::test_event;
    use crate::model::{Team, TeamTier};

    /// Four teams of two drivers and a three-round calendar.
    pub fn small_season() -> Season {
        let teams = vec![
            Team::new("alpha", 92.0, TeamTier::Elite),
            Team::new("bravo", 80.0, TeamTier::Elite),
            Team::new("charlie", 60.0, TeamTier::Midfield),
            Team::new("delta", 40.0, TeamTier::Lower),
        ];
        let mut competitors = Vec::new();
        for (team, skills) in [
            ("alpha", [95.0, 88.0]),
            ("bravo", [90.0, 85.0]),
            ("charlie", [84.0, 80.0]),
            ("delta", [78.0, 74.0]),
        ] {
            for (i, skill) in skills.iter().enumerate() {
                competitors.push(Competitor::new(format!("{team}_{}", i + 1), team, *skill));
            }
        }
        let events = vec![test_event("r1", 1), test_event("r2", 2), test_event("r3", 3)];
        let data = SeasonData {
            name: "fixture".to_string(),
            teams,
            competitors,
            events,
        };
        Season::new(data).expect("fixture season is valid")
    }
}
