//! Advisory validator battery.
//!
//! Runs a fixed set of plausibility checks against a season and the current
//! rolling state. Findings are graded like a line-stop guard:
//! - **Acceptable**: well inside the threshold
//! - **Warning**: inside the threshold but close to it
//! - **Critical**: threshold crossed
//!
//! The battery never fails a prediction. Critical findings are logged and
//! reported; callers decide what to do with them.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::domains::championship::{project_season, SeasonProjection};
use crate::domains::form::FormState;
use crate::domains::reliability::WearState;
use crate::domains::monte_carlo::MonteCarloEngine;
use crate::domains::strategy::simulate_stop;
use crate::engine::capabilities::Capabilities;
use crate::engine::rng::SimRng;
use crate::engine::state::EngineState;
use crate::error::SimResult;
use crate::model::{EventDescriptor, Overtaking, Season, TeamTier};

/// Stops sampled per team for the pit check.
const PIT_SAMPLES_PER_TEAM: usize = 400;

/// Graded severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Acceptable,
    /// Inside the threshold, close to the boundary.
    Warning,
    /// Threshold crossed.
    Critical,
}

/// Grades a measured value against a threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeverityClassifier {
    /// Fraction of the threshold at which a value starts to warn
    /// (0.9 = warn beyond 90% of a ceiling).
    pub warning_fraction: f64,
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self { warning_fraction: 0.9 }
    }
}

impl SeverityClassifier {
    #[must_use]
    pub const fn new(warning_fraction: f64) -> Self {
        Self { warning_fraction }
    }

    /// Grade a value that must not exceed `ceiling`.
    #[must_use]
    pub fn classify_ceiling(&self, value: f64, ceiling: f64) -> Severity {
        if !value.is_finite() || value > ceiling {
            Severity::Critical
        } else if value > ceiling * self.warning_fraction {
            Severity::Warning
        } else {
            Severity::Acceptable
        }
    }

    /// Grade a value that must reach `floor`.
    #[must_use]
    pub fn classify_floor(&self, value: f64, floor: f64) -> Severity {
        if !value.is_finite() || value < floor {
            Severity::Critical
        } else if self.warning_fraction > 0.0 && value < floor / self.warning_fraction {
            Severity::Warning
        } else {
            Severity::Acceptable
        }
    }

    /// Grade a value that must stay inside `[low, high]`.
    #[must_use]
    pub fn classify_band(&self, value: f64, low: f64, high: f64) -> Severity {
        self.classify_floor(value, low).max(self.classify_ceiling(value, high))
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub severity: Severity,
    /// Human-readable measurement.
    pub diagnostic: String,
}

impl CheckOutcome {
    fn graded(name: &str, severity: Severity, diagnostic: String) -> Self {
        Self {
            name: name.to_string(),
            passed: severity != Severity::Critical,
            severity,
            diagnostic,
        }
    }

    fn boolean(name: &str, passed: bool, diagnostic: String) -> Self {
        let severity = if passed { Severity::Acceptable } else { Severity::Critical };
        Self::graded(name, severity, diagnostic)
    }

    fn skipped(name: &str, reason: &str) -> Self {
        Self::graded(name, Severity::Acceptable, format!("skipped: {reason}"))
    }
}

/// All findings of one battery run, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckOutcome>,
}

impl ValidationReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Worst severity across the battery.
    #[must_use]
    pub fn worst(&self) -> Severity {
        self.checks.iter().map(|c| c.severity).max().unwrap_or(Severity::Acceptable)
    }

    /// Check by name.
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckOutcome> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Runs the battery for one season.
#[derive(Debug)]
pub struct Validator<'a> {
    season: &'a Season,
    state: &'a EngineState,
    config: EngineConfig,
    capabilities: &'a Capabilities,
    classifier: SeverityClassifier,
}

impl<'a> Validator<'a> {
    /// Diagnostic runs use `validator.diagnostic_trials` trials.
    #[must_use]
    pub fn new(season: &'a Season, state: &'a EngineState, config: &EngineConfig, capabilities: &'a Capabilities) -> Self {
        let mut config = config.clone();
        config.monte_carlo.trials = config.validator.diagnostic_trials;
        config.monte_carlo.sync_trials = config.validator.diagnostic_trials;
        Self {
            season,
            state,
            config,
            capabilities,
            classifier: SeverityClassifier::default(),
        }
    }

    #[must_use]
    pub const fn with_classifier(mut self, classifier: SeverityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    fn seed(&self) -> u64 {
        self.config.reproducibility.seed
    }

    fn engine(&self) -> MonteCarloEngine<'_> {
        MonteCarloEngine::new(self.season, self.state, &self.config, self.capabilities)
    }

    /// Run every check.
    ///
    /// # Errors
    ///
    /// Propagates simulation errors (a malformed event, a failed partition).
    /// Threshold misses are reported in the result, never as errors.
    pub fn run(&self) -> SimResult<ValidationReport> {
        let projection = if self.season.events().is_empty() {
            None
        } else {
            Some(project_season(self.season, self.state, &self.config, self.capabilities)?)
        };

        let checks = vec![
            self.winner_variation()?,
            self.pole_conversion()?,
            self.pit_average(),
            self.wear_escalation(),
            Self::confidence_after_dnf(),
            self.penalty_after_replacement()?,
            self.title_gap(projection.as_ref()),
            self.midfield_podiums(projection.as_ref()),
        ];

        for check in &checks {
            if check.passed {
                debug!(check = %check.name, severity = ?check.severity, diagnostic = %check.diagnostic, "validator check");
            } else {
                warn!(check = %check.name, diagnostic = %check.diagnostic, "validator check failed");
            }
        }
        Ok(ValidationReport { checks })
    }

    fn winner_variation(&self) -> SimResult<CheckOutcome> {
        const NAME: &str = "winner_variation";
        let calendar = self.season.calendar();
        let Some(event) = calendar
            .iter()
            .find(|e| !e.overtaking.is_restrictive())
            .or_else(|| calendar.first())
        else {
            return Ok(CheckOutcome::skipped(NAME, "empty calendar"));
        };

        let aggregate = self.engine().run_event(event)?;
        let (team, share) = self
            .season
            .teams()
            .iter()
            .map(|t| {
                let share: f64 = aggregate
                    .outcomes
                    .iter()
                    .filter(|o| o.team == t.id)
                    .map(|o| o.win_probability)
                    .sum();
                (t.id.as_str(), share)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or(("", 0.0));

        let limit = self.config.validator.max_team_win_share;
        Ok(CheckOutcome::graded(
            NAME,
            self.classifier.classify_ceiling(share, limit),
            format!("{team} wins {:.1}% of {} (limit {:.1}%)", share * 100.0, event.id, limit * 100.0),
        ))
    }

    fn pole_conversion(&self) -> SimResult<CheckOutcome> {
        const NAME: &str = "pole_conversion";
        let Some(base) = self.season.calendar().first().copied() else {
            return Ok(CheckOutcome::skipped(NAME, "empty calendar"));
        };

        // The calmest version of the opening event isolates grid advantage.
        let event = EventDescriptor {
            overtaking: Overtaking::VeryLow,
            sc_probability: 0.0,
            ..base.clone()
        };
        let aggregate = self.engine().run_event(&event)?;
        let floor = self.config.validator.min_pole_conversion;
        Ok(CheckOutcome::graded(
            NAME,
            self.classifier.classify_floor(aggregate.pole_conversion, floor),
            format!(
                "pole converts {:.1}% at {} with very low overtaking (floor {:.1}%)",
                aggregate.pole_conversion * 100.0,
                event.id,
                floor * 100.0
            ),
        ))
    }

    fn pit_average(&self) -> CheckOutcome {
        const NAME: &str = "pit_average";
        let teams = self.season.teams();
        if teams.is_empty() {
            return CheckOutcome::skipped(NAME, "no teams");
        }
        let mut rng = SimRng::for_purpose(self.seed(), "validator", "pit");
        let mut total = 0.0;
        let mut count = 0.0;
        for team in teams {
            for _ in 0..PIT_SAMPLES_PER_TEAM {
                total += simulate_stop(&team.pit_crew, None, &mut rng).time;
                count += 1.0;
            }
        }
        let mean = total / count;
        let v = &self.config.validator;
        CheckOutcome::graded(
            NAME,
            self.classifier.classify_band(mean, v.pit_band_low, v.pit_band_high),
            format!("mean stop {mean:.2}s (band {:.1}-{:.1}s)", v.pit_band_low, v.pit_band_high),
        )
    }

    fn wear_escalation(&self) -> CheckOutcome {
        const NAME: &str = "wear_escalation";
        let Some(team) = self
            .season
            .teams()
            .iter()
            .find(|t| t.tier == TeamTier::Midfield)
            .or_else(|| self.season.teams().first())
        else {
            return CheckOutcome::skipped(NAME, "no teams");
        };
        let calendar = self.season.calendar();
        let span = calendar.len() * 2 / 3;
        if span == 0 {
            return CheckOutcome::skipped(NAME, "calendar too short");
        }

        let mut rng = SimRng::for_purpose(self.seed(), "validator", "wear");
        let mut wear = WearState::default();
        let early = wear.average_multiplier();
        for event in calendar.iter().take(span) {
            wear.advance(event, team.tier, &mut rng);
        }
        let increase = wear.average_multiplier() / early - 1.0;
        let v = &self.config.validator;
        CheckOutcome::graded(
            NAME,
            self.classifier.classify_band(increase, v.wear_increase_min, v.wear_increase_max),
            format!(
                "{} failure rate +{:.0}% after {span} events (band +{:.0}% to +{:.0}%)",
                team.id,
                increase * 100.0,
                v.wear_increase_min * 100.0,
                v.wear_increase_max * 100.0
            ),
        )
    }

    fn confidence_after_dnf() -> CheckOutcome {
        let mut form = FormState::default();
        let before = form.confidence;
        form.push(20);
        form.update_confidence(20, true);
        CheckOutcome::boolean(
            "confidence_after_dnf",
            form.confidence < before,
            format!("confidence {before:.2} -> {:.2} after a retirement", form.confidence),
        )
    }

    fn penalty_after_replacement(&self) -> SimResult<CheckOutcome> {
        const NAME: &str = "penalty_after_replacement";
        let Some(team) = self.season.teams().iter().find(|t| self.season.competitors_of(&t.id).next().is_some()) else {
            return Ok(CheckOutcome::skipped(NAME, "no staffed team"));
        };

        let mut probe = self.state.clone();
        let mut rng = SimRng::for_purpose(self.seed(), "validator", "power_unit");
        probe.replace_power_unit(self.season, &team.id, &mut rng)?;
        let queued: Vec<u32> = self
            .season
            .competitors_of(&team.id)
            .map(|c| probe.queued_penalty(&c.id))
            .collect();
        Ok(CheckOutcome::boolean(
            NAME,
            queued.iter().all(|&p| p > 0),
            format!("{} power unit change queues {queued:?} places", team.id),
        ))
    }

    fn title_gap(&self, projection: Option<&SeasonProjection>) -> CheckOutcome {
        const NAME: &str = "title_gap";
        let Some(p) = projection else {
            return CheckOutcome::skipped(NAME, "empty calendar");
        };
        let gap = p.title_gap();
        let limit = self.config.validator.max_title_gap;
        CheckOutcome::graded(
            NAME,
            self.classifier.classify_ceiling(gap, limit),
            format!("projected title gap {gap:.0} points (limit {limit:.0})"),
        )
    }

    fn midfield_podiums(&self, projection: Option<&SeasonProjection>) -> CheckOutcome {
        const NAME: &str = "midfield_podiums";
        let Some(p) = projection else {
            return CheckOutcome::skipped(NAME, "empty calendar");
        };
        let podiums = p.midfield_podiums();
        let floor = self.config.validator.min_midfield_podiums;
        CheckOutcome::graded(
            NAME,
            self.classifier.classify_floor(podiums, floor),
            format!("midfield teams expect {podiums:.2} podiums (floor {floor:.1})"),
        )
    }
}

/// Run the battery with default grading.
///
/// # Errors
///
/// See [`Validator::run`].
pub fn run_battery(
    season: &Season,
    state: &EngineState,
    config: &EngineConfig,
    capabilities: &Capabilities,
) -> SimResult<ValidationReport> {
    Validator::new(season, state, config, capabilities).run()
}
