//! Rolling form, confidence and team development.
//!
//! All state here is mutated only when a confirmed result is ingested.
//! Monte Carlo trials read the multipliers and never write.

use serde::{Deserialize, Serialize};

use crate::engine::rng::SimRng;

/// Finishes kept per competitor.
const FORM_WINDOW: usize = 5;
/// Finishes considered by the form multiplier and streak checks.
const RECENT: usize = 3;
/// Average team finishes kept.
const TEAM_WINDOW: usize = 3;

/// Classified position treated as a retirement by the form model.
const DNF_POSITION: u32 = 19;

/// A competitor's recent results and morale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    /// Last finishing positions, oldest first.
    pub recent: Vec<u32>,
    /// Morale multiplier (0.90-1.10).
    pub confidence: f64,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            recent: Vec::new(),
            confidence: 1.0,
        }
    }
}

impl FormState {
    /// Fewer than three recorded finishes.
    #[must_use]
    pub fn is_rookie(&self) -> bool {
        self.recent.len() < RECENT
    }

    fn last3(&self) -> &[u32] {
        &self.recent[self.recent.len().saturating_sub(RECENT)..]
    }

    /// Momentum multiplier from the last three finishes (0.95-1.05).
    #[must_use]
    pub fn multiplier(&self) -> f64 {
        let recent = self.last3();
        if recent.is_empty() {
            return 1.0;
        }
        let avg = recent.iter().map(|&p| f64::from(p)).sum::<f64>() / recent.len() as f64;
        let podiums = recent.iter().filter(|&&p| p <= 3).count() as f64;
        let dnfs = recent.iter().filter(|&&p| p >= DNF_POSITION).count() as f64;
        (1.0 + (10.5 - avg) * 0.005 + podiums * 0.015 - dnfs * 0.015).clamp(0.95, 1.05)
    }

    /// Record a finish.
    pub fn push(&mut self, position: u32) {
        self.recent.push(position);
        if self.recent.len() > FORM_WINDOW {
            self.recent.remove(0);
        }
    }

    /// Update morale after a finish already recorded with [`FormState::push`].
    pub fn update_confidence(&mut self, position: u32, retired: bool) {
        let mut c = self.confidence;
        if retired {
            c -= 0.03;
        } else if position == 1 {
            c += 0.02;
        } else if position <= 3 {
            c += 0.01;
        } else if position >= 15 {
            c -= 0.01;
        }

        if self.recent.len() >= RECENT {
            let last3 = self.last3();
            if last3.iter().all(|&p| p >= 12) {
                c -= 0.04;
            }
            if last3.iter().all(|&p| p <= 5) {
                c += 0.03;
            }
        }
        self.confidence = c.clamp(0.90, 1.10);
    }
}

/// Weekend-specific form draw around a competitor's momentum (0.95-1.06).
///
/// Deterministic per (master seed, event, competitor) so every trial of a
/// run agrees on it.
#[must_use]
pub fn weekend_form(master_seed: u64, event_id: &str, competitor: &str, momentum: f64) -> f64 {
    let mut rng = SimRng::for_purpose(master_seed, &format!("{event_id}/{competitor}"), "weekend-form");
    let mut form = 0.96 + rng.next() * 0.09;
    if momentum > 1.02 {
        form += 0.02;
    } else if momentum < 0.98 {
        form -= 0.02;
    }
    form.clamp(0.95, 1.06)
}

/// Direction of a team's recent results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Stable,
}

/// Kind of development step rolled after a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopmentEvent {
    Breakthrough,
    Upgrade,
    Regression,
    Stagnation,
}

/// Logged development step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeRecord {
    pub event_id: String,
    pub kind: DevelopmentEvent,
    /// Rating change applied.
    pub delta: f64,
}

/// A team's rolling equipment rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamState {
    /// Rating (15-98 once results arrive).
    pub rating: f64,
    /// Smoothed change in average finish (positive = improving).
    pub velocity: f64,
    pub trend: Trend,
    /// Last average team finishes, oldest first.
    pub recent: Vec<f64>,
    /// Development steps that moved the rating.
    pub upgrades: Vec<UpgradeRecord>,
}

impl TeamState {
    /// Fresh state from a base rating.
    #[must_use]
    pub fn new(base_rating: f64) -> Self {
        Self {
            rating: base_rating,
            velocity: 0.0,
            trend: Trend::Stable,
            recent: Vec::new(),
            upgrades: Vec::new(),
        }
    }

    /// Rating including momentum (10-100).
    #[must_use]
    pub fn effective_rating(&self) -> f64 {
        (self.rating + self.velocity * 0.5).clamp(10.0, 100.0)
    }

    /// Average finish a team of this rating is expected to achieve.
    #[must_use]
    pub fn expected_finish(&self) -> f64 {
        11.0 - self.rating / 10.0
    }

    /// Reliability index derived from the rating (0.9-1.1).
    #[must_use]
    pub fn reliability(&self) -> f64 {
        0.9 + 0.2 * self.effective_rating() / 100.0
    }

    /// Gradual development multiplier (0.94-1.06).
    #[must_use]
    pub fn development_trend(&self) -> f64 {
        if self.recent.is_empty() {
            return 1.0;
        }
        let window = &self.recent[self.recent.len().saturating_sub(RECENT)..];
        let avg = window.iter().sum::<f64>() / window.len() as f64;
        let diff = self.expected_finish() - avg;
        (1.0 + (self.velocity * 0.5 + diff * 0.5) * 0.015).clamp(0.94, 1.06)
    }

    /// Fold in the team's average finish at a confirmed event.
    pub fn apply_result(&mut self, event_id: &str, avg_finish: f64, rng: &mut SimRng) {
        self.recent.push(avg_finish);
        if self.recent.len() > TEAM_WINDOW {
            self.recent.remove(0);
        }

        if let [.., prev, curr] = self.recent[..] {
            let delta = prev - curr;
            self.velocity = self.velocity * 0.4 + delta * 0.6;
            self.trend = if delta > 0.5 {
                Trend::Up
            } else if delta < -0.5 {
                Trend::Down
            } else {
                Trend::Stable
            };
        }

        let expected = self.expected_finish();
        let roll = rng.next();
        let (spike, kind) = if roll < 0.05 {
            (4.0 + rng.next() * 2.0, Some(DevelopmentEvent::Breakthrough))
        } else if roll < 0.15 {
            (1.5 + rng.next() * 1.5, Some(DevelopmentEvent::Upgrade))
        } else if roll < 0.25 {
            (-(0.5 + rng.next() * 1.5), Some(DevelopmentEvent::Regression))
        } else if roll > 0.85 {
            (0.0, Some(DevelopmentEvent::Stagnation))
        } else {
            (0.0, None)
        };

        let mut adj = (expected - avg_finish) * 0.12 + spike;
        if self.recent.len() >= RECENT {
            let sum: f64 = self.recent[self.recent.len() - RECENT..].iter().sum();
            if sum < expected * 3.0 - 2.0 {
                adj += 0.5;
            }
            if sum > expected * 3.0 + 2.0 {
                adj -= 0.5;
            }
        }

        let old = self.rating;
        self.rating = (self.rating + adj).clamp(15.0, 98.0);
        if let Some(kind @ (DevelopmentEvent::Breakthrough | DevelopmentEvent::Upgrade | DevelopmentEvent::Regression)) = kind {
            self.upgrades.push(UpgradeRecord {
                event_id: event_id.to_string(),
                kind,
                delta: self.rating - old,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(finishes: &[u32]) -> FormState {
        let mut f = FormState::default();
        for &p in finishes {
            f.push(p);
        }
        f
    }

    #[test]
    fn test_no_history_is_neutral() {
        let f = FormState::default();
        assert!((f.multiplier() - 1.0).abs() < f64::EPSILON);
        assert!(f.is_rookie());
    }

    #[test]
    fn test_podium_streak_caps_high() {
        let f = form(&[1, 2, 1]);
        assert!((f.multiplier() - 1.05).abs() < 1e-12);
        assert!(!f.is_rookie());
    }

    #[test]
    fn test_backmarker_form() {
        // avg 16: 1 - 0.0275, no podiums, no DNFs
        let f = form(&[15, 16, 17]);
        assert!(f.multiplier() < 1.0);
        assert!(f.multiplier() >= 0.95);
    }

    #[test]
    fn test_window_keeps_five() {
        let f = form(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(f.recent, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_confidence_dnf_drops() {
        let mut f = form(&[20]);
        f.update_confidence(20, true);
        assert!((f.confidence - 0.97).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_strong_streak() {
        let mut f = form(&[2, 3]);
        f.push(1);
        f.update_confidence(1, false);
        // +0.02 win, +0.03 streak
        assert!((f.confidence - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_clamped() {
        let mut f = FormState::default();
        for _ in 0..20 {
            f.push(20);
            f.update_confidence(20, true);
        }
        assert!((f.confidence - 0.90).abs() < 1e-12);
    }

    #[test]
    fn test_weekend_form_deterministic_and_bounded() {
        let a = weekend_form(42, "monza", "leclerc", 1.0);
        let b = weekend_form(42, "monza", "leclerc", 1.0);
        assert!((a - b).abs() < f64::EPSILON);
        assert!((0.95..=1.06).contains(&a));
        let hot = weekend_form(42, "monza", "leclerc", 1.04);
        assert!(hot >= a);
    }

    #[test]
    fn test_team_velocity_and_trend() {
        let mut t = TeamState::new(80.0);
        let mut rng = SimRng::new(3);
        t.apply_result("r1", 8.0, &mut rng);
        t.apply_result("r2", 4.0, &mut rng);
        assert!((t.velocity - 2.4).abs() < 1e-12);
        assert_eq!(t.trend, Trend::Up);
        assert!((15.0..=98.0).contains(&t.rating));
    }

    #[test]
    fn test_effective_rating_clamped() {
        let mut t = TeamState::new(99.0);
        t.velocity = 10.0;
        assert!((t.effective_rating() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_development_trend_bounds() {
        let mut t = TeamState::new(90.0);
        assert!((t.development_trend() - 1.0).abs() < f64::EPSILON);
        t.recent = vec![20.0, 20.0, 20.0];
        t.velocity = -10.0;
        assert!((t.development_trend() - 0.94).abs() < 1e-12);
    }

    #[test]
    fn test_reliability_tracks_rating() {
        assert!(TeamState::new(95.0).reliability() > TeamState::new(30.0).reliability());
    }
}
