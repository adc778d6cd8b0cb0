//! Cross-race skill rating (Elo with a Glicko-style uncertainty).
//!
//! Each confirmed finishing order is decomposed into pairwise comparisons.
//! The expected score of a comparison is logistic in the rating difference;
//! the step size scales with the competitor's uncertainty and with a
//! position-gap weight so adjacent finishers move more than distant ones.
//!
//! Only confirmed results update ratings. Simulation trials read
//! [`RatingSystem::normalized`] and never write.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Base step size.
const K_FACTOR: f64 = 8.0;
/// Uncertainty of an established competitor.
const INITIAL_RD: f64 = 200.0;
/// Uncertainty of a newcomer (base skill below [`NEWCOMER_SKILL`]).
const NEWCOMER_RD: f64 = 280.0;
const NEWCOMER_SKILL: f64 = 82.0;
const MIN_RD: f64 = 50.0;
const RD_DECAY: f64 = 0.95;
const MIN_RATING: f64 = 1000.0;
const MAX_RATING: f64 = 2200.0;

/// One competitor's rating state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    /// Current rating.
    pub rating: f64,
    /// Rating deviation (uncertainty).
    pub rd: f64,
    /// Highest rating reached.
    pub peak: f64,
    /// Lowest rating reached.
    pub floor: f64,
    /// Trajectory, one point per rated event.
    pub history: Vec<RatingPoint>,
}

/// Rating after a given event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub event_id: String,
    pub rating: f64,
    pub rd: f64,
}

/// Ratings for every rostered competitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSystem {
    entries: BTreeMap<String, RatingEntry>,
}

impl RatingSystem {
    /// Create an empty rating system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a competitor's rating from base skill (no-op if already rated).
    pub fn initialize(&mut self, competitor: &str, base_skill: f64) {
        self.entries.entry(competitor.to_string()).or_insert_with(|| {
            let rating = 1200.0 + base_skill / 100.0 * 600.0;
            RatingEntry {
                rating,
                rd: if base_skill < NEWCOMER_SKILL { NEWCOMER_RD } else { INITIAL_RD },
                peak: rating,
                floor: rating,
                history: Vec::new(),
            }
        });
    }

    /// Rating entry of a competitor.
    #[must_use]
    pub fn entry(&self, competitor: &str) -> Option<&RatingEntry> {
        self.entries.get(competitor)
    }

    /// Raw rating.
    #[must_use]
    pub fn rating(&self, competitor: &str) -> Option<f64> {
        self.entries.get(competitor).map(|e| e.rating)
    }

    /// Rating mapped onto [0, 1]; 0.5 for unknown competitors.
    #[must_use]
    pub fn normalized(&self, competitor: &str) -> f64 {
        self.entries
            .get(competitor)
            .map_or(0.5, |e| (e.rating - MIN_RATING) / (MAX_RATING - MIN_RATING))
    }

    /// Normalized confidence interval `(low, high)` derived from uncertainty.
    #[must_use]
    pub fn confidence_interval(&self, competitor: &str) -> (f64, f64) {
        match self.entries.get(competitor) {
            Some(e) => {
                let base = self.normalized(competitor);
                let half = e.rd / 400.0;
                ((base - half).max(0.0), (base + half).min(1.0))
            }
            None => (0.4, 0.6),
        }
    }

    /// Apply a confirmed finishing order (winner first).
    ///
    /// Orders with fewer than three competitors are ignored. Unrated ids
    /// are skipped. Returns the number of competitors updated.
    pub fn update(&mut self, event_id: &str, order: &[String]) -> usize {
        if order.len() < 3 {
            return 0;
        }

        let mut deltas: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
        for (i, winner) in order.iter().enumerate() {
            for (j, loser) in order.iter().enumerate().skip(i + 1) {
                let (Some(w), Some(l)) = (self.entries.get(winner), self.entries.get(loser)) else {
                    continue;
                };
                let expected_w = expected_score(w.rating, l.rating);
                let gap_weight = (1.0 - (j - i) as f64 * 0.05).max(0.3);
                let k_w = K_FACTOR * (w.rd / INITIAL_RD) * gap_weight;
                let k_l = K_FACTOR * (l.rd / INITIAL_RD) * gap_weight;

                let dw = deltas.entry(winner.as_str()).or_insert((0.0, 0));
                dw.0 += k_w * (1.0 - expected_w);
                dw.1 += 1;
                let dl = deltas.entry(loser.as_str()).or_insert((0.0, 0));
                dl.0 -= k_l * (1.0 - expected_w);
                dl.1 += 1;
            }
        }

        let mut updated = 0;
        for (id, (delta, comparisons)) in deltas {
            if let Some(e) = self.entries.get_mut(id) {
                e.rating = (e.rating + delta / f64::from(comparisons).sqrt()).clamp(MIN_RATING, MAX_RATING);
                e.rd = (e.rd * RD_DECAY).max(MIN_RD);
                e.peak = e.peak.max(e.rating);
                e.floor = e.floor.min(e.rating);
                e.history.push(RatingPoint {
                    event_id: event_id.to_string(),
                    rating: e.rating,
                    rd: e.rd,
                });
                updated += 1;
            }
        }
        updated
    }
}

/// Logistic expected score of `a` against `b`.
#[must_use]
pub fn expected_score(a: f64, b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((b - a) / 400.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    fn system() -> RatingSystem {
        let mut s = RatingSystem::new();
        for (id, skill) in [("a", 85.0), ("b", 85.0), ("c", 85.0), ("d", 75.0)] {
            s.initialize(id, skill);
        }
        s
    }

    #[test]
    fn test_initial_rating_and_newcomer_uncertainty() {
        let s = system();
        let a = s.entry("a").map(|e| (e.rating, e.rd));
        assert_eq!(a, Some((1710.0, 200.0)));
        assert_eq!(s.entry("d").map(|e| e.rd), Some(280.0));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut s = system();
        s.update("r1", &order(&["a", "b", "c"]));
        let before = s.rating("a");
        s.initialize("a", 10.0);
        assert_eq!(s.rating("a"), before);
    }

    #[test]
    fn test_expected_score_symmetry() {
        let e = expected_score(1600.0, 1500.0);
        assert!((e + expected_score(1500.0, 1600.0) - 1.0).abs() < 1e-12);
        assert!(e > 0.5);
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_short_result_ignored() {
        let mut s = system();
        assert_eq!(s.update("r1", &order(&["a", "b"])), 0);
        assert_eq!(s.rating("a"), Some(1710.0));
    }

    #[test]
    fn test_winner_gains_loser_drops() {
        let mut s = system();
        let before_a = s.rating("a").unwrap_or_default();
        let before_c = s.rating("c").unwrap_or_default();
        s.update("r1", &order(&["a", "b", "c"]));
        assert!(s.rating("a").unwrap_or_default() > before_a);
        assert!(s.rating("c").unwrap_or_default() < before_c);
    }

    #[test]
    fn test_uncertainty_decays_to_floor() {
        let mut s = system();
        for i in 0..100 {
            s.update(&format!("r{i}"), &order(&["a", "b", "c"]));
        }
        assert_eq!(s.entry("a").map(|e| e.rd), Some(MIN_RD));
        assert_eq!(s.entry("a").map(|e| e.history.len()), Some(100));
    }

    #[test]
    fn test_repeated_dominance() {
        let mut s = system();
        let a0 = s.rating("a").unwrap_or_default();
        let b0 = s.rating("b").unwrap_or_default();
        for i in 0..10 {
            s.update(&format!("r{i}"), &order(&["a", "c", "b"]));
        }
        let a1 = s.rating("a").unwrap_or_default();
        let b1 = s.rating("b").unwrap_or_default();
        assert!(a1 > a0);
        assert!(a1 - a0 > b1 - b0);
        assert!(a1 > b1);
    }

    #[test]
    fn test_normalized_and_interval() {
        let s = system();
        let n = s.normalized("a");
        assert!((n - 710.0 / 1200.0).abs() < 1e-12);
        let (lo, hi) = s.confidence_interval("a");
        assert!((lo - (n - 0.5)).abs() < 1e-12);
        assert!((hi - (n + 0.5).min(1.0)).abs() < 1e-12);
        assert!((s.normalized("ghost") - 0.5).abs() < f64::EPSILON);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: ratings stay within bounds and uncertainty never grows.
        #[test]
        fn prop_bounds(perm in Just(vec!["a", "b", "c", "d", "e"]).prop_shuffle(), rounds in 1usize..30) {
            let mut s = RatingSystem::new();
            for id in ["a", "b", "c", "d", "e"] {
                s.initialize(id, 90.0);
            }
            let order: Vec<String> = perm.iter().map(|x| (*x).to_string()).collect();
            for r in 0..rounds {
                let before: Vec<f64> = order.iter().filter_map(|id| s.entry(id).map(|e| e.rd)).collect();
                s.update(&format!("r{r}"), &order);
                for (id, rd0) in order.iter().zip(before) {
                    let e = s.entry(id);
                    prop_assert!(e.is_some());
                    if let Some(e) = e {
                        prop_assert!((MIN_RATING..=MAX_RATING).contains(&e.rating));
                        prop_assert!(e.rd <= rd0);
                    }
                }
            }
        }
    }
}
