//! Prediction accuracy tracking.
//!
//! The aggregate produced before an event is stored as a
//! [`PredictionSnapshot`]; when the confirmed result arrives the snapshot is
//! scored and the record is kept for season statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domains::monte_carlo::AggregateResult;
use crate::model::ConfirmedResult;

/// Brier score of a naive "qualifying order wins" predictor.
pub const NAIVE_BRIER: f64 = 0.10;

/// Predicted order and win probabilities of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSnapshot {
    pub event_id: String,
    /// Competitors by predicted average finish.
    pub order: Vec<String>,
    pub win_probability: BTreeMap<String, f64>,
    pub expected_finish: BTreeMap<String, f64>,
}

impl PredictionSnapshot {
    /// Capture the prediction carried by an aggregate.
    #[must_use]
    pub fn from_aggregate(result: &AggregateResult) -> Self {
        Self {
            event_id: result.event_id.clone(),
            order: result.outcomes.iter().map(|o| o.competitor.clone()).collect(),
            win_probability: result
                .outcomes
                .iter()
                .map(|o| (o.competitor.clone(), o.win_probability))
                .collect(),
            expected_finish: result
                .outcomes
                .iter()
                .map(|o| (o.competitor.clone(), o.avg_finish))
                .collect(),
        }
    }
}

/// Scores of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub event_id: String,
    pub brier_score: f64,
    pub winner_correct: bool,
    /// Predicted top three also in the real top three.
    pub podium_overlap: usize,
    pub top5_overlap: usize,
    pub mean_position_error: f64,
}

/// Season-level accuracy statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub races_scored: usize,
    pub avg_brier: f64,
    /// Share of correct winners (0-1).
    pub winner_rate: f64,
    pub avg_podium_overlap: f64,
    pub avg_top5_overlap: f64,
    pub avg_position_error: f64,
    /// Relative Brier improvement over [`NAIVE_BRIER`] (percent).
    pub improvement_vs_naive: f64,
}

/// Scored predictions in ingestion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyTracker {
    records: Vec<AccuracyRecord>,
}

impl AccuracyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scored events.
    #[must_use]
    pub fn races_scored(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn records(&self) -> &[AccuracyRecord] {
        &self.records
    }

    /// Score a prediction against the confirmed order and keep the record.
    pub fn score(&mut self, prediction: &PredictionSnapshot, actual: &ConfirmedResult) -> Option<&AccuracyRecord> {
        if actual.positions.is_empty() || prediction.order.is_empty() {
            return None;
        }
        let winner = &actual.positions[0];
        let top = |ids: &[String], n: usize| ids.iter().take(n).cloned().collect::<Vec<_>>();
        let overlap = |n: usize| {
            let real = top(&actual.positions, n);
            top(&prediction.order, n).iter().filter(|id| real.contains(id)).count()
        };

        let brier = prediction
            .order
            .iter()
            .map(|id| {
                let p = prediction.win_probability.get(id).copied().unwrap_or(0.0);
                let hit = if id == winner { 1.0 } else { 0.0 };
                (p - hit).powi(2)
            })
            .sum::<f64>()
            / prediction.order.len() as f64;

        let errors: Vec<f64> = prediction
            .order
            .iter()
            .enumerate()
            .filter_map(|(predicted, id)| {
                actual
                    .positions
                    .iter()
                    .position(|a| a == id)
                    .map(|real| (predicted as f64 - real as f64).abs())
            })
            .collect();
        let mean_position_error = if errors.is_empty() {
            10.0
        } else {
            errors.iter().sum::<f64>() / errors.len() as f64
        };

        self.records.push(AccuracyRecord {
            event_id: actual.event_id.clone(),
            brier_score: brier,
            winner_correct: prediction.order.first() == Some(winner),
            podium_overlap: overlap(3),
            top5_overlap: overlap(5),
            mean_position_error,
        });
        self.records.last()
    }

    /// Aggregate statistics, `None` before the first scored event.
    #[must_use]
    pub fn stats(&self) -> Option<AccuracyStats> {
        if self.records.is_empty() {
            return None;
        }
        let n = self.records.len() as f64;
        let mean = |f: fn(&AccuracyRecord) -> f64| self.records.iter().map(f).sum::<f64>() / n;
        let avg_brier = mean(|r| r.brier_score);
        Some(AccuracyStats {
            races_scored: self.records.len(),
            avg_brier,
            winner_rate: mean(|r| if r.winner_correct { 1.0 } else { 0.0 }),
            avg_podium_overlap: mean(|r| r.podium_overlap as f64),
            avg_top5_overlap: mean(|r| r.top5_overlap as f64),
            avg_position_error: mean(|r| r.mean_position_error),
            improvement_vs_naive: (NAIVE_BRIER - avg_brier) / NAIVE_BRIER * 100.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    fn snapshot(order: &[&str], win: &[f64]) -> PredictionSnapshot {
        PredictionSnapshot {
            event_id: "r1".into(),
            order: ids(order),
            win_probability: order.iter().zip(win).map(|(id, p)| ((*id).to_string(), *p)).collect(),
            expected_finish: BTreeMap::new(),
        }
    }

    #[test]
    fn test_perfect_prediction() {
        let mut t = AccuracyTracker::new();
        let pred = snapshot(&["a", "b", "c", "d"], &[1.0, 0.0, 0.0, 0.0]);
        let actual = ConfirmedResult::new("r1", ids(&["a", "b", "c", "d"]));
        let rec = t.score(&pred, &actual).cloned();
        assert!(rec.is_some());
        if let Some(rec) = rec {
            assert!(rec.brier_score.abs() < f64::EPSILON);
            assert!(rec.winner_correct);
            assert_eq!(rec.podium_overlap, 3);
            assert!(rec.mean_position_error.abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_wrong_winner() {
        let mut t = AccuracyTracker::new();
        let pred = snapshot(&["a", "b", "c", "d"], &[0.6, 0.2, 0.1, 0.1]);
        let actual = ConfirmedResult::new("r1", ids(&["d", "c", "b", "a"]));
        let rec = t.score(&pred, &actual).cloned();
        if let Some(rec) = rec {
            // (0.36 + 0.04 + 0.01 + 0.81) / 4
            assert!((rec.brier_score - 0.305).abs() < 1e-12);
            assert!(!rec.winner_correct);
            assert_eq!(rec.podium_overlap, 2);
            assert!((rec.mean_position_error - 2.0).abs() < 1e-12);
        } else {
            unreachable!("record expected");
        }
    }

    #[test]
    fn test_empty_result_not_scored() {
        let mut t = AccuracyTracker::new();
        let pred = snapshot(&["a"], &[1.0]);
        assert!(t.score(&pred, &ConfirmedResult::new("r1", Vec::new())).is_none());
        assert_eq!(t.races_scored(), 0);
        assert!(t.stats().is_none());
    }

    #[test]
    fn test_stats_improvement() {
        let mut t = AccuracyTracker::new();
        let pred = snapshot(&["a", "b", "c"], &[1.0, 0.0, 0.0]);
        t.score(&pred, &ConfirmedResult::new("r1", ids(&["a", "b", "c"])));
        let stats = t.stats();
        assert_eq!(stats.as_ref().map(|s| s.races_scored), Some(1));
        assert!(stats.is_some_and(|s| (s.improvement_vs_naive - 100.0).abs() < 1e-9 && (s.winner_rate - 1.0).abs() < 1e-12));
    }
}
