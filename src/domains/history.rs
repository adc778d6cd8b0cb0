//! Per-track performance memory.
//!
//! Stores how far each competitor finished from the pre-race prediction at
//! every event and converts that into a small pace multiplier for the next
//! visit. Events without direct history borrow from events of the same
//! track type at half weight.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::TrackType;

/// Deltas kept per competitor per event.
const DELTA_WINDOW: usize = 5;
const DIRECT_SCALE: f64 = 0.003;
const SIMILAR_SCALE: f64 = 0.002;
const SIMILAR_WEIGHT: f64 = 0.5;

/// One competitor's record at one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_type: TrackType,
    pub races: u32,
    pub avg_finish: f64,
    pub best_finish: u32,
    /// Expected minus actual position, oldest first (positive = beat the prediction).
    pub deltas: Vec<f64>,
}

impl TrackRecord {
    fn new(track_type: TrackType) -> Self {
        Self {
            track_type,
            races: 0,
            avg_finish: 0.0,
            best_finish: u32::MAX,
            deltas: Vec::new(),
        }
    }

    /// Recency-weighted mean delta (weights 0.5 + i/n * 0.5).
    fn weighted_delta(&self) -> Option<f64> {
        if self.deltas.is_empty() {
            return None;
        }
        let n = self.deltas.len() as f64;
        let (sum, total) = self
            .deltas
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(s, w), (i, d)| {
                let weight = 0.5 + i as f64 / n * 0.5;
                (s + d * weight, w + weight)
            });
        Some(sum / total)
    }
}

/// Track history of every competitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackHistory {
    records: BTreeMap<String, BTreeMap<String, TrackRecord>>,
}

impl TrackHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finish against its expected position.
    pub fn record(
        &mut self,
        competitor: &str,
        event_id: &str,
        track_type: TrackType,
        position: u32,
        expected: f64,
    ) {
        let entry = self
            .records
            .entry(competitor.to_string())
            .or_default()
            .entry(event_id.to_string())
            .or_insert_with(|| TrackRecord::new(track_type));

        entry.deltas.push(expected - f64::from(position));
        if entry.deltas.len() > DELTA_WINDOW {
            entry.deltas.remove(0);
        }
        entry.races += 1;
        entry.avg_finish += (f64::from(position) - entry.avg_finish) / f64::from(entry.races);
        entry.best_finish = entry.best_finish.min(position);
    }

    /// Record of a competitor at an event.
    #[must_use]
    pub fn record_of(&self, competitor: &str, event_id: &str) -> Option<&TrackRecord> {
        self.records.get(competitor)?.get(event_id)
    }

    /// Pace multiplier for a competitor at an event (1.0 without history).
    #[must_use]
    pub fn pace_modifier(&self, competitor: &str, event_id: &str, track_type: TrackType) -> f64 {
        let Some(events) = self.records.get(competitor) else {
            return 1.0;
        };

        if let Some(delta) = events.get(event_id).and_then(TrackRecord::weighted_delta) {
            return 1.0 + delta * DIRECT_SCALE;
        }

        let similar: Vec<f64> = events
            .iter()
            .filter(|(id, r)| id.as_str() != event_id && r.track_type == track_type)
            .filter_map(|(_, r)| r.deltas.last().map(|d| d * SIMILAR_WEIGHT))
            .collect();
        if similar.is_empty() {
            return 1.0;
        }
        1.0 + similar.iter().sum::<f64>() / similar.len() as f64 * SIMILAR_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_history_is_neutral() {
        let h = TrackHistory::new();
        assert!((h.pace_modifier("a", "monza", TrackType::Power) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_direct_history() {
        let mut h = TrackHistory::new();
        h.record("a", "monza", TrackType::Power, 2, 6.0);
        // single delta of +4 at weight 0.5
        let m = h.pace_modifier("a", "monza", TrackType::Power);
        assert!((m - 1.012).abs() < 1e-12);
    }

    #[test]
    fn test_recent_deltas_weigh_more() {
        let mut h = TrackHistory::new();
        h.record("a", "monza", TrackType::Power, 10, 5.0);
        h.record("a", "monza", TrackType::Power, 1, 5.0);
        // deltas [-5, 4], weights [0.5, 0.75]
        let expected = 1.0 + (-5.0 * 0.5 + 4.0 * 0.75) / 1.25 * 0.003;
        assert!((h.pace_modifier("a", "monza", TrackType::Power) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_window_and_summary() {
        let mut h = TrackHistory::new();
        for p in [8, 6, 4, 2, 1, 3] {
            h.record("a", "spa", TrackType::Highspeed, p, 5.0);
        }
        let r = h.record_of("a", "spa");
        assert_eq!(r.map(|r| r.deltas.len()), Some(5));
        assert_eq!(r.map(|r| r.best_finish), Some(1));
        assert_eq!(r.map(|r| r.races), Some(6));
        assert!(r.is_some_and(|r| (r.avg_finish - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_same_type_fallback_at_half_weight() {
        let mut h = TrackHistory::new();
        h.record("a", "monza", TrackType::Power, 1, 5.0);
        h.record("a", "baku", TrackType::Power, 3, 5.0);
        h.record("a", "suzuka", TrackType::Technical, 20, 5.0);
        // mean of (4 * 0.5, 2 * 0.5) = 1.5
        let m = h.pace_modifier("a", "jeddah", TrackType::Power);
        assert!((m - 1.003).abs() < 1e-12);
        assert!((h.pace_modifier("a", "vegas", TrackType::Street) - 1.0).abs() < f64::EPSILON);
    }
}
