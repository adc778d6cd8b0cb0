//! Confirmed (real-world) results fed back into the engine.

use serde::{Deserialize, Serialize};

/// A real classified finishing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmedResult {
    /// Event the result belongs to.
    pub event_id: String,
    /// Finishing order, winner first; retirements classified at the back.
    pub positions: Vec<String>,
    /// Competitors that did not finish.
    #[serde(default)]
    pub retired: Vec<String>,
    /// Sprint session result (points only).
    #[serde(default)]
    pub sprint: bool,
}

impl ConfirmedResult {
    /// Race result with no retirements.
    #[must_use]
    pub fn new(event_id: impl Into<String>, positions: Vec<String>) -> Self {
        Self {
            event_id: event_id.into(),
            positions,
            retired: Vec::new(),
            sprint: false,
        }
    }

    /// Mark competitors as retired.
    #[must_use]
    pub fn with_retired(mut self, retired: Vec<String>) -> Self {
        self.retired = retired;
        self
    }

    /// 1-based finishing position of a competitor.
    #[must_use]
    pub fn position_of(&self, competitor: &str) -> Option<usize> {
        self.positions.iter().position(|c| c == competitor).map(|i| i + 1)
    }

    /// Whether a competitor retired.
    #[must_use]
    pub fn is_retired(&self, competitor: &str) -> bool {
        self.retired.iter().any(|c| c == competitor)
    }

    /// Content key used to make ingestion idempotent.
    ///
    /// Two results with the same event, session and orderings always
    /// produce the same key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.event_id.as_bytes());
        hasher.update(&[0, u8::from(self.sprint)]);
        for id in &self.positions {
            hasher.update(id.as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(&[1]);
        let mut retired: Vec<&String> = self.retired.iter().collect();
        retired.sort();
        for id in retired {
            hasher.update(id.as_bytes());
            hasher.update(&[0]);
        }
        format!("{}#{}", self.event_id, hasher.finalize().to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_position_of() {
        let r = ConfirmedResult::new("monza", ids(&["a", "b", "c"]));
        assert_eq!(r.position_of("a"), Some(1));
        assert_eq!(r.position_of("c"), Some(3));
        assert_eq!(r.position_of("z"), None);
    }

    #[test]
    fn test_fingerprint_stable() {
        let a = ConfirmedResult::new("monza", ids(&["a", "b", "c"]));
        let b = ConfirmedResult::new("monza", ids(&["a", "b", "c"]));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_order_sensitive() {
        let a = ConfirmedResult::new("monza", ids(&["a", "b", "c"]));
        let b = ConfirmedResult::new("monza", ids(&["b", "a", "c"]));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_retired_order_insensitive() {
        let a = ConfirmedResult::new("x", ids(&["a", "b", "c"])).with_retired(ids(&["b", "c"]));
        let b = ConfirmedResult::new("x", ids(&["a", "b", "c"])).with_retired(ids(&["c", "b"]));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_separates_sprint() {
        let race = ConfirmedResult::new("x", ids(&["a", "b", "c"]));
        let mut sprint = race.clone();
        sprint.sprint = true;
        assert_ne!(race.fingerprint(), sprint.fingerprint());
    }
}
