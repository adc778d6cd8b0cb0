//! Deterministic random number generation.
//!
//! Implements PCG (Permuted Congruential Generator) with seeds derived from
//! a master seed plus a scope key, so every Monte Carlo trial owns an
//! independent stream.
//!
//! # Reproducibility Guarantee
//!
//! Given the same master seed, all random number sequences will be
//! bitwise-identical across:
//! - Different runs
//! - Different platforms
//! - Different thread counts (a trial's stream depends only on its index)

use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// Deterministic, reproducible random number generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRng {
    /// Master seed for reproducibility.
    master_seed: u64,
    /// Derived stream key (equals the master seed for a root generator).
    stream: u64,
    /// Internal PCG state.
    rng: Pcg64,
}

impl SimRng {
    /// Create a new RNG with the given master seed.
    #[must_use]
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            stream: master_seed,
            rng: Pcg64::seed_from_u64(master_seed),
        }
    }

    /// RNG for one Monte Carlo trial of one event.
    ///
    /// # Example
    ///
    /// ```rust
    /// use racesim::engine::rng::SimRng;
    ///
    /// let mut a = SimRng::for_trial(42, "monza", 7);
    /// let mut b = SimRng::for_trial(42, "monza", 7);
    /// assert_eq!(a.next(), b.next());
    /// ```
    #[must_use]
    pub fn for_trial(master_seed: u64, event_id: &str, trial: u64) -> Self {
        Self::derived(master_seed, event_id.as_bytes(), &trial.to_le_bytes())
    }

    /// RNG for a named, non-trial purpose within a scope
    /// (e.g. `("monza", "reference-weather")` or `("monza/ferrari", "wear")`).
    #[must_use]
    pub fn for_purpose(master_seed: u64, scope: &str, purpose: &str) -> Self {
        Self::derived(master_seed, scope.as_bytes(), purpose.as_bytes())
    }

    fn derived(master_seed: u64, scope: &[u8], key: &[u8]) -> Self {
        let stream = derive_stream(master_seed, scope, key);
        Self {
            master_seed,
            stream,
            rng: Pcg64::seed_from_u64(stream),
        }
    }

    /// Get the master seed.
    #[must_use]
    pub const fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Get the derived stream key.
    #[must_use]
    pub const fn stream(&self) -> u64 {
        self.stream
    }

    /// Uniform f64 in [0, 1).
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Uniform f64 in [min, max). A reversed range yields values in (max, min].
    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next()
    }

    /// Standard normal sample using the Box-Muller transform.
    pub fn gen_standard_normal(&mut self) -> f64 {
        let u1 = self.next();
        let u2 = self.next();

        // Avoid log(0)
        let u1 = if u1 < f64::EPSILON { f64::EPSILON } else { u1 };

        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Normal sample with given mean and standard deviation.
    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        mean + std * self.gen_standard_normal()
    }

    /// Bernoulli draw: true with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next() < p
    }
}

/// Hash `(master_seed, scope, key)` into a 64-bit stream seed.
fn derive_stream(master_seed: u64, scope: &[u8], key: &[u8]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&master_seed.to_le_bytes());
    hasher.update(&(scope.len() as u64).to_le_bytes());
    hasher.update(scope);
    hasher.update(key);
    let hash = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(seed)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: Uniform draws are always in [0, 1).
        #[test]
        fn prop_next_unit_interval(seed in any::<u64>()) {
            let mut rng = SimRng::new(seed);
            for _ in 0..100 {
                let v = rng.next();
                prop_assert!((0.0..1.0).contains(&v));
            }
        }

        /// Property: Derived trial streams are reproducible.
        #[test]
        fn prop_for_trial_reproducible(seed in any::<u64>(), trial in 0u64..10_000) {
            let mut a = SimRng::for_trial(seed, "event", trial);
            let mut b = SimRng::for_trial(seed, "event", trial);
            for _ in 0..20 {
                prop_assert_eq!(a.next().to_bits(), b.next().to_bits());
            }
        }

        /// Property: Normal draws are finite.
        #[test]
        fn prop_normal_finite(seed in any::<u64>(), mean in -100.0..100.0f64, std in 0.0..10.0f64) {
            let mut rng = SimRng::new(seed);
            for _ in 0..50 {
                prop_assert!(rng.normal(mean, std).is_finite());
            }
        }
    }
}
