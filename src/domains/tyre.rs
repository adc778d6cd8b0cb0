//! Tyre degradation and fuel mass models.
//!
//! Statistical approximations, not vehicle dynamics: each returns a small
//! pace modifier on the same scale as the pace model.

use serde::{Deserialize, Serialize};

use crate::model::TyreDeg;

/// Tyre compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
}

impl std::fmt::Display for Compound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Soft => "soft",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Intermediate => "intermediate",
            Self::Wet => "wet",
        };
        f.write_str(name)
    }
}

/// Tyre degradation capability injected into the pace model.
pub trait TireModel: Send + Sync + std::fmt::Debug {
    /// Per-lap pace loss (seconds, 0-0.4) of a set after `laps_on_tyre` laps.
    fn pace_loss(
        &self,
        compound: Compound,
        laps_on_tyre: u32,
        track_temp: f64,
        smoothness: f64,
        track_deg: TyreDeg,
        fuel_kg: f64,
    ) -> f64;

    /// Pace-equation modifier (higher = slower).
    fn pace_modifier(
        &self,
        compound: Compound,
        laps_on_tyre: u32,
        track_temp: f64,
        smoothness: f64,
        track_deg: TyreDeg,
        fuel_kg: f64,
    ) -> f64 {
        self.pace_loss(compound, laps_on_tyre, track_temp, smoothness, track_deg, fuel_kg) * 0.05
    }

    /// Laps until the loss passes 0.35 s for a neutral driver (max 60).
    fn optimal_stint_length(&self, compound: Compound, track_temp: f64, track_deg: TyreDeg) -> u32 {
        (1..=60)
            .find(|&lap| self.pace_loss(compound, lap, track_temp, 1.0, track_deg, 40.0) > 0.35)
            .unwrap_or(60)
    }
}

/// Narrow-tyre overheating coefficient.
const OVERHEATING: f64 = 1.15;
const MAX_LOSS: f64 = 0.4;

/// Exponential soft, linear others, scaled by temperature, track, driver and load.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegradationModel;

impl DegradationModel {
    /// Raw loss curve and optimal track temperature of a compound.
    fn curve(compound: Compound, laps: f64) -> (f64, f64) {
        match compound {
            Compound::Soft => (0.020 * (laps / 21.0).exp(), 35.0),
            Compound::Medium => (0.008 + laps * 0.003, 33.0),
            Compound::Hard => (0.004 + laps * 0.0015, 30.0),
            Compound::Intermediate => (0.012 + laps * 0.0025, 25.0),
            Compound::Wet => (0.008 + laps * 0.002, 20.0),
        }
    }
}

impl TireModel for DegradationModel {
    fn pace_loss(
        &self,
        compound: Compound,
        laps_on_tyre: u32,
        track_temp: f64,
        smoothness: f64,
        track_deg: TyreDeg,
        fuel_kg: f64,
    ) -> f64 {
        let (raw, optimal) = Self::curve(compound, f64::from(laps_on_tyre));
        let temp = 1.0 + (track_temp - optimal) * 0.015;
        let smooth = if smoothness > 0.0 { 1.0 / smoothness } else { 1.0 };
        let load = if fuel_kg > 0.0 { 1.0 + fuel_kg / 500.0 } else { 1.0 };
        (raw * temp * track_deg.wear_multiplier() * smooth * OVERHEATING * load).clamp(0.0, MAX_LOSS)
    }
}

/// Fuel burn and the resulting lap time gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelModel {
    /// Fuel at the start (kg).
    pub start_kg: f64,
    /// Burn per green-flag lap (kg).
    pub burn_per_lap: f64,
    /// Burn factor under safety car.
    pub sc_burn_factor: f64,
    /// Seconds gained per kg burned.
    pub gain_per_kg: f64,
    /// Gain cap per lap completed (seconds).
    pub max_gain_per_lap: f64,
}

impl Default for FuelModel {
    fn default() -> Self {
        Self {
            start_kg: 75.0,
            burn_per_lap: 1.4,
            sc_burn_factor: 0.55,
            gain_per_kg: 0.00022,
            max_gain_per_lap: 0.03,
        }
    }
}

impl FuelModel {
    /// Fuel remaining after `lap` laps of which `sc_laps` ran behind the safety car.
    #[must_use]
    pub fn remaining(&self, lap: u32, sc_laps: u32) -> f64 {
        let sc = sc_laps.min(lap);
        let green = f64::from(lap - sc);
        let burned = green * self.burn_per_lap + f64::from(sc) * self.burn_per_lap * self.sc_burn_factor;
        (self.start_kg - burned).max(0.0)
    }

    /// Lap time gain from burned fuel (seconds).
    #[must_use]
    pub fn gain(&self, lap: u32, sc_laps: u32) -> f64 {
        let burned = self.start_kg - self.remaining(lap, sc_laps);
        (burned * self.gain_per_kg).min(f64::from(lap) * self.max_gain_per_lap)
    }

    /// Pace-equation modifier (higher = faster).
    #[must_use]
    pub fn pace_modifier(&self, lap: u32, sc_laps: u32) -> f64 {
        self.gain(lap, sc_laps) * 0.01
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_grows_with_age() {
        let m = DegradationModel;
        for c in [Compound::Soft, Compound::Medium, Compound::Hard] {
            let fresh = m.pace_loss(c, 1, 35.0, 1.0, TyreDeg::Medium, 50.0);
            let old = m.pace_loss(c, 20, 35.0, 1.0, TyreDeg::Medium, 50.0);
            assert!(old > fresh, "{c} should degrade");
        }
    }

    #[test]
    fn test_loss_clamped() {
        let m = DegradationModel;
        let loss = m.pace_loss(Compound::Soft, 100, 60.0, 0.5, TyreDeg::VeryHigh, 100.0);
        assert!((loss - MAX_LOSS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_smooth_driver_degrades_less() {
        let m = DegradationModel;
        let rough = m.pace_loss(Compound::Medium, 15, 35.0, 0.9, TyreDeg::High, 50.0);
        let smooth = m.pace_loss(Compound::Medium, 15, 35.0, 1.1, TyreDeg::High, 50.0);
        assert!(smooth < rough);
    }

    #[test]
    fn test_medium_reference_value() {
        // (0.008 + 10*0.003) * (1 + 2*0.015) * 1.0 * 1.0 * 1.15 * 1.1
        let m = DegradationModel;
        let loss = m.pace_loss(Compound::Medium, 10, 35.0, 1.0, TyreDeg::Medium, 50.0);
        let expected = 0.038 * 1.03 * 1.15 * 1.1;
        assert!((loss - expected).abs() < 1e-12);
        assert!((m.pace_modifier(Compound::Medium, 10, 35.0, 1.0, TyreDeg::Medium, 50.0) - expected * 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_soft_stint_shorter_than_hard() {
        let m = DegradationModel;
        let soft = m.optimal_stint_length(Compound::Soft, 35.0, TyreDeg::High);
        let hard = m.optimal_stint_length(Compound::Hard, 35.0, TyreDeg::High);
        assert!(soft < hard);
    }

    #[test]
    fn test_fuel_burn_and_gain() {
        let f = FuelModel::default();
        assert!((f.remaining(0, 0) - 75.0).abs() < f64::EPSILON);
        assert!((f.remaining(10, 0) - 61.0).abs() < 1e-12);
        assert!(f.remaining(10, 5) > f.remaining(10, 0));
        assert!(f.remaining(1000, 0).abs() < f64::EPSILON);
        assert!(f.gain(30, 0) > f.gain(10, 0));
        assert!(f.gain(0, 0).abs() < f64::EPSILON);
    }
}
