//! Cover-to-reserve heuristic
//!
//! The battery never goes below the floor. Up to the floor's worth of cloud
//! cover keeps the reserve at the floor; above it the reserve rises linearly
//! with cover.

use crate::config::HeuristicConfig;

/// Battery percentage added per percent of cover above the floor
pub const CLOUD_TO_TARGET_SLOPE: f64 = 0.75;

/// Minimum battery reserve in percent
pub const TARGET_FLOOR_PCT: f64 = 20.0;

/// Upper bound of any device setting
const MAX_PCT: f64 = 100.0;

/// Map an average cover percentage onto a reserve percentage.
///
/// Input is clamped to `[0, 100]`; the result is `20` for cover up to 20 and
/// `(cover - 20) * slope + 20` above.
pub fn compute_target(avg_cover: f64, slope: f64) -> f64 {
    compute_target_with_floor(avg_cover, slope, TARGET_FLOOR_PCT)
}

fn compute_target_with_floor(avg_cover: f64, slope: f64, floor: f64) -> f64 {
    let cover = if avg_cover.is_nan() {
        0.0
    } else {
        avg_cover.clamp(0.0, MAX_PCT)
    };
    let target = if cover < floor {
        floor
    } else {
        (cover - floor) * slope + floor
    };
    target.min(MAX_PCT)
}

/// Decided reserve level for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryTarget {
    percent: f64,
}

impl BatteryTarget {
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Integer charge target sent to the device
    pub fn charge_setpoint(&self) -> u8 {
        self.percent.round().clamp(0.0, MAX_PCT) as u8
    }

    /// Stop-discharge setting, one point above the charge target
    pub fn discharge_floor(&self) -> u8 {
        self.charge_setpoint().saturating_add(1).min(MAX_PCT as u8)
    }
}

/// Configured heuristic
#[derive(Debug, Clone)]
pub struct TargetHeuristic {
    slope: f64,
    floor: f64,
}

impl TargetHeuristic {
    pub fn new(config: &HeuristicConfig) -> Self {
        Self {
            slope: config.slope,
            floor: config.floor_pct,
        }
    }

    pub fn compute(&self, avg_cover: f64) -> BatteryTarget {
        BatteryTarget {
            percent: compute_target_with_floor(avg_cover, self.slope, self.floor),
        }
    }
}

impl Default for TargetHeuristic {
    fn default() -> Self {
        Self::new(&HeuristicConfig::default())
    }
}
