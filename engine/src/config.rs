// ═══════════════════════════════════════════════════════════════════════
// Engine configuration — corridor width, tolerances, projection constants
// ═══════════════════════════════════════════════════════════════════════

use crate::error::{EngineError, Result};
use crate::projection::Projection;
use serde::{Deserialize, Serialize};

/// Finest snap grid accepted. Keeps any projected lat/lng well inside
/// Clipper's integer range.
pub const MIN_SNAP_EPSILON_M: f64 = 1e-6;

/// Tunables for corridor building and clipping. Every field has a default,
/// so a partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Half-width of the claimed corridor around a route, in metres.
    pub corridor_half_width_m: f64,
    /// Vertices closer than this are coincident. Also the clipping grid.
    pub snap_epsilon_m: f64,
    /// Boolean-op result parts (and holes) smaller than this are dropped.
    pub sliver_area_m2: f64,
    /// Maximum deviation of the flattened round caps/joins from a true arc.
    pub arc_tolerance_m: f64,
    /// Latitude the local equirectangular projection is centred on.
    pub reference_latitude: f64,
    pub meters_per_degree: f64,
    /// Allowed gap between a stored user total and the derived one.
    pub aggregate_tolerance_m2: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            corridor_half_width_m: 50.0,
            snap_epsilon_m: 0.01,
            sliver_area_m2: 1.0,
            arc_tolerance_m: 0.25,
            reference_latitude: 40.4168,
            meters_per_degree: 111_320.0,
            aggregate_tolerance_m2: 0.5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("corridor_half_width_m", self.corridor_half_width_m),
            ("snap_epsilon_m", self.snap_epsilon_m),
            ("sliver_area_m2", self.sliver_area_m2),
            ("arc_tolerance_m", self.arc_tolerance_m),
            ("meters_per_degree", self.meters_per_degree),
            ("aggregate_tolerance_m2", self.aggregate_tolerance_m2),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }
        if self.snap_epsilon_m < MIN_SNAP_EPSILON_M {
            return Err(EngineError::InvalidConfig(format!(
                "snap_epsilon_m must be at least {MIN_SNAP_EPSILON_M}, got {}",
                self.snap_epsilon_m
            )));
        }
        if !self.reference_latitude.is_finite() || self.reference_latitude.abs() >= 89.0 {
            return Err(EngineError::InvalidConfig(format!(
                "reference_latitude must be within ±89°, got {}",
                self.reference_latitude
            )));
        }
        check_half_width(self.corridor_half_width_m, self.snap_epsilon_m)
    }

    pub fn projection(&self) -> Projection {
        Projection::for_latitude(self.reference_latitude, self.meters_per_degree)
    }
}

/// The snap grid has to stay far below the corridor scale or clipping
/// starts eating real territory.
pub(crate) fn check_half_width(half_width_m: f64, snap_epsilon_m: f64) -> Result<()> {
    if !half_width_m.is_finite() || half_width_m <= 0.0 {
        return Err(EngineError::InvalidConfig(format!(
            "corridor half-width must be positive, got {half_width_m}"
        )));
    }
    if snap_epsilon_m * 100.0 > half_width_m {
        return Err(EngineError::InvalidConfig(format!(
            "snap epsilon {snap_epsilon_m} m is too coarse for a {half_width_m} m corridor"
        )));
    }
    Ok(())
}
