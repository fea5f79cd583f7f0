//! Blood oxygen content.
//!
//! Saturation follows a Hill curve; total content adds hemoglobin-bound and
//! plasma-dissolved oxygen.

use crate::graph::Edge;

/// Hill exponent of the oxygen saturation curve
pub const OXYGEN_CURVE_EXP: f64 = 2.8275;

/// Partial pressure at half saturation (mmHg)
pub const OXYGEN_CURVE_P50: f64 = 26.875;

/// Hemoglobin oxygen capacity (fmol/μm³)
pub const OXYGEN_SATURATION: f64 = 0.00835;

/// Upper bound of oxygen partial pressure (mmHg)
pub const MAX_OXYGEN_PARTIAL_PRESSURE: f64 = 100.0;

/// Inlet partial pressure of the narrowest roots (mmHg)
pub const MIN_OXYGEN_PARTIAL_PRESSURE: f64 = 55.0;

/// Inlet partial pressure gained per μm of root radius
pub const OXYGEN_PRESSURE_SCALE: f64 = 1.0;

/// Partial pressure (mmHg) of blood entering through a root edge
pub fn inlet_partial_pressure(edge: &Edge) -> f64 {
    (MIN_OXYGEN_PARTIAL_PRESSURE + OXYGEN_PRESSURE_SCALE * edge.radius_um).min(MAX_OXYGEN_PARTIAL_PRESSURE)
}

/// Fractional hemoglobin saturation at a partial pressure
pub fn oxygen_saturation(pressure_mmHg: f64) -> f64 {
    let p = pressure_mmHg.powf(OXYGEN_CURVE_EXP);
    p / (p + OXYGEN_CURVE_P50.powf(OXYGEN_CURVE_EXP))
}

/// Total oxygen content (fmol/μm³) at a partial pressure and plasma solubility
pub fn total_oxygen(pressure_mmHg: f64, solubility: f64) -> f64 {
    OXYGEN_SATURATION * oxygen_saturation(pressure_mmHg) + solubility * pressure_mmHg
}
