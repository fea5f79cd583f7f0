//! Lumped-parameter hemodynamics over the vessel graph.
//!
//! Flow follows Poiseuille's law with the in-vivo relative viscosity of
//! Pries et al., root pressures come from an empirical radius to pressure
//! curve, and radii are propagated from capillaries with Murray's law.
//!
//! References:
//! - Pries AR et al. Circ Res. 1994;75:904-915 (in-vivo viscosity)
//! - Welter M et al. PLOS ONE. 2016;11:e0161267 (root pressure curve)
//! - Murray CD. PNAS. 1926;12:207-214 (branching law)

mod oxygen;
mod perfusion;
mod pressure;
mod properties;
mod radius;
pub mod solver;
mod state;

pub use oxygen::{inlet_partial_pressure, oxygen_saturation, total_oxygen, MAX_OXYGEN_PARTIAL_PRESSURE};
pub use perfusion::check_perfused;
pub use pressure::{calculate_pressures, reverse_pressures, set_leaf_pressures, set_root_pressures};
pub use properties::{calculate_flows, calculate_lengths, calculate_stresses, calculate_thicknesses, thickness};
pub use radius::{update_radii, RadiusMode};
pub use state::{calculate_current_state, has_negative_flow, update_graph};

use crate::graph::{Edge, EdgeCategory};

/// Initial capillary radius (μm)
pub const CAP_RADIUS: f64 = 4.0;

/// Smallest radius a retained edge may have (μm)
pub const CAP_RADIUS_MIN: f64 = 2.0;

/// Largest capillary radius (μm)
pub const CAP_RADIUS_MAX: f64 = 20.0;

/// Smallest wall a retained edge may have (μm)
pub const MIN_WALL_THICKNESS: f64 = 0.5;

/// Upper bound on wall thickness as a fraction of radius
pub const MAX_WALL_RADIUS_FRACTION: f64 = 0.5;

/// Plasma viscosity (mmHg·s)
pub const PLASMA_VISCOSITY: f64 = 0.000009;

/// Absolute tolerance for radius and concentration comparisons
pub const DELTA_TOLERANCE: f64 = 1e-8;

/// Tissue layer height (μm); wider vessels extend past the layer
pub const LAYER_HEIGHT_UM: f64 = 8.7;

/// Branching exponent of the radius conservation rule
pub const MURRAY_EXPONENT: f64 = 3.0;

/// Cap on negative-flow recalculation passes
pub const MAX_STATE_ITERATIONS: usize = 100;

/// Root pressure (mmHg) for a root edge of the given radius.
///
/// Arteries follow the rising branch of the curve and veins the falling one,
/// so wider arteries sit at higher pressure and wider veins at lower.
pub fn calculate_pressure(radius_um: f64, category: EdgeCategory) -> f64 {
    18.0 + (89.0 - 18.0) / (1.0 + ((radius_um * category.sign() + 21.0) / 16.0).exp())
}

/// Relative apparent blood viscosity at 45% hematocrit (Pries 1994)
pub fn relative_viscosity(radius_um: f64) -> f64 {
    let d = 2.0 * radius_um;
    let mu45 = 6.0 * (-0.085 * d).exp() + 3.2 - 2.44 * (-0.06 * d.powf(0.645)).exp();
    let f = (d / (d - 1.1)).powi(2);
    (1.0 + (mu45 - 1.0) * f) * f
}

/// Hydraulic conductance (μm³/(mmHg·min)) of a cylinder
pub fn conductance(radius_um: f64, length_um: f64) -> f64 {
    let mu = PLASMA_VISCOSITY * relative_viscosity(radius_um) / 60.0;
    std::f64::consts::PI * radius_um.powi(4) / (8.0 * mu * length_um)
}

/// Conductance of a single edge
pub fn edge_conductance(edge: &Edge) -> f64 {
    conductance(edge.radius_um, edge.length_um)
}
