//! Per-tick exchange between the vessel network and the tissue lattice.
//!
//! Each registered molecule owns a [`MoleculeLayer`]: the host fills the
//! previous and current concentration fields, a step writes the delta field.
//!
//! Two stepping schemes exist:
//! - [`TransportMode::Simple`] tops every spanned voxel up to the source
//!   concentration;
//! - [`TransportMode::Complex`] propagates concentration (or oxygen partial
//!   pressure) through the network by flow and exchanges it across the
//!   vessel wall over one minute.

mod lattice;
mod spans;
mod step;
mod traversal;

pub use lattice::LatticeField;
pub use spans::update_spans;
pub use step::{complex_step, simple_step, ExchangeSettings};
pub use traversal::{step_graph, traverse_edge, traverse_node, update_traverse, TraversalReport};

use serde::{Deserialize, Serialize};

use crate::geometry::LatticeShape;

/// Code of the molecule carried as partial pressure instead of fraction
pub const OXYGEN: &str = "OXYGEN";

/// Molecule codes every edge carries a transport entry for
pub const DEFAULT_MOLECULES: [&str; 2] = ["GLUCOSE", OXYGEN];

/// Edges carrying less than this (μm³/s) do not exchange
pub const MIN_EXCHANGE_FLOW: f64 = 2000.0;

/// Edges carrying less than this (μm³/min) are dropped from a stuck traversal
pub const MIN_TRAVERSAL_FLOW: f64 = 1000.0;

/// Inlet share of a merging junction below which the inlet is dropped
pub const MIN_INLET_SHARE: f64 = 0.01;

/// Stalled frontier iterations before a traversal prunes edges
pub const MAX_TRAVERSAL_STALLS: usize = 100;

/// Seconds integrated per tick
pub const EXCHANGE_SECONDS: usize = 60;

pub(crate) fn is_oxygen(code: &str) -> bool {
    code.eq_ignore_ascii_case(OXYGEN)
}

/// Stepping scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportMode {
    #[default]
    Simple,
    Complex,
}

/// Concentration fields for one molecule
#[derive(Debug, Clone)]
pub struct MoleculeLayer {
    pub code: String,
    /// Source concentration carried by the blood
    pub concentration: f64,
    /// Wall permeability at 1 μm thickness (μm/s)
    pub permeability: f64,
    pub previous: LatticeField<f64>,
    pub current: LatticeField<f64>,
    /// Change written by the network each tick
    pub delta: LatticeField<f64>,
}

impl MoleculeLayer {
    pub fn new(code: impl Into<String>, concentration: f64, permeability: f64, shape: LatticeShape) -> Self {
        Self {
            code: code.into(),
            concentration,
            permeability,
            previous: LatticeField::new(shape),
            current: LatticeField::new(shape),
            delta: LatticeField::new(shape),
        }
    }

    pub fn is_oxygen(&self) -> bool {
        is_oxygen(&self.code)
    }

    /// Mean of the delta field over the whole lattice
    pub fn mean_delta(&self) -> f64 {
        let count = self.delta.values().len();
        if count == 0 {
            return 0.0;
        }
        self.delta.iter().sum::<f64>() / count as f64
    }

    /// Applies the delta to the current field, keeping the old one as previous.
    ///
    /// Hosts that own their own tissue model skip this and read `delta` directly.
    pub fn advance(&mut self) {
        self.previous.clone_from(&self.current);
        for (value, delta) in self.current.iter_mut().zip(self.delta.iter()) {
            *value += *delta;
        }
    }
}
