//! Vascular Sites - capillary network simulation over a tissue lattice
//!
//! This library grows or tiles a vessel network on a rectangular or
//! triangular lattice, solves its hemodynamics, and exchanges molecules
//! between the blood and the lattice every tick.

// Allow non-snake-case for unit suffixes in field names (mmHg, um3, etc.)
// This follows the project convention of including units in names.
#![allow(non_snake_case)]

pub mod builder;
pub mod config;
pub mod export;
pub mod geometry;
pub mod graph;
pub mod hemodynamics;
pub mod state;
pub mod transport;

pub use builder::{build_network, build_network_with_report, GrowthReport, NetworkLayout};
pub use config::Parameters;
pub use geometry::{make_geometry, GeometryKind, LatticeShape, SiteGeometry};
pub use graph::{Edge, EdgeId, EdgeType, Graph, Node, NodeId};
pub use state::GraphSites;
pub use transport::{LatticeField, MoleculeLayer, TransportMode};
