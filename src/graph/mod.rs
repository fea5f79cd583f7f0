//! Vessel network graph.
//!
//! A directed multigraph backed by `petgraph`. Nodes are unique per lattice
//! coordinate and edges carry hemodynamic and transport state.

mod edge;
mod network;

pub use edge::{Edge, EdgeCategory, EdgeLevel, EdgeTag, EdgeType, Node, Root};
pub use network::{EdgeId, Graph, NodeId};
