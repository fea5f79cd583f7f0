//! Vessel segment and junction records stored in the graph arena.
//!
//! Nodes are identified by lattice coordinate. Edges carry the hemodynamic
//! state assigned during construction (radius, wall, stresses, flow) and the
//! per-molecule bookkeeping used by the transport traversal.

use std::collections::HashMap;

use glam::IVec3;
use serde::{Deserialize, Serialize};

use super::{EdgeId, NodeId};

/// Vessel category, used for flow orientation and root pressure curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeCategory {
    Artery,
    Capillary,
    Vein,
}

impl EdgeCategory {
    /// Sign used by the radius to pressure relation
    pub fn sign(self) -> f64 {
        match self {
            EdgeCategory::Artery => -1.0,
            EdgeCategory::Capillary => 0.0,
            EdgeCategory::Vein => 1.0,
        }
    }
}

/// Vessel type of a single edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Arteriole,
    Artery,
    Capillary,
    Vein,
    Venule,
}

impl EdgeType {
    pub fn category(self) -> EdgeCategory {
        match self {
            EdgeType::Arteriole | EdgeType::Artery => EdgeCategory::Artery,
            EdgeType::Capillary => EdgeCategory::Capillary,
            EdgeType::Vein | EdgeType::Venule => EdgeCategory::Vein,
        }
    }

    /// Parses a root type code (`A`/`a` or `V`/`v`)
    pub fn from_code(code: &str) -> Option<Self> {
        if code.eq_ignore_ascii_case("A") {
            Some(EdgeType::Artery)
        } else if code.eq_ignore_ascii_case("V") {
            Some(EdgeType::Vein)
        } else {
            None
        }
    }
}

/// Growth resolution level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLevel {
    /// Edges created outside the leveled growth (pattern layout, merged edges)
    Variable,
    /// Coarse growth pass
    Level1,
    /// Fine growth pass after subdivision
    Level2,
}

impl EdgeLevel {
    /// Lattice distance spanned by one edge at this level
    pub fn scale(self) -> i32 {
        match self {
            EdgeLevel::Variable => 0,
            EdgeLevel::Level1 => 4,
            EdgeLevel::Level2 => 2,
        }
    }
}

/// Remodeling mark applied during a shear-driven round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeTag {
    Add,
    Remove,
}

/// Placed growth root: its boundary node and first edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Root {
    pub node: NodeId,
    pub edge: EdgeId,
    pub edge_type: EdgeType,
}

/// Junction between vessel segments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Lattice coordinate (x, y, z)
    pub position: IVec3,
    /// Anchors the network to the tissue boundary
    pub is_root: bool,
    /// Hydrostatic pressure (mmHg)
    pub pressure_mmHg: f64,
    /// Oxygen partial pressure (mmHg), NaN when the node is cut off from flow
    pub oxygen_mmHg: f64,
}

impl Node {
    pub fn new(position: IVec3) -> Self {
        Self {
            position,
            is_root: false,
            pressure_mmHg: 0.0,
            oxygen_mmHg: 0.0,
        }
    }
}

/// Directed vessel segment; direction encodes the direction of flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
    pub level: EdgeLevel,
    /// Lattice distance spanned by the edge
    pub scale: i32,

    /// Internal radius (μm)
    pub radius_um: f64,
    /// Vessel length (μm)
    pub length_um: f64,
    /// Wall thickness (μm)
    pub wall_um: f64,
    /// Wall shear stress (mmHg)
    pub shear_mmHg: f64,
    /// Circumferential stress (mmHg)
    pub circum_mmHg: f64,
    /// Shear stress rescaled to [0, 1] over the whole graph
    pub shear_scaled: f64,
    /// Volumetric flow rate (μm³/min)
    pub flow_um3_per_min: f64,
    /// Exchange surface area (μm²)
    pub area_um2: f64,

    pub tag: Option<EdgeTag>,
    pub visited: bool,
    pub perfused: bool,
    /// Excluded from pressure solves and transport traversal
    pub ignored: bool,

    /// Fraction of source concentration carried, per molecule code
    pub fraction: HashMap<String, f64>,
    /// Mass moved into the lattice during the last tick, per molecule code
    pub transport: HashMap<String, f64>,
    /// Lattice voxels covered by the segment
    pub span: Vec<IVec3>,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, edge_type: EdgeType, level: EdgeLevel) -> Self {
        Self::build(from, to, edge_type, level, level.scale())
    }

    /// Edge with an explicit scale, outside the leveled growth passes
    pub fn with_scale(from: NodeId, to: NodeId, edge_type: EdgeType, scale: i32) -> Self {
        Self::build(from, to, edge_type, EdgeLevel::Variable, scale)
    }

    fn build(from: NodeId, to: NodeId, edge_type: EdgeType, level: EdgeLevel, scale: i32) -> Self {
        Self {
            from,
            to,
            edge_type,
            level,
            scale,
            radius_um: 0.0,
            length_um: 0.0,
            wall_um: 0.0,
            shear_mmHg: 0.0,
            circum_mmHg: 0.0,
            shear_scaled: 0.0,
            flow_um3_per_min: 0.0,
            area_um2: 0.0,
            tag: None,
            visited: false,
            perfused: false,
            ignored: false,
            fraction: HashMap::new(),
            transport: HashMap::new(),
            span: Vec::new(),
        }
    }

    pub fn category(&self) -> EdgeCategory {
        self.edge_type.category()
    }

    pub fn fraction_of(&self, code: &str) -> f64 {
        self.fraction.get(code).copied().unwrap_or(0.0)
    }

    pub fn transport_of(&self, code: &str) -> f64 {
        self.transport.get(code).copied().unwrap_or(0.0)
    }
}
