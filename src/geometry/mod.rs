//! Lattice geometry strategies.
//!
//! The vessel network lives on the node lattice of either a rectangular or a
//! triangular tissue grid. Each strategy supplies its direction set, unit
//! offsets, segment lengths, the voxels a segment covers, the repeating
//! pattern tessellation, and where growth roots sit on each border.

mod rect;
mod tri;

pub use rect::RectGeometry;
pub use tri::TriGeometry;

use glam::IVec3;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeType, Graph};

/// Supported lattice geometries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Rect,
    Tri,
}

/// Direction code of a lattice step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeDirection {
    Undefined,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl EdgeDirection {
    /// Direction pointing back along the same line
    pub fn reverse(self) -> Self {
        use EdgeDirection::*;
        match self {
            Undefined => Undefined,
            Up => Down,
            UpRight => DownLeft,
            Right => Left,
            DownRight => UpLeft,
            Down => Up,
            DownLeft => UpRight,
            Left => Right,
            UpLeft => DownRight,
        }
    }
}

/// Side of the tissue a root grows in from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Border {
    /// -x side
    Left,
    /// -y side
    Top,
    /// +x side
    Right,
    /// +y side
    Bottom,
}

impl Border {
    pub const ALL: [Border; 4] = [Border::Left, Border::Top, Border::Right, Border::Bottom];
}

/// Lattice dimensions in voxels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeShape {
    /// Extent in x
    pub length: i32,
    /// Extent in y
    pub width: i32,
    /// Extent in z
    pub height: i32,
}

impl LatticeShape {
    pub fn new(length: i32, width: i32, height: i32) -> Self {
        Self { length, width, height }
    }

    pub fn voxel_count(&self) -> usize {
        (self.length.max(0) * self.width.max(0) * self.height.max(0)) as usize
    }
}

/// Placement of a growth root produced by a geometry strategy
#[derive(Debug, Clone)]
pub struct RootSite {
    pub position: IVec3,
    /// Direction of the first root edge
    pub direction: EdgeDirection,
    pub edge_type: EdgeType,
}

/// Edge emitted by the pattern tessellation
#[derive(Debug, Clone, Copy)]
pub struct PatternEdge {
    pub from: IVec3,
    pub to: IVec3,
    pub edge_type: EdgeType,
}

/// Geometry-specific facts consumed by the network builder and transport
pub trait SiteGeometry {
    fn kind(&self) -> GeometryKind;

    fn shape(&self) -> LatticeShape;

    /// All step directions, in canonical order
    fn directions(&self) -> &'static [EdgeDirection];

    /// Directions allowed for single-edge motifs
    fn single_directions(&self) -> &'static [EdgeDirection];

    /// Unit coordinate change for a direction
    fn offset(&self, direction: EdgeDirection) -> IVec3;

    /// The two directions of the leaves of a tripod grown in `direction`
    fn root_offsets(&self, direction: EdgeDirection) -> [EdgeDirection; 2];

    /// Direction code of a unit step in scaled coordinates
    fn unit_direction(&self, dx: i32, dy: i32) -> EdgeDirection;

    /// Direction code of the step from `from` to `to` at the given scale
    fn direction(&self, from: IVec3, to: IVec3, scale: i32) -> EdgeDirection {
        if scale <= 0 {
            return EdgeDirection::Undefined;
        }
        let from = from / scale;
        let to = to / scale;
        self.unit_direction(to.x - from.x, to.y - from.y)
    }

    /// True if the node lies inside the node lattice
    fn check_node(&self, position: IVec3) -> bool;

    /// True if a segment does not cross an existing segment
    fn check_cross(&self, _graph: &Graph, _from: IVec3, _to: IVec3, _scale: i32) -> bool {
        true
    }

    /// Segment length (μm)
    fn length(&self, from: IVec3, to: IVec3, scale: i32) -> f64;

    /// Lattice voxels covered by a segment
    fn span(&self, from: IVec3, to: IVec3) -> Vec<IVec3>;

    /// Typed edges of the tessellated pattern that fit inside the lattice
    fn pattern_edges(&self) -> Vec<PatternEdge>;

    /// Start nodes of the pruning traversal (left boundary of each layer)
    fn pattern_inlets(&self) -> Vec<IVec3>;

    /// Unit cell column and row of a node
    fn pattern_cell(&self, position: IVec3) -> (i32, i32);

    /// Unit cell column and row at which the pattern splits
    fn pattern_split(&self) -> (i32, i32);

    /// Places a root `percent` of the way along a border
    fn root_site(&self, border: Border, percent: f64, edge_type: EdgeType, scale: i32) -> RootSite;

    /// Random inward offset path covering `fraction` of the domain
    fn line_offsets(&self, border: Border, fraction: f64, scale: i32, rng: &mut dyn RngCore) -> Vec<EdgeDirection>;

    /// Node offset from `position` by `scale` steps in `direction`
    fn offset_node(&self, position: IVec3, direction: EdgeDirection, scale: i32) -> IVec3 {
        position + self.offset(direction) * scale
    }
}

/// Builds the strategy for a geometry kind
pub fn make_geometry(kind: GeometryKind, shape: LatticeShape, step_size_xy_um: f64) -> Box<dyn SiteGeometry> {
    match kind {
        GeometryKind::Rect => Box::new(RectGeometry::new(shape, step_size_xy_um)),
        GeometryKind::Tri => Box::new(TriGeometry::new(shape, step_size_xy_um)),
    }
}

/// Rounds half up, matching the placement arithmetic of root layouts
pub(crate) fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Pushes a voxel if it lies inside the lattice in x and y
pub(crate) fn check_site(sites: &mut Vec<IVec3>, shape: &LatticeShape, x: i32, y: i32, z: i32) {
    if x >= 0 && x < shape.length && y >= 0 && y < shape.width {
        sites.push(IVec3::new(x, y, z));
    }
}

/// Random walk of line root offsets over three inward directions.
///
/// Indices 0 and 2 deviate in opposite senses along `axis`; the running
/// deviation biases the next draw back toward the start line.
pub(crate) fn balanced_walk(
    count: i32,
    directions: &[EdgeDirection; 3],
    axis: usize,
    offset: impl Fn(EdgeDirection) -> IVec3,
    rng: &mut dyn RngCore,
) -> Vec<EdgeDirection> {
    use rand::Rng;

    let mut deviation = 0;
    let mut offsets = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let index = if deviation > 0 {
            rng.gen_range(0..2)
        } else if deviation < 0 {
            rng.gen_range(0..2) + 1
        } else {
            rng.gen_range(0..3)
        };
        let direction = directions[index];
        offsets.push(direction);
        deviation += offset(direction)[axis];
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_is_involution() {
        use EdgeDirection::*;
        for d in [Up, UpRight, Right, DownRight, Down, DownLeft, Left, UpLeft] {
            assert_eq!(d.reverse().reverse(), d);
            assert_ne!(d.reverse(), d);
        }
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(0.0), 0);
    }

    #[test]
    fn test_check_site_bounds() {
        let shape = LatticeShape::new(4, 3, 1);
        let mut sites = Vec::new();
        check_site(&mut sites, &shape, 3, 2, 0);
        check_site(&mut sites, &shape, 4, 2, 0);
        check_site(&mut sites, &shape, -1, 0, 0);
        assert_eq!(sites, vec![IVec3::new(3, 2, 0)]);
    }
}
