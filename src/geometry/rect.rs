//! Rectangular lattice geometry.
//!
//! Nodes sit on the corners of square voxels. Edges step along the axes or
//! the diagonals; crossing diagonals inside one voxel are not allowed.

use glam::IVec3;
use rand::RngCore;

use super::{
    balanced_walk, check_site, round_half_up, Border, EdgeDirection, GeometryKind, LatticeShape,
    PatternEdge, RootSite, SiteGeometry,
};
use crate::graph::{EdgeType, Graph};

use EdgeDirection::*;

const DIRECTIONS: [EdgeDirection; 8] = [Up, UpRight, Right, DownRight, Down, DownLeft, Left, UpLeft];

const SINGLE_DIRECTIONS: [EdgeDirection; 4] = [UpRight, DownRight, DownLeft, UpLeft];

/// Direction lookup indexed by `[dy + 1][dx + 1]`
const DIRS: [[EdgeDirection; 3]; 3] = [
    [UpLeft, Up, UpRight],
    [Left, Undefined, Right],
    [DownLeft, Down, DownRight],
];

/// Rectangular lattice strategy
#[derive(Debug, Clone)]
pub struct RectGeometry {
    shape: LatticeShape,
    /// Axis and diagonal edge lengths at unit scale (μm)
    edge_lengths: [f64; 2],
}

impl RectGeometry {
    pub fn new(shape: LatticeShape, step_size_xy_um: f64) -> Self {
        Self {
            shape,
            edge_lengths: [step_size_xy_um, step_size_xy_um * 2f64.sqrt()],
        }
    }

    fn calc_offset(&self, k: i32) -> i32 {
        let h = self.shape.height;
        (h - k / 2 + 1 - ((h - 1) / 4) % 2) % 2
    }

    fn calc_col(&self, i: i32, offset: i32) -> i32 {
        (i + 4 * offset) % 6
    }

    fn calc_row(&self, i: i32, j: i32, offset: i32) -> i32 {
        let shift = if ((i + 4 * offset) / 6) & 1 == 0 { 0 } else { 3 };
        (j + offset + shift) % 6
    }

    /// x coordinate of the capillary column in a layer
    fn capillary_column(&self, offset: i32) -> i32 {
        let thresh = self.shape.length / 2;
        thresh + 2 - (self.calc_col(thresh, offset) + 1) % 6
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        !(x < 0 || x > self.shape.length || y < 0 || y > self.shape.width)
    }
}

impl SiteGeometry for RectGeometry {
    fn kind(&self) -> GeometryKind {
        GeometryKind::Rect
    }

    fn shape(&self) -> LatticeShape {
        self.shape
    }

    fn directions(&self) -> &'static [EdgeDirection] {
        &DIRECTIONS
    }

    fn single_directions(&self) -> &'static [EdgeDirection] {
        &SINGLE_DIRECTIONS
    }

    fn offset(&self, direction: EdgeDirection) -> IVec3 {
        match direction {
            Up => IVec3::new(0, -1, 0),
            UpRight => IVec3::new(1, -1, 0),
            Right => IVec3::new(1, 0, 0),
            DownRight => IVec3::new(1, 1, 0),
            Down => IVec3::new(0, 1, 0),
            DownLeft => IVec3::new(-1, 1, 0),
            Left => IVec3::new(-1, 0, 0),
            UpLeft => IVec3::new(-1, -1, 0),
            Undefined => IVec3::ZERO,
        }
    }

    fn root_offsets(&self, direction: EdgeDirection) -> [EdgeDirection; 2] {
        match direction {
            Up => [UpRight, UpLeft],
            UpRight => [Right, Up],
            Right => [DownRight, UpRight],
            DownRight => [Down, Right],
            Down => [DownLeft, DownRight],
            DownLeft => [Left, Down],
            Left => [UpLeft, DownLeft],
            UpLeft => [Up, Left],
            Undefined => [Undefined, Undefined],
        }
    }

    fn unit_direction(&self, dx: i32, dy: i32) -> EdgeDirection {
        if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dy) {
            return Undefined;
        }
        DIRS[(dy + 1) as usize][(dx + 1) as usize]
    }

    fn check_node(&self, position: IVec3) -> bool {
        self.in_bounds(position.x, position.y)
    }

    fn check_cross(&self, graph: &Graph, from: IVec3, to: IVec3, scale: i32) -> bool {
        match self.direction(from, to, scale) {
            DownRight | DownLeft | UpRight | UpLeft => {
                let node1 = IVec3::new(from.x, to.y, from.z);
                let node2 = IVec3::new(to.x, from.y, to.z);
                !(graph.has_edge(node1, node2) || graph.has_edge(node2, node1))
            }
            _ => true,
        }
    }

    fn length(&self, from: IVec3, to: IVec3, scale: i32) -> f64 {
        match self.direction(from, to, scale) {
            Up | Right | Down | Left => scale as f64 * self.edge_lengths[0],
            UpRight | UpLeft | DownRight | DownLeft => scale as f64 * self.edge_lengths[1],
            Undefined => f64::NAN,
        }
    }

    fn span(&self, from: IVec3, to: IVec3) -> Vec<IVec3> {
        let mut s = Vec::new();
        let shape = &self.shape;

        let z = from.z;
        let (x0, y0, x1, y1) = (from.x, from.y, to.x, to.y);

        let sx = x1 - x0 < 0;
        let sy = y1 - y0 < 0;
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();

        if x0 == x1 {
            for d in 0..dy {
                let y = y0 + if sy { -(d + 1) } else { d };
                check_site(&mut s, shape, x0, y, z);
                check_site(&mut s, shape, x0 - 1, y, z);
            }
        } else if y0 == y1 {
            for d in 0..dx {
                let x = x0 + if sx { -(d + 1) } else { d };
                check_site(&mut s, shape, x, y0, z);
                check_site(&mut s, shape, x, y0 - 1, z);
            }
        } else if dx == dy {
            for d in 0..dx {
                let x = x0 + if sx { -(d + 1) } else { d };
                let y = y0 + if sy { -(d + 1) } else { d };
                check_site(&mut s, shape, x, y, z);
            }
        } else {
            // Bresenham walk between the start and end squares
            let start_x = x0 - i32::from(sx);
            let start_y = y0 - i32::from(sy);
            let end_x = x1 - i32::from(!sx);
            let end_y = y1 - i32::from(!sy);

            let ddx = (end_x - start_x).abs();
            let ddy = (end_y - start_y).abs();
            let inc_x = if x1 > x0 { 1 } else { -1 };
            let inc_y = if y1 > y0 { 1 } else { -1 };

            let (mut x, mut y) = (start_x, start_y);
            let mut e = ddx - ddy;
            check_site(&mut s, shape, x, y, z);

            while x != end_x || y != end_y {
                if e > 0 {
                    x += inc_x;
                    e -= 2 * ddy;
                } else {
                    y += inc_y;
                    e += 2 * ddx;
                }
                check_site(&mut s, shape, x, y, z);
            }
        }

        s
    }

    fn pattern_edges(&self) -> Vec<PatternEdge> {
        let mut raw = Vec::new();

        for k in (0..self.shape.height).step_by(2) {
            let offset = self.calc_offset(k);
            for i in 0..=self.shape.length {
                for j in 0..=self.shape.width {
                    let col = self.calc_col(i, offset);
                    let row = self.calc_row(i, j, offset);
                    let from = IVec3::new(i, j, k);
                    match (col, row) {
                        (0..=3, 5) => raw.push((from, IVec3::new(i + 1, j, k))),
                        (5, 4) => raw.push((from, IVec3::new(i, j - 1, k))),
                        (5, 0) => raw.push((from, IVec3::new(i, j + 1, k))),
                        (5, 1) => raw.push((from, IVec3::new(i + 1, j + 1, k))),
                        (5, 3) => raw.push((from, IVec3::new(i + 1, j - 1, k))),
                        (4, 5) => {
                            raw.push((from, IVec3::new(i + 1, j - 1, k)));
                            raw.push((from, IVec3::new(i + 1, j + 1, k)));
                        }
                        _ => {}
                    }
                }
            }
        }

        raw.into_iter()
            .filter(|(from, to)| self.in_bounds(from.x, from.y) && self.in_bounds(to.x, to.y))
            .map(|(from, to)| {
                let thresh = self.capillary_column(self.calc_offset(from.z));
                let edge_type = if from.x == thresh {
                    EdgeType::Capillary
                } else if from.x < thresh {
                    EdgeType::Artery
                } else {
                    EdgeType::Vein
                };
                PatternEdge { from, to, edge_type }
            })
            .collect()
    }

    fn pattern_inlets(&self) -> Vec<IVec3> {
        (0..self.shape.height)
            .step_by(2)
            .flat_map(|k| (0..=self.shape.width).map(move |j| IVec3::new(0, j, k)))
            .collect()
    }

    fn pattern_cell(&self, position: IVec3) -> (i32, i32) {
        let offset = self.calc_offset(position.z);
        (
            self.calc_col(position.x, offset),
            self.calc_row(position.x, position.y, offset),
        )
    }

    fn pattern_split(&self) -> (i32, i32) {
        (4, 5)
    }

    fn root_site(&self, border: Border, percent: f64, edge_type: EdgeType, scale: i32) -> RootSite {
        let width = self.shape.width.div_euclid(scale);
        let length = self.shape.length.div_euclid(scale);

        let (position, direction) = match border {
            Border::Left => {
                let c = round_half_up(width as f64 * percent);
                (IVec3::new(0, c * scale, 0), Right)
            }
            Border::Right => {
                let c = round_half_up(width as f64 * percent);
                (IVec3::new(length * scale, c * scale, 0), Left)
            }
            Border::Top => {
                let c = round_half_up(length as f64 * percent);
                (IVec3::new(c * scale, 0, 0), Down)
            }
            Border::Bottom => {
                let c = round_half_up(length as f64 * percent);
                (IVec3::new(c * scale, width * scale, 0), Up)
            }
        };

        RootSite {
            position,
            direction,
            edge_type,
        }
    }

    fn line_offsets(&self, border: Border, fraction: f64, scale: i32, rng: &mut dyn RngCore) -> Vec<EdgeDirection> {
        let width = self.shape.width.div_euclid(scale);
        let length = self.shape.length.div_euclid(scale);

        let (count, directions, axis) = match border {
            Border::Left => (round_half_up(length as f64 * fraction), [UpRight, Right, DownRight], 1),
            Border::Right => (round_half_up(length as f64 * fraction), [UpLeft, Left, DownLeft], 1),
            Border::Top => (round_half_up(width as f64 * fraction), [DownLeft, Down, DownRight], 0),
            Border::Bottom => (round_half_up(width as f64 * fraction), [UpLeft, Up, UpRight], 0),
        };

        balanced_walk(count, &directions, axis, |d| self.offset(d), rng)
    }
}
