//! Triangular lattice geometry.
//!
//! Nodes sit on the vertices of alternating up and down triangles, so
//! horizontal steps move two columns and diagonal steps move one column and
//! one row. Every step has the same length.

use glam::IVec3;
use rand::{Rng, RngCore};

use super::{
    balanced_walk, check_site, round_half_up, Border, EdgeDirection, GeometryKind, LatticeShape,
    PatternEdge, RootSite, SiteGeometry,
};
use crate::graph::EdgeType;

use EdgeDirection::*;

const DIRECTIONS: [EdgeDirection; 6] = [UpLeft, UpRight, Right, DownRight, DownLeft, Left];

/// Direction lookup indexed by `[dy + 1][dx + 2]`
const DIRS: [[EdgeDirection; 5]; 3] = [
    [Undefined, UpLeft, Undefined, UpRight, Undefined],
    [Left, Undefined, Undefined, Undefined, Right],
    [Undefined, DownLeft, Undefined, DownRight, Undefined],
];

/// Start column of the pattern traversal for each layer phase
const INLET_COLUMNS: [i32; 3] = [0, 1, 0];

/// Triangular lattice strategy
#[derive(Debug, Clone)]
pub struct TriGeometry {
    shape: LatticeShape,
    edge_length: f64,
}

/// Pre-increment: apply the step, then yield the new value
fn pre(value: &mut i32, step: i32) -> i32 {
    *value += step;
    *value
}

/// Post-increment: yield the current value, then apply the step
fn post(value: &mut i32, step: i32) -> i32 {
    let current = *value;
    *value += step;
    current
}

impl TriGeometry {
    pub fn new(shape: LatticeShape, step_size_xy_um: f64) -> Self {
        Self {
            shape,
            edge_length: step_size_xy_um,
        }
    }

    fn calc_offset(&self, k: i32) -> i32 {
        (self.shape.height - k / 2 - 1) % 3
    }

    fn calc_col(&self, i: i32, offset: i32) -> i32 {
        (i + 6 * offset) % 9
    }

    fn calc_row(&self, i: i32, j: i32, offset: i32) -> i32 {
        let shift = if ((i + 6 * offset) / 9) & 1 == 0 { 0 } else { 3 };
        (j + shift) % 6
    }

    fn capillary_column(&self, offset: i32) -> i32 {
        let thresh = (self.shape.length + 1) / 2;
        thresh + 3 - ((self.calc_col(thresh, offset) + 1) % 9 + 4) % 9
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        !(x < 0 || x > self.shape.length + 1 || y < 0 || y > self.shape.width)
    }

    /// Number of coarse horizontal positions along x
    fn coarse_length(&self, scale: i32) -> i32 {
        (self.shape.length - 2 * scale + 3) / scale
    }

    /// Walks the triangle strip between two arbitrary endpoints
    fn walk_triangles(&self, s: &mut Vec<IVec3>, from: IVec3, to: IVec3) {
        let shape = &self.shape;
        let z = from.z;
        let (x0, y0, x1, y1) = (from.x, from.y, to.x, to.y);

        let sx = x1 - x0 < 0;
        let sy = y1 - y0 < 0;
        let ddx = (x1 - x0).abs();
        let ddy = (y1 - y0).abs();

        let start_x = x0 - if ddy < ddx { if sx { 2 } else { 0 } } else { 1 };
        let start_y = y0 - i32::from(sy);
        let end_x = x1 - if ddy < ddx { if sx { 0 } else { 2 } } else { 1 };
        let end_y = y1 - i32::from(!sy);

        let dx = (end_x - start_x).abs();
        let dy = (end_y - start_y).abs();

        let (mut x, mut y) = (start_x, start_y);
        let mut e = 0;
        check_site(s, shape, x, y, z);

        // Each step moves at most one triangle, so the walk never needs more
        // steps than the taxicab distance between the end triangles.
        let mut remaining = 4 * (dx + dy) + 8;

        while (x != end_x || y != end_y) && remaining > 0 {
            remaining -= 1;
            let even = (x + y) & 1 == 0;

            if e > 3 * dx {
                let (cx, cy) = match (sx, sy, even) {
                    (false, false, true) => (pre(&mut x, -1), post(&mut y, 1)),
                    (false, false, false) => (post(&mut x, -1), pre(&mut y, 1)),
                    (false, true, true) => (post(&mut x, -1), pre(&mut y, -1)),
                    (false, true, false) => (pre(&mut x, -1), post(&mut y, -1)),
                    (true, false, true) => (pre(&mut x, 1), post(&mut y, 1)),
                    (true, false, false) => (post(&mut x, 1), pre(&mut y, 1)),
                    (true, true, true) => (post(&mut x, 1), pre(&mut y, -1)),
                    (true, true, false) => (pre(&mut x, 1), post(&mut y, -1)),
                };
                check_site(s, shape, cx, cy, z);
                e -= 2 * dy + 2 * dx;
            } else if e >= 2 * dx {
                y += if sy { -1 } else { 1 };
                e -= 2 * dx;
            } else {
                e += 2 * dy;
                if e >= dx {
                    let (cx, cy) = match (sx, sy, even) {
                        (false, false, true) => (pre(&mut x, 1), post(&mut y, 1)),
                        (false, false, false) => (post(&mut x, 1), pre(&mut y, 1)),
                        (false, true, true) => (post(&mut x, 1), pre(&mut y, -1)),
                        (false, true, false) => (pre(&mut x, 1), post(&mut y, -1)),
                        (true, false, true) => (pre(&mut x, -1), post(&mut y, 1)),
                        (true, false, false) => (post(&mut x, -1), pre(&mut y, 1)),
                        (true, true, true) => (post(&mut x, -1), pre(&mut y, -1)),
                        (true, true, false) => (pre(&mut x, -1), post(&mut y, -1)),
                    };
                    check_site(s, shape, cx, cy, z);
                    e -= 2 * dx;
                } else {
                    x += if sx { -1 } else { 1 };
                }
            }

            check_site(s, shape, x, y, z);
        }
    }
}

impl SiteGeometry for TriGeometry {
    fn kind(&self) -> GeometryKind {
        GeometryKind::Tri
    }

    fn shape(&self) -> LatticeShape {
        self.shape
    }

    fn directions(&self) -> &'static [EdgeDirection] {
        &DIRECTIONS
    }

    fn single_directions(&self) -> &'static [EdgeDirection] {
        &DIRECTIONS
    }

    fn offset(&self, direction: EdgeDirection) -> IVec3 {
        match direction {
            UpLeft => IVec3::new(-1, -1, 0),
            UpRight => IVec3::new(1, -1, 0),
            Right => IVec3::new(2, 0, 0),
            DownRight => IVec3::new(1, 1, 0),
            DownLeft => IVec3::new(-1, 1, 0),
            Left => IVec3::new(-2, 0, 0),
            Up | Down | Undefined => IVec3::ZERO,
        }
    }

    fn root_offsets(&self, direction: EdgeDirection) -> [EdgeDirection; 2] {
        match direction {
            UpLeft => [UpRight, Left],
            UpRight => [Right, UpLeft],
            Right => [DownRight, UpRight],
            DownRight => [DownLeft, Right],
            DownLeft => [Left, DownRight],
            Left => [UpLeft, DownLeft],
            Up | Down | Undefined => [Undefined, Undefined],
        }
    }

    fn unit_direction(&self, dx: i32, dy: i32) -> EdgeDirection {
        if !(-2..=2).contains(&dx) || !(-1..=1).contains(&dy) {
            return Undefined;
        }
        DIRS[(dy + 1) as usize][(dx + 2) as usize]
    }

    fn check_node(&self, position: IVec3) -> bool {
        self.in_bounds(position.x, position.y)
    }

    fn length(&self, _from: IVec3, _to: IVec3, scale: i32) -> f64 {
        scale as f64 * self.edge_length
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
                check_site(&mut s, shape, x0 - 1, y0 + if sy { -(d + 1) } else { d }, z);
            }
        } else if y0 == y1 {
            for d in (0..dx).step_by(2) {
                let x = x0 + if sx { -(d + 2) } else { d };
                check_site(&mut s, shape, x, y0, z);
                check_site(&mut s, shape, x, y0 - 1, z);
            }
        } else if dx == 3 * dy {
            // 30 degree diagonals
            for d in (0..dx - 1).step_by(3) {
                let y = y0 + if sy { -(d / 3 + 1) } else { d / 3 };
                check_site(&mut s, shape, x0 + if sx { -(d + 2) } else { d }, y, z);
                check_site(&mut s, shape, x0 + if sx { -(d + 3) } else { d + 1 }, y, z);
            }
        } else if dx == dy {
            // 60 degree diagonals
            for d in 0..dx {
                let y = y0 + if sy { -(d + 1) } else { d };
                check_site(&mut s, shape, x0 + if sx { -(d + 2) } else { d }, y, z);
                check_site(&mut s, shape, x0 + if sx { -(d + 1) } else { d - 1 }, y, z);
            }
        } else {
            self.walk_triangles(&mut s, from, to);
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
                        (0, 4) | (5, 1) | (7, 1) => raw.push((from, IVec3::new(i + 2, j, k))),
                        (3, 3) | (4, 2) => raw.push((from, IVec3::new(i + 1, j - 1, k))),
                        (3, 5) | (4, 0) => raw.push((from, IVec3::new(i + 1, j + 1, k))),
                        (2, 4) => {
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
        let mut inlets = Vec::new();
        for k in (0..self.shape.height).step_by(2) {
            let x = INLET_COLUMNS[self.calc_offset(k) as usize];
            inlets.extend((0..=self.shape.width).map(|j| IVec3::new(x, j, k)));
        }
        inlets
    }

    fn pattern_cell(&self, position: IVec3) -> (i32, i32) {
        let offset = self.calc_offset(position.z);
        (
            self.calc_col(position.x, offset),
            self.calc_row(position.x, position.y, offset),
        )
    }

    fn pattern_split(&self) -> (i32, i32) {
        (2, 4)
    }

    fn root_site(&self, border: Border, percent: f64, edge_type: EdgeType, scale: i32) -> RootSite {
        let width = self.shape.width.div_euclid(scale);
        let length = self.coarse_length(scale);

        let (position, direction) = match border {
            Border::Left => {
                let c = round_half_up(width as f64 * percent);
                let x = if c % 2 == 0 { 0 } else { scale };
                (IVec3::new(x, c * scale, 0), Right)
            }
            Border::Right => {
                let c = round_half_up(width as f64 * percent);
                let off = match (length % 2 == 0, c % 2 == 0) {
                    (true, true) | (false, false) => 0,
                    _ => scale,
                };
                (IVec3::new(length * scale + off, c * scale, 0), Left)
            }
            Border::Top => {
                let mut c = round_half_up(length as f64 * percent);
                if c % 2 != 0 {
                    c += 1;
                }
                let direction = if c < (length + 1) / 2 { DownRight } else { DownLeft };
                (IVec3::new(c * scale, 0, 0), direction)
            }
            Border::Bottom => {
                let mut c = round_half_up(length as f64 * percent);
                // Parity follows the parity of the coarse width
                if (c % 2 == 0) != (width % 2 == 0) {
                    c += 1;
                }
                let direction = if c < (length + 1) / 2 { UpRight } else { UpLeft };
                (IVec3::new(c * scale, width * scale, 0), direction)
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
        let length = self.coarse_length(scale);

        match border {
            Border::Left | Border::Right => {
                let count = round_half_up(length as f64 * fraction / 2.0);
                let directions = if border == Border::Left {
                    [UpRight, Right, DownRight]
                } else {
                    [UpLeft, Left, DownLeft]
                };
                balanced_walk(count, &directions, 1, |d| self.offset(d), rng)
            }
            Border::Top | Border::Bottom => {
                let count = round_half_up(width as f64 * fraction);
                let directions = if border == Border::Top {
                    [DownRight, DownLeft]
                } else {
                    [UpRight, UpLeft]
                };

                let mut deviation = 0;
                let mut offsets = Vec::with_capacity(count.max(0) as usize);
                for _ in 0..count {
                    let direction = if deviation > 1 {
                        directions[1]
                    } else if deviation < -1 {
                        directions[0]
                    } else {
                        directions[rng.gen_range(0..2)]
                    };
                    offsets.push(direction);
                    deviation += self.offset(direction).x;
                }
                offsets
            }
        }
    }
}
