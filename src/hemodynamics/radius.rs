//! Radius propagation from capillaries with Murray's law.
//!
//! Seeded edges get the capillary radius, then radii spread level by level
//! through the graph. At a branch the unknown radius solves
//! `parent^k = child1^k + child2^k`; pass-through edges copy their neighbour.

use std::collections::HashSet;

use rand::Rng;

use super::{CAP_RADIUS, CAP_RADIUS_MIN, DELTA_TOLERANCE, MURRAY_EXPONENT};
use crate::graph::{EdgeCategory, EdgeId, Graph};

/// Traversal direction relative to flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upstream,
    Downstream,
}

/// Which edges a radius pass walks through and how it assigns them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusMode {
    /// Upstream through every edge
    UpstreamAll,
    /// Upstream, keeping only artery-category edges on the frontier
    UpstreamArteries,
    /// Downstream, keeping only vein-category edges on the frontier
    DownstreamVeins,
    /// Upstream over the pattern layout, copying radii at splits
    UpstreamPattern,
    /// Downstream over the pattern layout, copying radii at splits
    DownstreamPattern,
}

impl RadiusMode {
    fn direction(self) -> Direction {
        match self {
            RadiusMode::UpstreamAll | RadiusMode::UpstreamArteries | RadiusMode::UpstreamPattern => {
                Direction::Upstream
            }
            RadiusMode::DownstreamVeins | RadiusMode::DownstreamPattern => Direction::Downstream,
        }
    }

    /// In and out degree of a junction where the walk fans out
    fn split_degrees(self) -> (usize, usize) {
        match self.direction() {
            Direction::Upstream => (2, 1),
            Direction::Downstream => (1, 2),
        }
    }

    fn frontier_category(self) -> Option<EdgeCategory> {
        match self {
            RadiusMode::UpstreamAll => None,
            RadiusMode::UpstreamArteries | RadiusMode::UpstreamPattern => Some(EdgeCategory::Artery),
            RadiusMode::DownstreamVeins | RadiusMode::DownstreamPattern => Some(EdgeCategory::Vein),
        }
    }

    fn is_pattern(self) -> bool {
        matches!(self, RadiusMode::UpstreamPattern | RadiusMode::DownstreamPattern)
    }
}

/// Edges adjacent to `edge` in the walk direction
fn neighbours(graph: &Graph, edge: EdgeId, direction: Direction) -> Vec<EdgeId> {
    match direction {
        Direction::Upstream => graph.edges_in(graph[edge].from),
        Direction::Downstream => graph.edges_out(graph[edge].to),
    }
}

/// Junction between `edge` and a neighbour, seen from the neighbour
fn junction_degrees(graph: &Graph, neighbour: EdgeId, direction: Direction) -> (usize, usize) {
    let node = match direction {
        Direction::Upstream => graph[neighbour].to,
        Direction::Downstream => graph[neighbour].from,
    };
    (graph.in_degree(node), graph.out_degree(node))
}

/// Edges on the far side of a merging junction
fn merge_partners(graph: &Graph, neighbour: EdgeId, direction: Direction) -> Vec<EdgeId> {
    match direction {
        Direction::Upstream => graph.edges_out(graph[neighbour].to),
        Direction::Downstream => graph.edges_in(graph[neighbour].from),
    }
}

fn murray_sum(r1: f64, r2: f64) -> f64 {
    (r1.powf(MURRAY_EXPONENT) + r2.powf(MURRAY_EXPONENT)).powf(1.0 / MURRAY_EXPONENT)
}

/// Radius of the unknown branch given the parent and the known sibling
fn solve_branch(parent: f64, known: f64) -> f64 {
    let (large, small) = if parent > known {
        (parent, known)
    } else if parent < known {
        (known, parent)
    } else {
        return known;
    };

    let mut radius = (large.powf(MURRAY_EXPONENT) - small.powf(MURRAY_EXPONENT)).powf(1.0 / MURRAY_EXPONENT);
    if (radius - small).abs() < DELTA_TOLERANCE {
        radius = small;
    }
    radius.max(CAP_RADIUS_MIN)
}

fn set_radius(graph: &mut Graph, edge: EdgeId, radius: f64, progress: &mut bool) {
    if graph[edge].radius_um != radius {
        graph[edge].radius_um = radius;
        *progress = true;
    }
}

/// Propagates radii one step away from `edge` with the conservation rule.
///
/// Returns the edges to continue from; an edge that still lacks a radius
/// returns only itself so it is revisited once its neighbours resolve.
fn calculate_radius(graph: &mut Graph, edge: EdgeId, mode: RadiusMode, progress: &mut bool) -> Vec<EdgeId> {
    let direction = mode.direction();
    let (split_in, split_out) = mode.split_degrees();
    let list = neighbours(graph, edge, direction);

    if list.is_empty() || graph[edge].visited {
        return Vec::new();
    }

    let radius = graph[edge].radius_um;
    let mut children = Vec::with_capacity(list.len());

    for &e in &list {
        let (inputs, outputs) = junction_degrees(graph, e, direction);

        if inputs == 1 && outputs == 1 && radius != 0.0 {
            set_radius(graph, e, radius, progress);
        } else if inputs == split_in && outputs == split_out && list.len() >= 2 {
            let r1 = graph[list[0]].radius_um;
            let r2 = graph[list[1]].radius_um;
            if graph[e].radius_um == 0.0 && radius != 0.0 {
                let solved = if r1 == 0.0 && r2 != 0.0 {
                    solve_branch(radius, r2)
                } else if r1 != 0.0 && r2 == 0.0 {
                    solve_branch(radius, r1)
                } else {
                    (radius / 2f64.powf(1.0 / MURRAY_EXPONENT)).max(CAP_RADIUS_MIN)
                };
                set_radius(graph, e, solved, progress);
            }
        } else if inputs == split_out && outputs == split_in {
            let partners = merge_partners(graph, e, direction);
            if partners.len() >= 2 {
                let r1 = graph[partners[0]].radius_um;
                let r2 = graph[partners[1]].radius_um;
                if r1 != 0.0 && r2 != 0.0 {
                    set_radius(graph, e, murray_sum(r1, r2), progress);
                }
            }
        }

        children.push(e);
    }

    if radius == 0.0 {
        children.clear();
        children.push(edge);
    } else {
        graph[edge].visited = true;
        *progress = true;
    }

    children
}

/// Propagates radii without solving splits; both branches copy the parent
fn assign_radius(graph: &mut Graph, edge: EdgeId, mode: RadiusMode, progress: &mut bool) -> Vec<EdgeId> {
    let direction = mode.direction();
    let (split_in, split_out) = mode.split_degrees();
    let list = neighbours(graph, edge, direction);

    if list.is_empty() {
        return Vec::new();
    }

    let radius = graph[edge].radius_um;
    let mut children = Vec::with_capacity(list.len());

    for &e in &list {
        let (inputs, outputs) = junction_degrees(graph, e, direction);

        if (inputs == 1 && outputs == 1 && radius != 0.0) || (inputs == split_in && outputs == split_out) {
            set_radius(graph, e, radius, progress);
        } else if inputs == split_out && outputs == split_in {
            let partners = merge_partners(graph, e, direction);
            if partners.len() >= 2 {
                let r1 = graph[partners[0]].radius_um;
                let r2 = graph[partners[1]].radius_um;
                if r1 != 0.0 && r2 != 0.0 {
                    set_radius(graph, e, murray_sum(r1, r2), progress);
                }
            }
        }

        children.push(e);
    }

    if !graph[edge].visited {
        graph[edge].visited = true;
        *progress = true;
    }

    children
}

/// Seeds `seeds` with the capillary radius and propagates radii through the
/// graph in the direction given by `mode`.
///
/// Pattern modes draw each seed radius from `CAP_RADIUS·U[0.5, 1.5)`.
pub fn update_radii<R: Rng + ?Sized>(graph: &mut Graph, seeds: &[EdgeId], mode: RadiusMode, rng: &mut R) {
    for id in graph.edge_ids() {
        graph[id].visited = false;
    }

    for &id in seeds {
        let mut radius = CAP_RADIUS;
        if mode.is_pattern() {
            radius *= rng.gen::<f64>() + 0.5;
        }
        graph[id].radius_um = radius;
    }

    let category = mode.frontier_category();
    let max_passes = 2 * (graph.edge_count() + 1);
    let mut current: Vec<EdgeId> = seeds.to_vec();
    let mut passes = 0;

    while !current.is_empty() && passes < max_passes {
        let mut next = Vec::new();
        let mut seen = HashSet::new();
        let mut progress = false;

        for &edge in &current {
            let children = if mode.is_pattern() {
                assign_radius(graph, edge, mode, &mut progress)
            } else {
                calculate_radius(graph, edge, mode, &mut progress)
            };
            for child in children {
                let keep = category.map_or(true, |c| graph[child].category() == c);
                if keep && seen.insert(child) {
                    next.push(child);
                }
            }
        }

        // Edges waiting on a radius that can no longer arrive
        if !progress && next == current {
            log::debug!("Radius propagation stalled with {} pending edges", next.len());
            break;
        }

        passes += 1;
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeLevel, EdgeType};
    use glam::IVec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn p(x: i32, y: i32) -> IVec3 {
        IVec3::new(x, y, 0)
    }

    #[test]
    fn test_solve_branch() {
        let r = solve_branch(10.0, 8.0);
        assert!((r.powi(3) + 512.0 - 1000.0).abs() < 1e-9);
        assert_eq!(solve_branch(5.0, 5.0), 5.0);
        // Known sibling larger than parent: roles swap
        let r = solve_branch(8.0, 10.0);
        assert!((r.powi(3) + 512.0 - 1000.0).abs() < 1e-9);
        // Floor
        assert_eq!(solve_branch(4.0, 3.999), CAP_RADIUS_MIN);
    }

    /// Artery root feeding a split into two capillaries
    #[test]
    fn test_upstream_merge_obeys_murray() {
        let mut g = Graph::new();
        let parent = g.connect(p(0, 0), p(4, 0), EdgeType::Artery, EdgeLevel::Level1);
        let c1 = g.connect(p(4, 0), p(8, 0), EdgeType::Capillary, EdgeLevel::Level1);
        let c2 = g.connect(p(4, 0), p(4, 4), EdgeType::Capillary, EdgeLevel::Level1);

        let mut rng = StdRng::seed_from_u64(1);
        update_radii(&mut g, &[c1, c2], RadiusMode::UpstreamAll, &mut rng);

        assert_eq!(g[c1].radius_um, CAP_RADIUS);
        let expected = murray_sum(CAP_RADIUS, CAP_RADIUS);
        assert!((g[parent].radius_um - expected).abs() < 1e-12);
        assert!((g[parent].radius_um.powi(3) - 2.0 * CAP_RADIUS.powi(3)).abs() < 1e-9);
    }

    /// Vein collecting two capillaries, walked downstream
    #[test]
    fn test_downstream_veins() {
        let mut g = Graph::new();
        let c1 = g.connect(p(0, 0), p(4, 4), EdgeType::Capillary, EdgeLevel::Level1);
        let c2 = g.connect(p(8, 0), p(4, 4), EdgeType::Capillary, EdgeLevel::Level1);
        let v1 = g.connect(p(4, 4), p(4, 8), EdgeType::Vein, EdgeLevel::Level1);
        let v2 = g.connect(p(4, 8), p(4, 12), EdgeType::Vein, EdgeLevel::Level1);

        let mut rng = StdRng::seed_from_u64(1);
        update_radii(&mut g, &[c1, c2], RadiusMode::DownstreamVeins, &mut rng);

        let expected = murray_sum(CAP_RADIUS, CAP_RADIUS);
        assert!((g[v1].radius_um - expected).abs() < 1e-12);
        assert!((g[v2].radius_um - expected).abs() < 1e-12);
    }

    /// Walking upstream into a split solves the unknown sibling
    #[test]
    fn test_upstream_split_solves_sibling() {
        let mut g = Graph::new();
        let a = g.connect(p(0, 0), p(4, 0), EdgeType::Artery, EdgeLevel::Level1);
        let b = g.connect(p(8, 0), p(4, 0), EdgeType::Artery, EdgeLevel::Level1);
        let child = g.connect(p(4, 0), p(4, 4), EdgeType::Capillary, EdgeLevel::Level1);
        g[a].radius_um = 3.0;

        // `a` keeps its preset radius; only seeds are overwritten
        let mut rng = StdRng::seed_from_u64(1);
        update_radii(&mut g, &[child], RadiusMode::UpstreamAll, &mut rng);

        let solved = g[b].radius_um;
        assert!((solved.powi(3) + 27.0 - CAP_RADIUS.powi(3)).abs() < 1e-9, "b = {}", solved);
    }

    #[test]
    fn test_pattern_seed_variation() {
        let mut g = Graph::new();
        let a = g.connect(p(0, 0), p(1, 0), EdgeType::Artery, EdgeLevel::Variable);
        let c = g.connect(p(1, 0), p(2, 0), EdgeType::Capillary, EdgeLevel::Variable);

        let mut rng = StdRng::seed_from_u64(7);
        update_radii(&mut g, &[c], RadiusMode::UpstreamPattern, &mut rng);

        let r = g[c].radius_um;
        assert!(r >= 0.5 * CAP_RADIUS && r < 1.5 * CAP_RADIUS);
        assert_eq!(g[a].radius_um, r);
    }

    #[test]
    fn test_unresolvable_edge_terminates() {
        // Crossing junction (two in, two out) that no rule resolves
        let mut g = Graph::new();
        let f = g.connect(p(0, 0), p(4, 0), EdgeType::Artery, EdgeLevel::Level1);
        let e = g.connect(p(4, 0), p(8, 0), EdgeType::Artery, EdgeLevel::Level1);
        g.connect(p(12, 0), p(8, 0), EdgeType::Artery, EdgeLevel::Level1);
        let seed = g.connect(p(8, 0), p(8, 4), EdgeType::Capillary, EdgeLevel::Level1);
        g.connect(p(8, 0), p(12, 4), EdgeType::Capillary, EdgeLevel::Level1);

        let mut rng = StdRng::seed_from_u64(3);
        update_radii(&mut g, &[seed], RadiusMode::UpstreamAll, &mut rng);

        assert_eq!(g[seed].radius_um, CAP_RADIUS);
        assert_eq!(g[e].radius_um, 0.0);
        assert_eq!(g[f].radius_um, 0.0);
    }
}
