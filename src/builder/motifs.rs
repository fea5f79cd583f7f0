//! Stochastic growth primitives: roots, motifs, capillary segments and
//! same-type connections.
//!
//! Every primitive only claims lattice nodes that lie inside the lattice
//! and, where it creates a new junction, nodes that no edge touches yet.
//! Segments and connections join existing nodes and refuse to raise any
//! node above degree 3.

use std::collections::{HashSet, VecDeque};

use glam::IVec3;
use rand::seq::SliceRandom;
use rand::Rng;

use super::layout::RootPlan;
use super::{GrowthReport, MOTIF_STALL_LIMIT};
use crate::geometry::{EdgeDirection, SiteGeometry};
use crate::graph::{EdgeId, EdgeLevel, EdgeType, Graph, NodeId};
use crate::hemodynamics::CAP_RADIUS_MAX;

/// Shape of structure grown off a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motif {
    /// One edge that forks into two leaves
    Triple,
    /// One edge followed by a single leaf
    Double,
    /// A single edge
    Single,
}

/// Highest total degree any node may reach through segments and connections
const MAX_DEGREE: usize = 3;

fn is_free(graph: &Graph, geometry: &dyn SiteGeometry, position: IVec3) -> bool {
    geometry.check_node(position) && graph.degree_at(position) == 0
}

/// Direction of an edge at the given level
pub(crate) fn edge_direction(graph: &Graph, geometry: &dyn SiteGeometry, edge: EdgeId, level: EdgeLevel) -> EdgeDirection {
    let from = graph.position(graph[edge].from);
    let to = graph.position(graph[edge].to);
    geometry.direction(from, to, level.scale())
}

/// Places a root edge and its first leaves.
///
/// Returns the leaf edges to grow from; nothing is added when the root edge
/// itself cannot be placed.
pub fn add_root(graph: &mut Graph, geometry: &dyn SiteGeometry, plan: &RootPlan, rng: &mut impl Rng) -> Vec<EdgeId> {
    let level = EdgeLevel::Level1;
    let scale = level.scale();
    let edge_type = plan.site.edge_type;
    let node0 = plan.site.position;
    let node1 = geometry.offset_node(node0, plan.site.direction, scale);

    let placeable = is_free(graph, geometry, node0)
        && is_free(graph, geometry, node1)
        && geometry.check_cross(graph, node0, node1, scale);
    if !placeable {
        return Vec::new();
    }
    graph.connect(node0, node1, edge_type, level);

    let mut leaves = Vec::new();
    match &plan.offsets {
        None => {
            for offset in geometry.root_offsets(plan.site.direction) {
                let node2 = geometry.offset_node(node1, offset, scale);
                if is_free(graph, geometry, node2) && geometry.check_cross(graph, node1, node2, scale) {
                    leaves.push(graph.connect(node1, node2, edge_type, level));
                }
            }
        }
        Some(offsets) => {
            let mut current = node1;
            let mut line = Vec::new();
            for &offset in offsets {
                let next = geometry.offset_node(current, offset, scale);
                if is_free(graph, geometry, next) && geometry.check_cross(graph, current, next, scale) {
                    line.push(graph.connect(current, next, edge_type, level));
                    current = next;
                }
            }

            line.shuffle(rng);
            for edge in line {
                let to = graph.position(graph[edge].to);
                leaves.extend(add_motif(graph, geometry, to, edge, edge_type, level, Motif::Triple, rng));
            }
        }
    }

    leaves
}

/// Grows one motif from `node0` in a random direction that does not double
/// back on `edge0`.
///
/// Returns the new leaf edges, or `edge0` alone if the motif did not fit.
#[allow(clippy::too_many_arguments)]
pub fn add_motif(
    graph: &mut Graph,
    geometry: &dyn SiteGeometry,
    node0: IVec3,
    edge0: EdgeId,
    edge_type: EdgeType,
    level: EdgeLevel,
    motif: Motif,
    rng: &mut impl Rng,
) -> Vec<EdgeId> {
    let scale = level.scale();
    let back = edge_direction(graph, geometry, edge0, level).reverse();
    let choices: Vec<EdgeDirection> = geometry.directions().iter().copied().filter(|&d| d != back).collect();
    let Some(&direction) = choices.choose(rng) else {
        return vec![edge0];
    };

    let [left, right] = geometry.root_offsets(direction);
    let node1 = geometry.offset_node(node0, direction, scale);
    let node2 = geometry.offset_node(node1, left, scale);
    let node3 = geometry.offset_node(node1, right, scale);

    let stem_fits = geometry.check_node(node0)
        && is_free(graph, geometry, node1)
        && geometry.check_cross(graph, node0, node1, scale);
    let leaf_fits = |graph: &Graph, node: IVec3| is_free(graph, geometry, node) && geometry.check_cross(graph, node1, node, scale);

    match motif {
        Motif::Triple => {
            if stem_fits && leaf_fits(graph, node2) && leaf_fits(graph, node3) {
                graph.connect(node0, node1, edge_type, level);
                let a = graph.connect(node1, node2, edge_type, level);
                let b = graph.connect(node1, node3, edge_type, level);
                return vec![a, b];
            }
        }
        Motif::Double => {
            if stem_fits {
                let options: Vec<IVec3> = [node2, node3].into_iter().filter(|&n| leaf_fits(graph, n)).collect();
                if let Some(&leaf) = options.choose(rng) {
                    graph.connect(node0, node1, edge_type, level);
                    return vec![graph.connect(node1, leaf, edge_type, level)];
                }
            }
        }
        Motif::Single => {
            if geometry.single_directions().contains(&direction) && stem_fits {
                return vec![graph.connect(node0, node1, edge_type, level)];
            }
        }
    }

    vec![edge0]
}

/// Grows motifs off every leaf in `leaves`, round after round.
///
/// A round that leaves the number of active leaves unchanged counts toward
/// the stall limit and a round that changes it counts against; growth stops
/// at the limit or when no leaves remain. Returns the final leaves.
pub fn add_motifs(
    graph: &mut Graph,
    geometry: &dyn SiteGeometry,
    leaves: Vec<EdgeId>,
    level: EdgeLevel,
    motif: Motif,
    rng: &mut impl Rng,
    report: &mut GrowthReport,
) -> Vec<EdgeId> {
    let mut stalls: i64 = 0;
    let mut leaves = leaves;

    while stalls < MOTIF_STALL_LIMIT {
        if leaves.is_empty() {
            break;
        }

        let mut next = Vec::with_capacity(leaves.len());
        for &edge in &leaves {
            let node = graph.position(graph[edge].to);
            let edge_type = graph[edge].edge_type;
            next.extend(add_motif(graph, geometry, node, edge, edge_type, level, motif, rng));
        }

        if next.len() == leaves.len() {
            stalls += 1;
        } else {
            stalls -= 1;
        }
        report.motif_rounds += 1;
        report.motif_stalls_max = report.motif_stalls_max.max(stalls);

        leaves = next;
        leaves.shuffle(rng);
    }

    leaves
}

/// True if a directed path leads from `start` to `end`
fn reaches(graph: &Graph, start: NodeId, end: NodeId) -> bool {
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        if node == end {
            return true;
        }
        for e in graph.edges_out(node) {
            if seen.insert(graph[e].to) {
                queue.push_back(graph[e].to);
            }
        }
    }
    false
}

/// Joins an artery end at `node0` to neighbouring small veins with
/// capillaries
pub fn add_segment(
    graph: &mut Graph,
    geometry: &dyn SiteGeometry,
    node0: IVec3,
    direction: EdgeDirection,
    level: EdgeLevel,
    rng: &mut impl Rng,
) {
    let scale = level.scale();
    let small_vein = |e: EdgeId| graph[e].edge_type == EdgeType::Vein && graph[e].radius_um <= CAP_RADIUS_MAX;

    let mut options: Vec<IVec3> = Vec::new();
    for &offset in geometry.directions() {
        if offset == direction.reverse() {
            continue;
        }
        let node1 = geometry.offset_node(node0, offset, scale);
        if !geometry.check_node(node1) {
            continue;
        }
        let Some(id) = graph.node_at(node1) else { continue };

        let out_ok = match graph.edges_out(id).as_slice() {
            [e] => small_vein(*e) && !graph[graph[*e].from].is_root,
            _ => false,
        };
        let in_ok = match graph.edges_in(id).as_slice() {
            [e] => small_vein(*e) && !graph[graph[*e].to].is_root,
            _ => false,
        };
        if out_ok || in_ok {
            options.push(node1);
        }
    }

    options.shuffle(rng);
    for node1 in options {
        if graph.degree_at(node0) < MAX_DEGREE
            && graph.degree_at(node1) < MAX_DEGREE
            && geometry.check_cross(graph, node0, node1, scale)
        {
            graph.connect(node0, node1, EdgeType::Capillary, level);
        }
    }
}

/// Joins a dead end at `node0` to a neighbouring pass-through node of the
/// same type with an arteriole or venule, unless that would close a loop
#[allow(clippy::too_many_arguments)]
pub fn add_connection(
    graph: &mut Graph,
    geometry: &dyn SiteGeometry,
    node0: IVec3,
    direction: EdgeDirection,
    edge_type: EdgeType,
    level: EdgeLevel,
    rng: &mut impl Rng,
) {
    let scale = level.scale();
    let connection_type = if edge_type == EdgeType::Artery {
        EdgeType::Arteriole
    } else {
        EdgeType::Venule
    };
    let Some(start) = graph.node_at(node0) else { return };
    let matches = |e: EdgeId| graph[e].edge_type == edge_type && graph[e].radius_um <= CAP_RADIUS_MAX;

    let mut options: Vec<IVec3> = Vec::new();
    for &offset in geometry.directions() {
        if offset == direction.reverse() {
            continue;
        }
        let node1 = geometry.offset_node(node0, offset, scale);
        if !geometry.check_node(node1) {
            continue;
        }
        let Some(id) = graph.node_at(node1) else { continue };

        if let ([out], [inbound]) = (graph.edges_out(id).as_slice(), graph.edges_in(id).as_slice()) {
            if matches(*out) && matches(*inbound) && !reaches(graph, id, start) {
                options.push(node1);
            }
        }
    }

    options.shuffle(rng);
    for node1 in options {
        if graph.degree_at(node0) < MAX_DEGREE
            && graph.degree_at(node1) < MAX_DEGREE
            && !graph.has_edge(node0, node1)
            && geometry.check_cross(graph, node0, node1, scale)
        {
            graph.connect(node0, node1, connection_type, level);
        }
    }
}

/// Adds capillary segments off artery dead ends and artery pass-through
/// nodes, visiting edges in random order
pub fn add_segments(graph: &mut Graph, geometry: &dyn SiteGeometry, level: EdgeLevel, rng: &mut impl Rng) {
    let mut edges = graph.edge_ids();
    edges.shuffle(rng);

    for id in edges {
        if graph[id].edge_type != EdgeType::Artery {
            continue;
        }
        let to = graph[id].to;
        let (inbound, outbound) = (graph.in_degree(to), graph.out_degree(to));
        if outbound == 0 || (inbound == 1 && outbound == 1) {
            let direction = edge_direction(graph, geometry, id, level);
            let node0 = graph.position(to);
            add_segment(graph, geometry, node0, direction, level, rng);
        }
    }
}

/// Adds arteriole and venule connections off artery and vein ends, visiting
/// edges in random order
pub fn add_connections(graph: &mut Graph, geometry: &dyn SiteGeometry, level: EdgeLevel, rng: &mut impl Rng) {
    let mut edges = graph.edge_ids();
    edges.shuffle(rng);

    for id in edges {
        let edge_type = graph[id].edge_type;
        if edge_type != EdgeType::Artery && edge_type != EdgeType::Vein {
            continue;
        }

        let to = graph[id].to;
        let same = |e: &EdgeId| graph[*e].edge_type == edge_type;
        let eligible = match (graph.edges_in(to).as_slice(), graph.edges_out(to).as_slice()) {
            ([_], []) => true,
            ([inbound], [outbound]) => same(inbound) && same(outbound),
            ([a, b], []) => same(a) && same(b),
            _ => false,
        };

        if eligible {
            let direction = edge_direction(graph, geometry, id, level);
            let node0 = graph.position(to);
            add_connection(graph, geometry, node0, direction, edge_type, level, rng);
        }
    }
}
