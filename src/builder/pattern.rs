//! Tessellated pattern layout.

use rand::Rng;

use crate::geometry::SiteGeometry;
use crate::graph::{Edge, EdgeId, EdgeType, Graph, NodeId};
use crate::hemodynamics::{
    calculate_flows, calculate_lengths, calculate_pressure, calculate_pressures, calculate_stresses,
    calculate_thicknesses, reverse_pressures, update_radii, RadiusMode,
};

/// Cells from a lattice border inside which the pattern is left open at the
/// split cell
const SPLIT_BORDER_MARGIN: i32 = 3;

/// Builds the pattern network: tessellate, prune unreachable edges, size
/// radii, anchor roots, merge collinear runs and solve hemodynamics.
pub fn pattern_network(geometry: &dyn SiteGeometry, rng: &mut impl Rng) -> Graph {
    let mut graph = Graph::new();
    for pattern in geometry.pattern_edges() {
        if graph.has_edge(pattern.from, pattern.to) {
            continue;
        }
        let from = graph.ensure_node(pattern.from);
        let to = graph.ensure_node(pattern.to);
        graph.add_edge(Edge::with_scale(from, to, pattern.edge_type, 1));
    }

    for inlet in geometry.pattern_inlets() {
        if let Some(node) = graph.node_at(inlet) {
            visit(&mut graph, geometry, node);
        }
    }

    for id in graph.edge_ids() {
        if graph[id].visited {
            graph[id].perfused = true;
        } else {
            graph.remove_edge(id);
        }
    }

    let caps = graph.edges_of_type(&[EdgeType::Capillary]);
    update_radii(&mut graph, &caps, RadiusMode::UpstreamPattern, rng);
    update_radii(&mut graph, &caps, RadiusMode::DownstreamPattern, rng);

    for id in graph.edge_ids() {
        let edge = &graph[id];
        let (from, to, radius, category) = (edge.from, edge.to, edge.radius_um, edge.category());
        let root = match edge.edge_type {
            EdgeType::Artery if graph.in_degree(from) == 0 => Some(from),
            EdgeType::Vein if graph.out_degree(to) == 0 => Some(to),
            _ => None,
        };
        if let Some(node) = root {
            graph[node].pressure_mmHg = calculate_pressure(radius, category);
            graph[node].is_root = true;
        }
    }

    calculate_lengths(&mut graph, geometry, 1);
    merge_collinear(&mut graph, geometry);

    calculate_pressures(&mut graph);
    if reverse_pressures(&mut graph) {
        calculate_pressures(&mut graph);
    }
    calculate_thicknesses(&mut graph);
    calculate_stresses(&mut graph);
    calculate_flows(&mut graph);

    graph
}

/// Depth-first marking of edges reachable from `start`.
///
/// At the split cell, edges heading toward a nearby lattice border are left
/// unmarked so the incomplete cells along that border fall away.
fn visit(graph: &mut Graph, geometry: &dyn SiteGeometry, start: NodeId) {
    let width = geometry.shape().width;
    let split = geometry.pattern_split();
    let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];

    while let Some(frame) = stack.last_mut() {
        let (node, index) = *frame;
        let Some(id) = graph.edges_out(node).get(index).copied() else {
            stack.pop();
            continue;
        };
        frame.1 += 1;

        if graph[id].visited {
            continue;
        }

        let position = graph.position(node);
        if geometry.pattern_cell(position) == split {
            let j = position.y;
            let dy = graph.position(graph[id].to).y - j;
            if (dy > 0 && j > width - SPLIT_BORDER_MARGIN) || (dy < 0 && j < SPLIT_BORDER_MARGIN) {
                continue;
            }
        }

        graph[id].visited = true;
        stack.push((graph[id].to, 0));
    }
}

/// Joins runs of same-type edges that continue in the same direction
fn merge_collinear(graph: &mut Graph, geometry: &dyn SiteGeometry) -> usize {
    let direction_of = |graph: &Graph, id: EdgeId| {
        let edge = &graph[id];
        geometry.direction(graph.position(edge.from), graph.position(edge.to), edge.scale)
    };

    graph.merge_nodes(
        |graph, first, second| {
            graph[first].edge_type == graph[second].edge_type
                && direction_of(graph, first) == direction_of(graph, second)
        },
        |first, second| {
            let mut joined = Edge::with_scale(first.from, second.to, first.edge_type, first.scale + second.scale);
            joined.length_um = first.length_um + second.length_um;
            joined.radius_um = (first.radius_um + second.radius_um) / 2.0;
            joined.perfused = true;
            joined
        },
    )
}
