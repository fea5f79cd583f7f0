//! Recomputing hemodynamics after structural edits.

use std::collections::HashMap;

use super::{calculate_flows, calculate_pressures, calculate_stresses, reverse_pressures, MAX_STATE_ITERATIONS};
use crate::graph::{EdgeId, Graph, NodeId};

/// True if any edge carries flow against its direction
pub fn has_negative_flow(graph: &Graph) -> bool {
    graph.edges().any(|(_, e)| e.flow_um3_per_min < 0.0)
}

/// Solves pressures and flows until no edge runs backwards.
///
/// Returns the number of passes taken, at most `MAX_STATE_ITERATIONS`.
pub fn calculate_current_state(graph: &mut Graph) -> usize {
    let mut passes = 0;
    loop {
        calculate_pressures(graph);
        if reverse_pressures(graph) {
            calculate_pressures(graph);
        }
        calculate_flows(graph);
        calculate_stresses(graph);
        passes += 1;

        if !has_negative_flow(graph) {
            break;
        }
        if passes >= MAX_STATE_ITERATIONS {
            log::info!("Negative flow persists after {} passes", passes);
            break;
        }
        log::info!("Negative flow detected, recalculating");
    }
    passes
}

/// Ignores dead-end branches left behind by removed edges, then re-solves.
///
/// Leaf edges (a non-root end with nothing beyond it) are marked ignored
/// and their end pressures invalidated, repeatedly, until none remain.
/// Nodes left without a pressure lose their oxygen value too.
pub fn update_graph(graph: &mut Graph) {
    let mut active = graph.edge_ids();

    loop {
        let mut degrees: HashMap<NodeId, (usize, usize)> = HashMap::new();
        for &id in &active {
            degrees.entry(graph[id].from).or_default().1 += 1;
            degrees.entry(graph[id].to).or_default().0 += 1;
        }
        let in_degree = |n: NodeId| degrees.get(&n).map_or(0, |d| d.0);
        let out_degree = |n: NodeId| degrees.get(&n).map_or(0, |d| d.1);

        let mut leaves: Vec<EdgeId> = Vec::new();
        let mut kept: Vec<EdgeId> = Vec::new();
        for &id in &active {
            let edge = &graph[id];
            if edge.ignored {
                continue;
            }
            let dangling_to = out_degree(edge.to) == 0 && !graph[edge.to].is_root;
            let dangling_from = in_degree(edge.from) == 0 && !graph[edge.from].is_root;
            if dangling_to || dangling_from {
                leaves.push(id);
            } else {
                kept.push(id);
            }
        }

        if leaves.is_empty() {
            break;
        }

        for id in leaves {
            let (from, to) = (graph[id].from, graph[id].to);
            graph[id].ignored = true;
            graph[from].pressure_mmHg = f64::NAN;
            graph[to].pressure_mmHg = f64::NAN;
        }
        active = kept;
    }

    calculate_current_state(graph);

    for node in graph.connected_nodes() {
        if graph[node].pressure_mmHg.is_nan() {
            graph[node].oxygen_mmHg = f64::NAN;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeLevel, EdgeType};
    use crate::hemodynamics::thickness;
    use glam::IVec3;

    fn p(x: i32, y: i32) -> IVec3 {
        IVec3::new(x, y, 0)
    }

    /// Root to root chain with a dead-end spur hanging off the middle
    fn spur_graph() -> (Graph, EdgeId, EdgeId) {
        let mut g = Graph::new();
        for (from, to) in [(p(0, 0), p(4, 0)), (p(4, 0), p(8, 0)), (p(8, 0), p(12, 0))] {
            g.connect(from, to, EdgeType::Capillary, EdgeLevel::Level1);
        }
        let spur = g.connect(p(4, 0), p(4, 4), EdgeType::Capillary, EdgeLevel::Level1);
        let tail = g.connect(p(4, 4), p(4, 8), EdgeType::Capillary, EdgeLevel::Level1);
        for id in g.edge_ids() {
            g[id].radius_um = 4.0;
            g[id].length_um = 120.0;
            g[id].wall_um = thickness(4.0);
        }
        let inlet = g.node_at(p(0, 0)).unwrap();
        let outlet = g.node_at(p(12, 0)).unwrap();
        g[inlet].is_root = true;
        g[inlet].pressure_mmHg = 70.0;
        g[outlet].is_root = true;
        g[outlet].pressure_mmHg = 20.0;
        (g, spur, tail)
    }

    #[test]
    fn test_update_graph_ignores_dead_branches() {
        let (mut g, spur, tail) = spur_graph();
        update_graph(&mut g);

        assert!(g[spur].ignored);
        assert!(g[tail].ignored);
        assert!(g[g[tail].to].oxygen_mmHg.is_nan());
        assert_eq!(g.edges().filter(|(_, e)| !e.ignored).count(), 3);

        for (_, e) in g.edges().filter(|(_, e)| !e.ignored) {
            assert!(e.flow_um3_per_min > 0.0);
        }
        assert!(!has_negative_flow(&g));
    }

    #[test]
    fn test_current_state_reverses_backward_edges() {
        let (mut g, spur, tail) = spur_graph();
        g.remove_edge(spur);
        g.remove_edge(tail);
        let middle = g.edge_ids()[1];
        g.reverse_edge(middle);

        let passes = calculate_current_state(&mut g);
        assert!(passes <= MAX_STATE_ITERATIONS);
        assert!(g.has_edge(p(4, 0), p(8, 0)));
        assert!(!has_negative_flow(&g));
    }
}
