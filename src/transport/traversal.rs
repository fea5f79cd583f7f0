//! Breadth-first propagation of blood composition from the inlets.
//!
//! For ordinary molecules every edge receives the fraction of the source
//! concentration it carries. For oxygen every node receives the partial
//! pressure that balances the oxygen mass entering it.
//!
//! A node is only resolved once all of its inflow is known; until then it
//! re-enters the frontier. Cycles and fragments left by earlier edits can
//! keep the frontier from shrinking, so a stalled traversal prunes weak
//! edges and restarts from the inlets.

use std::collections::HashSet;

use super::{is_oxygen, MAX_TRAVERSAL_STALLS, MIN_INLET_SHARE, MIN_TRAVERSAL_FLOW};
use crate::graph::{EdgeId, Graph, NodeId};
use crate::hemodynamics::solver::bisection;
use crate::hemodynamics::{inlet_partial_pressure, total_oxygen, update_graph, MAX_OXYGEN_PARTIAL_PRESSURE};

/// Counters from one traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalReport {
    /// Frontier iterations run
    pub iterations: usize,
    /// Restarts from the inlets after a stall
    pub restarts: usize,
    /// Edges removed to unblock the traversal
    pub removed: usize,
}

/// Insertion-ordered node set
#[derive(Debug, Clone, Default)]
struct Frontier {
    nodes: Vec<NodeId>,
    seen: HashSet<NodeId>,
}

impl Frontier {
    fn extend(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        for node in nodes {
            if self.seen.insert(node) {
                self.nodes.push(node);
            }
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Propagates `code` through the graph from every root inlet.
pub fn step_graph(graph: &mut Graph, code: &str, solubility_plasma: f64) -> TraversalReport {
    let oxygen = is_oxygen(code);
    let mut inlets: Vec<NodeId> = Vec::new();

    for id in graph.edge_ids() {
        let from = graph[id].from;
        if oxygen {
            let current = graph[from].oxygen_mmHg;
            graph[from].oxygen_mmHg = if current.is_nan() { f64::NAN } else { -1.0 };
        } else {
            let edge = &mut graph[id];
            edge.visited = edge.ignored;
            edge.fraction.insert(code.to_string(), -1.0);
        }

        if graph[from].is_root && !graph[id].ignored && !inlets.contains(&from) {
            inlets.push(from);
        }
    }

    let traverse = |graph: &mut Graph, node: NodeId| {
        if oxygen {
            traverse_node(graph, node, code, solubility_plasma)
        } else {
            traverse_edge(graph, node, code)
        }
    };

    let mut first = Frontier::default();
    for inlet in inlets {
        for id in graph.edges_out(inlet) {
            let to = graph[id].to;
            if oxygen {
                graph[inlet].oxygen_mmHg = inlet_partial_pressure(&graph[id]);
            } else {
                graph[id].visited = true;
                graph[id].fraction.insert(code.to_string(), 1.0);
            }
            first.extend(traverse(graph, to));
        }
    }

    let mut report = TraversalReport::default();
    let mut current = first.clone();
    let mut size = current.len();
    let mut stalls = 0;
    let mut resets = 0;

    while size > 0 {
        let mut next = Frontier::default();
        for &node in &current.nodes {
            next.extend(traverse(graph, node));
        }
        report.iterations += 1;

        current = next;
        let previous = size;
        size = current.len();
        if size == previous {
            stalls += 1;
        } else {
            stalls = 0;
        }

        if stalls > MAX_TRAVERSAL_STALLS {
            report.removed += update_traverse(graph, &current.nodes, false);
            resets += 1;
            if resets > MAX_TRAVERSAL_STALLS {
                report.removed += update_traverse(graph, &current.nodes, true);
                resets = 0;
            }
            current = first.clone();
            stalls = 0;
            report.restarts += 1;
        }
    }

    report
}

/// Resolves the fraction carried out of `node`.
///
/// Returns `node` itself while an inflow is unresolved, otherwise the
/// downstream nodes.
pub fn traverse_edge(graph: &mut Graph, node: NodeId, code: &str) -> Vec<NodeId> {
    let edges_in = graph.edges_in(node);
    if edges_in.iter().any(|&e| !graph[e].visited && !graph[e].ignored) {
        return vec![node];
    }

    let mass: f64 = edges_in
        .iter()
        .map(|&e| &graph[e])
        .filter(|e| !e.ignored)
        .map(|e| (e.fraction_of(code) - e.transport_of(code)) * e.flow_um3_per_min)
        .sum();
    let mass = mass.max(0.0);

    let edges_out = graph.edges_out(node);
    let flow_out: f64 = edges_out
        .iter()
        .map(|&e| &graph[e])
        .filter(|e| !e.ignored)
        .map(|e| e.flow_um3_per_min)
        .sum();

    let fraction = (mass / flow_out).min(1.0);
    edges_out
        .into_iter()
        .map(|id| {
            let edge = &mut graph[id];
            edge.fraction.insert(code.to_string(), fraction);
            edge.visited = true;
            edge.to
        })
        .collect()
}

/// Resolves the oxygen partial pressure of `node` from its inflow.
///
/// Returns `node` itself while an upstream node is unresolved, otherwise
/// the downstream nodes reached through non-ignored edges.
pub fn traverse_node(graph: &mut Graph, node: NodeId, code: &str, solubility_plasma: f64) -> Vec<NodeId> {
    let edges_in = graph.edges_in(node);
    if edges_in.iter().any(|&e| graph[graph[e].from].oxygen_mmHg < 0.0) {
        return vec![node];
    }

    let mass_in: f64 = edges_in
        .iter()
        .map(|&e| &graph[e])
        .filter(|e| !e.ignored)
        .map(|e| e.flow_um3_per_min * total_oxygen(graph[e.from].oxygen_mmHg, solubility_plasma) - e.transport_of(code))
        .sum();

    let outflow: Vec<EdgeId> = graph.edges_out(node).into_iter().filter(|&e| !graph[e].ignored).collect();
    let children: Vec<NodeId> = outflow.iter().map(|&e| graph[e].to).collect();

    if mass_in < 0.0 {
        graph[node].oxygen_mmHg = 0.0;
        return children;
    }

    if !graph.edges_out(node).is_empty() {
        let flow_out: f64 = outflow.iter().map(|&e| graph[e].flow_um3_per_min).sum();
        let balance = |p: f64| flow_out * total_oxygen(p, solubility_plasma) - mass_in;

        graph[node].oxygen_mmHg = if balance(MAX_OXYGEN_PARTIAL_PRESSURE) < 0.0 || flow_out == 0.0 {
            MAX_OXYGEN_PARTIAL_PRESSURE
        } else {
            bisection(balance, 0.0, MAX_OXYGEN_PARTIAL_PRESSURE).unwrap_or(MAX_OXYGEN_PARTIAL_PRESSURE)
        };
        children
    } else {
        if let &[only] = edges_in.as_slice() {
            graph[node].oxygen_mmHg = graph[graph[only].from].oxygen_mmHg;
        }
        children
    }
}

/// Removes weak edges around a stalled frontier and re-solves the network.
///
/// Edges with flow below [`MIN_TRAVERSAL_FLOW`] (or no flow value) go, as
/// does the weaker inlet of a merge that supplies under
/// [`MIN_INLET_SHARE`] of its flow. With `remove_min` the weakest remaining
/// edge goes as well. Returns the number of edges removed.
pub fn update_traverse(graph: &mut Graph, nodes: &[NodeId], remove_min: bool) -> usize {
    let mut doomed: Vec<EdgeId> = Vec::new();
    let mut weakest: Option<(EdgeId, f64)> = None;

    for &node in nodes {
        let neighbours = graph.edges_out(node).into_iter().chain(graph.edges_in(node));
        for id in neighbours {
            let flow = graph[id].flow_um3_per_min;
            if flow < MIN_TRAVERSAL_FLOW || flow.is_nan() {
                doomed.push(id);
            } else if weakest.map_or(true, |(_, min)| flow < min) {
                weakest = Some((id, flow));
            }
        }

        if let &[first, second] = graph.edges_in(node).as_slice() {
            let total = graph[first].flow_um3_per_min + graph[second].flow_um3_per_min;
            if graph[first].flow_um3_per_min / total < MIN_INLET_SHARE {
                doomed.push(first);
            } else if graph[second].flow_um3_per_min / total < MIN_INLET_SHARE {
                doomed.push(second);
            }
        }
    }

    if remove_min {
        if let Some((id, _)) = weakest {
            doomed.push(id);
        }
    }

    let mut removed = 0;
    for id in doomed {
        let Some(edge) = graph.remove_edge(id) else {
            continue;
        };
        log::info!("Removing edge {:?} to unblock transport traversal", id);
        let (from, to) = (edge.from, edge.to);
        graph[from].pressure_mmHg = f64::NAN;
        graph[to].pressure_mmHg = f64::NAN;
        removed += 1;
    }

    if removed > 0 {
        update_graph(graph);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeLevel, EdgeType};
    use crate::transport::OXYGEN;
    use glam::IVec3;

    fn p(x: i32, y: i32) -> IVec3 {
        IVec3::new(x, y, 0)
    }

    /// Root inlet feeding a split into two capillaries with a 3:1 flow ratio
    fn split_graph() -> (Graph, EdgeId, EdgeId, EdgeId) {
        let mut g = Graph::new();
        let trunk = g.connect(p(0, 0), p(4, 0), EdgeType::Artery, EdgeLevel::Level1);
        let left = g.connect(p(4, 0), p(8, 4), EdgeType::Capillary, EdgeLevel::Level1);
        let right = g.connect(p(4, 0), p(8, -4), EdgeType::Capillary, EdgeLevel::Level1);
        g[trunk].flow_um3_per_min = 400_000.0;
        g[left].flow_um3_per_min = 300_000.0;
        g[right].flow_um3_per_min = 100_000.0;
        g[trunk].radius_um = 10.0;
        let inlet = g.node_at(p(0, 0)).unwrap();
        g[inlet].is_root = true;
        (g, trunk, left, right)
    }

    #[test]
    fn test_fraction_splits_by_flow() {
        let (mut g, trunk, left, right) = split_graph();
        g[trunk].transport.insert("GLUCOSE".into(), 0.25);

        let report = step_graph(&mut g, "GLUCOSE", 0.0);

        assert_eq!(g[trunk].fraction_of("GLUCOSE"), 1.0);
        // 0.75 of the trunk mass remains and spreads over the same total flow
        assert!((g[left].fraction_of("GLUCOSE") - 0.75).abs() < 1e-12);
        assert!((g[right].fraction_of("GLUCOSE") - 0.75).abs() < 1e-12);
        assert!(g[left].visited && g[right].visited);
        assert_eq!(report.restarts, 0);
    }

    #[test]
    fn test_unvisited_inflow_defers_node() {
        let (mut g, trunk, left, _) = split_graph();
        let junction = g[left].from;
        g[trunk].visited = true;
        g.connect(p(0, 4), p(4, 0), EdgeType::Artery, EdgeLevel::Level1);

        assert_eq!(traverse_edge(&mut g, junction, "GLUCOSE"), vec![junction]);
        assert_eq!(g[left].fraction_of("GLUCOSE"), 0.0);
    }

    #[test]
    fn test_oxygen_partial_pressure_is_conserved() {
        let (mut g, trunk, left, _) = split_graph();
        let solubility = 3.1e-5;

        step_graph(&mut g, OXYGEN, solubility);

        let inlet = g[trunk].from;
        let junction = g[left].from;
        let inlet_p = g[inlet].oxygen_mmHg;
        assert_eq!(inlet_p, inlet_partial_pressure(&g[trunk]));

        // Mass balance at the junction: inflow equals outflow and nothing is lost
        let p = g[junction].oxygen_mmHg;
        assert!(p > 0.0 && p <= MAX_OXYGEN_PARTIAL_PRESSURE);
        assert!((p - inlet_p).abs() < 1e-3, "junction {} inlet {}", p, inlet_p);

        // Outlets take their single parent's value
        assert_eq!(g[g[left].to].oxygen_mmHg, p);
    }

    #[test]
    fn test_oxygen_removed_lowers_pressure() {
        let (mut g, trunk, left, _) = split_graph();
        let solubility = 3.1e-5;
        let flow = g[trunk].flow_um3_per_min;
        let inlet_p = inlet_partial_pressure(&g[trunk]);
        // Take a quarter of the oxygen carried by the trunk
        g[trunk].transport.insert(OXYGEN.into(), 0.25 * flow * total_oxygen(inlet_p, solubility));

        step_graph(&mut g, OXYGEN, solubility);

        let p = g[g[left].from].oxygen_mmHg;
        assert!(p < inlet_p);
        let carried = flow * total_oxygen(p, solubility);
        let expected = 0.75 * flow * total_oxygen(inlet_p, solubility);
        assert!((carried - expected).abs() / expected < 1e-3);
    }

    #[test]
    fn test_update_traverse_removes_weak_edges() {
        let (mut g, trunk, left, right) = split_graph();
        g[right].flow_um3_per_min = 10.0;
        let junction = g[left].from;

        let removed = update_traverse(&mut g, &[junction], false);
        assert_eq!(removed, 1);
        assert!(!g.contains_edge(right));
        assert!(g.contains_edge(trunk));
    }

    #[test]
    fn test_update_traverse_remove_min() {
        let (mut g, _, left, right) = split_graph();
        let junction = g[left].from;

        let removed = update_traverse(&mut g, &[junction], true);
        assert_eq!(removed, 1);
        assert!(!g.contains_edge(right));
    }

    #[test]
    fn test_cycle_terminates() {
        // Two capillaries feeding each other never resolve on their own
        let mut g = Graph::new();
        let inlet_edge = g.connect(p(0, 0), p(4, 0), EdgeType::Artery, EdgeLevel::Level1);
        let a = g.connect(p(4, 0), p(8, 0), EdgeType::Capillary, EdgeLevel::Level1);
        let b = g.connect(p(8, 0), p(8, 4), EdgeType::Capillary, EdgeLevel::Level1);
        let c = g.connect(p(8, 4), p(8, 0), EdgeType::Capillary, EdgeLevel::Level1);
        for id in [inlet_edge, a, b, c] {
            g[id].flow_um3_per_min = 50_000.0;
        }
        let inlet = g[inlet_edge].from;
        g[inlet].is_root = true;

        let report = step_graph(&mut g, "GLUCOSE", 0.0);
        assert!(report.restarts > 0);
        assert!(report.removed > 0);
    }
}
