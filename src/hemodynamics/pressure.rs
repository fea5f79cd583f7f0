//! Node pressures from a conductance network.

use std::collections::HashMap;

use super::solver::{sor, SparseMatrix};
use super::{calculate_pressure, edge_conductance};
use crate::graph::{EdgeCategory, EdgeType, Graph, NodeId, Root};

/// Scaling applied to the conductance system before relaxation
const SYSTEM_SCALE: f64 = 1e-7;

/// Highest (arteries) or lowest (veins) curve pressure across root edges
fn root_pressure(graph: &Graph, roots: &[Root], category: EdgeCategory) -> f64 {
    let mut pressure = match category {
        EdgeCategory::Artery => f64::MIN_POSITIVE,
        _ => f64::MAX,
    };
    for root in roots {
        let Some(edge) = graph.edge(root.edge) else { continue };
        let p = calculate_pressure(edge.radius_um, edge.category());
        pressure = match category {
            EdgeCategory::Artery => pressure.max(p),
            EdgeCategory::Vein => pressure.min(p),
            EdgeCategory::Capillary => pressure,
        };
    }
    pressure
}

/// Pins every root node of one category to a shared pressure and returns it
pub fn set_root_pressures(graph: &mut Graph, roots: &[Root], category: EdgeCategory) -> f64 {
    let pressure = root_pressure(graph, roots, category);
    for root in roots {
        let node = &mut graph[root.node];
        node.pressure_mmHg = pressure;
        node.is_root = true;
    }
    pressure
}

/// Gives dead-end nodes the pressure of the root category feeding them
pub fn set_leaf_pressures(graph: &mut Graph, artery_pressure: f64, vein_pressure: f64) {
    for id in graph.edge_ids() {
        let (to, edge_type) = (graph[id].to, graph[id].edge_type);
        if !graph[to].is_root && graph.out_degree(to) == 0 {
            graph[to].pressure_mmHg = if edge_type == EdgeType::Artery {
                artery_pressure
            } else {
                vein_pressure
            };
        }
    }
}

/// Reverses non-ignored edges that run against their pressure gradient.
///
/// Returns true if any edge was flipped.
pub fn reverse_pressures(graph: &mut Graph) -> bool {
    let mut reversed = false;
    for id in graph.edge_ids() {
        let edge = &graph[id];
        if edge.ignored {
            continue;
        }
        if graph[edge.from].pressure_mmHg - graph[edge.to].pressure_mmHg < 0.0 {
            graph.reverse_edge(id);
            reversed = true;
        }
    }
    reversed
}

/// Solves for the pressure of every free node from mass balance.
///
/// Roots and single-edge inlet/outlet leaves keep their assigned pressure
/// and act as boundary conditions.
pub fn calculate_pressures(graph: &mut Graph) {
    let mut unknowns: Vec<NodeId> = Vec::new();
    let mut index: HashMap<NodeId, usize> = HashMap::new();

    for (_, edge) in graph.edges() {
        if edge.ignored {
            continue;
        }
        let (from, to) = (edge.from, edge.to);
        let free_from = !graph[from].is_root && !(graph.in_degree(from) == 0 && graph.out_degree(from) == 1);
        let free_to = !graph[to].is_root && !(graph.in_degree(to) == 1 && graph.out_degree(to) == 0);
        for (node, free) in [(from, free_from), (to, free_to)] {
            if free && !index.contains_key(&node) {
                index.insert(node, unknowns.len());
                unknowns.push(node);
            }
        }
    }

    let n = unknowns.len();
    if n == 0 {
        return;
    }

    let mut matrix = SparseMatrix::new(n);
    let mut rhs = vec![0.0; n];
    let mut guess = vec![0.0; n];

    for (row, &node) in unknowns.iter().enumerate() {
        let mut count = 0.0;
        let neighbours = graph
            .edges_in(node)
            .into_iter()
            .map(|e| (e, graph[e].from))
            .chain(graph.edges_out(node).into_iter().map(|e| (e, graph[e].to)));

        for (e, other) in neighbours {
            if graph[e].ignored {
                continue;
            }
            let coefficient = edge_conductance(&graph[e]);
            matrix.add(row, row, coefficient);

            let pressure = graph[other].pressure_mmHg;
            match index.get(&other) {
                Some(&col) if !graph[other].is_root => {
                    matrix.add(row, col, -coefficient);
                    guess[row] += pressure;
                    count += 1.0;
                }
                _ => rhs[row] += coefficient * pressure,
            }
        }

        if count != 0.0 {
            guess[row] /= count;
        }
        if graph[node].pressure_mmHg > 0.0 {
            guess[row] = graph[node].pressure_mmHg;
        }
        if guess[row].is_nan() {
            guess[row] = 0.0;
        }
    }

    matrix.scale(SYSTEM_SCALE);
    for value in rhs.iter_mut() {
        *value *= SYSTEM_SCALE;
    }

    let solution = sor(&matrix, &rhs, &guess);
    for (node, pressure) in unknowns.into_iter().zip(solution) {
        graph[node].pressure_mmHg = pressure;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeLevel;
    use glam::IVec3;

    fn p(x: i32, y: i32) -> IVec3 {
        IVec3::new(x, y, 0)
    }

    /// Root -> a -> b -> outlet root, all the same vessel
    fn chain() -> Graph {
        let mut g = Graph::new();
        for (from, to) in [(p(0, 0), p(4, 0)), (p(4, 0), p(8, 0)), (p(8, 0), p(12, 0))] {
            let e = g.connect(from, to, EdgeType::Capillary, EdgeLevel::Level1);
            g[e].radius_um = 5.0;
            g[e].length_um = 100.0;
        }
        let inlet = g.node_at(p(0, 0)).unwrap();
        let outlet = g.node_at(p(12, 0)).unwrap();
        g[inlet].is_root = true;
        g[inlet].pressure_mmHg = 60.0;
        g[outlet].is_root = true;
        g[outlet].pressure_mmHg = 30.0;
        g
    }

    #[test]
    fn test_uniform_chain_drops_linearly() {
        let mut g = chain();
        calculate_pressures(&mut g);

        let a = g[g.node_at(p(4, 0)).unwrap()].pressure_mmHg;
        let b = g[g.node_at(p(8, 0)).unwrap()].pressure_mmHg;
        assert!((a - 50.0).abs() < 1e-3, "a = {}", a);
        assert!((b - 40.0).abs() < 1e-3, "b = {}", b);
    }

    #[test]
    fn test_reverse_against_gradient() {
        let mut g = chain();
        let mid = g.node_at(p(8, 0)).unwrap();
        let first = g.node_at(p(4, 0)).unwrap();
        g[first].pressure_mmHg = 20.0;
        g[mid].pressure_mmHg = 40.0;

        assert!(reverse_pressures(&mut g));
        assert!(g.has_edge(p(8, 0), p(4, 0)));
        assert!(!g.has_edge(p(4, 0), p(0, 0)));
        assert!(g.has_edge(p(0, 0), p(4, 0)));
    }

    #[test]
    fn test_root_and_leaf_pressures() {
        let mut g = Graph::new();
        let a = g.connect(p(0, 0), p(4, 0), EdgeType::Artery, EdgeLevel::Level1);
        let v = g.connect(p(0, 8), p(4, 8), EdgeType::Vein, EdgeLevel::Level1);
        g[a].radius_um = 20.0;
        g[v].radius_um = 20.0;
        let arteries = [Root { node: g[a].from, edge: a, edge_type: EdgeType::Artery }];
        let veins = [Root { node: g[v].from, edge: v, edge_type: EdgeType::Vein }];

        let pa = set_root_pressures(&mut g, &arteries, EdgeCategory::Artery);
        let pv = set_root_pressures(&mut g, &veins, EdgeCategory::Vein);
        assert!(pa > pv);
        assert!(g[g[a].from].is_root);
        assert_eq!(g[g[v].from].pressure_mmHg, pv);

        set_leaf_pressures(&mut g, pa, pv);
        assert_eq!(g[g[a].to].pressure_mmHg, pa);
        assert_eq!(g[g[v].to].pressure_mmHg, pv);
    }
}
