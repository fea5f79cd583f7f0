//! Perfusion marking.
//!
//! An edge is perfused when it lies on a shortest artery root to vein root
//! path, or on any detour that leaves a perfused edge and rejoins one.
//! Path bookkeeping lives in maps scoped to each call.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::{EdgeId, Graph, NodeId, Root};

/// Breadth-first shortest path along edge direction; returns parent links
fn shortest_path(graph: &Graph, start: NodeId, end: NodeId) -> Option<HashMap<NodeId, NodeId>> {
    let mut prev = HashMap::new();
    let mut settled = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        if node == end {
            return Some(prev);
        }
        for e in graph.edges_out(node) {
            let to = graph[e].to;
            if settled.insert(to) {
                prev.insert(to, node);
                queue.push_back(to);
            }
        }
    }

    None
}

/// Marks the edges of the shortest path from `start` to `end`, if any
fn mark_path(graph: &mut Graph, start: NodeId, end: NodeId) {
    let Some(prev) = shortest_path(graph, start, end) else {
        return;
    };

    let mut node = end;
    while node != start {
        let Some(&parent) = prev.get(&node) else { break };
        let edge = graph
            .edges_in(node)
            .into_iter()
            .find(|&e| graph[e].from == parent);
        if let Some(edge) = edge {
            graph[edge].perfused = true;
        }
        node = parent;
    }
}

/// Nodes reachable from `seeds` across edges that are not yet perfused
fn spread(graph: &Graph, seeds: Vec<NodeId>, forward: bool) -> HashSet<NodeId> {
    let mut reached: HashSet<NodeId> = seeds.iter().copied().collect();
    let mut queue: VecDeque<NodeId> = seeds.into();

    while let Some(node) = queue.pop_front() {
        let edges = if forward { graph.edges_out(node) } else { graph.edges_in(node) };
        for e in edges {
            if graph[e].perfused {
                continue;
            }
            let next = if forward { graph[e].to } else { graph[e].from };
            if reached.insert(next) {
                queue.push_back(next);
            }
        }
    }

    reached
}

/// Resets and recomputes the perfused flag of every edge.
///
/// Shortest paths between every artery and vein root are marked first.
/// Any further edge on a path that starts at the end of a perfused edge and
/// runs into another perfused edge is then marked as well.
pub fn check_perfused(graph: &mut Graph, arteries: &[Root], veins: &[Root]) {
    for id in graph.edge_ids() {
        graph[id].perfused = false;
    }

    for artery in arteries {
        for vein in veins {
            mark_path(graph, artery.node, vein.node);
        }
    }

    let perfused: Vec<EdgeId> = graph.edges().filter(|(_, e)| e.perfused).map(|(id, _)| id).collect();
    let starts = perfused.iter().map(|&e| graph[e].to).collect();
    let ends = perfused.iter().map(|&e| graph[e].from).collect();

    let downstream_of_perfused = spread(graph, starts, true);
    let upstream_of_perfused = spread(graph, ends, false);

    for id in graph.edge_ids() {
        let (from, to) = (graph[id].from, graph[id].to);
        if downstream_of_perfused.contains(&from) && upstream_of_perfused.contains(&to) {
            graph[id].perfused = true;
        }
    }
}
