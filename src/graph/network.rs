//! Vessel network storage on a petgraph stable graph.
//!
//! Nodes are unique per lattice coordinate and are never removed, so node
//! ids stay dense. Edge ids are handed out once and never reused; the
//! petgraph index behind an id changes whenever the edge is reversed or
//! restored. Enumeration follows `order`, where a re-added edge goes last.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use glam::IVec3;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::{Edge, EdgeLevel, EdgeType, Node};

/// Dense index of a node in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    fn index(self) -> NodeIndex {
        NodeIndex::new(self.0)
    }
}

/// Stable handle of an edge; never reused by a later edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

/// Directed multigraph over lattice-positioned nodes
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: StableDiGraph<Node, Edge>,
    lookup: HashMap<IVec3, NodeIndex>,
    slots: HashMap<EdgeId, EdgeIndex>,
    ids: HashMap<EdgeIndex, EdgeId>,
    order: Vec<EdgeId>,
    next_edge: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every node and edge
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of live edges
    pub fn edge_count(&self) -> usize {
        self.order.len()
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    pub fn node_at(&self, position: IVec3) -> Option<NodeId> {
        self.lookup.get(&position).map(|ix| NodeId(ix.index()))
    }

    /// Returns the node at `position`, creating it if needed
    pub fn ensure_node(&mut self, position: IVec3) -> NodeId {
        if let Some(id) = self.node_at(position) {
            return id;
        }
        let ix = self.inner.add_node(Node::new(position));
        self.lookup.insert(position, ix);
        NodeId(ix.index())
    }

    pub fn position(&self, node: NodeId) -> IVec3 {
        self.inner[node.index()].position
    }

    /// Nodes touched by at least one live edge
    pub fn connected_nodes(&self) -> Vec<NodeId> {
        self.inner
            .node_indices()
            .map(|ix| NodeId(ix.index()))
            .filter(|&id| self.degree(id) > 0)
            .collect()
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    fn link(&mut self, id: EdgeId, edge: Edge) {
        let ix = self.inner.add_edge(edge.from.index(), edge.to.index(), edge);
        self.slots.insert(id, ix);
        self.ids.insert(ix, id);
        self.order.push(id);
    }

    fn unlink(&mut self, id: EdgeId) -> Option<Edge> {
        let ix = self.slots.remove(&id)?;
        self.ids.remove(&ix);
        self.order.retain(|&e| e != id);
        self.inner.remove_edge(ix)
    }

    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.link(id, edge);
        id
    }

    /// Adds an edge between two coordinates, creating nodes as needed
    pub fn connect(&mut self, from: IVec3, to: IVec3, edge_type: EdgeType, level: EdgeLevel) -> EdgeId {
        let from = self.ensure_node(from);
        let to = self.ensure_node(to);
        self.add_edge(Edge::new(from, to, edge_type, level))
    }

    /// Removes an edge and hands back its last state, `None` if it was
    /// already gone
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        self.unlink(id)
    }

    /// Re-adds a removed edge under its old id, at the end of the
    /// enumeration order. Returns false if the id is live or was never issued.
    pub fn restore_edge(&mut self, id: EdgeId, edge: Edge) -> bool {
        if id.0 >= self.next_edge || self.slots.contains_key(&id) {
            return false;
        }
        self.link(id, edge);
        true
    }

    /// Flips the direction of an edge. The edge moves to the end of the
    /// enumeration order, as if removed and re-added.
    pub fn reverse_edge(&mut self, id: EdgeId) {
        let Some(mut edge) = self.unlink(id) else { return };
        std::mem::swap(&mut edge.from, &mut edge.to);
        self.link(id, edge);
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.slots.get(&id).map(|&ix| &self.inner[ix])
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        let ix = *self.slots.get(&id)?;
        self.inner.edge_weight_mut(ix)
    }

    /// True if an edge runs from `from` to `to`
    pub fn has_edge(&self, from: IVec3, to: IVec3) -> bool {
        match (self.lookup.get(&from), self.lookup.get(&to)) {
            (Some(&a), Some(&b)) => self.inner.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Snapshot of live edge ids in enumeration order
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.order.clone()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.order.iter().map(move |&id| (id, &self[id]))
    }

    /// Edges at `node` in the given direction, oldest first
    fn adjacent(&self, node: NodeId, direction: Direction) -> Vec<EdgeId> {
        let mut edges: Vec<EdgeId> = self
            .inner
            .edges_directed(node.index(), direction)
            .map(|e| self.ids[&e.id()])
            .collect();
        // petgraph walks the newest edge first
        edges.reverse();
        edges
    }

    pub fn edges_in(&self, node: NodeId) -> Vec<EdgeId> {
        self.adjacent(node, Direction::Incoming)
    }

    pub fn edges_out(&self, node: NodeId) -> Vec<EdgeId> {
        self.adjacent(node, Direction::Outgoing)
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.inner.edges_directed(node.index(), Direction::Incoming).count()
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.inner.edges_directed(node.index(), Direction::Outgoing).count()
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.in_degree(node) + self.out_degree(node)
    }

    /// Total degree at a coordinate, zero if no node exists there
    pub fn degree_at(&self, position: IVec3) -> usize {
        self.node_at(position).map_or(0, |n| self.degree(n))
    }

    pub fn in_degree_at(&self, position: IVec3) -> usize {
        self.node_at(position).map_or(0, |n| self.in_degree(n))
    }

    pub fn out_degree_at(&self, position: IVec3) -> usize {
        self.node_at(position).map_or(0, |n| self.out_degree(n))
    }

    /// Live edges whose type is in `types`
    pub fn edges_of_type(&self, types: &[EdgeType]) -> Vec<EdgeId> {
        self.edges()
            .filter(|(_, e)| types.contains(&e.edge_type))
            .map(|(id, _)| id)
            .collect()
    }

    /// Live edges whose type is in `types` and that belong to `level`
    pub fn edges_of_type_at(&self, types: &[EdgeType], level: EdgeLevel) -> Vec<EdgeId> {
        self.edges()
            .filter(|(_, e)| types.contains(&e.edge_type) && e.level == level)
            .map(|(id, _)| id)
            .collect()
    }

    /// Edges of the given types that end in a node with no outgoing edge
    pub fn leaves_of_type(&self, types: &[EdgeType]) -> Vec<EdgeId> {
        self.edges()
            .filter(|(_, e)| types.contains(&e.edge_type) && self.out_degree(e.to) == 0)
            .map(|(id, _)| id)
            .collect()
    }

    /// Copy of the graph restricted to edges satisfying `keep`.
    ///
    /// Edge and node ids are preserved, so ids from the subgraph can be used
    /// to address the same segments in the original graph.
    pub fn subgraph<F>(&self, mut keep: F) -> Graph
    where
        F: FnMut(&Edge) -> bool,
    {
        let mut sub = Graph {
            lookup: self.lookup.clone(),
            next_edge: self.next_edge,
            ..Graph::default()
        };
        for ix in self.inner.node_indices() {
            sub.inner.add_node(self.inner[ix].clone());
        }
        for (id, edge) in self.edges() {
            if keep(edge) {
                sub.link(id, edge.clone());
            }
        }
        sub
    }

    /// Collapses pass-through junctions (one edge in, one edge out) into a
    /// single edge when `joinable` accepts the pair. The replacement edge is
    /// produced by `join` from the upstream and downstream edges and keeps
    /// their outer endpoints. Returns the number of merges.
    pub fn merge_nodes<F, J>(&mut self, mut joinable: F, mut join: J) -> usize
    where
        F: FnMut(&Graph, EdgeId, EdgeId) -> bool,
        J: FnMut(&Edge, &Edge) -> Edge,
    {
        let mut merged = 0;
        loop {
            let mut pair = None;
            for &first in &self.order {
                let junction = self[first].to;
                if self.in_degree(junction) != 1 || self.out_degree(junction) != 1 {
                    continue;
                }
                let second = self.edges_out(junction)[0];
                if second != first && joinable(self, first, second) {
                    pair = Some((first, second));
                    break;
                }
            }

            let Some((first, second)) = pair else { break };
            let mut joined = join(&self[first], &self[second]);
            joined.from = self[first].from;
            joined.to = self[second].to;
            self.remove_edge(first);
            self.remove_edge(second);
            self.add_edge(joined);
            merged += 1;
        }
        merged
    }
}

impl Index<EdgeId> for Graph {
    type Output = Edge;

    fn index(&self, id: EdgeId) -> &Edge {
        &self.inner[self.slots[&id]]
    }
}

impl IndexMut<EdgeId> for Graph {
    fn index_mut(&mut self, id: EdgeId) -> &mut Edge {
        let ix = self.slots[&id];
        &mut self.inner[ix]
    }
}

impl Index<NodeId> for Graph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.inner[id.index()]
    }
}

impl IndexMut<NodeId> for Graph {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.inner[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> IVec3 {
        IVec3::new(x, y, 0)
    }

    #[test]
    fn test_add_and_degrees() {
        let mut g = Graph::new();
        let e = g.connect(p(0, 0), p(1, 0), EdgeType::Artery, EdgeLevel::Level1);
        g.connect(p(1, 0), p(2, 0), EdgeType::Artery, EdgeLevel::Level1);

        let mid = g.node_at(p(1, 0)).unwrap();
        assert_eq!(g.in_degree(mid), 1);
        assert_eq!(g.out_degree(mid), 1);
        assert_eq!(g.degree(mid), 2);
        assert_eq!(g.degree_at(p(5, 5)), 0);
        assert!(g.has_edge(p(0, 0), p(1, 0)));
        assert!(!g.has_edge(p(1, 0), p(0, 0)));
        assert_eq!(g.edges_out(g.node_at(p(0, 0)).unwrap()), vec![e]);
    }

    #[test]
    fn test_adjacency_in_insertion_order() {
        let mut g = Graph::new();
        let a = g.connect(p(0, 0), p(1, 0), EdgeType::Artery, EdgeLevel::Level1);
        let b = g.connect(p(0, 0), p(0, 1), EdgeType::Artery, EdgeLevel::Level1);
        let c = g.connect(p(0, 0), p(1, 1), EdgeType::Artery, EdgeLevel::Level1);
        let origin = g.node_at(p(0, 0)).unwrap();
        assert_eq!(g.edges_out(origin), vec![a, b, c]);

        g.reverse_edge(a);
        g.reverse_edge(a);
        assert_eq!(g.edges_out(origin), vec![b, c, a]);
    }

    #[test]
    fn test_remove_returns_last_state() {
        let mut g = Graph::new();
        let e = g.connect(p(0, 0), p(1, 0), EdgeType::Vein, EdgeLevel::Level1);
        g[e].radius_um = 7.0;

        let removed = g.remove_edge(e).unwrap();
        assert_eq!(removed.radius_um, 7.0);
        assert!(g.remove_edge(e).is_none());
        assert!(g.is_empty());
        assert!(!g.contains_edge(e));
        assert!(g.edge(e).is_none());
        assert_eq!(g.degree_at(p(0, 0)), 0);

        assert!(g.restore_edge(e, removed.clone()));
        assert!(!g.restore_edge(e, removed));
        assert_eq!(g.edge_ids(), vec![e]);
        assert_eq!(g[e].radius_um, 7.0);
        assert_eq!(g.out_degree_at(p(0, 0)), 1);
    }

    #[test]
    fn test_edge_ids_are_not_reused() {
        let mut g = Graph::new();
        let a = g.connect(p(0, 0), p(1, 0), EdgeType::Artery, EdgeLevel::Level1);
        g.remove_edge(a);
        let b = g.connect(p(1, 0), p(2, 0), EdgeType::Artery, EdgeLevel::Level1);

        assert_ne!(a, b);
        assert!(!g.contains_edge(a));
        assert!(!g.restore_edge(EdgeId(99), g[b].clone()));
    }

    #[test]
    fn test_reverse_moves_to_end() {
        let mut g = Graph::new();
        let a = g.connect(p(0, 0), p(1, 0), EdgeType::Vein, EdgeLevel::Level1);
        let b = g.connect(p(1, 0), p(2, 0), EdgeType::Vein, EdgeLevel::Level1);

        g.reverse_edge(a);
        assert!(g.has_edge(p(1, 0), p(0, 0)));
        assert_eq!(g.edge_ids(), vec![b, a]);
        assert_eq!(g[a].from, g.node_at(p(1, 0)).unwrap());
        assert_eq!(g.out_degree_at(p(1, 0)), 2);
        assert_eq!(g.in_degree_at(p(1, 0)), 0);
    }

    #[test]
    fn test_subgraph_preserves_ids() {
        let mut g = Graph::new();
        let a = g.connect(p(0, 0), p(1, 0), EdgeType::Artery, EdgeLevel::Level1);
        let b = g.connect(p(1, 0), p(2, 0), EdgeType::Capillary, EdgeLevel::Level1);

        let sub = g.subgraph(|e| e.edge_type == EdgeType::Capillary);
        assert_eq!(sub.edge_ids(), vec![b]);
        assert!(!sub.contains_edge(a));
        assert_eq!(sub[b].to, g[b].to);
        assert_eq!(sub.position(sub[b].to), p(2, 0));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_merge_pass_through() {
        let mut g = Graph::new();
        let a = g.connect(p(0, 0), p(1, 0), EdgeType::Artery, EdgeLevel::Level1);
        let b = g.connect(p(1, 0), p(2, 0), EdgeType::Artery, EdgeLevel::Level1);
        g.connect(p(2, 0), p(2, 1), EdgeType::Capillary, EdgeLevel::Level1);
        g[a].length_um = 10.0;
        g[b].length_um = 5.0;

        let merged = g.merge_nodes(
            |g, first, second| g[first].edge_type == g[second].edge_type,
            |first, second| {
                let mut joined = first.clone();
                joined.length_um = first.length_um + second.length_um;
                joined
            },
        );

        assert_eq!(merged, 1);
        assert_eq!(g.edge_count(), 2);
        assert!(g.has_edge(p(0, 0), p(2, 0)));
        assert_eq!(g.degree_at(p(1, 0)), 0);
        let joined = g.edge_ids()[1];
        assert_eq!(g[joined].length_um, 15.0);
    }
}
