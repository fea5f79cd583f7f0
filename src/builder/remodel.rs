//! Shear-driven structural remodeling of a growing network.

use rand::seq::SliceRandom;
use rand::Rng;

use super::motifs::{add_motif, Motif};
use super::PROBABILITY_WEIGHT;
use crate::geometry::SiteGeometry;
use crate::graph::{EdgeId, EdgeLevel, EdgeTag, EdgeType, Graph};

/// Runs one remodeling round and returns the fraction of edges it changed.
///
/// Bridging edges (capillaries, arterioles, venules) are dropped first so
/// only the artery and vein trees remain. Each remaining edge is then tagged
/// for removal with probability falling in its scaled shear, or for a new
/// motif chain with probability rising in it. Removal only applies to true
/// leaves and growth only where the end node has room.
pub fn remodel_round(graph: &mut Graph, geometry: &dyn SiteGeometry, level: EdgeLevel, rng: &mut impl Rng) -> f64 {
    for id in graph.edges_of_type(&[EdgeType::Capillary, EdgeType::Arteriole, EdgeType::Venule]) {
        graph.remove_edge(id);
    }

    let mut edges = graph.edge_ids();
    let total = edges.len();
    let mut tagged = 0;

    for &id in &edges {
        graph[id].tag = None;
    }

    for &id in &edges {
        let to = graph[id].to;
        let (in_degree, out_degree) = (graph.in_degree(to), graph.out_degree(to));

        let shear = graph[id].shear_scaled;
        let remove_weight = 1.0 - shear - PROBABILITY_WEIGHT;
        let grow_weight = shear + PROBABILITY_WEIGHT;
        let draw: f64 = rng.gen();

        if draw < remove_weight && out_degree == 0 && in_degree == 1 {
            graph[id].tag = Some(EdgeTag::Remove);
            tagged += 1;
        } else if draw < grow_weight && (out_degree == 0 || (in_degree == 1 && out_degree == 1)) {
            graph[id].tag = Some(EdgeTag::Add);
            tagged += 1;
        }
    }

    edges.shuffle(rng);
    if tagged == 0 || total == 0 {
        return 0.0;
    }

    for id in edges {
        let tag = graph[id].tag;
        let to = graph[id].to;
        match tag {
            Some(EdgeTag::Add) if graph.degree(to) < 3 => grow_chain(graph, geometry, id, level, rng),
            Some(EdgeTag::Remove) => {
                graph.remove_edge(id);
            }
            _ => {}
        }
        if let Some(edge) = graph.edge_mut(id) {
            edge.tag = None;
            edge.radius_um = 0.0;
        }
    }

    tagged as f64 / total as f64
}

/// Tripod, then double, then single motif grown off the end of `edge`
fn grow_chain(graph: &mut Graph, geometry: &dyn SiteGeometry, edge: EdgeId, level: EdgeLevel, rng: &mut impl Rng) {
    let edge_type = graph[edge].edge_type;
    let mut node = graph.position(graph[edge].to);

    for motif in [Motif::Triple, Motif::Double, Motif::Single] {
        let bag = add_motif(graph, geometry, node, edge, edge_type, level, motif, rng);
        let Some(&first) = bag.first() else { return };
        node = graph.position(graph[first].to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{make_geometry, GeometryKind, LatticeShape};
    use glam::IVec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn p(x: i32, y: i32) -> IVec3 {
        IVec3::new(x, y, 0)
    }

    #[test]
    fn test_round_drops_bridges() {
        let geometry = make_geometry(GeometryKind::Rect, LatticeShape::new(40, 40, 1), 30.0);
        let mut g = Graph::new();
        g.connect(p(0, 20), p(4, 20), EdgeType::Artery, EdgeLevel::Level1);
        g.connect(p(4, 20), p(8, 20), EdgeType::Capillary, EdgeLevel::Level1);
        g.connect(p(4, 20), p(8, 16), EdgeType::Arteriole, EdgeLevel::Level1);

        let mut rng = StdRng::seed_from_u64(11);
        let fraction = remodel_round(&mut g, geometry.as_ref(), EdgeLevel::Level1, &mut rng);

        assert!((0.0..=1.0).contains(&fraction));
        assert!(g.edges_of_type(&[EdgeType::Capillary, EdgeType::Arteriole]).is_empty());
        assert!(g.edges().all(|(_, e)| e.tag.is_none()));
    }

    #[test]
    fn test_round_on_empty_graph_changes_nothing() {
        let geometry = make_geometry(GeometryKind::Rect, LatticeShape::new(40, 40, 1), 30.0);
        let mut g = Graph::new();
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(remodel_round(&mut g, geometry.as_ref(), EdgeLevel::Level1, &mut rng), 0.0);
    }

    #[test]
    fn test_rounds_respect_degree_bound() {
        let geometry = make_geometry(GeometryKind::Rect, LatticeShape::new(60, 60, 1), 30.0);
        let mut g = Graph::new();
        g.connect(p(0, 28), p(4, 28), EdgeType::Artery, EdgeLevel::Level1);
        g.connect(p(4, 28), p(8, 24), EdgeType::Artery, EdgeLevel::Level1);
        g.connect(p(4, 28), p(8, 32), EdgeType::Artery, EdgeLevel::Level1);

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..10 {
            for id in g.edge_ids() {
                g[id].shear_scaled = 1.0;
            }
            let fraction = remodel_round(&mut g, geometry.as_ref(), EdgeLevel::Level1, &mut rng);
            assert!((0.0..=1.0).contains(&fraction));
        }

        for node in g.connected_nodes() {
            assert!(g.degree(node) <= 3);
        }
    }

    #[test]
    fn test_low_shear_leaf_is_removed() {
        let geometry = make_geometry(GeometryKind::Rect, LatticeShape::new(40, 40, 1), 30.0);
        let mut g = Graph::new();
        g.connect(p(0, 20), p(4, 20), EdgeType::Artery, EdgeLevel::Level1);
        let leaf = g.connect(p(4, 20), p(8, 20), EdgeType::Artery, EdgeLevel::Level1);

        // Removal weight is 0.8 at zero shear; over a few seeds the leaf goes
        let removed = (0..20).any(|seed| {
            let mut copy = g.subgraph(|_| true);
            let mut rng = StdRng::seed_from_u64(seed);
            remodel_round(&mut copy, geometry.as_ref(), EdgeLevel::Level1, &mut rng);
            !copy.contains_edge(leaf)
        });
        assert!(removed);
    }
}
