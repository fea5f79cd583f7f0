//! Per-edge derived quantities: length, wall, stresses, flow and area.

use super::{edge_conductance, LAYER_HEIGHT_UM, MAX_WALL_RADIUS_FRACTION};
use crate::geometry::SiteGeometry;
use crate::graph::Graph;

/// Wall thickness (μm) for a vessel of the given internal radius
pub fn thickness(radius_um: f64) -> f64 {
    let d = 2.0 * radius_um;
    let wall = d * (0.267 - 0.084 * d.log10());
    wall.min(MAX_WALL_RADIUS_FRACTION * radius_um)
}

pub fn calculate_thicknesses(graph: &mut Graph) {
    for id in graph.edge_ids() {
        graph[id].wall_um = thickness(graph[id].radius_um);
    }
}

/// Assigns every edge its geometric length at the given lattice scale
pub fn calculate_lengths(graph: &mut Graph, geometry: &dyn SiteGeometry, scale: i32) {
    for id in graph.edge_ids() {
        let from = graph.position(graph[id].from);
        let to = graph.position(graph[id].to);
        graph[id].length_um = geometry.length(from, to, scale);
    }
}

/// Shear and circumferential stress for every edge, plus shear rescaled to
/// [0, 1] across the graph
pub fn calculate_stresses(graph: &mut Graph) {
    let mut shear_min = f64::INFINITY;
    let mut shear_max = 0.0_f64;

    for id in graph.edge_ids() {
        let p_from = graph[graph[id].from].pressure_mmHg;
        let p_to = graph[graph[id].to].pressure_mmHg;
        let edge = &mut graph[id];

        edge.shear_mmHg = edge.radius_um * (p_to - p_from).abs() / (2.0 * edge.length_um);
        edge.circum_mmHg = (p_to + p_from) / 2.0 * edge.radius_um / edge.wall_um;

        if edge.shear_mmHg > shear_max {
            shear_max = edge.shear_mmHg;
        }
        if edge.shear_mmHg < shear_min {
            shear_min = edge.shear_mmHg;
        }
    }

    let range = shear_max - shear_min;
    for id in graph.edge_ids() {
        let edge = &mut graph[id];
        edge.shear_scaled = if range > 0.0 {
            (edge.shear_mmHg - shear_min) / range
        } else {
            0.0
        };
    }
}

/// Flow rate (μm³/min) and exchange area (μm²) for every edge
pub fn calculate_flows(graph: &mut Graph) {
    for id in graph.edge_ids() {
        let delta = graph[graph[id].from].pressure_mmHg - graph[graph[id].to].pressure_mmHg;
        let edge = &mut graph[id];
        edge.flow_um3_per_min = edge_conductance(edge) * delta;

        // Vessels wider than the layer continue past it; count both faces
        edge.area_um2 = if 2.0 * edge.radius_um < LAYER_HEIGHT_UM {
            std::f64::consts::PI * 2.0 * (edge.radius_um + edge.wall_um / 2.0) * edge.length_um
        } else {
            edge.length_um * LAYER_HEIGHT_UM * 2.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{make_geometry, GeometryKind, LatticeShape};
    use crate::graph::{EdgeLevel, EdgeType};
    use glam::IVec3;

    #[test]
    fn test_thickness_clamped_to_half_radius() {
        for r in [2.0, 4.0, 10.0, 40.0] {
            let w = thickness(r);
            assert!(w > 0.0);
            assert!(w <= MAX_WALL_RADIUS_FRACTION * r + 1e-12);
        }
        // Unclamped value for a 4 μm capillary
        let d = 8.0_f64;
        let expected = d * (0.267 - 0.084 * d.log10());
        assert!((thickness(4.0) - expected.min(2.0)).abs() < 1e-12);
    }

    fn two_edges() -> Graph {
        let mut g = Graph::new();
        let a = g.connect(IVec3::new(0, 0, 0), IVec3::new(4, 0, 0), EdgeType::Artery, EdgeLevel::Level1);
        let b = g.connect(IVec3::new(4, 0, 0), IVec3::new(8, 0, 0), EdgeType::Capillary, EdgeLevel::Level1);
        for (e, r) in [(a, 10.0), (b, 4.0)] {
            g[e].radius_um = r;
            g[e].length_um = 120.0;
            g[e].wall_um = thickness(r);
        }
        let pressures = [60.0, 50.0, 30.0];
        for (x, p) in [0, 4, 8].into_iter().zip(pressures) {
            let n = g.node_at(IVec3::new(x, 0, 0)).unwrap();
            g[n].pressure_mmHg = p;
        }
        g
    }

    #[test]
    fn test_stresses_and_scaling() {
        let mut g = two_edges();
        calculate_stresses(&mut g);
        let ids = g.edge_ids();

        assert!((g[ids[0]].shear_mmHg - 10.0 * 10.0 / 240.0).abs() < 1e-12);
        assert!((g[ids[1]].shear_mmHg - 4.0 * 20.0 / 240.0).abs() < 1e-12);
        assert_eq!(g[ids[0]].shear_scaled, 1.0);
        assert_eq!(g[ids[1]].shear_scaled, 0.0);
        let circum = 55.0 * 10.0 / g[ids[0]].wall_um;
        assert!((g[ids[0]].circum_mmHg - circum).abs() < 1e-9);
    }

    #[test]
    fn test_equal_shears_scale_to_zero() {
        let mut g = two_edges();
        for n in g.connected_nodes() {
            g[n].pressure_mmHg = 10.0;
        }
        calculate_stresses(&mut g);
        assert!(g.edges().all(|(_, e)| e.shear_scaled == 0.0));
    }

    #[test]
    fn test_flows_and_area() {
        let mut g = two_edges();
        calculate_flows(&mut g);
        let ids = g.edge_ids();

        assert!(g[ids[0]].flow_um3_per_min > 0.0);
        // Wide vessel uses the layer faces
        assert!((g[ids[0]].area_um2 - 120.0 * LAYER_HEIGHT_UM * 2.0).abs() < 1e-9);
        let r = 4.0 + g[ids[1]].wall_um / 2.0;
        assert!((g[ids[1]].area_um2 - std::f64::consts::PI * 2.0 * r * 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_lengths_follow_geometry() {
        let geometry = make_geometry(GeometryKind::Rect, LatticeShape::new(20, 20, 1), 30.0);
        let mut g = two_edges();
        g.connect(IVec3::new(8, 0, 0), IVec3::new(12, 4, 0), EdgeType::Vein, EdgeLevel::Level1);
        calculate_lengths(&mut g, geometry.as_ref(), 4);
        let ids = g.edge_ids();
        assert_eq!(g[ids[0]].length_um, 120.0);
        assert!((g[ids[2]].length_um - 120.0 * 2f64.sqrt()).abs() < 1e-9);
    }
}
