//! Per-tick lattice updates.

use rand::seq::SliceRandom;
use rand::Rng;

use super::{step_graph, MoleculeLayer, EXCHANGE_SECONDS, MIN_EXCHANGE_FLOW};
use crate::graph::{EdgeId, Graph};
use crate::hemodynamics::DELTA_TOLERANCE;

/// Physical constants of the wall exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeSettings {
    /// Oxygen solubility in plasma (fmol/(μm³·mmHg))
    pub solubility_plasma: f64,
    /// Oxygen solubility in tissue (fmol/(μm³·mmHg))
    pub solubility_tissue: f64,
    /// Volume of one lattice voxel (μm³)
    pub site_volume_um3: f64,
}

/// Tops every voxel spanned by a live edge up to the source concentration.
pub fn simple_step(graph: &Graph, layers: &mut [MoleculeLayer]) {
    for layer in layers.iter_mut() {
        layer.delta.clear();
        for (_, edge) in graph.edges().filter(|(_, e)| !e.ignored) {
            for &voxel in &edge.span {
                layer.delta[voxel] = (layer.concentration - layer.previous[voxel]).max(0.0);
            }
        }
    }
}

/// Propagates every molecule through the network and exchanges it with the
/// lattice across the vessel walls.
///
/// Nothing is delivered once no live edge leaves a root.
pub fn complex_step(graph: &mut Graph, layers: &mut [MoleculeLayer], settings: &ExchangeSettings, rng: &mut impl Rng) {
    let connected = graph.edges().any(|(_, e)| !e.ignored && graph[e.from].is_root);
    if !connected {
        for layer in layers.iter_mut() {
            layer.delta.clear();
        }
        return;
    }

    for layer in layers.iter_mut() {
        let report = step_graph(graph, &layer.code, settings.solubility_plasma);
        if report.removed > 0 {
            log::debug!("{} traversal removed {} edge(s)", layer.code, report.removed);
        }

        layer.delta.clear();
        let mut edges = graph.edge_ids();
        edges.shuffle(rng);

        for id in edges {
            if graph[id].ignored {
                continue;
            }
            exchange_edge(graph, id, layer, settings);
        }
    }
}

/// Exchanges one molecule across the wall of edge `id` for one tick
fn exchange_edge(graph: &mut Graph, id: EdgeId, layer: &mut MoleculeLayer, settings: &ExchangeSettings) {
    let oxygen = layer.is_oxygen();
    graph[id].transport.insert(layer.code.clone(), 0.0);

    let edge = &graph[id];
    if edge.span.is_empty() {
        return;
    }

    let mut external: f64 = edge
        .span
        .iter()
        .map(|&v| layer.current[v] + layer.delta[v])
        .sum::<f64>()
        / edge.span.len() as f64;

    let flow = edge.flow_um3_per_min / 60.0;
    let conductance = edge.area_um2 * layer.permeability / edge.wall_um;
    if flow < MIN_EXCHANGE_FLOW {
        return;
    }

    let internal = if oxygen {
        external *= settings.solubility_tissue;
        settings.solubility_plasma * (graph[edge.from].oxygen_mmHg + graph[edge.to].oxygen_mmHg) / 2.0
    } else {
        edge.fraction_of(&layer.code) * layer.concentration
    };

    if (internal - external).abs() <= DELTA_TOLERANCE {
        return;
    }

    let volume = settings.site_volume_um3;
    let mut internal_new = internal;
    let mut external_new = external;

    if layer.permeability > volume / edge.area_um2 {
        internal_new = (internal_new * flow + volume * external_new) / (flow + volume);
        external_new = internal_new;
    } else {
        for _ in 0..EXCHANGE_SECONDS {
            internal_new = (internal_new * flow + conductance * external_new) / (flow + conductance);
            external_new += conductance * (internal_new - external_new) / volume;
        }
    }

    let target = if oxygen {
        external_new / settings.solubility_tissue
    } else {
        external_new
    };
    for &voxel in &edge.span {
        let present = layer.current[voxel] + layer.delta[voxel];
        layer.delta[voxel] += (target - present).max(0.0);
    }

    let transported = if oxygen {
        (internal - internal_new) * edge.flow_um3_per_min
    } else {
        (internal - internal_new) / layer.concentration
    };
    graph[id].transport.insert(layer.code.clone(), transported);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LatticeShape;
    use crate::graph::{EdgeLevel, EdgeType};
    use glam::IVec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn settings() -> ExchangeSettings {
        ExchangeSettings {
            solubility_plasma: 3.1e-5,
            solubility_tissue: 3.1e-5,
            site_volume_um3: 30.0 * 30.0 * 8.7,
        }
    }

    fn voxel() -> IVec3 {
        IVec3::new(2, 2, 0)
    }

    #[test]
    fn test_simple_step_tops_up_spanned_voxel() {
        let mut g = Graph::new();
        let e = g.connect(IVec3::new(2, 2, 0), IVec3::new(3, 3, 0), EdgeType::Capillary, EdgeLevel::Variable);
        g[e].span = vec![voxel()];

        let mut layer = MoleculeLayer::new("GLUCOSE", 5.0, 0.0, LatticeShape::new(5, 5, 1));
        layer.previous[voxel()] = 1.0;
        layer.delta[IVec3::new(0, 0, 0)] = 9.0;

        let mut layers = vec![layer];
        simple_step(&g, &mut layers);

        assert_eq!(layers[0].delta[voxel()], 4.0);
        assert_eq!(layers[0].delta[IVec3::new(0, 0, 0)], 0.0);
    }

    #[test]
    fn test_simple_step_skips_ignored_and_saturated() {
        let mut g = Graph::new();
        let e = g.connect(IVec3::new(2, 2, 0), IVec3::new(3, 3, 0), EdgeType::Capillary, EdgeLevel::Variable);
        g[e].span = vec![voxel()];

        let mut layer = MoleculeLayer::new("GLUCOSE", 5.0, 0.0, LatticeShape::new(5, 5, 1));
        layer.previous[voxel()] = 7.0;
        let mut layers = vec![layer];
        simple_step(&g, &mut layers);
        assert_eq!(layers[0].delta[voxel()], 0.0);

        g[e].ignored = true;
        layers[0].previous[voxel()] = 1.0;
        simple_step(&g, &mut layers);
        assert_eq!(layers[0].delta[voxel()], 0.0);
    }

    /// Root-fed capillary with enough flow to exchange
    fn fed_capillary() -> Graph {
        let mut g = Graph::new();
        let e = g.connect(IVec3::new(2, 2, 0), IVec3::new(3, 2, 0), EdgeType::Capillary, EdgeLevel::Variable);
        let inlet = g[e].from;
        g[inlet].is_root = true;
        let edge = &mut g[e];
        edge.span = vec![voxel()];
        edge.flow_um3_per_min = 600_000.0;
        edge.area_um2 = 2000.0;
        edge.wall_um = 1.0;
        edge.radius_um = 4.0;
        g
    }

    #[test]
    fn test_complex_step_delivers_to_depleted_voxel() {
        let mut g = fed_capillary();
        let mut layers = vec![MoleculeLayer::new("GLUCOSE", 5.0, 0.01, LatticeShape::new(5, 5, 1))];
        let mut rng = StdRng::seed_from_u64(1);

        complex_step(&mut g, &mut layers, &settings(), &mut rng);

        let delta = layers[0].delta[voxel()];
        assert!(delta > 0.0 && delta <= 5.0, "delta {}", delta);
        let (_, edge) = g.edges().next().unwrap();
        assert_eq!(edge.fraction_of("GLUCOSE"), 1.0);
        assert!(edge.transport_of("GLUCOSE") > 0.0);
    }

    #[test]
    fn test_complex_step_high_permeability_equilibrates() {
        let mut g = fed_capillary();
        let mut layers = vec![MoleculeLayer::new("GLUCOSE", 5.0, 1e6, LatticeShape::new(5, 5, 1))];
        let mut rng = StdRng::seed_from_u64(1);

        complex_step(&mut g, &mut layers, &settings(), &mut rng);

        // One-shot mixing of 10000 μm³/s of blood with one voxel of tissue
        let volume = settings().site_volume_um3;
        let expected = 5.0 * 10_000.0 / (10_000.0 + volume);
        assert!((layers[0].delta[voxel()] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_complex_step_slow_edges_do_not_exchange() {
        let mut g = fed_capillary();
        let id = g.edge_ids()[0];
        g[id].flow_um3_per_min = 60.0 * (MIN_EXCHANGE_FLOW - 1.0);
        let mut layers = vec![MoleculeLayer::new("GLUCOSE", 5.0, 0.01, LatticeShape::new(5, 5, 1))];
        let mut rng = StdRng::seed_from_u64(1);

        complex_step(&mut g, &mut layers, &settings(), &mut rng);
        assert_eq!(layers[0].delta[voxel()], 0.0);
        assert_eq!(g[id].transport_of("GLUCOSE"), 0.0);
    }

    #[test]
    fn test_complex_step_disconnected_network_clears_deltas() {
        let mut g = fed_capillary();
        let id = g.edge_ids()[0];
        g[id].ignored = true;
        let mut layers = vec![MoleculeLayer::new("GLUCOSE", 5.0, 0.01, LatticeShape::new(5, 5, 1))];
        layers[0].delta[voxel()] = 3.0;
        let mut rng = StdRng::seed_from_u64(1);

        complex_step(&mut g, &mut layers, &settings(), &mut rng);
        assert!(layers[0].delta.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_complex_step_oxygen_raises_tissue_pressure() {
        let mut g = fed_capillary();
        let mut layers = vec![MoleculeLayer::new("OXYGEN", 0.0, 0.01, LatticeShape::new(5, 5, 1))];
        layers[0].current[voxel()] = 20.0;
        let mut rng = StdRng::seed_from_u64(1);

        complex_step(&mut g, &mut layers, &settings(), &mut rng);

        let delta = layers[0].delta[voxel()];
        assert!(delta > 0.0);
        assert!(20.0 + delta <= 100.0);
        let (_, edge) = g.edges().next().unwrap();
        assert!(edge.transport_of("OXYGEN") > 0.0);
    }
}
