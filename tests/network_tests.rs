//! Integration tests for network construction and hemodynamics
//!
//! Covers the concrete left/right growth scenario and the structural
//! properties every built network must satisfy:
//! - node degree never exceeds 3
//! - construction loops stay within their caps
//! - flow runs from high to low pressure
//! - perfused edges lie on an artery root to vein root path
//! - identical seeds give identical networks

use std::collections::{HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::SeedableRng;
use vascular_sites::{
    builder::{
        build_network, build_network_with_report, parse_layout, NetworkLayout, MAX_CONSTRUCTION_ATTEMPTS,
        MAX_REMODEL_ROUNDS, MOTIF_STALL_LIMIT,
    },
    geometry::{make_geometry, GeometryKind, LatticeShape},
    graph::{EdgeCategory, EdgeLevel, EdgeType, Graph, NodeId},
    config::{SitesParameters, TransportParameters},
    hemodynamics::{update_radii, RadiusMode, CAP_RADIUS, CAP_RADIUS_MAX, CAP_RADIUS_MIN, MURRAY_EXPONENT},
    transport::{step_graph, DEFAULT_MOLECULES, MAX_TRAVERSAL_STALLS},
};

fn grow(layout: &str, length: i32, width: i32, seed: u64) -> Graph {
    let geometry = make_geometry(GeometryKind::Rect, LatticeShape::new(length, width, 1), 30.0);
    let mut rng = StdRng::seed_from_u64(seed);
    build_network(&NetworkLayout::Growth(parse_layout(layout)), geometry.as_ref(), &mut rng)
}

fn root_nodes(graph: &Graph) -> Vec<NodeId> {
    graph.connected_nodes().into_iter().filter(|&n| graph[n].is_root).collect()
}

fn roots_of(graph: &Graph, category: EdgeCategory) -> Vec<NodeId> {
    root_nodes(graph)
        .into_iter()
        .filter(|&n| {
            graph
                .edges_out(n)
                .into_iter()
                .chain(graph.edges_in(n))
                .any(|e| graph[e].category() == category)
        })
        .collect()
}

/// Nodes reachable from `starts` along edge direction, or against it
fn reachable(graph: &Graph, starts: &[NodeId], forward: bool) -> HashSet<NodeId> {
    let mut reached: HashSet<NodeId> = starts.iter().copied().collect();
    let mut queue: VecDeque<NodeId> = starts.iter().copied().collect();
    while let Some(node) = queue.pop_front() {
        let next: Vec<NodeId> = if forward {
            graph.edges_out(node).into_iter().map(|e| graph[e].to).collect()
        } else {
            graph.edges_in(node).into_iter().map(|e| graph[e].from).collect()
        };
        for n in next {
            if reached.insert(n) {
                queue.push_back(n);
            }
        }
    }
    reached
}

// ============================================================================
// Left/Right Scenario
// ============================================================================

#[test]
fn test_left_right_scenario() {
    let graph = grow("LEFT single 50A RIGHT single 50V", 60, 60, 0);
    assert!(!graph.is_empty(), "growth should succeed within the attempt cap");

    let roots = root_nodes(&graph);
    assert_eq!(roots.len(), 2, "expected one artery and one vein root");

    let artery_roots: Vec<_> = roots.iter().filter(|&&n| graph.position(n).x == 0).collect();
    let vein_roots: Vec<_> = roots.iter().filter(|&&n| graph.position(n).x == 60).collect();
    assert_eq!(artery_roots.len(), 1);
    assert_eq!(vein_roots.len(), 1);

    let artery_root = *artery_roots[0];
    let touching = graph.edges_in(artery_root).into_iter().chain(graph.edges_out(artery_root));
    for e in touching {
        assert_eq!(graph[e].category(), EdgeCategory::Artery);
    }

    let capillaries = graph.edges_of_type(&[EdgeType::Capillary]);
    assert!(!capillaries.is_empty(), "capillaries should bridge the two trees");
    for id in capillaries {
        let r = graph[id].radius_um;
        assert!(
            (CAP_RADIUS_MIN..=CAP_RADIUS_MAX).contains(&r),
            "capillary radius {:.3} μm outside [{}, {}]",
            r,
            CAP_RADIUS_MIN,
            CAP_RADIUS_MAX
        );
    }

    for node in graph.connected_nodes() {
        assert!(graph.degree(node) <= 3, "node at {:?} has degree {}", graph.position(node), graph.degree(node));
    }
}

#[test]
fn test_empty_layout_gives_empty_graph() {
    let graph = grow("", 40, 40, 0);
    assert!(graph.is_empty());
    assert_eq!(graph.edge_count(), 0);
}

// ============================================================================
// Structural Properties
// ============================================================================

#[test]
fn test_degree_bound_across_seeds() {
    for seed in 0..4 {
        let graph = grow("LEFT single 50A RIGHT single 50V", 40, 40, seed);
        for node in graph.connected_nodes() {
            assert!(graph.degree(node) <= 3, "seed {}: degree {}", seed, graph.degree(node));
        }
    }
}

// ============================================================================
// Termination
// ============================================================================

#[test]
fn test_growth_counters_stay_within_caps() {
    let layout = NetworkLayout::Growth(parse_layout("LEFT single 50A RIGHT single 50V"));
    for kind in [GeometryKind::Rect, GeometryKind::Tri] {
        let geometry = make_geometry(kind, LatticeShape::new(40, 40, 1), 30.0);
        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (graph, report) = build_network_with_report(&layout, geometry.as_ref(), &mut rng);

            assert!(
                (1..=MAX_CONSTRUCTION_ATTEMPTS).contains(&report.attempts),
                "{:?} seed {}: {} attempts",
                kind,
                seed,
                report.attempts
            );
            assert!(report.remodel_rounds <= MAX_REMODEL_ROUNDS, "{:?} seed {}: {:?}", kind, seed, report);
            assert!(report.motif_stalls_max <= MOTIF_STALL_LIMIT, "{:?} seed {}: {:?}", kind, seed, report);
            if !graph.is_empty() {
                assert!(report.motif_rounds > 0);
            }
            for node in graph.connected_nodes() {
                assert!(graph.degree(node) <= 3, "{:?} seed {}: degree {}", kind, seed, graph.degree(node));
            }
        }
    }
}

#[test]
fn test_traversal_stays_bounded_on_built_networks() {
    let solubility = TransportParameters::default()
        .exchange(SitesParameters::default().lattice_site_volume_um3)
        .solubility_plasma;

    for seed in 0..5 {
        let mut graph = grow("LEFT single 50A RIGHT single 50V", 40, 40, seed);
        let edges_before = graph.edge_count();

        for code in DEFAULT_MOLECULES {
            let live = graph.edge_count();
            let report = step_graph(&mut graph, code, solubility);

            assert_eq!(graph.edge_count() + report.removed, live, "seed {} {}: {:?}", seed, code, report);
            assert!(
                report.restarts <= (MAX_TRAVERSAL_STALLS + 1) * (live + 1),
                "seed {} {}: {:?}",
                seed,
                code,
                report
            );
            if live > 0 {
                assert!(report.iterations > 0);
            }
        }
        assert!(graph.edge_count() <= edges_before);
    }
}

#[test]
fn test_flow_follows_pressure() {
    let graph = grow("LEFT single 50A RIGHT single 50V", 60, 60, 0);

    for (_, edge) in graph.edges().filter(|(_, e)| !e.ignored) {
        let p_from = graph[edge.from].pressure_mmHg;
        let p_to = graph[edge.to].pressure_mmHg;
        if !p_from.is_finite() || !p_to.is_finite() {
            continue;
        }
        assert!(
            p_from >= p_to - 1e-9,
            "{:?} edge runs uphill: {:.4} -> {:.4} mmHg",
            edge.edge_type,
            p_from,
            p_to
        );
        assert!(edge.flow_um3_per_min >= 0.0);
    }
}

#[test]
fn test_perfused_edges_lie_on_root_paths() {
    for seed in 0..5 {
        let graph = grow("LEFT single 50A RIGHT single 50V", 60, 60, seed);
        if graph.is_empty() {
            continue;
        }

        let arteries = roots_of(&graph, EdgeCategory::Artery);
        let veins = roots_of(&graph, EdgeCategory::Vein);
        assert!(!arteries.is_empty() && !veins.is_empty(), "seed {}", seed);

        let downstream = reachable(&graph, &arteries, true);
        let upstream = reachable(&graph, &veins, false);

        let mut perfused = 0;
        for (id, edge) in graph.edges().filter(|(_, e)| e.perfused) {
            perfused += 1;
            assert!(
                downstream.contains(&edge.from),
                "seed {}: no artery root reaches the start of {:?}",
                seed,
                id
            );
            assert!(
                upstream.contains(&edge.to),
                "seed {}: the end of {:?} reaches no vein root",
                seed,
                id
            );
        }
        assert!(perfused > 0, "seed {}: nothing perfused", seed);
    }
}

#[test]
fn test_same_seed_same_network() {
    let a = grow("LEFT single 50A RIGHT single 50V", 40, 40, 7);
    let b = grow("LEFT single 50A RIGHT single 50V", 40, 40, 7);

    assert_eq!(a.edge_count(), b.edge_count());
    for ((_, ea), (_, eb)) in a.edges().zip(b.edges()) {
        assert_eq!(a.position(ea.from), b.position(eb.from));
        assert_eq!(a.position(ea.to), b.position(eb.to));
        assert_eq!(ea.edge_type, eb.edge_type);
        assert_eq!(ea.radius_um.to_bits(), eb.radius_um.to_bits());
        assert_eq!(a[ea.from].pressure_mmHg.to_bits(), b[eb.from].pressure_mmHg.to_bits());
    }
}

#[test]
fn test_pattern_layout_on_both_geometries() {
    for kind in [GeometryKind::Rect, GeometryKind::Tri] {
        let geometry = make_geometry(kind, LatticeShape::new(30, 30, 1), 30.0);
        let mut rng = StdRng::seed_from_u64(0);
        let graph = build_network(&NetworkLayout::Pattern, geometry.as_ref(), &mut rng);
        for node in graph.connected_nodes() {
            assert!(graph.degree(node) <= 4);
        }
    }
}

// ============================================================================
// Murray's Law
// ============================================================================

#[test]
fn test_merging_capillaries_obey_murray() {
    let p = |x, y| glam::IVec3::new(x, y, 0);
    let mut g = Graph::new();
    let left = g.connect(p(0, 0), p(4, 4), EdgeType::Capillary, EdgeLevel::Level1);
    let right = g.connect(p(8, 0), p(4, 4), EdgeType::Capillary, EdgeLevel::Level1);
    let parent = g.connect(p(4, 4), p(4, 8), EdgeType::Vein, EdgeLevel::Level1);

    let mut rng = StdRng::seed_from_u64(0);
    update_radii(&mut g, &[left, right], RadiusMode::DownstreamVeins, &mut rng);

    let children = g[left].radius_um.powf(MURRAY_EXPONENT) + g[right].radius_um.powf(MURRAY_EXPONENT);
    let parent_cubed = g[parent].radius_um.powf(MURRAY_EXPONENT);
    assert_eq!(g[left].radius_um, CAP_RADIUS);
    assert!(
        (parent_cubed - children).abs() < 1e-9,
        "parent^3 = {:.6}, children = {:.6}",
        parent_cubed,
        children
    );
}
