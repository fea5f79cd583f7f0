//! Root-driven growth layout.
//!
//! Roots enter from the borders, motifs grow off them at the coarse level,
//! capillary segments and connections close the circuit, shear-driven
//! remodeling reshapes the network, and unperfused branches are pruned.
//! The surviving network is then subdivided and the cycle repeats once at
//! the fine level.

use rand::seq::SliceRandom;
use rand::Rng;

use super::layout::{place_roots, BorderClause};
use super::motifs::{add_connections, add_motifs, add_root, add_segments, Motif};
use super::remodel::remodel_round;
use super::{GrowthReport, MAX_REMODEL_ROUNDS, REMODELING_FRACTION};
use crate::geometry::SiteGeometry;
use crate::graph::{Edge, EdgeCategory, EdgeId, EdgeLevel, EdgeType, Graph, Root};
use crate::hemodynamics::{
    calculate_flows, calculate_lengths, calculate_pressures, calculate_stresses, calculate_thicknesses,
    check_perfused, reverse_pressures, set_leaf_pressures, set_root_pressures, update_radii, RadiusMode,
};

/// Artery and vein roots that made it into the graph
#[derive(Debug, Clone, Default)]
pub struct RootSet {
    pub arteries: Vec<Root>,
    pub veins: Vec<Root>,
}

/// Grows one candidate network from the given root clauses, adding its loop
/// counts to `report`.
///
/// Returns an empty graph when no artery and vein root pair could be
/// placed, or when pruning leaves no capillary behind.
pub fn grow_network(
    clauses: &[BorderClause],
    geometry: &dyn SiteGeometry,
    rng: &mut impl Rng,
    report: &mut GrowthReport,
) -> Graph {
    let mut graph = Graph::new();

    let mut plans = place_roots(clauses, geometry, rng);
    plans.shuffle(rng);

    let mut leaves = Vec::new();
    for plan in &plans {
        leaves.extend(add_root(&mut graph, geometry, plan, rng));
    }

    let mut roots = RootSet::default();
    for plan in &plans {
        let Some(node) = graph.node_at(plan.site.position) else { continue };
        let Some(edge) = graph.edges_out(node).first().copied() else { continue };
        graph[node].is_root = true;

        let root = Root { node, edge, edge_type: plan.site.edge_type };
        match plan.site.edge_type {
            EdgeType::Artery => roots.arteries.push(root),
            EdgeType::Vein => roots.veins.push(root),
            _ => {}
        }
    }

    if roots.arteries.is_empty() || roots.veins.is_empty() {
        log::debug!(
            "Growth needs an artery and a vein root, placed {} and {}",
            roots.arteries.len(),
            roots.veins.len()
        );
        return Graph::new();
    }

    let level = EdgeLevel::Level1;
    grow_motifs(&mut graph, geometry, leaves, level, rng, report);
    update_network(&mut graph, geometry, &mut roots, level, rng);

    let mut rounds = 0;
    let mut fraction = 1.0;
    while fraction > REMODELING_FRACTION && rounds < MAX_REMODEL_ROUNDS {
        fraction = remodel_round(&mut graph, geometry, level, rng);
        update_network(&mut graph, geometry, &mut roots, level, rng);
        rounds += 1;
        log::debug!("Remodeling round {} changed {:.3} of edges", rounds, fraction);
    }
    report.remodel_rounds = report.remodel_rounds.max(rounds);

    refine_network(&mut graph, &roots, rng);
    if graph.is_empty() {
        return graph;
    }

    let level = EdgeLevel::Level2;
    let midpoints = subdivide_network(&mut graph);
    grow_motifs(&mut graph, geometry, midpoints, level, rng, report);
    update_network(&mut graph, geometry, &mut roots, level, rng);
    refine_network(&mut graph, &roots, rng);

    graph
}

/// Tripods, then doubles, then singles off the given leaves
fn grow_motifs(
    graph: &mut Graph,
    geometry: &dyn SiteGeometry,
    leaves: Vec<EdgeId>,
    level: EdgeLevel,
    rng: &mut impl Rng,
    report: &mut GrowthReport,
) {
    let leaves = add_motifs(graph, geometry, leaves, level, Motif::Triple, rng, report);
    let leaves = add_motifs(graph, geometry, leaves, level, Motif::Double, rng, report);
    add_motifs(graph, geometry, leaves, level, Motif::Single, rng, report);
}

/// Radii, capillary bridges, root and leaf pressures, lengths, pressures and
/// stresses for the current growth level.
///
/// At the fine level the coarse capillaries sit out the first radius pass so
/// that artery and vein trees size themselves from their own leaves.
pub fn update_network(
    graph: &mut Graph,
    geometry: &dyn SiteGeometry,
    roots: &mut RootSet,
    level: EdgeLevel,
    rng: &mut impl Rng,
) {
    let parked: Vec<(EdgeId, Edge)> = if level == EdgeLevel::Level2 {
        graph
            .edges_of_type(&[EdgeType::Capillary])
            .into_iter()
            .filter_map(|cap| graph.remove_edge(cap).map(|edge| (cap, edge)))
            .collect()
    } else {
        Vec::new()
    };

    let leaves = graph.leaves_of_type(&[EdgeType::Artery, EdgeType::Vein]);
    update_radii(graph, &leaves, RadiusMode::UpstreamAll, rng);

    for (cap, edge) in parked {
        graph.restore_edge(cap, edge);
    }

    add_segments(graph, geometry, level, rng);
    add_connections(graph, geometry, level, rng);

    let caps = graph.edges_of_type(&[EdgeType::Capillary]);
    let seeds_with = |graph: &Graph, small: EdgeType| -> Vec<EdgeId> {
        match level {
            EdgeLevel::Level2 => {
                let mut seeds = graph.edges_of_type_at(&[small], level);
                seeds.extend(&caps);
                seeds
            }
            _ => graph.edges_of_type(&[EdgeType::Capillary, small]),
        }
    };

    let seeds = seeds_with(graph, EdgeType::Arteriole);
    update_radii(graph, &seeds, RadiusMode::UpstreamAll, rng);

    for &cap in &caps {
        graph.reverse_edge(cap);
    }
    let seeds = seeds_with(graph, EdgeType::Venule);
    update_radii(graph, &seeds, RadiusMode::UpstreamAll, rng);
    for &cap in &caps {
        graph.reverse_edge(cap);
    }

    for root in roots.arteries.iter_mut().chain(roots.veins.iter_mut()) {
        match level {
            EdgeLevel::Level2 => {
                if let Some(edge) = graph.edges_out(root.node).first().copied() {
                    root.edge = edge;
                }
            }
            _ => {
                if let Some(edge) = graph.edge(root.edge) {
                    root.node = edge.from;
                }
            }
        }
    }

    let artery_pressure = set_root_pressures(graph, &roots.arteries, EdgeCategory::Artery);
    let vein_pressure = set_root_pressures(graph, &roots.veins, EdgeCategory::Vein);
    set_leaf_pressures(graph, artery_pressure, vein_pressure);

    calculate_lengths(graph, geometry, level.scale());
    calculate_pressures(graph);
    calculate_stresses(graph);
}

/// Orients veins toward their roots, keeps only perfused edges and recomputes
/// every hemodynamic property. Clears the graph if no capillary exists.
pub fn refine_network(graph: &mut Graph, roots: &RootSet, rng: &mut impl Rng) {
    for id in graph.edges_of_type(&[EdgeType::Vein, EdgeType::Venule]) {
        graph.reverse_edge(id);
    }
    reverse_pressures(graph);

    if graph.edges_of_type(&[EdgeType::Capillary]).is_empty() {
        graph.clear();
        return;
    }

    check_perfused(graph, &roots.arteries, &roots.veins);
    for id in graph.edge_ids() {
        if graph[id].perfused {
            graph[id].radius_um = 0.0;
        } else {
            graph.remove_edge(id);
        }
    }

    let caps = graph.edges_of_type(&[EdgeType::Capillary]);
    update_radii(graph, &caps, RadiusMode::UpstreamArteries, rng);
    update_radii(graph, &caps, RadiusMode::DownstreamVeins, rng);

    set_root_pressures(graph, &roots.arteries, EdgeCategory::Artery);
    set_root_pressures(graph, &roots.veins, EdgeCategory::Vein);

    calculate_pressures(graph);
    if reverse_pressures(graph) {
        calculate_pressures(graph);
    }

    calculate_thicknesses(graph);
    calculate_stresses(graph);
    calculate_flows(graph);
}

/// Splits every edge at its midpoint.
///
/// Vein and venule halves are laid out root to capillary again, so all
/// halves point away from their root. Returns the first half of every
/// artery and vein, which seed fine-level growth.
pub fn subdivide_network(graph: &mut Graph) -> Vec<EdgeId> {
    let fine_scale = EdgeLevel::Level2.scale();
    let mut midpoints = Vec::new();

    for id in graph.edge_ids() {
        let edge = graph[id].clone();
        let mid_position = (graph.position(edge.from) + graph.position(edge.to)) / 2;
        let mid_pressure = (graph[edge.from].pressure_mmHg + graph[edge.to].pressure_mmHg) / 2.0;

        let mid = graph.ensure_node(mid_position);
        graph[mid].pressure_mmHg = mid_pressure;

        let (a, b) = match edge.category() {
            EdgeCategory::Vein => (edge.to, edge.from),
            _ => (edge.from, edge.to),
        };

        graph.remove_edge(id);
        let halves = [(a, mid), (mid, b)].map(|(from, to)| {
            let mut half = Edge::new(from, to, edge.edge_type, EdgeLevel::Level1);
            half.scale = fine_scale;
            half.perfused = true;
            if matches!(edge.edge_type, EdgeType::Arteriole | EdgeType::Venule) {
                half.radius_um = edge.radius_um;
            }
            graph.add_edge(half)
        });

        if matches!(edge.edge_type, EdgeType::Artery | EdgeType::Vein) {
            midpoints.push(halves[0]);
        }
    }

    midpoints
}
