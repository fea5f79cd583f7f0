//! Network construction.
//!
//! Two layouts are supported: a deterministic tessellated pattern and a
//! stochastic root-driven growth. Both return a fully solved graph; growth
//! may come back empty, in which case construction is retried.

mod growth;
mod layout;
mod motifs;
mod pattern;
mod remodel;

pub use growth::{grow_network, refine_network, subdivide_network, update_network, RootSet};
pub use layout::{parse_clauses, parse_code, parse_layout, place_roots, BorderClause, RootClause, RootKind, RootPlan};
pub use motifs::{add_connections, add_motif, add_motifs, add_root, add_segments, Motif};
pub use pattern::pattern_network;
pub use remodel::remodel_round;

use rand::Rng;

use crate::geometry::SiteGeometry;
use crate::graph::Graph;

/// Consecutive unchanged motif rounds before growth gives up
pub const MOTIF_STALL_LIMIT: i64 = 50;

/// Growth attempts before construction settles for an empty graph
pub const MAX_CONSTRUCTION_ATTEMPTS: usize = 100;

/// Cap on remodeling rounds per level
pub const MAX_REMODEL_ROUNDS: usize = 100;

/// Round change fraction below which remodeling has converged
pub const REMODELING_FRACTION: f64 = 0.05;

/// Baseline weight added to remodeling probabilities
pub const PROBABILITY_WEIGHT: f64 = 0.2;

/// Loop counters from one construction, for checking against their caps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthReport {
    /// Growth attempts, including the one that was kept
    pub attempts: usize,
    /// Most remodeling rounds run at one level
    pub remodel_rounds: usize,
    /// Highest motif stall count reached
    pub motif_stalls_max: i64,
    /// Motif rounds run over all attempts
    pub motif_rounds: usize,
}

/// Which construction strategy to run
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkLayout {
    Pattern,
    Growth(Vec<BorderClause>),
}

/// Builds a network with the given layout.
///
/// Growth is retried from scratch while it yields an empty graph; after
/// `MAX_CONSTRUCTION_ATTEMPTS` the empty graph is returned as is.
pub fn build_network(layout: &NetworkLayout, geometry: &dyn SiteGeometry, rng: &mut impl Rng) -> Graph {
    let (graph, report) = build_network_with_report(layout, geometry, rng);
    log::debug!("Construction counters: {:?}", report);
    graph
}

/// [`build_network`] that also hands back the loop counters
pub fn build_network_with_report(
    layout: &NetworkLayout,
    geometry: &dyn SiteGeometry,
    rng: &mut impl Rng,
) -> (Graph, GrowthReport) {
    let mut report = GrowthReport::default();
    let clauses = match layout {
        NetworkLayout::Pattern => return (pattern_network(geometry, rng), report),
        NetworkLayout::Growth(clauses) => clauses,
    };

    if clauses.is_empty() {
        log::warn!("Growth layout has no root clauses, network stays empty");
        return (Graph::new(), report);
    }

    while report.attempts < MAX_CONSTRUCTION_ATTEMPTS {
        report.attempts += 1;
        let graph = grow_network(clauses, geometry, rng, &mut report);
        if !graph.is_empty() {
            log::info!(
                "Grew network with {} edges after {} attempt(s)",
                graph.edge_count(),
                report.attempts
            );
            return (graph, report);
        }
    }

    log::warn!(
        "Network construction failed after {} attempts, using an empty graph",
        MAX_CONSTRUCTION_ATTEMPTS
    );
    (Graph::new(), report)
}
