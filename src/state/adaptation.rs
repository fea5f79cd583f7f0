//! Structural adaptation of vessel radius and wall thickness.
//!
//! Each edge responds to four stimuli measured against the mean of the
//! edges leaving the roots: wall shear stress, circumferential stress,
//! flow and the oxygen gap between blood and tissue. Radius and wall mass
//! are updated together; an edge that thins below the capillary minimum
//! is removed and the network re-solved.

use crate::config::AdaptationParameters;
use crate::graph::{EdgeId, Graph};
use crate::hemodynamics::{
    calculate_current_state, update_graph, CAP_RADIUS_MIN, MAX_WALL_RADIUS_FRACTION, MIN_WALL_THICKNESS,
};
use crate::transport::LatticeField;

/// Mean stimuli over the root edges
#[derive(Debug, Clone, Copy, PartialEq)]
struct References {
    shear: f64,
    circum: f64,
    flow: f64,
}

fn references(graph: &Graph) -> Option<References> {
    let mut sum = (0.0, 0.0, 0.0);
    let mut count = 0usize;
    for (_, edge) in graph.edges() {
        if edge.ignored || !graph[edge.from].is_root {
            continue;
        }
        sum.0 += edge.shear_mmHg;
        sum.1 += edge.circum_mmHg;
        sum.2 += edge.flow_um3_per_min;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f64;
    Some(References {
        shear: sum.0 / n,
        circum: sum.1 / n,
        flow: sum.2 / n,
    })
}

/// Mean tissue oxygen over the voxels spanned by `id`, zero if it spans none
fn external_oxygen(graph: &Graph, id: EdgeId, oxygen: &LatticeField<f64>) -> f64 {
    let span = &graph[id].span;
    if span.is_empty() {
        return 0.0;
    }
    span.iter().map(|&v| oxygen.get(v).copied().unwrap_or(0.0)).sum::<f64>() / span.len() as f64
}

/// Runs one adaptation pass over every live edge.
///
/// Returns the number of edges removed. The network is re-solved either
/// way: through [`update_graph`] if anything was removed, otherwise with a
/// plain state recomputation.
pub fn adapt_network(graph: &mut Graph, oxygen: &LatticeField<f64>, params: &AdaptationParameters) -> usize {
    let Some(refs) = references(graph) else {
        log::debug!("No live root edges, skipping adaptation");
        return 0;
    };

    let mut removed = 0;
    for id in graph.edge_ids() {
        if graph[id].ignored {
            continue;
        }

        let external = external_oxygen(graph, id, oxygen);
        let (from, to) = (graph[id].from, graph[id].to);
        let internal = (graph[from].oxygen_mmHg + graph[to].oxygen_mmHg) / 2.0;
        if internal == 0.0 {
            continue;
        }

        let edge = &graph[id];
        let s_tau = params.scale_shear * (edge.shear_mmHg / refs.shear).log10();
        let s_sigma = params.scale_circum * (edge.circum_mmHg / refs.circum).log10();
        let s_flow = params.scale_flow * (refs.flow / edge.flow_um3_per_min).log10();
        let s_met = params.scale_metabolic
            * if external == 0.0 {
                1.0
            } else {
                (internal / external).log10()
            };
        let s_wall = 1.0 + (edge.wall_um / MIN_WALL_THICKNESS).log10();

        // Mid-wall radius and wall cross-section per radian
        let rm = edge.radius_um + edge.wall_um / 2.0;
        let am = edge.wall_um * rm;

        let rm_new = rm + rm * (s_tau + s_flow + s_met - params.scale_sigma * s_sigma) / s_wall;
        let am_new = am + am * (s_sigma - params.scale_tau * s_tau) / s_wall;

        let mut wall = am_new / rm_new;
        let radius = rm_new - wall / 2.0;
        if wall / radius > MAX_WALL_RADIUS_FRACTION {
            wall = MAX_WALL_RADIUS_FRACTION * radius;
        }

        if radius.is_nan() || wall.is_nan() || radius < CAP_RADIUS_MIN || wall < MIN_WALL_THICKNESS {
            graph.remove_edge(id);
            graph[from].pressure_mmHg = f64::NAN;
            graph[to].pressure_mmHg = f64::NAN;
            removed += 1;
        } else {
            let edge = &mut graph[id];
            edge.radius_um = radius;
            edge.wall_um = wall;
        }
    }

    if removed > 0 {
        log::info!("Adaptation removed {} edge(s)", removed);
        update_graph(graph);
    } else {
        calculate_current_state(graph);
    }
    removed
}
