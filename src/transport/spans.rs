//! Lattice voxels covered by each edge and the perfusion mask.

use super::{LatticeField, DEFAULT_MOLECULES};
use crate::geometry::SiteGeometry;
use crate::graph::Graph;

/// Recomputes the lattice voxels covered by every edge.
///
/// Also seeds missing transport entries with zero and returns a mask of the
/// voxels spanned by perfused edges.
pub fn update_spans(graph: &mut Graph, geometry: &dyn SiteGeometry) -> LatticeField<bool> {
    let mut mask = LatticeField::new(geometry.shape());

    for id in graph.edge_ids() {
        let from = graph.position(graph[id].from);
        let to = graph.position(graph[id].to);
        let span: Vec<_> = geometry.span(from, to).into_iter().filter(|&v| mask.contains(v)).collect();

        let edge = &mut graph[id];
        for code in DEFAULT_MOLECULES {
            edge.transport.entry(code.to_string()).or_insert(0.0);
        }
        if edge.perfused {
            for &voxel in &span {
                mask[voxel] = true;
            }
        }
        edge.span = span;
    }

    mask
}
