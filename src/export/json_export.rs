//! JSON snapshot of the vessel network.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use serde::Serialize;

use super::EdgeRecord;
use crate::graph::Graph;

/// Node as written to the snapshot; NaN values serialize as `null`
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub is_root: bool,
    pub pressure_mmHg: f64,
    pub oxygen_mmHg: f64,
}

/// Full network export structure
#[derive(Debug, Clone, Serialize)]
pub struct NetworkExport {
    /// Export timestamp
    pub exported_at: String,
    /// Export version for compatibility
    pub version: &'static str,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl NetworkExport {
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .connected_nodes()
            .into_iter()
            .map(|id| {
                let position = graph.position(id);
                let node = &graph[id];
                NodeRecord {
                    x: position.x,
                    y: position.y,
                    z: position.z,
                    is_root: node.is_root,
                    pressure_mmHg: node.pressure_mmHg,
                    oxygen_mmHg: node.oxygen_mmHg,
                }
            })
            .collect();
        let edges = graph
            .edges()
            .enumerate()
            .map(|(index, (_, edge))| EdgeRecord::new(0, index, graph, edge))
            .collect();

        Self {
            exported_at: Local::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            nodes,
            edges,
        }
    }
}

/// Export the network to `dir` as `network_YYYYMMDD_HHMMSS.json`
///
/// Returns the path to the saved JSON file.
pub fn export_network_json<P: AsRef<Path>>(graph: &Graph, dir: P) -> Result<PathBuf> {
    std::fs::create_dir_all(dir.as_ref())?;
    let timestamp = Local::now();
    let path = dir
        .as_ref()
        .join(format!("network_{}.json", timestamp.format("%Y%m%d_%H%M%S")));
    export_network_json_to(graph, &path)?;
    Ok(path)
}

/// Export the network to a specific file
pub fn export_network_json_to<P: AsRef<Path>>(graph: &Graph, path: P) -> Result<()> {
    let export = NetworkExport::from_graph(graph);
    let file = std::fs::File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, &export)?;

    log::info!("JSON network exported: {}", path.as_ref().display());
    Ok(())
}
