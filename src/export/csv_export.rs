//! CSV export of per-edge hemodynamics over time.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use serde::Serialize;

use crate::graph::{Edge, EdgeType, Graph};

/// One row per edge per recorded tick
#[derive(Debug, Clone, Serialize)]
pub struct EdgeRecord {
    pub tick: u64,
    pub edge: usize,
    pub from_x: i32,
    pub from_y: i32,
    pub from_z: i32,
    pub to_x: i32,
    pub to_y: i32,
    pub to_z: i32,
    pub edge_type: EdgeType,
    pub radius_um: f64,
    pub length_um: f64,
    pub wall_um: f64,
    /// Wall shear stress (mmHg)
    pub shear_mmHg: f64,
    /// Circumferential stress (mmHg)
    pub circum_mmHg: f64,
    pub flow_um3_per_min: f64,
    pub perfused: bool,
    pub ignored: bool,
}

impl EdgeRecord {
    pub fn new(tick: u64, index: usize, graph: &Graph, edge: &Edge) -> Self {
        let from = graph.position(edge.from);
        let to = graph.position(edge.to);
        Self {
            tick,
            edge: index,
            from_x: from.x,
            from_y: from.y,
            from_z: from.z,
            to_x: to.x,
            to_y: to.y,
            to_z: to.z,
            edge_type: edge.edge_type,
            radius_um: edge.radius_um,
            length_um: edge.length_um,
            wall_um: edge.wall_um,
            shear_mmHg: edge.shear_mmHg,
            circum_mmHg: edge.circum_mmHg,
            flow_um3_per_min: edge.flow_um3_per_min,
            perfused: edge.perfused,
            ignored: edge.ignored,
        }
    }
}

/// Appends edge tables to a CSV file
pub struct EdgeCsvExporter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl EdgeCsvExporter {
    /// Create an exporter in `dir` with a timestamped filename
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        Self::create(dir.as_ref().join(format!("edges_{}.csv", timestamp)))
    }

    /// Create an exporter writing to exactly `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = csv::Writer::from_writer(File::create(&path)?);
        log::info!("CSV export started: {}", path.display());
        Ok(Self { writer, path, rows: 0 })
    }

    /// Writes one row for every edge of `graph`
    pub fn record(&mut self, tick: u64, graph: &Graph) -> Result<()> {
        for (index, (_, edge)) in graph.edges().enumerate() {
            self.writer.serialize(EdgeRecord::new(tick, index, graph, edge))?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Finish writing and return the output path
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        log::info!("CSV export completed: {} rows to {}", self.rows, self.path.display());
        Ok(self.path)
    }
}
