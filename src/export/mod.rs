//! Export of network snapshots.
//!
//! Provides a per-tick CSV edge table and a JSON snapshot of the full graph.

mod csv_export;
mod json_export;

pub use csv_export::{EdgeCsvExporter, EdgeRecord};
pub use json_export::{export_network_json, export_network_json_to, NetworkExport, NodeRecord};
