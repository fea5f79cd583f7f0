//! Parameter structures for the vascular sites component.
//!
//! Physiological values carry their source where one exists.

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::builder::{parse_code, parse_layout, NetworkLayout};
use crate::geometry::{GeometryKind, LatticeShape};
use crate::transport::{ExchangeSettings, TransportMode};

/// Top-level parameters container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    /// Lattice, geometry and network layout
    pub sites: SitesParameters,
    /// Molecules and stepping scheme
    pub transport: TransportParameters,
    /// Structural adaptation of vessel radii and walls
    #[serde(default)]
    pub adaptation: AdaptationParameters,
}

impl Parameters {
    /// Load parameters from JSON files, or use defaults if files don't exist
    pub fn load_or_default() -> Self {
        Self::load_from_dir("data/parameters")
    }

    /// Load parameters from specific directory
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            sites: SitesParameters::load_or_default(dir.join("sites.json")),
            transport: TransportParameters::load_or_default(dir.join("transport.json")),
            adaptation: AdaptationParameters::load_or_default(dir.join("adaptation.json")),
        }
    }

    /// Load a single combined parameter file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read parameters from {:?}", path))?;
        let params =
            serde_json::from_str(&contents).with_context(|| format!("Failed to parse parameters in {:?}", path))?;
        log::info!("Loaded parameters from {:?}", path);
        Ok(params)
    }
}

/// Reads a JSON parameter file, falling back to defaults on any failure
fn load_json_or_default<T, P>(path: P, label: &str) -> T
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    match std::fs::read_to_string(path.as_ref()) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(params) => {
                log::info!("Loaded {} parameters from {:?}", label, path.as_ref());
                params
            }
            Err(e) => {
                log::warn!("Failed to parse {} parameters: {}, using defaults", label, e);
                T::default()
            }
        },
        Err(_) => {
            log::info!("{} parameters file not found, using defaults", label);
            T::default()
        }
    }
}

/// Network construction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GraphLayout {
    /// Repeating unit cell tiled over the lattice
    Pattern,
    /// Stochastic growth from border roots
    #[default]
    Growth,
}

/// Lattice and network layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitesParameters {
    /// Lattice extent in x (voxels)
    pub lattice_length: i32,
    /// Lattice extent in y (voxels)
    pub lattice_width: i32,
    /// Lattice extent in z (voxels)
    pub lattice_height: i32,

    /// Voxel edge in the xy plane (μm)
    pub step_size_xy_um: f64,
    /// Voxel edge along z (μm)
    pub step_size_z_um: f64,
    /// Volume of one voxel (μm³)
    pub lattice_site_volume_um3: f64,

    pub geometry: GeometryKind,
    pub graph_layout: GraphLayout,

    /// Free-text root layout, e.g. `"LEFT single 50A RIGHT single 50V"`
    pub root_layout: String,
    /// Layout code (`S`, `A`, `R`, `L`); when set, the per-border setups
    /// below are used instead of `root_layout`
    #[serde(default)]
    pub root_code: Option<String>,
    #[serde(default)]
    pub root_left: String,
    #[serde(default)]
    pub root_top: String,
    #[serde(default)]
    pub root_right: String,
    #[serde(default)]
    pub root_bottom: String,

    /// Seed of the random number generator
    pub seed: u64,
}

impl SitesParameters {
    /// Load from JSON file or return defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        load_json_or_default(path, "Sites")
    }

    pub fn shape(&self) -> LatticeShape {
        LatticeShape::new(self.lattice_length, self.lattice_width, self.lattice_height)
    }

    /// Construction strategy with the root clauses parsed
    pub fn network_layout(&self) -> NetworkLayout {
        match self.graph_layout {
            GraphLayout::Pattern => NetworkLayout::Pattern,
            GraphLayout::Growth => {
                let clauses = match &self.root_code {
                    Some(code) => parse_code(
                        code,
                        [
                            self.root_left.as_str(),
                            self.root_top.as_str(),
                            self.root_right.as_str(),
                            self.root_bottom.as_str(),
                        ],
                    ),
                    None => parse_layout(&self.root_layout),
                };
                NetworkLayout::Growth(clauses)
            }
        }
    }
}

impl Default for SitesParameters {
    fn default() -> Self {
        let step_size_xy_um = 30.0;
        let step_size_z_um = 8.7;
        Self {
            lattice_length: 60,
            lattice_width: 60,
            lattice_height: 1,
            step_size_xy_um,
            step_size_z_um,
            lattice_site_volume_um3: step_size_xy_um * step_size_xy_um * step_size_z_um,
            geometry: GeometryKind::Rect,
            graph_layout: GraphLayout::Growth,
            root_layout: "LEFT single 50A RIGHT single 50V".to_string(),
            root_code: None,
            root_left: String::new(),
            root_top: String::new(),
            root_right: String::new(),
            root_bottom: String::new(),
            seed: 0,
        }
    }
}

/// Molecule carried by the blood
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoleculeParameters {
    /// Molecule code, e.g. `"GLUCOSE"`
    pub code: String,
    /// Concentration in blood (fmol/μm³; oxygen in mmHg)
    pub concentration: f64,
    /// Wall permeability at 1 μm thickness (μm/s)
    pub permeability: f64,
}

/// Transport stepping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportParameters {
    pub mode: TransportMode,

    /// Oxygen solubility in plasma (fmol/(μm³·mmHg))
    /// Source: Christoforides et al., J Appl Physiol 1969
    pub oxygen_solubility_plasma: f64,

    /// Oxygen solubility in tissue (fmol/(μm³·mmHg))
    /// Source: Goldman, Microcirculation 2008
    pub oxygen_solubility_tissue: f64,

    pub molecules: Vec<MoleculeParameters>,
}

impl TransportParameters {
    /// Load from JSON file or return defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        load_json_or_default(path, "Transport")
    }

    /// Exchange constants for a lattice with the given voxel volume
    pub fn exchange(&self, site_volume_um3: f64) -> ExchangeSettings {
        ExchangeSettings {
            solubility_plasma: self.oxygen_solubility_plasma,
            solubility_tissue: self.oxygen_solubility_tissue,
            site_volume_um3,
        }
    }
}

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            mode: TransportMode::Simple,
            oxygen_solubility_plasma: 0.00003,
            oxygen_solubility_tissue: 0.000014,
            molecules: vec![
                MoleculeParameters {
                    code: "GLUCOSE".to_string(),
                    concentration: 0.005,
                    permeability: 0.5,
                },
                MoleculeParameters {
                    code: "OXYGEN".to_string(),
                    concentration: 100.0,
                    permeability: 0.4,
                },
            ],
        }
    }
}

/// Radius and wall adaptation to shear, circumferential stress, flow and
/// oxygen demand.
/// Source: Pries AR, Secomb TW, Gaehtgens P. Am J Physiol 1998
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationParameters {
    /// Ticks between adaptation passes
    pub interval_ticks: u32,
    /// Weight of wall shear stress
    pub scale_shear: f64,
    /// Weight of circumferential stress
    pub scale_circum: f64,
    /// Weight of flow rate
    pub scale_flow: f64,
    /// Weight of oxygen demand
    pub scale_metabolic: f64,
    /// Coupling of shear into wall mass
    pub scale_tau: f64,
    /// Coupling of circumferential stress into radius
    pub scale_sigma: f64,
}

impl AdaptationParameters {
    /// Load from JSON file or return defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        load_json_or_default(path, "Adaptation")
    }
}

impl Default for AdaptationParameters {
    fn default() -> Self {
        Self {
            interval_ticks: 60,
            scale_shear: 0.05,
            scale_circum: 0.05,
            scale_flow: 0.05,
            scale_metabolic: 0.05,
            scale_tau: 0.1,
            scale_sigma: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BorderClause, RootClause};
    use crate::geometry::Border;
    use crate::graph::EdgeType;

    #[test]
    fn test_default_site_volume() {
        let params = SitesParameters::default();
        assert!((params.lattice_site_volume_um3 - 7830.0).abs() < 1e-9);
        assert_eq!(params.shape(), LatticeShape::new(60, 60, 1));
    }

    #[test]
    fn test_default_layout_has_artery_and_vein() {
        let NetworkLayout::Growth(clauses) = SitesParameters::default().network_layout() else {
            panic!("default layout should grow");
        };
        assert_eq!(
            clauses,
            vec![
                BorderClause {
                    border: Border::Left,
                    clause: RootClause::Single { percent: 50, edge_type: EdgeType::Artery },
                },
                BorderClause {
                    border: Border::Right,
                    clause: RootClause::Single { percent: 50, edge_type: EdgeType::Vein },
                },
            ]
        );
    }

    #[test]
    fn test_root_code_overrides_free_text() {
        let params = SitesParameters {
            root_code: Some("A".to_string()),
            root_top: "3".to_string(),
            ..SitesParameters::default()
        };
        let NetworkLayout::Growth(clauses) = params.network_layout() else {
            panic!("expected growth layout");
        };
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].border, Border::Top);
        assert_eq!(clauses[0].clause, RootClause::Alternate { count: 3 });
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let params = Parameters::load_from_dir(dir.path());
        assert_eq!(params.transport.molecules.len(), 2);
        assert_eq!(params.adaptation.interval_ticks, 60);
    }

    #[test]
    fn test_serialization() {
        let params = Parameters::default();
        let json = serde_json::to_string_pretty(&params).unwrap();
        let parsed: Parameters = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sites.root_layout, params.sites.root_layout);
        assert_eq!(parsed.transport.mode, params.transport.mode);
    }

    #[test]
    fn test_from_file_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Parameters::from_file(&path).is_err());
    }
}
