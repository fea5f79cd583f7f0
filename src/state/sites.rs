//! The vascular sites component: a network laid over the tissue lattice.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::adaptation::adapt_network;
use crate::builder::build_network;
use crate::config::{AdaptationParameters, SitesParameters, TransportParameters};
use crate::geometry::{make_geometry, LatticeShape, SiteGeometry};
use crate::graph::Graph;
use crate::transport::{
    complex_step, is_oxygen, simple_step, update_spans, ExchangeSettings, LatticeField, MoleculeLayer, TransportMode,
};

/// Vessel network coupled to per-molecule lattice layers
pub struct GraphSites {
    geometry: Box<dyn SiteGeometry>,
    graph: Graph,
    /// Voxels spanned by perfused edges
    mask: LatticeField<bool>,
    layers: Vec<MoleculeLayer>,
    mode: TransportMode,
    exchange: ExchangeSettings,
}

impl GraphSites {
    /// Builds the network with the seed from `sites` and computes spans.
    ///
    /// No molecule layer is registered yet; see [`GraphSites::register_defaults`].
    pub fn new(sites: &SitesParameters, transport: &TransportParameters) -> Self {
        let mut rng = StdRng::seed_from_u64(sites.seed);
        Self::with_rng(sites, transport, &mut rng)
    }

    /// Same as [`GraphSites::new`] but drawing from a caller-owned generator
    pub fn with_rng(sites: &SitesParameters, transport: &TransportParameters, rng: &mut impl Rng) -> Self {
        let geometry = make_geometry(sites.geometry, sites.shape(), sites.step_size_xy_um);
        let mut graph = build_network(&sites.network_layout(), geometry.as_ref(), rng);
        let mask = update_spans(&mut graph, geometry.as_ref());

        log::info!(
            "Vascular sites ready: {} edges, {} perfused voxels",
            graph.edge_count(),
            mask.iter().filter(|&&m| m).count()
        );

        Self {
            geometry,
            graph,
            mask,
            layers: Vec::new(),
            mode: transport.mode,
            exchange: transport.exchange(sites.lattice_site_volume_um3),
        }
    }

    /// Adds a molecule layer; its fields must match the lattice shape
    pub fn register(&mut self, layer: MoleculeLayer) -> anyhow::Result<()> {
        let shape = self.geometry.shape();
        anyhow::ensure!(
            layer.delta.shape() == shape && layer.current.shape() == shape && layer.previous.shape() == shape,
            "Layer {} does not match the lattice {:?}",
            layer.code,
            shape
        );
        if self.layer(&layer.code).is_some() {
            anyhow::bail!("Layer {} is already registered", layer.code);
        }
        log::debug!("Registered layer {}", layer.code);
        self.layers.push(layer);
        Ok(())
    }

    /// Registers one empty layer per configured molecule
    pub fn register_defaults(&mut self, transport: &TransportParameters) -> anyhow::Result<()> {
        let shape = self.shape();
        for molecule in &transport.molecules {
            self.register(MoleculeLayer::new(
                molecule.code.clone(),
                molecule.concentration,
                molecule.permeability,
                shape,
            ))?;
        }
        Ok(())
    }

    /// Writes this tick's delta field of every layer
    pub fn step(&mut self, rng: &mut impl Rng) {
        match self.mode {
            TransportMode::Simple => simple_step(&self.graph, &mut self.layers),
            TransportMode::Complex => complex_step(&mut self.graph, &mut self.layers, &self.exchange, rng),
        }
    }

    /// Adapts radii and walls to the current oxygen field, then refreshes spans.
    ///
    /// Without an oxygen layer the tissue is taken as anoxic. Returns the
    /// number of edges removed.
    pub fn remodel(&mut self, params: &AdaptationParameters) -> usize {
        let shape = self.shape();
        let removed = match self.layers.iter().find(|l| is_oxygen(&l.code)) {
            Some(layer) => adapt_network(&mut self.graph, &layer.current, params),
            None => adapt_network(&mut self.graph, &LatticeField::new(shape), params),
        };
        if removed > 0 {
            self.mask = update_spans(&mut self.graph, self.geometry.as_ref());
        }
        removed
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn mask(&self) -> &LatticeField<bool> {
        &self.mask
    }

    pub fn geometry(&self) -> &dyn SiteGeometry {
        self.geometry.as_ref()
    }

    pub fn shape(&self) -> LatticeShape {
        self.geometry.shape()
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn layers(&self) -> &[MoleculeLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [MoleculeLayer] {
        &mut self.layers
    }

    pub fn layer(&self, code: &str) -> Option<&MoleculeLayer> {
        self.layers.iter().find(|l| l.code.eq_ignore_ascii_case(code))
    }

    pub fn layer_mut(&mut self, code: &str) -> Option<&mut MoleculeLayer> {
        self.layers.iter_mut().find(|l| l.code.eq_ignore_ascii_case(code))
    }
}
