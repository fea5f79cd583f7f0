//! Configuration module for loading component parameters.

mod parameters;

pub use parameters::{
    AdaptationParameters, GraphLayout, MoleculeParameters, Parameters, SitesParameters, TransportParameters,
};
