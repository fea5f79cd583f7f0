//! Runtime state of the vascular sites component.

mod adaptation;
mod sites;

pub use adaptation::adapt_network;
pub use sites::GraphSites;
