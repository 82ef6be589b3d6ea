//! Landscape layers
//!
//! - installation: the couplings a landscape knows about
//! - configuration: loaded documents, validation and credentials
//! - integration: coordinators, devices, services and device groups
//! - operational: connectivity, clusters and checkout pools

pub mod configuration;
pub mod installation;
pub mod integration;
pub mod operational;

pub use configuration::ConfigurationLayer;
pub use installation::InstallationLayer;
pub use integration::IntegrationLayer;
pub use operational::OperationalLayer;
