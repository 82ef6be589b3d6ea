//! # landscaper-engine
//!
//! Brings a declared automation landscape to life.
//!
//! Activation runs in three stages:
//! - configuration: validate documents, record them, initialize credentials
//!   and let installed couplings register for the items they recognize
//! - integration: coordinators create devices and services, device groups
//!   are formed
//! - operational: coordinators activate, connectivity is established, the
//!   topology overlay builds clusters and the checkout pools are filled
//!
//! ## Architecture
//!
//! - `landscape`: the `Landscape` object, its builder and the process-wide singleton
//! - `layers`: installation, configuration, integration and operational layers
//! - `coupling`: integration couplings that map configuration to coordinators
//! - `coordinator`: coordinators that create and own devices and services
//! - `device` / `service`: landscape resources
//! - `extension`: protocol extensions attached to resources
//! - `group` / `cluster`: device groups and clusters
//! - `filters`: include and exclude filters
//! - `agents`: system contexts and the local command agent
//! - `power`: power interface lookup
//! - `extractor`: extraction of configuration from a running landscape

pub mod agents;
pub mod cluster;
pub mod coordinator;
pub mod coupling;
pub mod credentials;
pub mod device;
pub mod extension;
pub mod extractor;
pub mod filters;
pub mod group;
pub mod landscape;
pub mod layers;
pub mod power;
pub mod service;

// Re-export main types
pub use agents::{
    ActionPattern, CommandAspects, CommandOutput, ExpectedStatus, LocalCommandAgent, LoggingPattern,
    SystemContext, TimeoutContext,
};
pub use cluster::LandscapeDeviceCluster;
pub use coordinator::{
    ClientCoordinator, ConnectivityReport, ContextFactory, Coordinator, CoordinatorState,
    NodeCoordinator, ServiceCoordinator,
};
pub use coupling::{
    builtin_couplings, sort_by_precedence, ClientCoupling, CouplingKey, IntegrationCoupling,
    NodeCoupling, ServiceCoupling, ANY_SECTION,
};
pub use credentials::CredentialManager;
pub use device::LandscapeDevice;
pub use extension::{ExtendedTarget, ExtensionBinding, ProtocolExtension, SshExtension};
pub use extractor::ConfigurationExtractor;
pub use filters::{
    ExcludeDeviceByGroup, ExcludeDeviceByName, ExcludeDeviceByRole, ExcludeFilter,
    ExcludeServiceByName, Filters, IncludeClusterByName, IncludeDeviceByDeviceType,
    IncludeDeviceByDeviceTypeAndRole, IncludeDeviceByGroup, IncludeDeviceByName,
    IncludeDeviceByRole, IncludeDeviceConfigByDeviceType, IncludeFilter, IncludeServiceByName,
    IncludeServiceByType,
};
pub use group::LandscapeDeviceGroup;
pub use layers::{ConfigurationLayer, InstallationLayer, IntegrationLayer, OperationalLayer};
pub use landscape::{
    install_landscape, landscape_singleton, startup_landscape, Landscape, LandscapeBuilder,
};
pub use power::{PowerInterface, PowerInterfaceRegistry};
pub use service::LandscapeService;
