//! Configuration parsing for Landscaper
//!
//! This crate handles parsing, layering and validation of the landscape,
//! topology, credentials and runtime documents that describe an automation
//! landscape. Documents may be written in YAML, JSON or TOML.

pub mod documents;
pub mod format;
pub mod loader;
pub mod merge;
pub mod record;

// Re-export main types
pub use documents::{
    ApodSection, ClusterSpec, CredentialSpec, CredentialsConfig, DeviceConfig, EnvironmentSection,
    InfrastructureSection, LandscapeConfig, PowerConfig, RuntimeSettings, Secret, SerialConfig,
    ServiceConfig, TopologyConfig,
};
pub use format::ConfigFormat;
pub use loader::{ConfigLoader, ConfigSource, DocumentKind, LoadedConfiguration};
pub use merge::{ConfigLayering, ConfigOverrides};
pub use record::record_declared;

use landscaper_core::error::LandscapeError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, LandscapeError>;
