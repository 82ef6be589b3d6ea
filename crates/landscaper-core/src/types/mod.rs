//! Core data types for the automation landscape.
//!
//! This module provides the fundamental types used throughout Landscaper:
//! - Friendly identifiers for devices and services
//! - Activation parameters for the startup stages
//! - Extension and startup level constants

pub mod constants;
pub mod identifier;
pub mod params;

// Re-export all public types
pub use constants::{DeviceExtensionType, StartupLevel};
pub use identifier::FriendlyIdentifier;
pub use params::ActivationParams;
