//! # landscaper-core
//!
//! Core types and utilities shared across all Landscaper crates.
//!
//! This crate provides:
//! - FriendlyIdentifier for referencing devices by a short hint
//! - ActivationParams controlling the landscape startup stages
//! - LandscapeError enum for unified error handling
//! - Path utilities for expanding configured directories
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (FriendlyIdentifier, ActivationParams, constants)
//! - `error`: Error types and result aliases
//! - `utils`: Utility functions and helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{LandscapeError, LandscapeResult};
pub use types::{ActivationParams, DeviceExtensionType, FriendlyIdentifier, StartupLevel};
