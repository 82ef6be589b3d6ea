//! Error types and result aliases for Landscaper operations.
//!
//! Provides a unified error type that covers all possible error conditions
//! across the landscape layers with actionable error messages.

use thiserror::Error;

/// Unified error type for all Landscaper operations
#[derive(Error, Debug)]
pub enum LandscapeError {
    // Config errors
    #[error("Failed to parse {file}: {message}")]
    ConfigParse { file: String, message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("{title}:\n{}", .failures.join("\n"))]
    ConfigurationReport { title: String, failures: Vec<String> },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Unknown credential '{identifier}'")]
    Credential { identifier: String },

    // Usage errors
    #[error("Semantic error: {message}")]
    Semantic { message: String },

    #[error("Not overloaded: {message}")]
    NotOverloaded { message: String },

    // Pool errors
    #[error("Checkout failed: {message}")]
    Checkout { message: String },

    #[error("Checkin failed: {message}")]
    Checkin { message: String },

    // Connectivity errors
    #[error("Unable to resolve IP address for {identity}")]
    Resolution { identity: String },

    #[error("Timeout waiting for {what_for}\n{}", .detail.join("\n"))]
    Timeout { what_for: String, detail: Vec<String> },

    #[error("Command failed: {message}")]
    Command {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Landscaper operations
pub type LandscapeResult<T> = Result<T, LandscapeError>;

impl LandscapeError {
    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create a semantic (API misuse) error
    pub fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a not-overloaded error for a default trait method
    pub fn not_overloaded(message: impl Into<String>) -> Self {
        Self::NotOverloaded {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LandscapeError::Timeout { .. } | LandscapeError::Io { .. } | LandscapeError::Command { .. }
        )
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            LandscapeError::ConfigParse { .. } => {
                Some("Check the file syntax; .yaml, .yml, .json and .toml files are supported")
            },
            LandscapeError::ConfigurationReport { .. } => {
                Some("Fix the listed entries in the landscape file and run 'landscaper check'")
            },
            LandscapeError::Credential { .. } => {
                Some("Add the credential to the credentials file or fix the identifier in the device entry")
            },
            LandscapeError::Checkout { .. } => {
                Some("Check the resource back in before checking it out again")
            },
            LandscapeError::Resolution { .. } => {
                Some("Declare an 'ipaddr' for the device or make sure its 'host' resolves")
            },
            LandscapeError::Timeout { .. } => {
                Some("Increase the completion timeout or verify the target is reachable")
            },
            _ => None,
        }
    }
}
