//! Landscape activation parameters.

use serde::{Deserialize, Serialize};

/// Parameters that customize the landscape activation stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ActivationParams {
    /// Skip creating devices during integration
    pub disable_device_activation: bool,
    /// Skip creating services during integration
    pub disable_service_activation: bool,
    /// Tolerate devices that fail connectivity checks
    pub allow_missing_devices: bool,
    /// Tolerate device entries no installed coupling recognizes
    pub allow_unknown_devices: bool,
    /// Tolerate services that fail connectivity checks
    pub allow_missing_services: bool,
    /// Tolerate service entries no installed coupling recognizes
    pub allow_unknown_services: bool,
    /// Run feature validation during the operational stage
    pub validate_features: bool,
    /// Run topology validation during the operational stage
    pub validate_topology: bool,
}

impl Default for ActivationParams {
    fn default() -> Self {
        Self {
            disable_device_activation: false,
            disable_service_activation: false,
            allow_missing_devices: false,
            allow_unknown_devices: false,
            allow_missing_services: false,
            allow_unknown_services: false,
            validate_features: true,
            validate_topology: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ActivationParams::default();
        assert!(!params.disable_device_activation);
        assert!(!params.allow_unknown_devices);
        assert!(params.validate_features);
        assert!(params.validate_topology);
    }
}
