//! Configuration layer
//!
//! Holds the loaded documents, validates them against the installed
//! couplings and hands out filtered configuration to the other layers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use landscaper_config::documents::APOD_RESERVED_SECTIONS;
use landscaper_config::{
    record_declared, DeviceConfig, LandscapeConfig, LoadedConfiguration, PowerConfig,
    RuntimeSettings, SerialConfig, ServiceConfig, TopologyConfig,
};
use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::types::ActivationParams;

use crate::coupling::{CouplingKey, IntegrationCoupling};
use crate::credentials::CredentialManager;
use crate::filters::Filters;
use crate::landscape::Landscape;

pub const LANDSCAPE_FAILURES_TITLE: &str = "ERROR Landscape validation failures";
pub const TOPOLOGY_FAILURES_TITLE: &str = "ERROR Topology validation failures";

#[derive(Default)]
struct ConfigurationState {
    landscape_info: Option<LandscapeConfig>,
    topology_info: Option<TopologyConfig>,
    credential_manager: Option<Arc<CredentialManager>>,
    recorded: Vec<PathBuf>,
}

/// The documents a landscape was configured with
pub struct ConfigurationLayer {
    loaded: LoadedConfiguration,
    state: RwLock<ConfigurationState>,
}

impl ConfigurationLayer {
    pub fn new(loaded: LoadedConfiguration) -> Self {
        Self {
            loaded,
            state: RwLock::new(ConfigurationState::default()),
        }
    }

    pub fn loaded(&self) -> &LoadedConfiguration {
        &self.loaded
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.loaded.runtime
    }

    /// Validate and adopt the landscape document
    ///
    /// Every declared item whose leaf matches an installed coupling is
    /// validated by the first such coupling. Errors abort with a report;
    /// warnings are logged.
    pub fn load_landscape(
        &self,
        couplings: &[Arc<dyn IntegrationCoupling>],
        _params: &ActivationParams,
    ) -> LandscapeResult<Option<LandscapeConfig>> {
        let landscape = match &self.loaded.landscape {
            Some(landscape) if !landscape.is_empty() => landscape.clone(),
            _ => {
                debug!("No landscape document declared");
                return Ok(None);
            }
        };

        let (errors, warnings) = validate_landscape(&landscape, couplings);

        if !errors.is_empty() {
            return Err(LandscapeError::ConfigurationReport {
                title: LANDSCAPE_FAILURES_TITLE.to_string(),
                failures: errors.iter().map(|e| format!("    {}", e)).collect(),
            });
        }
        for warning in &warnings {
            warn!("Landscape Configuration Warning: {}", warning);
        }

        self.state.write().landscape_info = Some(landscape.clone());
        Ok(Some(landscape))
    }

    /// Validate and adopt the topology document
    pub fn load_topology(&self, _params: &ActivationParams) -> LandscapeResult<Option<TopologyConfig>> {
        let topology = match &self.loaded.topology {
            Some(topology) if !topology.clusters.is_empty() => topology.clone(),
            _ => return Ok(None),
        };

        let (errors, warnings) = topology.validate();
        if !errors.is_empty() {
            return Err(LandscapeError::ConfigurationReport {
                title: TOPOLOGY_FAILURES_TITLE.to_string(),
                failures: errors.iter().map(|e| format!("    {}", e)).collect(),
            });
        }
        for warning in &warnings {
            warn!("Topology Configuration Warning: {}", warning);
        }

        self.state.write().topology_info = Some(topology.clone());
        Ok(Some(topology))
    }

    /// Write the declared landscape and topology into `dir`
    pub async fn record_configuration(&self, dir: &Path) -> LandscapeResult<Vec<PathBuf>> {
        let (landscape, topology) = {
            let state = self.state.read();
            (
                state.landscape_info.as_ref().map(to_value).transpose()?,
                state.topology_info.as_ref().map(to_value).transpose()?,
            )
        };

        let mut written = Vec::new();
        if let Some(value) = landscape {
            written.extend(record_declared(dir, "landscape", &value).await?);
        }
        if let Some(value) = topology {
            written.extend(record_declared(dir, "topology", &value).await?);
        }

        self.state.write().recorded.extend(written.iter().cloned());
        Ok(written)
    }

    /// Files written by `record_configuration`
    pub fn recorded_files(&self) -> Vec<PathBuf> {
        self.state.read().recorded.clone()
    }

    pub fn initialize_credentials(&self) -> LandscapeResult<Arc<CredentialManager>> {
        let manager = match &self.loaded.credentials {
            Some(config) => CredentialManager::from_config(config)?,
            None => CredentialManager::new(),
        };
        let manager = Arc::new(manager);
        debug!("Initialized {} credentials", manager.len());

        self.state.write().credential_manager = Some(manager.clone());
        Ok(manager)
    }

    pub fn credential_manager(&self) -> LandscapeResult<Arc<CredentialManager>> {
        self.state.read().credential_manager.clone().ok_or_else(|| {
            LandscapeError::semantic("Credentials are initialized during the configuration stage.")
        })
    }

    /// Give each installed coupling a look at the configuration
    pub fn attach_to_environment(&self, landscape: &Landscape) -> LandscapeResult<()> {
        for coupling in landscape.installation().installed_couplings() {
            coupling.attach_to_environment(landscape)?;
        }
        Ok(())
    }

    pub fn landscape_info(&self) -> Option<LandscapeConfig> {
        self.state.read().landscape_info.clone()
    }

    pub fn topology_info(&self) -> Option<TopologyConfig> {
        self.state.read().topology_info.clone()
    }

    /// Whether the landscape declares any item handled by `key`
    pub fn declares_items_for(&self, key: &CouplingKey) -> bool {
        let state = self.state.read();
        let Some(landscape) = &state.landscape_info else {
            return false;
        };

        match key.root.as_str() {
            "apod" => landscape.device_configs().iter().any(|config| {
                let section = config.section.as_deref().unwrap_or_default();
                key.matches("apod", section, &config.to_value())
            }),
            "infrastructure" => landscape
                .service_configs()
                .iter()
                .any(|config| key.matches("infrastructure", "services", &config.to_value())),
            _ => false,
        }
    }

    pub fn device_configs(&self, filters: &Filters<DeviceConfig>) -> Vec<DeviceConfig> {
        let configs = self
            .state
            .read()
            .landscape_info
            .as_ref()
            .map(LandscapeConfig::device_configs)
            .unwrap_or_default();
        filters.apply(configs)
    }

    pub fn service_configs(&self, filters: &Filters<ServiceConfig>) -> Vec<ServiceConfig> {
        let configs = self
            .state
            .read()
            .landscape_info
            .as_ref()
            .map(LandscapeConfig::service_configs)
            .unwrap_or_default();
        filters.apply(configs)
    }

    pub fn power_configs(&self) -> Vec<PowerConfig> {
        self.state
            .read()
            .landscape_info
            .as_ref()
            .map(LandscapeConfig::power_configs)
            .unwrap_or_default()
    }

    pub fn serial_configs(&self) -> Vec<SerialConfig> {
        self.state
            .read()
            .landscape_info
            .as_ref()
            .map(LandscapeConfig::serial_configs)
            .unwrap_or_default()
    }
}

fn to_value<T: serde::Serialize>(document: &T) -> LandscapeResult<Value> {
    serde_json::to_value(document).map_err(|e| LandscapeError::ConfigValidation {
        field: "document".to_string(),
        reason: e.to_string(),
    })
}

/// Validate the declared devices and services, returning `(errors, warnings)`
/// with each message prefixed by the path of its item
fn validate_landscape(
    landscape: &LandscapeConfig,
    couplings: &[Arc<dyn IntegrationCoupling>],
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (section, items) in &landscape.apod.sections {
        if APOD_RESERVED_SECTIONS.contains(&section.as_str()) {
            continue;
        }
        let items = items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.skip)
            .map(|(index, item)| (format!("apod/{}/{}", section, index), item.to_value()))
            .collect();
        validate_section("apod", section, items, couplings, &mut errors, &mut warnings);
    }

    let services = landscape
        .infrastructure
        .services
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.skip)
        .map(|(index, item)| (format!("infrastructure/services/{}", index), item.to_value()))
        .collect();
    validate_section("infrastructure", "services", services, couplings, &mut errors, &mut warnings);

    (errors, warnings)
}

fn validate_section(
    root: &str,
    section: &str,
    mut remaining: Vec<(String, Value)>,
    couplings: &[Arc<dyn IntegrationCoupling>],
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    for coupling in couplings {
        let key = coupling.key_parts();
        if !key.matches_section(root, section) {
            continue;
        }

        remaining.retain(|(path, item)| {
            if !key.matches(root, section, item) {
                return true;
            }
            let (item_errors, item_warnings) = coupling.validate_item_configuration(item);
            errors.extend(item_errors.into_iter().map(|e| format!("{}: {}", path, e)));
            warnings.extend(item_warnings.into_iter().map(|w| format!("({}) {}", path, w)));
            false
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::coupling::builtin_couplings;
    use landscaper_config::CredentialsConfig;
    use serde_json::json;

    pub(crate) fn landscape_document(value: Value) -> LandscapeConfig {
        serde_json::from_value(value).unwrap()
    }

    fn layer(landscape: Value) -> ConfigurationLayer {
        ConfigurationLayer::new(LoadedConfiguration {
            landscape: Some(landscape_document(landscape)),
            ..Default::default()
        })
    }

    #[test]
    fn test_load_landscape_reports_item_paths() {
        let layer = layer(json!({
            "apod": {
                "devices": [
                    {"deviceType": "network/client", "host": "10.0.0.1", "credentials": ["lab-ssh"]},
                    {"deviceType": "network/client", "credentials": ["lab-ssh"]},
                    {"deviceType": "cluster/node", "host": "10.0.0.3", "skip": true},
                ],
            },
        }));

        let err = layer
            .load_landscape(&builtin_couplings(), &ActivationParams::default())
            .unwrap_err();
        match err {
            LandscapeError::ConfigurationReport { title, failures } => {
                assert_eq!(title, LANDSCAPE_FAILURES_TITLE);
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("    apod/devices/1:"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(layer.landscape_info().is_none());
    }

    #[test]
    fn test_load_landscape_accepts_valid_documents() {
        let layer = layer(json!({
            "apod": {
                "devices": [
                    {"deviceType": "network/client", "host": "10.0.0.1"},
                    {"deviceType": "custom/thing"},
                ],
            },
            "infrastructure": {
                "services": [{"serviceType": "network/service-base", "host": "svc1"}],
            },
        }));

        let loaded = layer
            .load_landscape(&builtin_couplings(), &ActivationParams::default())
            .unwrap();
        assert!(loaded.is_some());

        let client = builtin_couplings().remove(0);
        assert!(layer.declares_items_for(client.key_parts()));
        let service = builtin_couplings().remove(2);
        assert!(layer.declares_items_for(service.key_parts()));
        let node = builtin_couplings().remove(1);
        assert!(!layer.declares_items_for(node.key_parts()));
    }

    #[test]
    fn test_missing_landscape_is_not_an_error() {
        let layer = ConfigurationLayer::new(LoadedConfiguration::default());
        let loaded = layer
            .load_landscape(&builtin_couplings(), &ActivationParams::default())
            .unwrap();
        assert!(loaded.is_none());
        assert!(layer.device_configs(&Filters::new()).is_empty());
        assert!(layer.load_topology(&ActivationParams::default()).unwrap().is_none());
    }

    #[test]
    fn test_topology_failures() {
        let layer = ConfigurationLayer::new(LoadedConfiguration {
            topology: Some(
                serde_json::from_value(json!({
                    "clusters": [{"name": "c1", "group": "", "nodes": ["n1"]}],
                }))
                .unwrap(),
            ),
            ..Default::default()
        });

        let err = layer.load_topology(&ActivationParams::default()).unwrap_err();
        assert!(err.to_string().starts_with(TOPOLOGY_FAILURES_TITLE));
    }

    #[test]
    fn test_credentials() {
        let layer = ConfigurationLayer::new(LoadedConfiguration {
            credentials: Some(CredentialsConfig {
                credentials: vec![crate::credentials::tests::credential("lab-ssh", &["ssh"])],
            }),
            ..Default::default()
        });

        assert!(matches!(
            layer.credential_manager().unwrap_err(),
            LandscapeError::Semantic { .. }
        ));
        let manager = layer.initialize_credentials().unwrap();
        assert_eq!(manager.identifiers(), vec!["lab-ssh"]);
        assert!(layer.credential_manager().is_ok());
    }

    #[tokio::test]
    async fn test_record_configuration() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let declared = json!({
            "apod": {"devices": [{"deviceType": "network/client", "host": "10.0.0.1"}]},
            "lab": {"owner": "qa"},
        });
        let layer = layer(declared.clone());
        layer
            .load_landscape(&builtin_couplings(), &ActivationParams::default())
            .unwrap();

        let written = layer.record_configuration(temp_dir.path()).await.unwrap();
        assert_eq!(written.len(), 2);
        assert!(temp_dir.path().join("landscape-declared.yaml").is_file());
        assert!(!temp_dir.path().join("topology-declared.yaml").exists());
        assert_eq!(layer.recorded_files(), written);

        let recorded = std::fs::read_to_string(temp_dir.path().join("landscape-declared.json")).unwrap();
        let recorded: Value = serde_json::from_str(&recorded).unwrap();
        assert_eq!(recorded, declared);
    }
}
