//! Typed models of the landscape, topology, credentials and runtime documents

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use landscaper_core::error::LandscapeError;
use landscaper_core::utils::expand_path;

use crate::ConfigResult;

/// `apod` sections that never hold device declarations
pub const APOD_RESERVED_SECTIONS: &[&str] = &["controller", "power", "serial", "environment"];

/// Default directory used to record declared configuration
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "~/landscaper/results";

/// Complete landscape description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandscapeConfig {
    /// Environment metadata such as a label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentSection>,

    /// Automation pod: devices, power and serial resources
    #[serde(default, skip_serializing_if = "ApodSection::is_empty")]
    pub apod: ApodSection,

    /// Infrastructure services
    #[serde(default, skip_serializing_if = "InfrastructureSection::is_empty")]
    pub infrastructure: InfrastructureSection,

    /// Integration specific settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrations: Option<Value>,

    /// Top level sections other tooling keeps in the document
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Environment section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Automation pod section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApodSection {
    /// Power switch interfaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub power: Vec<PowerConfig>,

    /// Serial console interfaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serial: Vec<SerialConfig>,

    /// Controller settings (reserved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<Value>,

    /// Pod environment settings (reserved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Value>,

    /// Device sections keyed by section name
    #[serde(flatten)]
    pub sections: IndexMap<String, Vec<DeviceConfig>>,
}

/// Infrastructure section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceConfig>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declaration of a single device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Device type such as `network/client`
    pub device_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipaddr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Group label, makes the device eligible for clusters of that group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Credential identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub features: Map<String, Value>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub skip: bool,

    /// The `apod` section the device was declared in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Fields interpreted by specific coordinators
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declaration of a single service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Service type such as `network/service-base`
    pub service_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipaddr: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub features: Map<String, Value>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub skip: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declaration of a power switch interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerConfig {
    pub name: String,

    pub power_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declaration of a serial console interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialConfig {
    pub name: String,

    pub serial_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Topology overlay describing clusters built from device groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A cluster assembled from the devices of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,

    /// Device group the nodes and spares are drawn from
    pub group: String,

    /// Device names that form the cluster
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Device names eligible to join the cluster
    #[serde(default)]
    pub spares: Vec<String>,
}

/// Credentials document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub credentials: Vec<CredentialSpec>,
}

/// A named credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSpec {
    pub identifier: String,

    /// Categories such as `ssh`, `basic` or `api-token`
    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyfile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypasswd: Option<Secret>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Secret>,

    /// Marks the preferred credential of a category
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary: bool,
}

/// A secret value that never appears in debug output
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret text
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// Runtime behaviors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeSettings {
    /// Directory where declared configuration and results are written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    /// Record the declared configuration during activation
    #[serde(default = "default_true")]
    pub log_configuration: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            output_directory: None,
            log_configuration: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LandscapeConfig {
    /// Device declarations from every non-reserved `apod` section
    ///
    /// Skipped devices are left out and every returned config carries the
    /// name of its section.
    pub fn device_configs(&self) -> Vec<DeviceConfig> {
        let mut device_configs = Vec::new();

        for (section, items) in &self.apod.sections {
            if APOD_RESERVED_SECTIONS.contains(&section.as_str()) {
                continue;
            }
            for item in items {
                if item.skip {
                    continue;
                }
                let mut config = item.clone();
                config.section = Some(section.clone());
                device_configs.push(config);
            }
        }

        device_configs
    }

    /// Power interface declarations
    pub fn power_configs(&self) -> Vec<PowerConfig> {
        self.apod.power.clone()
    }

    /// Serial interface declarations
    pub fn serial_configs(&self) -> Vec<SerialConfig> {
        self.apod.serial.clone()
    }

    /// Service declarations, without skipped services
    pub fn service_configs(&self) -> Vec<ServiceConfig> {
        self.infrastructure
            .services
            .iter()
            .filter(|svc| !svc.skip)
            .cloned()
            .collect()
    }

    /// Whether the document declares any resources at all
    pub fn is_empty(&self) -> bool {
        self.apod.sections.is_empty()
            && self.apod.power.is_empty()
            && self.apod.serial.is_empty()
            && self.infrastructure.services.is_empty()
    }
}

impl ApodSection {
    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
            && self.serial.is_empty()
            && self.controller.is_none()
            && self.environment.is_none()
            && self.sections.is_empty()
    }
}

impl InfrastructureSection {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.extra.is_empty()
    }
}

impl DeviceConfig {
    /// Create a device declaration of the given type
    pub fn new(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            name: None,
            host: None,
            ipaddr: None,
            role: None,
            group: None,
            credentials: Vec::new(),
            features: Map::new(),
            skip: false,
            section: None,
            extra: Map::new(),
        }
    }

    /// Look up a field by its configuration key
    pub fn field(&self, key: &str) -> Option<Value> {
        self.to_value().get(key).cloned()
    }

    /// Check if a field is present by its configuration key
    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// The declaration as a generic value tree
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl ServiceConfig {
    /// Create a service declaration of the given type
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            name: None,
            host: None,
            ipaddr: None,
            credentials: Vec::new(),
            features: Map::new(),
            skip: false,
            extra: Map::new(),
        }
    }

    /// Look up a field by its configuration key
    pub fn field(&self, key: &str) -> Option<Value> {
        self.to_value().get(key).cloned()
    }

    /// Check if a field is present by its configuration key
    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// The declaration as a generic value tree
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl TopologyConfig {
    /// Find a cluster declaration by name
    pub fn cluster(&self, name: &str) -> Option<&ClusterSpec> {
        self.clusters.iter().find(|c| c.name == name)
    }

    /// Validate cluster declarations, returning `(errors, warnings)`
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for (index, cluster) in self.clusters.iter().enumerate() {
            let path = format!("clusters/{}", index);
            if cluster.name.is_empty() {
                errors.push(format!("{}: cluster 'name' must not be empty", path));
            } else if !seen.insert(cluster.name.as_str()) {
                errors.push(format!("{}: duplicate cluster name '{}'", path, cluster.name));
            }
            if cluster.group.is_empty() {
                errors.push(format!("{}: cluster 'group' must not be empty", path));
            }
            if cluster.nodes.is_empty() {
                warnings.push(format!("{}: cluster '{}' declares no nodes", path, cluster.name));
            }
            for spare in &cluster.spares {
                if cluster.nodes.contains(spare) {
                    errors.push(format!(
                        "{}: device '{}' is listed as both node and spare",
                        path, spare
                    ));
                }
            }
        }

        (errors, warnings)
    }
}

impl CredentialsConfig {
    /// Validate credential declarations
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();

        for cred in &self.credentials {
            if cred.identifier.is_empty() {
                return Err(LandscapeError::ConfigValidation {
                    field: "credentials.identifier".to_string(),
                    reason: "credential identifiers must not be empty".to_string(),
                });
            }

            if !seen.insert(cred.identifier.as_str()) {
                return Err(LandscapeError::ConfigValidation {
                    field: format!("credentials.{}", cred.identifier),
                    reason: "duplicate credential identifier".to_string(),
                });
            }

            if cred.has_category("ssh") {
                if cred.username.is_none() {
                    return Err(LandscapeError::ConfigValidation {
                        field: format!("credentials.{}.username", cred.identifier),
                        reason: "ssh credentials require a 'username'".to_string(),
                    });
                }
                if cred.password.is_none() && cred.keyfile.is_none() {
                    return Err(LandscapeError::ConfigValidation {
                        field: format!("credentials.{}", cred.identifier),
                        reason: "ssh credentials require a 'password' or a 'keyfile'".to_string(),
                    });
                }
            }

            if cred.has_category("api-token") && cred.token.is_none() {
                return Err(LandscapeError::ConfigValidation {
                    field: format!("credentials.{}.token", cred.identifier),
                    reason: "api-token credentials require a 'token'".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl CredentialSpec {
    /// Check if the credential belongs to a category
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

impl RuntimeSettings {
    /// The output directory with `~` and environment variables expanded
    pub fn resolved_output_directory(&self) -> PathBuf {
        let raw = self
            .output_directory
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_DIRECTORY);
        expand_path(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{from_value, parse_value, ConfigFormat};

    const LANDSCAPE: &str = r#"
environment:
  label: production
apod:
  devices:
    - deviceType: network/client
      name: client-a
      host: 172.16.1.10
      credentials: [lab-ssh]
      features:
        isolation: false
    - deviceType: network/client
      name: client-b
      host: 172.16.1.11
      skip: true
  nodes:
    - deviceType: cluster/node
      name: node-green
      host: 172.16.1.20
      group: cluster/primary
      rack: r12
  power:
    - name: pdu-1
      powerType: DliPowerSwitch
      model: web-power
      host: 172.16.1.2
      credential: pdu-admin
  controller:
    host: 172.16.1.1
infrastructure:
  services:
    - serviceType: network/service-base
      name: build-server
      host: 10.0.0.5
    - serviceType: network/service-base
      name: old-server
      host: 10.0.0.6
      skip: true
"#;

    fn landscape() -> LandscapeConfig {
        let value = parse_value(LANDSCAPE, ConfigFormat::Yaml, "landscape.yaml").unwrap();
        from_value(value, "landscape.yaml").unwrap()
    }

    #[test]
    fn test_device_configs_skip_and_section() {
        let config = landscape();
        let devices = config.device_configs();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name.as_deref(), Some("client-a"));
        assert_eq!(devices[0].section.as_deref(), Some("devices"));
        assert_eq!(devices[1].name.as_deref(), Some("node-green"));
        assert_eq!(devices[1].section.as_deref(), Some("nodes"));
        assert_eq!(devices[1].group.as_deref(), Some("cluster/primary"));
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let config = landscape();
        let node = &config.device_configs()[1];

        assert_eq!(node.extra.get("rack"), Some(&Value::String("r12".to_string())));
        assert_eq!(node.field("rack"), Some(Value::String("r12".to_string())));
        assert!(node.has_field("deviceType"));
        assert!(!node.has_field("ipaddr"));
    }

    #[test]
    fn test_top_level_sections_survive_serialization() {
        let declared = serde_json::json!({
            "apod": {"devices": [{"deviceType": "network/client", "host": "10.0.0.1"}]},
            "lab": {"owner": "qa"},
        });
        let config: LandscapeConfig = serde_json::from_value(declared.clone()).unwrap();

        assert_eq!(config.extra.get("lab"), Some(&serde_json::json!({"owner": "qa"})));
        assert!(config.infrastructure.is_empty());
        assert_eq!(serde_json::to_value(&config).unwrap(), declared);
    }

    #[test]
    fn test_reserved_sections() {
        let config = landscape();

        assert_eq!(config.power_configs().len(), 1);
        assert_eq!(config.power_configs()[0].power_type, "DliPowerSwitch");
        assert!(config.apod.controller.is_some());
        assert!(!config.apod.sections.contains_key("power"));
        assert!(!config.apod.sections.contains_key("controller"));
    }

    #[test]
    fn test_service_configs_skip() {
        let config = landscape();
        let services = config.service_configs();

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name.as_deref(), Some("build-server"));
    }

    #[test]
    fn test_environment_label() {
        let config = landscape();
        assert_eq!(
            config.environment.and_then(|e| e.label),
            Some("production".to_string())
        );
    }

    #[test]
    fn test_topology_validation() {
        let topology = TopologyConfig {
            clusters: vec![
                ClusterSpec {
                    name: "primary".to_string(),
                    group: "cluster/primary".to_string(),
                    nodes: vec!["green".to_string(), "orange".to_string()],
                    spares: vec!["orange".to_string()],
                },
                ClusterSpec {
                    name: "primary".to_string(),
                    group: "cluster/primary".to_string(),
                    nodes: vec![],
                    spares: vec![],
                },
            ],
            extra: Map::new(),
        };

        let (errors, warnings) = topology.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("both node and spare"));
        assert!(errors[1].contains("duplicate cluster name"));
        assert_eq!(warnings.len(), 1);
        assert!(topology.cluster("primary").is_some());
    }

    #[test]
    fn test_credentials_validation() {
        let yaml = r#"
credentials:
  - identifier: lab-ssh
    categories: [ssh]
    username: admin
    password: secret
  - identifier: api
    categories: [api-token]
    token: xyz
"#;
        let value = parse_value(yaml, ConfigFormat::Yaml, "credentials.yaml").unwrap();
        let config: CredentialsConfig = from_value(value, "credentials.yaml").unwrap();
        assert!(config.validate().is_ok());

        let mut duplicate = config.clone();
        duplicate.credentials.push(config.credentials[0].clone());
        assert!(duplicate.validate().is_err());

        let mut missing_secret = config.clone();
        missing_secret.credentials[0].password = None;
        assert!(missing_secret.validate().is_err());
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(****)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_runtime_defaults() {
        let settings: RuntimeSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.log_configuration);
        assert!(settings.output_directory.is_none());

        let settings = RuntimeSettings {
            output_directory: Some("/tmp/./results".to_string()),
            log_configuration: false,
        };
        assert_eq!(settings.resolved_output_directory(), PathBuf::from("/tmp/results"));
    }
}
