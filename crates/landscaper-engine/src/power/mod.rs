//! Power interface lookup
//!
//! Power interfaces are declared in the `apod.power` section and resolved by
//! name the first time a device asks for them.

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::debug;

use landscaper_config::{CredentialSpec, PowerConfig};
use landscaper_core::error::{LandscapeError, LandscapeResult};

use crate::credentials::CredentialManager;

/// Power types that can be resolved
pub const SUPPORTED_POWER_TYPES: &[&str] = &["DliPowerSwitch"];

/// A resolved power interface
#[derive(Debug, Clone)]
pub struct PowerInterface {
    pub name: String,
    pub power_type: String,
    pub model: Option<String>,
    pub host: String,
    pub credential: Arc<CredentialSpec>,
}

/// Resolves power interfaces by name and caches them
#[derive(Debug)]
pub struct PowerInterfaceRegistry {
    configs: IndexMap<String, PowerConfig>,
    credentials: Arc<CredentialManager>,
    cache: DashMap<String, Arc<PowerInterface>>,
}

impl PowerInterfaceRegistry {
    pub fn new(configs: Vec<PowerConfig>, credentials: Arc<CredentialManager>) -> Self {
        Self {
            configs: configs.into_iter().map(|c| (c.name.clone(), c)).collect(),
            credentials,
            cache: DashMap::new(),
        }
    }

    /// Names of the declared power interfaces
    pub fn names(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.configs.contains_key(name)
    }

    /// Look up an interface, resolving it on first use
    pub fn lookup(&self, name: &str) -> LandscapeResult<Arc<PowerInterface>> {
        if let Some(found) = self.cache.get(name) {
            return Ok(found.clone());
        }

        let config = self.configs.get(name).ok_or_else(|| {
            LandscapeError::configuration(format!("No power interface named '{}' was declared.", name))
        })?;

        let resolved = Arc::new(self.resolve(config)?);
        debug!("Resolved power interface '{}' ({})", name, resolved.power_type);
        self.cache.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Number of interfaces resolved so far
    pub fn resolved_count(&self) -> usize {
        self.cache.len()
    }

    fn resolve(&self, config: &PowerConfig) -> LandscapeResult<PowerInterface> {
        if !SUPPORTED_POWER_TYPES.contains(&config.power_type.as_str()) {
            return Err(LandscapeError::configuration(format!(
                "Un-supported power interface type={}.",
                config.power_type
            )));
        }

        let host = config.host.clone().ok_or_else(|| {
            LandscapeError::configuration(format!("Power interface '{}' is missing 'host'.", config.name))
        })?;
        let credential_id = config.credential.as_deref().ok_or_else(|| {
            LandscapeError::configuration(format!(
                "Power interface '{}' is missing 'credential'.",
                config.name
            ))
        })?;
        let credential = self.credentials.lookup(credential_id)?;

        Ok(PowerInterface {
            name: config.name.clone(),
            power_type: config.power_type.clone(),
            model: config.model.clone(),
            host,
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::manager;

    fn power(name: &str, power_type: &str, credential: Option<&str>) -> PowerConfig {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "powerType": power_type,
            "model": "DLI-7",
            "host": "10.9.0.1",
            "credential": credential,
        }))
        .unwrap()
    }

    fn registry() -> PowerInterfaceRegistry {
        PowerInterfaceRegistry::new(
            vec![
                power("pdu1", "DliPowerSwitch", Some("pdu-admin")),
                power("pdu2", "ApcSwitch", Some("pdu-admin")),
                power("pdu3", "DliPowerSwitch", Some("nobody")),
            ],
            Arc::new(manager()),
        )
    }

    #[test]
    fn test_lookup_caches() {
        let registry = registry();
        let first = registry.lookup("pdu1").unwrap();
        let second = registry.lookup("pdu1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.credential.identifier, "pdu-admin");
        assert_eq!(registry.resolved_count(), 1);
    }

    #[test]
    fn test_unsupported_type() {
        let err = registry().lookup("pdu2").unwrap_err();
        match err {
            LandscapeError::Configuration { message } => assert!(message.contains("ApcSwitch")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_credential_and_name() {
        let registry = registry();
        assert!(matches!(
            registry.lookup("pdu3").unwrap_err(),
            LandscapeError::Credential { .. }
        ));
        assert!(matches!(
            registry.lookup("missing").unwrap_err(),
            LandscapeError::Configuration { .. }
        ));
        assert_eq!(registry.names(), vec!["pdu1", "pdu2", "pdu3"]);
    }
}
