//! Built-in couplings for clients, cluster nodes and services

use std::sync::Arc;

use serde_json::Value;

use landscaper_core::error::LandscapeResult;
use landscaper_core::types::StartupLevel;

use super::{CouplingKey, IntegrationCoupling, ANY_SECTION};
use crate::coordinator::{
    ClientCoordinator, ContextFactory, Coordinator, NodeCoordinator, ServiceCoordinator,
};
use crate::landscape::Landscape;

fn has_text(item: &Value, field: &str) -> bool {
    item.get(field)
        .and_then(Value::as_str)
        .map(|s| !s.is_empty())
        .unwrap_or(false)
}

fn has_credentials(item: &Value) -> bool {
    item.get("credentials")
        .and_then(Value::as_array)
        .map(|creds| !creds.is_empty())
        .unwrap_or(false)
}

fn require(item: &Value, field: &str, class: &str, errors: &mut Vec<String>) {
    if !has_text(item, field) {
        errors.push(format!("'{}' declarations must have a '{}' field.", class, field));
    }
}

fn suggest_credentials(item: &Value, class: &str, warnings: &mut Vec<String>) {
    if !has_credentials(item) {
        warnings.push(format!(
            "'{}' declaration has no 'credentials'; ssh will not be available.",
            class
        ));
    }
}

/// Couples `network/client` devices to a [`ClientCoordinator`]
pub struct ClientCoupling {
    key: CouplingKey,
    must_include_ssh: bool,
    context_factory: Option<ContextFactory>,
}

impl ClientCoupling {
    pub const INTEGRATION_CLASS: &'static str = "network/client";

    pub fn new() -> Self {
        Self {
            key: CouplingKey::new("apod", ANY_SECTION, "deviceType", Self::INTEGRATION_CLASS),
            must_include_ssh: false,
            context_factory: None,
        }
    }

    pub fn with_must_include_ssh(mut self, must_include_ssh: bool) -> Self {
        self.must_include_ssh = must_include_ssh;
        self
    }

    pub fn with_context_factory(mut self, factory: ContextFactory) -> Self {
        self.context_factory = Some(factory);
        self
    }
}

impl Default for ClientCoupling {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationCoupling for ClientCoupling {
    fn key_parts(&self) -> &CouplingKey {
        &self.key
    }

    fn declare_precedence(&self) -> StartupLevel {
        StartupLevel::PrimaryProtocol
    }

    fn validate_item_configuration(&self, item: &Value) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        require(item, "host", Self::INTEGRATION_CLASS, &mut errors);
        suggest_credentials(item, Self::INTEGRATION_CLASS, &mut warnings);
        (errors, warnings)
    }

    fn create_coordinator(&self, landscape: &Landscape) -> LandscapeResult<Arc<dyn Coordinator>> {
        let coordinator: Arc<dyn Coordinator> = ClientCoordinator::new(
            self.integration_key(),
            landscape.is_interactive(),
            self.must_include_ssh,
            self.context_factory.clone(),
        );
        Ok(coordinator)
    }
}

/// Couples `cluster/node` devices to a [`NodeCoordinator`]
pub struct NodeCoupling {
    key: CouplingKey,
    must_include_ssh: bool,
    context_factory: Option<ContextFactory>,
}

impl NodeCoupling {
    pub const INTEGRATION_CLASS: &'static str = "cluster/node";

    pub fn new() -> Self {
        Self {
            key: CouplingKey::new("apod", ANY_SECTION, "deviceType", Self::INTEGRATION_CLASS),
            must_include_ssh: false,
            context_factory: None,
        }
    }

    pub fn with_must_include_ssh(mut self, must_include_ssh: bool) -> Self {
        self.must_include_ssh = must_include_ssh;
        self
    }

    pub fn with_context_factory(mut self, factory: ContextFactory) -> Self {
        self.context_factory = Some(factory);
        self
    }
}

impl Default for NodeCoupling {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationCoupling for NodeCoupling {
    fn key_parts(&self) -> &CouplingKey {
        &self.key
    }

    fn declare_precedence(&self) -> StartupLevel {
        StartupLevel::PrimaryProtocol
    }

    fn validate_item_configuration(&self, item: &Value) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        require(item, "name", Self::INTEGRATION_CLASS, &mut errors);
        require(item, "host", Self::INTEGRATION_CLASS, &mut errors);
        suggest_credentials(item, Self::INTEGRATION_CLASS, &mut warnings);
        (errors, warnings)
    }

    fn create_coordinator(&self, landscape: &Landscape) -> LandscapeResult<Arc<dyn Coordinator>> {
        let coordinator: Arc<dyn Coordinator> = NodeCoordinator::new(
            self.integration_key(),
            landscape.is_interactive(),
            self.must_include_ssh,
            self.context_factory.clone(),
        );
        Ok(coordinator)
    }
}

/// Couples `network/service-base` services to a [`ServiceCoordinator`]
pub struct ServiceCoupling {
    key: CouplingKey,
    context_factory: Option<ContextFactory>,
}

impl ServiceCoupling {
    pub const INTEGRATION_CLASS: &'static str = "network/service-base";

    pub fn new() -> Self {
        Self {
            key: CouplingKey::new(
                "infrastructure",
                "services",
                "serviceType",
                Self::INTEGRATION_CLASS,
            ),
            context_factory: None,
        }
    }

    pub fn with_context_factory(mut self, factory: ContextFactory) -> Self {
        self.context_factory = Some(factory);
        self
    }
}

impl Default for ServiceCoupling {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationCoupling for ServiceCoupling {
    fn key_parts(&self) -> &CouplingKey {
        &self.key
    }

    fn declare_precedence(&self) -> StartupLevel {
        StartupLevel::PrimaryProtocol
    }

    fn validate_item_configuration(&self, item: &Value) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        require(item, "host", Self::INTEGRATION_CLASS, &mut errors);
        (errors, Vec::new())
    }

    fn create_coordinator(&self, landscape: &Landscape) -> LandscapeResult<Arc<dyn Coordinator>> {
        let coordinator: Arc<dyn Coordinator> = ServiceCoordinator::new(
            self.integration_key(),
            landscape.is_interactive(),
            false,
            self.context_factory.clone(),
        );
        Ok(coordinator)
    }
}

/// The couplings installed when no others are given
pub fn builtin_couplings() -> Vec<Arc<dyn IntegrationCoupling>> {
    vec![
        Arc::new(ClientCoupling::new()),
        Arc::new(NodeCoupling::new()),
        Arc::new(ServiceCoupling::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_keys() {
        let keys: Vec<String> = builtin_couplings().iter().map(|c| c.integration_key()).collect();
        assert_eq!(
            keys,
            vec![
                "apod:*:deviceType:network/client",
                "apod:*:deviceType:cluster/node",
                "infrastructure:services:serviceType:network/service-base",
            ]
        );
    }

    #[test]
    fn test_client_validation() {
        let coupling = ClientCoupling::new();

        let (errors, warnings) = coupling.validate_item_configuration(&json!({
            "deviceType": "network/client",
            "host": "10.0.0.1",
            "credentials": ["lab-ssh"],
        }));
        assert!(errors.is_empty());
        assert!(warnings.is_empty());

        let (errors, warnings) =
            coupling.validate_item_configuration(&json!({"deviceType": "network/client"}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'host'"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_node_validation_requires_name() {
        let coupling = NodeCoupling::new();
        let (errors, _) = coupling.validate_item_configuration(&json!({
            "deviceType": "cluster/node",
            "host": "10.0.0.2",
        }));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'name'"));
    }

    #[test]
    fn test_service_validation() {
        let coupling = ServiceCoupling::new();
        let (errors, warnings) = coupling.validate_item_configuration(&json!({
            "serviceType": "network/service-base",
            "host": "",
        }));
        assert_eq!(errors.len(), 1);
        assert!(warnings.is_empty());
    }
}
