//! Landscape services
//!
//! Services are infrastructure endpoints such as build or file servers. They
//! share the credential, extension and callback machinery of devices.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use landscaper_config::{CredentialSpec, ServiceConfig};
use landscaper_core::error::LandscapeResult;
use landscaper_core::types::{DeviceExtensionType, FriendlyIdentifier};

use crate::agents::SystemContext;
use crate::coordinator::Coordinator;
use crate::credentials::CredentialManager;
use crate::device::endpoint::{EndpointCore, EndpointInit};
use crate::device::{MatchCallback, StatusCallback};
use crate::extension::ProtocolExtension;

/// A service declared in the landscape infrastructure
pub struct LandscapeService {
    core: EndpointCore<LandscapeService>,
    service_config: ServiceConfig,
}

impl LandscapeService {
    pub fn new(
        coordinator: Option<Weak<dyn Coordinator>>,
        friendly_id: FriendlyIdentifier,
        service_config: ServiceConfig,
        credentials: &CredentialManager,
    ) -> LandscapeResult<Self> {
        let core = EndpointCore::new(
            EndpointInit {
                kind: "LandscapeService",
                type_name: &service_config.service_type,
                coordinator,
                friendly_id,
                name: service_config.name.as_deref(),
                host: service_config.host.as_deref(),
                ipaddr: service_config.ipaddr.as_deref(),
                group: None,
                features: &service_config.features,
                credential_ids: &service_config.credentials,
            },
            credentials,
        )?;

        Ok(Self { core, service_config })
    }

    pub fn identity(&self) -> String {
        self.core.identity()
    }

    pub fn moniker(&self) -> String {
        self.core.identity()
    }

    pub fn pivots(&self) -> Vec<String> {
        vec![self.core.identity()]
    }

    pub fn friendly_id(&self) -> FriendlyIdentifier {
        self.core.friendly_id()
    }

    pub fn full_identifier(&self) -> String {
        self.core.full_identifier()
    }

    pub fn update_full_identifier(&self, full_identifier: &str) {
        self.core.update_full_identifier(full_identifier);
    }

    pub fn service_type(&self) -> &str {
        self.core.type_name()
    }

    pub fn service_config(&self) -> &ServiceConfig {
        &self.service_config
    }

    pub fn name(&self) -> Option<&str> {
        self.core.name()
    }

    pub fn host(&self) -> Option<&str> {
        self.core.host()
    }

    pub fn configured_ipaddr(&self) -> Option<&str> {
        self.core.configured_ipaddr()
    }

    pub fn ipaddr(&self) -> LandscapeResult<String> {
        self.core.ipaddr()
    }

    pub async fn resolve_ipaddr(&self) -> LandscapeResult<String> {
        self.core.resolve_ipaddr().await
    }

    /// Address known without a lookup, if any
    pub fn known_ipaddr(&self) -> Option<String> {
        self.core.known_ipaddr()
    }

    pub fn features(&self) -> &Map<String, Value> {
        self.core.features()
    }

    pub fn coordinator(&self) -> Option<Arc<dyn Coordinator>> {
        self.core.coordinator()
    }

    pub fn credentials(&self) -> &IndexMap<String, Arc<CredentialSpec>> {
        self.core.credentials()
    }

    pub fn credentials_by_category(&self, category: &str) -> Vec<Arc<CredentialSpec>> {
        self.core.credentials_by_category(category)
    }

    pub fn ssh_credential(&self) -> Option<&Arc<CredentialSpec>> {
        self.core.ssh_credential()
    }

    pub fn has_ssh_credential(&self) -> bool {
        self.core.ssh_credential().is_some()
    }

    pub fn is_configured_for_power(&self) -> bool {
        self.core.is_configured_for_power()
    }

    pub fn is_configured_for_serial(&self) -> bool {
        self.core.is_configured_for_serial()
    }

    pub fn attach_extension(&self, extension: Arc<dyn ProtocolExtension>) -> LandscapeResult<()> {
        self.core.attach_extension(extension)
    }

    pub fn has_extension_type(&self, ext_type: DeviceExtensionType) -> bool {
        self.core.has_extension_type(ext_type)
    }

    pub fn extension(&self, ext_type: DeviceExtensionType) -> Option<Arc<dyn ProtocolExtension>> {
        self.core.extension(ext_type)
    }

    pub fn extensions(&self) -> IndexMap<DeviceExtensionType, Arc<dyn ProtocolExtension>> {
        self.core.extensions()
    }

    pub fn initialize_features(&self) {
        self.core.initialize_features();
    }

    pub fn is_isolated(&self) -> bool {
        self.core.is_isolated()
    }

    pub fn is_watched(&self) -> bool {
        self.core.is_watched()
    }

    pub fn match_using_params(&self, match_type: &str, params: &[Value]) -> bool {
        self.core.match_using_params(self, match_type, params)
    }

    pub fn update_match_table(&self, table: HashMap<String, MatchCallback<LandscapeService>>) {
        self.core.update_match_table(table);
    }

    pub fn update_status_verification_callback(
        &self,
        protocol: &str,
        callback: StatusCallback<LandscapeService>,
    ) {
        self.core.update_status_verification_callback(protocol, callback);
    }

    pub fn verify_status(&self) -> LandscapeResult<()> {
        self.core.verify_status(self)
    }

    pub fn mark_contacted(&self) {
        self.core.mark_contacted();
    }

    pub fn contacted_first(&self) -> Option<DateTime<Utc>> {
        self.core.contacted_first()
    }

    pub fn contacted_last(&self) -> Option<DateTime<Utc>> {
        self.core.contacted_last()
    }

    pub fn default_system_context(&self) -> LandscapeResult<Arc<dyn SystemContext>> {
        self.core.default_system_context()
    }
}

impl fmt::Display for LandscapeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.core.describe())
    }
}

impl fmt::Debug for LandscapeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.core.describe())
    }
}
