//! Landscape devices
//!
//! A `LandscapeDevice` represents one declared device. Coordinators create
//! devices from their configuration and attach protocol extensions to them.

pub(crate) mod endpoint;

pub use endpoint::{MatchCallback, StatusCallback};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use landscaper_config::{CredentialSpec, DeviceConfig};
use landscaper_core::error::LandscapeResult;
use landscaper_core::types::{DeviceExtensionType, FriendlyIdentifier};

use crate::agents::SystemContext;
use crate::coordinator::Coordinator;
use crate::credentials::CredentialManager;
use crate::extension::ProtocolExtension;
use endpoint::{EndpointCore, EndpointInit};

/// A device declared in the landscape
pub struct LandscapeDevice {
    core: EndpointCore<LandscapeDevice>,
    device_config: DeviceConfig,
}

impl LandscapeDevice {
    /// Create a device, resolving its credentials through `credentials`
    pub fn new(
        coordinator: Option<Weak<dyn Coordinator>>,
        friendly_id: FriendlyIdentifier,
        device_config: DeviceConfig,
        credentials: &CredentialManager,
    ) -> LandscapeResult<Self> {
        let core = EndpointCore::new(
            EndpointInit {
                kind: "LandscapeDevice",
                type_name: &device_config.device_type,
                coordinator,
                friendly_id,
                name: device_config.name.as_deref(),
                host: device_config.host.as_deref(),
                ipaddr: device_config.ipaddr.as_deref(),
                group: device_config.group.as_deref(),
                features: &device_config.features,
                credential_ids: &device_config.credentials,
            },
            credentials,
        )?;

        Ok(Self { core, device_config })
    }

    /// Identity used in logs
    pub fn identity(&self) -> String {
        self.core.identity()
    }

    pub fn moniker(&self) -> String {
        self.core.identity()
    }

    /// Data points results can be collated by
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

    pub fn device_type(&self) -> &str {
        self.core.type_name()
    }

    pub fn device_config(&self) -> &DeviceConfig {
        &self.device_config
    }

    pub fn name(&self) -> Option<&str> {
        self.core.name()
    }

    pub fn role(&self) -> Option<&str> {
        self.device_config.role.as_deref()
    }

    /// Group label; empty when the device belongs to no group
    pub fn group(&self) -> &str {
        self.core.group()
    }

    pub fn host(&self) -> Option<&str> {
        self.core.host()
    }

    pub fn configured_ipaddr(&self) -> Option<&str> {
        self.core.configured_ipaddr()
    }

    /// The configured address, else the resolved host address
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

    /// First credential of the `ssh` category
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

    /// Attach an extension; each extension type can be attached once
    pub fn attach_extension(&self, extension: Arc<dyn ProtocolExtension>) -> LandscapeResult<()> {
        self.core.attach_extension(extension)
    }

    pub fn has_extension_type(&self, ext_type: DeviceExtensionType) -> bool {
        self.core.has_extension_type(ext_type)
    }

    pub fn extension(&self, ext_type: DeviceExtensionType) -> Option<Arc<dyn ProtocolExtension>> {
        self.core.extension(ext_type)
    }

    /// A copy of the attached extensions
    pub fn extensions(&self) -> IndexMap<DeviceExtensionType, Arc<dyn ProtocolExtension>> {
        self.core.extensions()
    }

    /// Apply feature declarations such as `isolation`
    pub fn initialize_features(&self) {
        self.core.initialize_features();
    }

    pub fn is_isolated(&self) -> bool {
        self.core.is_isolated()
    }

    pub fn is_watched(&self) -> bool {
        self.core.is_watched()
    }

    pub fn set_watched(&self, watched: bool) {
        self.core.set_watched(watched);
    }

    /// Run the match callback registered for `match_type`
    pub fn match_using_params(&self, match_type: &str, params: &[Value]) -> bool {
        self.core.match_using_params(self, match_type, params)
    }

    pub fn update_match_table(&self, table: HashMap<String, MatchCallback<LandscapeDevice>>) {
        self.core.update_match_table(table);
    }

    pub fn update_status_verification_callback(
        &self,
        protocol: &str,
        callback: StatusCallback<LandscapeDevice>,
    ) {
        self.core.update_status_verification_callback(protocol, callback);
    }

    /// Run every status verification callback; the first failure is returned
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

    /// The system context of the SSH extension, when one is available
    pub fn default_system_context(&self) -> LandscapeResult<Arc<dyn SystemContext>> {
        self.core.default_system_context()
    }
}

impl fmt::Display for LandscapeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.core.describe())
    }
}

impl fmt::Debug for LandscapeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.core.describe())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agents::LocalCommandAgent;
    use crate::credentials::tests::manager;
    use crate::extension::{ExtendedTarget, SshExtension, DEFAULT_SSH_PORT};
    use landscaper_core::error::LandscapeError;
    use serde_json::json;

    pub(crate) fn device_config(device_type: &str, name: &str, host: &str) -> DeviceConfig {
        let mut config = DeviceConfig::new(device_type);
        config.name = Some(name.to_string());
        config.host = Some(host.to_string());
        config
    }

    fn device(config: DeviceConfig) -> LandscapeDevice {
        let host = config.host.clone().unwrap_or_default();
        LandscapeDevice::new(None, FriendlyIdentifier::new(&host, &host), config, &manager()).unwrap()
    }

    #[test]
    fn test_basic_properties() {
        let mut config = device_config("network/client", "client-a", "172.16.1.10");
        config.role = Some("primary".to_string());
        config.group = Some("lab".to_string());
        let dev = device(config);

        assert_eq!(dev.identity(), "172.16.1.10");
        assert_eq!(dev.moniker(), "172.16.1.10");
        assert_eq!(dev.pivots(), vec!["172.16.1.10".to_string()]);
        assert_eq!(dev.name(), Some("client-a"));
        assert_eq!(dev.role(), Some("primary"));
        assert_eq!(dev.group(), "lab");
        assert_eq!(dev.device_type(), "network/client");
        assert!(dev.coordinator().is_none());
    }

    #[test]
    fn test_group_defaults_to_empty() {
        let dev = device(device_config("network/client", "a", "10.0.0.1"));
        assert_eq!(dev.group(), "");
    }

    #[test]
    fn test_ipaddr() {
        let mut config = device_config("network/client", "a", "10.0.0.1");
        config.ipaddr = Some("10.0.0.99".to_string());
        assert_eq!(device(config).ipaddr().unwrap(), "10.0.0.99");

        let dev = device(device_config("network/client", "a", "10.0.0.1"));
        assert_eq!(dev.ipaddr().unwrap(), "10.0.0.1");

        let mut config = DeviceConfig::new("network/client");
        config.name = Some("nohost".to_string());
        let dev = LandscapeDevice::new(None, FriendlyIdentifier::new("nohost", "nohost"), config, &manager())
            .unwrap();
        assert!(matches!(dev.ipaddr(), Err(LandscapeError::Resolution { .. })));
        assert_eq!(
            dev.to_string(),
            "<LandscapeDevice type=network/client identity=nohost ip=unknown>"
        );
    }

    #[test]
    fn test_display_does_not_look_up_host() {
        let dev = device(device_config("network/client", "a", "lab-host.invalid"));
        assert_eq!(dev.known_ipaddr(), None);
        assert_eq!(
            dev.to_string(),
            "<LandscapeDevice type=network/client identity=lab-host.invalid ip=unknown>"
        );
        assert_eq!(dev.known_ipaddr(), None);
    }

    #[tokio::test]
    async fn test_resolve_ipaddr_caches_lookup() {
        let dev = device(device_config("network/client", "a", "localhost"));
        assert_eq!(dev.known_ipaddr(), None);

        let resolved = dev.resolve_ipaddr().await.unwrap();
        assert!(resolved.parse::<std::net::IpAddr>().unwrap().is_loopback());
        assert_eq!(dev.known_ipaddr().as_deref(), Some(resolved.as_str()));
        assert!(dev.to_string().ends_with(&format!("ip={}>", resolved)));

        let literal = device(device_config("network/client", "b", "10.0.0.1"));
        assert_eq!(literal.resolve_ipaddr().await.unwrap(), "10.0.0.1");
    }

    #[test]
    fn test_credentials() {
        let mut config = device_config("network/client", "a", "10.0.0.1");
        config.credentials = vec!["pdu-admin".to_string(), "lab-ssh".to_string()];
        let dev = device(config);

        assert!(dev.has_ssh_credential());
        assert_eq!(dev.ssh_credential().unwrap().identifier, "lab-ssh");
        assert_eq!(dev.credentials_by_category("basic").len(), 1);

        let mut config = device_config("network/client", "a", "10.0.0.1");
        config.credentials = vec!["missing".to_string()];
        let result = LandscapeDevice::new(None, FriendlyIdentifier::new("a", "a"), config, &manager());
        assert!(matches!(result, Err(LandscapeError::Credential { .. })));
    }

    #[test]
    fn test_features() {
        let mut config = device_config("network/client", "a", "10.0.0.1");
        config.features.insert("isolation".to_string(), json!(true));
        config.features.insert("power".to_string(), json!("pdu-1"));
        let dev = device(config);

        assert!(!dev.is_isolated());
        dev.initialize_features();
        assert!(dev.is_isolated());
        assert!(dev.is_configured_for_power());
        assert!(!dev.is_configured_for_serial());
    }

    #[test]
    fn test_attach_extension_once() {
        let dev = Arc::new(device(device_config("network/client", "a", "10.0.0.1")));
        let make_ext = || {
            Arc::new(SshExtension::new(
                None,
                ExtendedTarget::Device(Arc::downgrade(&dev)),
                "10.0.0.1",
                DEFAULT_SSH_PORT,
                None,
                manager().lookup("lab-ssh").unwrap(),
            ))
        };

        assert!(matches!(
            dev.default_system_context(),
            Err(LandscapeError::NotOverloaded { .. })
        ));

        let ext = make_ext();
        dev.attach_extension(ext.clone()).unwrap();
        assert!(dev.has_extension_type(DeviceExtensionType::Ssh));
        assert_eq!(dev.extensions().len(), 1);
        assert!(Arc::ptr_eq(&ext.binding().extends().device().unwrap(), &dev));

        let err = dev.attach_extension(make_ext()).unwrap_err();
        assert!(matches!(err, LandscapeError::Semantic { .. }));

        ext.set_system_context(Arc::new(LocalCommandAgent::default()));
        assert!(dev.default_system_context().is_ok());
    }

    #[test]
    fn test_match_and_status_callbacks() {
        let dev = device(device_config("network/client", "client-a", "10.0.0.1"));

        let by_name: MatchCallback<LandscapeDevice> =
            Arc::new(|dev: &LandscapeDevice, params: &[Value]| params.first().and_then(Value::as_str) == dev.name());
        dev.update_match_table(HashMap::from([("name".to_string(), by_name)]));

        assert!(dev.match_using_params("name", &[json!("client-a")]));
        assert!(!dev.match_using_params("name", &[json!("client-b")]));
        assert!(!dev.match_using_params("unknown", &[]));

        assert!(dev.verify_status().is_ok());
        dev.update_status_verification_callback("ssh", Arc::new(|_: &LandscapeDevice| Ok(())));
        dev.update_status_verification_callback(
            "upnp",
            Arc::new(|dev: &LandscapeDevice| Err(LandscapeError::semantic(format!("{} unreachable", dev.identity())))),
        );
        let err = dev.verify_status().unwrap_err();
        assert!(err.to_string().contains("10.0.0.1 unreachable"));
    }

    #[test]
    fn test_mark_contacted() {
        let dev = device(device_config("network/client", "a", "10.0.0.1"));
        assert!(dev.contacted_first().is_none());

        dev.mark_contacted();
        let first = dev.contacted_first().unwrap();
        dev.mark_contacted();

        assert_eq!(dev.contacted_first().unwrap(), first);
        assert!(dev.contacted_last().unwrap() >= first);
    }

    #[test]
    fn test_update_full_identifier() {
        let dev = device(device_config("network/client", "a", "10.0.0.1"));
        dev.update_full_identifier("uuid:10.0.0.1-serial");
        assert_eq!(dev.full_identifier(), "uuid:10.0.0.1-serial");
    }
}
