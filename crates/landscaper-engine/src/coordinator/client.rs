//! Coordinator for network clients

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::debug;

use landscaper_config::DeviceConfig;
use landscaper_core::error::LandscapeResult;
use landscaper_core::types::{ActivationParams, FriendlyIdentifier};

use super::{
    connect_children, device_targets, missing_field_error, missing_ssh_error, check_targets,
    ConnectivityReport, ContextFactory, Coordinator, CoordinatorState,
};
use crate::agents::CONNECTIVITY_COMMAND;
use crate::credentials::CredentialManager;
use crate::device::LandscapeDevice;
use crate::extension::ExtendedTarget;

/// Creates and manages `network/client` devices
///
/// Clients are identified by their `host`.
pub struct ClientCoordinator {
    state: CoordinatorState,
    must_include_ssh: bool,
}

impl ClientCoordinator {
    pub fn new(
        integration_key: impl Into<String>,
        interactive: bool,
        must_include_ssh: bool,
        context_factory: Option<ContextFactory>,
    ) -> Arc<Self> {
        let integration_key = integration_key.into();
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let self_ref: Weak<dyn Coordinator> = weak.clone();
            Self {
                state: CoordinatorState::new(integration_key, self_ref, interactive, context_factory),
                must_include_ssh,
            }
        })
    }

    pub fn must_include_ssh(&self) -> bool {
        self.must_include_ssh
    }

    pub fn lookup_device_by_host(&self, host: &str) -> Option<Arc<LandscapeDevice>> {
        self.state.lookup_device(host)
    }

    pub fn lookup_device_by_ip(&self, ipaddr: &str) -> Option<Arc<LandscapeDevice>> {
        self.state
            .children()
            .into_iter()
            .find(|dev| dev.ipaddr().map(|ip| ip == ipaddr).unwrap_or(false))
    }
}

#[async_trait]
impl Coordinator for ClientCoordinator {
    fn integration_key(&self) -> &str {
        self.state.integration_key()
    }

    fn state(&self) -> &CoordinatorState {
        &self.state
    }

    fn activate(&self, _params: &ActivationParams) -> LandscapeResult<()> {
        for device in self.state.children() {
            self.state.expect_device(&device.identity());
            device.initialize_features();
        }
        Ok(())
    }

    async fn establish_connectivity(
        &self,
        _params: &ActivationParams,
    ) -> LandscapeResult<Vec<ConnectivityReport>> {
        connect_children(&self.state, CONNECTIVITY_COMMAND).await
    }

    fn create_landscape_device(
        &self,
        config: &DeviceConfig,
        credentials: &CredentialManager,
    ) -> LandscapeResult<(FriendlyIdentifier, Arc<LandscapeDevice>)> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| missing_field_error("ClientCoordinator", "host", &config.to_value()))?;

        let fid = FriendlyIdentifier::new(host.clone(), host);
        let device = Arc::new(LandscapeDevice::new(
            Some(self.state.self_ref()),
            fid.clone(),
            config.clone(),
            credentials,
        )?);

        let target = ExtendedTarget::Device(Arc::downgrade(&device));
        match self
            .state
            .ssh_extension_for(target, device.host(), device.ssh_credential(), &config.extra)
        {
            Ok(ext) => device.attach_extension(ext)?,
            Err(reason) if self.must_include_ssh => {
                return Err(missing_ssh_error("ClientCoordinator", "client", reason));
            }
            Err(reason) => debug!("No ssh extension for {}: {}", device.identity(), reason),
        }

        self.state.add_child(device.clone());
        Ok((fid, device))
    }

    async fn verify_connectivity(
        &self,
        cmd: &str,
        raise_error: bool,
    ) -> LandscapeResult<Vec<ConnectivityReport>> {
        let targets = device_targets(&self.state.children()).await;
        check_targets(targets, cmd, raise_error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::local_factory;
    use crate::credentials::tests::manager;
    use crate::device::tests::device_config;
    use landscaper_core::error::LandscapeError;
    use landscaper_core::types::DeviceExtensionType;

    fn client_config(host: &str, creds: &[&str]) -> DeviceConfig {
        let mut config = device_config("network/client", host, host);
        config.credentials = creds.iter().map(|c| c.to_string()).collect();
        config
    }

    #[test]
    fn test_create_device_attaches_ssh() {
        let coord = ClientCoordinator::new("apod:*:deviceType:network/client", false, false, None);
        let (fid, device) = coord
            .create_landscape_device(&client_config("10.1.1.1", &["lab-ssh"]), &manager())
            .unwrap();

        assert_eq!(fid.identity(), "10.1.1.1");
        assert!(device.has_extension_type(DeviceExtensionType::Ssh));
        assert_eq!(coord.children().len(), 1);
        assert!(coord.lookup_device_by_key("10.1.1.1").is_some());
        assert!(coord.lookup_device_by_host("10.1.1.1").is_some());
        assert!(coord.lookup_device_by_ip("10.1.1.1").is_some());

        let owner = device.coordinator().unwrap();
        assert_eq!(owner.integration_key(), "apod:*:deviceType:network/client");
    }

    #[test]
    fn test_ssh_optional_by_default() {
        let coord = ClientCoordinator::new("key", false, false, None);
        let (_, device) = coord
            .create_landscape_device(&client_config("10.1.1.2", &["pdu-admin"]), &manager())
            .unwrap();
        assert!(!device.has_extension_type(DeviceExtensionType::Ssh));
    }

    #[test]
    fn test_must_include_ssh() {
        let coord = ClientCoordinator::new("key", false, true, None);
        let err = coord
            .create_landscape_device(&client_config("10.1.1.3", &[]), &manager())
            .unwrap_err();

        match err {
            LandscapeError::Configuration { message } => {
                assert!(message.contains("missing 'ssh' credential"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(coord.children().is_empty());
    }

    #[test]
    fn test_host_required() {
        let coord = ClientCoordinator::new("key", false, false, None);
        let config = DeviceConfig::new("network/client");
        let err = coord.create_landscape_device(&config, &manager()).unwrap_err();
        assert!(matches!(err, LandscapeError::Configuration { .. }));
    }

    #[test]
    fn test_port_from_declaration() {
        let coord = ClientCoordinator::new("key", false, false, None);
        let mut config = client_config("10.1.1.4", &["lab-ssh"]);
        config.extra.insert("port".to_string(), serde_json::json!(2222));
        let (_, device) = coord.create_landscape_device(&config, &manager()).unwrap();

        let ext = device.extension(DeviceExtensionType::Ssh).unwrap();
        assert_eq!(ext.binding().location(), "10.1.1.4:2222");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_establish_connectivity_with_local_agent() {
        let coord = ClientCoordinator::new("key", false, false, Some(local_factory()));
        coord
            .create_landscape_device(&client_config("127.0.0.1", &["lab-ssh"]), &manager())
            .unwrap();
        coord
            .create_landscape_device(&client_config("127.0.0.2", &[]), &manager())
            .unwrap();
        coord.activate(&ActivationParams::default()).unwrap();

        let reports = coord
            .establish_connectivity(&ActivationParams::default())
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_success());
        assert_eq!(reports[0].stdout.as_deref(), Some("It Works\n"));
        assert_eq!(coord.state().expected_devices().len(), 2);
        assert_eq!(coord.state().matched_devices(), vec!["127.0.0.1"]);

        let device = coord.lookup_device_by_key("127.0.0.1").unwrap();
        assert!(device.contacted_first().is_some());
    }
}
