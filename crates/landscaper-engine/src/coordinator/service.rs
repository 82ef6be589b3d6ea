//! Coordinator for infrastructure services

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::debug;

use landscaper_config::ServiceConfig;
use landscaper_core::error::LandscapeResult;
use landscaper_core::types::{ActivationParams, FriendlyIdentifier};

use super::{
    connect_services, missing_field_error, missing_ssh_error, ConnectivityReport, ContextFactory,
    Coordinator, CoordinatorState,
};
use crate::agents::CONNECTIVITY_COMMAND;
use crate::credentials::CredentialManager;
use crate::extension::ExtendedTarget;
use crate::service::LandscapeService;

/// Creates and manages `network/service-base` services
pub struct ServiceCoordinator {
    state: CoordinatorState,
    must_include_ssh: bool,
}

impl ServiceCoordinator {
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

    pub fn lookup_service_by_host(&self, host: &str) -> Option<Arc<LandscapeService>> {
        self.state.lookup_service(host)
    }
}

#[async_trait]
impl Coordinator for ServiceCoordinator {
    fn integration_key(&self) -> &str {
        self.state.integration_key()
    }

    fn state(&self) -> &CoordinatorState {
        &self.state
    }

    fn activate(&self, _params: &ActivationParams) -> LandscapeResult<()> {
        for service in self.state.service_children() {
            service.initialize_features();
        }
        Ok(())
    }

    async fn establish_connectivity(
        &self,
        _params: &ActivationParams,
    ) -> LandscapeResult<Vec<ConnectivityReport>> {
        connect_services(&self.state, CONNECTIVITY_COMMAND, false).await
    }

    fn create_landscape_service(
        &self,
        config: &ServiceConfig,
        credentials: &CredentialManager,
    ) -> LandscapeResult<(FriendlyIdentifier, Arc<LandscapeService>)> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| missing_field_error("ServiceCoordinator", "host", &config.to_value()))?;

        let fid = FriendlyIdentifier::new(host.clone(), host);
        let service = Arc::new(LandscapeService::new(
            Some(self.state.self_ref()),
            fid.clone(),
            config.clone(),
            credentials,
        )?);

        let target = ExtendedTarget::Service(Arc::downgrade(&service));
        match self
            .state
            .ssh_extension_for(target, service.host(), service.ssh_credential(), &config.extra)
        {
            Ok(ext) => service.attach_extension(ext)?,
            Err(reason) if self.must_include_ssh => {
                return Err(missing_ssh_error("ServiceCoordinator", "service", reason));
            }
            Err(reason) => debug!("No ssh extension for {}: {}", service.identity(), reason),
        }

        self.state.add_service(service.clone());
        Ok((fid, service))
    }

    async fn verify_connectivity(
        &self,
        cmd: &str,
        raise_error: bool,
    ) -> LandscapeResult<Vec<ConnectivityReport>> {
        connect_services(&self.state, cmd, raise_error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::manager;
    use crate::service::tests::service_config;
    use landscaper_core::error::LandscapeError;
    use landscaper_core::types::DeviceExtensionType;

    #[test]
    fn test_create_service() {
        let coord = ServiceCoordinator::new(
            "infrastructure:services:serviceType:network/service-base",
            false,
            false,
            None,
        );
        let mut config = service_config("build-server", "10.0.0.5");
        config.credentials = vec!["backup-ssh".to_string()];

        let (fid, service) = coord.create_landscape_service(&config, &manager()).unwrap();
        assert_eq!(fid.identity(), "10.0.0.5");
        assert!(service.has_extension_type(DeviceExtensionType::Ssh));
        assert!(coord.lookup_service_by_host("10.0.0.5").is_some());
        assert_eq!(coord.service_children().len(), 1);
        assert!(coord.children().is_empty());
    }

    #[test]
    fn test_devices_not_supported() {
        let coord = ServiceCoordinator::new("key", false, false, None);
        let config = landscaper_config::DeviceConfig::new("network/client");
        let err = coord.create_landscape_device(&config, &manager()).unwrap_err();
        assert!(matches!(err, LandscapeError::NotOverloaded { .. }));
    }

    #[tokio::test]
    async fn test_connectivity_skips_unreachable() {
        let coord = ServiceCoordinator::new("key", false, false, None);
        let mut config = service_config("build-server", "10.0.0.5");
        config.credentials = vec!["lab-ssh".to_string()];
        coord.create_landscape_service(&config, &manager()).unwrap();

        let reports = coord
            .establish_connectivity(&ActivationParams::default())
            .await
            .unwrap();
        assert!(reports.is_empty());
    }
}
