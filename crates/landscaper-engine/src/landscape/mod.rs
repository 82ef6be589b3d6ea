//! The landscape
//!
//! A `Landscape` is brought up in three stages. Each stage runs once;
//! concurrent callers wait for the first one to finish and a stage that
//! failed can be run again. Calling a stage before its predecessor has
//! completed is a usage error.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell as GlobalCell;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use landscaper_config::{DeviceConfig, LoadedConfiguration};
use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::types::ActivationParams;

use crate::cluster::LandscapeDeviceCluster;
use crate::coupling::{builtin_couplings, IntegrationCoupling};
use crate::credentials::CredentialManager;
use crate::device::LandscapeDevice;
use crate::filters::Filters;
use crate::layers::{ConfigurationLayer, InstallationLayer, IntegrationLayer, OperationalLayer};
use crate::power::PowerInterface;
use crate::service::LandscapeService;

/// An automation landscape: devices, services and clusters plus the layers
/// that bring them up
pub struct Landscape {
    installation: InstallationLayer,
    configuration: ConfigurationLayer,
    integration: IntegrationLayer,
    operational: OperationalLayer,
    interactive: AtomicBool,
    configured: OnceCell<()>,
    integrated: OnceCell<()>,
    operational_gate: OnceCell<()>,
}

impl Landscape {
    pub fn builder() -> LandscapeBuilder {
        LandscapeBuilder::new()
    }

    pub fn installation(&self) -> &InstallationLayer {
        &self.installation
    }

    pub fn configuration(&self) -> &ConfigurationLayer {
        &self.configuration
    }

    pub fn integration(&self) -> &IntegrationLayer {
        &self.integration
    }

    pub fn operational(&self) -> &OperationalLayer {
        &self.operational
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::SeqCst)
    }

    pub fn set_interactive(&self, interactive: bool) {
        self.interactive.store(interactive, Ordering::SeqCst);
    }

    pub fn is_configured(&self) -> bool {
        self.configured.initialized()
    }

    pub fn is_integrated(&self) -> bool {
        self.integrated.initialized()
    }

    pub fn is_operational(&self) -> bool {
        self.operational_gate.initialized()
    }

    /// Load and validate the documents, record them and initialize credentials
    pub async fn activate_configuration(&self, params: &ActivationParams) -> LandscapeResult<()> {
        self.configured
            .get_or_try_init(|| async {
                let couplings = self.installation.installed_couplings();
                self.configuration.load_landscape(&couplings, params)?;
                self.configuration.load_topology(params)?;

                let runtime = self.configuration.runtime();
                if runtime.log_configuration {
                    let dir = runtime.resolved_output_directory();
                    self.configuration.record_configuration(&dir).await?;
                }

                self.configuration.initialize_credentials()?;
                if self.configuration.landscape_info().is_some() {
                    self.configuration.attach_to_environment(self)?;
                }

                info!("Landscape configuration complete");
                Ok::<(), LandscapeError>(())
            })
            .await?;
        Ok(())
    }

    /// Create coordinators, devices, services and device groups
    pub async fn activate_integration(&self, params: &ActivationParams) -> LandscapeResult<()> {
        if !self.is_configured() {
            return Err(LandscapeError::semantic(
                "activate_integration called before the configuration stage completed.",
            ));
        }

        self.integrated
            .get_or_try_init(|| async {
                self.integration.initialize_landscape(self, params)?;
                info!("Landscape integration complete");
                Ok::<(), LandscapeError>(())
            })
            .await?;
        Ok(())
    }

    /// Activate coordinators, establish connectivity and build clusters
    pub async fn activate_operations(&self, params: &ActivationParams) -> LandscapeResult<()> {
        if !self.is_integrated() {
            return Err(LandscapeError::semantic(
                "activate_operations called before the integration stage completed.",
            ));
        }

        self.operational_gate
            .get_or_try_init(|| async {
                self.operational.activate_coordinators(self, params)?;
                self.operational.establish_connectivity(self, params).await?;
                self.operational.overlay_topology(self, params)?;
                self.operational.validate_features(self, params)?;
                self.operational.validate_topology(self, params)?;
                info!("Landscape is operational");
                Ok::<(), LandscapeError>(())
            })
            .await?;
        Ok(())
    }

    /// Run all three stages
    pub async fn startup(&self, params: &ActivationParams) -> LandscapeResult<()> {
        self.activate_configuration(params).await?;
        self.activate_integration(params).await?;
        self.activate_operations(params).await
    }

    pub fn credential_manager(&self) -> LandscapeResult<Arc<CredentialManager>> {
        self.configuration.credential_manager()
    }

    pub fn get_device_configs(&self, filters: &Filters<DeviceConfig>) -> Vec<DeviceConfig> {
        self.configuration.device_configs(filters)
    }

    pub fn get_devices(&self, filters: &Filters<LandscapeDevice>) -> Vec<Arc<LandscapeDevice>> {
        self.integration.get_devices(filters)
    }

    pub fn get_services(&self, filters: &Filters<LandscapeService>) -> Vec<Arc<LandscapeService>> {
        self.integration.get_services(filters)
    }

    pub fn get_clusters(&self, filters: &Filters<LandscapeDeviceCluster>) -> Vec<Arc<LandscapeDeviceCluster>> {
        self.operational.get_clusters(filters)
    }

    pub fn get_cluster_by_name(&self, name: &str) -> Option<Arc<LandscapeDeviceCluster>> {
        self.operational.get_cluster_by_name(name)
    }

    pub fn checkout_device(&self, device: &Arc<LandscapeDevice>) -> LandscapeResult<()> {
        self.operational.checkout_device(device)
    }

    pub fn checkin_device(&self, device: &Arc<LandscapeDevice>) -> LandscapeResult<()> {
        self.operational.checkin_device(device)
    }

    pub fn checkout_cluster(&self, cluster: &LandscapeDeviceCluster) -> LandscapeResult<()> {
        self.operational.checkout_cluster(cluster)
    }

    pub fn checkin_cluster(&self, cluster: &LandscapeDeviceCluster) -> LandscapeResult<()> {
        self.operational.checkin_cluster(cluster)
    }

    /// Resolve a declared power interface
    pub fn power_interface(&self, name: &str) -> LandscapeResult<Arc<PowerInterface>> {
        let registry = self.integration.power_interfaces().ok_or_else(|| {
            LandscapeError::configuration(format!(
                "Power interface '{}' requested but no device declares a 'power' feature.",
                name
            ))
        })?;
        registry.lookup(name)
    }
}

impl fmt::Debug for Landscape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Landscape")
            .field("couplings", &self.installation.installed_keys())
            .field("configured", &self.is_configured())
            .field("integrated", &self.is_integrated())
            .field("operational", &self.is_operational())
            .finish()
    }
}

/// Builds a [`Landscape`] from a loaded configuration and a set of couplings
pub struct LandscapeBuilder {
    configuration: LoadedConfiguration,
    couplings: Vec<Arc<dyn IntegrationCoupling>>,
    interactive: bool,
}

impl LandscapeBuilder {
    pub fn new() -> Self {
        Self {
            configuration: LoadedConfiguration::default(),
            couplings: builtin_couplings(),
            interactive: false,
        }
    }

    pub fn with_configuration(mut self, configuration: LoadedConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Install an additional coupling next to the ones already given
    pub fn with_coupling(mut self, coupling: Arc<dyn IntegrationCoupling>) -> Self {
        self.couplings.push(coupling);
        self
    }

    /// Replace the installed couplings, built-ins included
    pub fn with_couplings(mut self, couplings: Vec<Arc<dyn IntegrationCoupling>>) -> Self {
        self.couplings = couplings;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn build(self) -> LandscapeResult<Landscape> {
        let installation = InstallationLayer::new(self.couplings)?;
        debug!("Landscape installed couplings: {:?}", installation.installed_keys());

        Ok(Landscape {
            installation,
            configuration: ConfigurationLayer::new(self.configuration),
            integration: IntegrationLayer::new(),
            operational: OperationalLayer::new(),
            interactive: AtomicBool::new(self.interactive),
            configured: OnceCell::new(),
            integrated: OnceCell::new(),
            operational_gate: OnceCell::new(),
        })
    }
}

impl Default for LandscapeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

static LANDSCAPE: GlobalCell<Arc<Landscape>> = GlobalCell::new();

/// Install the process-wide landscape; it can only be installed once
pub fn install_landscape(landscape: Landscape) -> LandscapeResult<Arc<Landscape>> {
    let landscape = Arc::new(landscape);
    LANDSCAPE
        .set(landscape.clone())
        .map_err(|_| LandscapeError::semantic("A landscape has already been installed for this process."))?;
    Ok(landscape)
}

/// The process-wide landscape
pub fn landscape_singleton() -> LandscapeResult<Arc<Landscape>> {
    LANDSCAPE
        .get()
        .cloned()
        .ok_or_else(|| LandscapeError::semantic("No landscape has been installed for this process."))
}

/// Bring the process-wide landscape up through all three stages
pub async fn startup_landscape(
    params: &ActivationParams,
    interactive: Option<bool>,
) -> LandscapeResult<Arc<Landscape>> {
    let landscape = landscape_singleton()?;
    landscape.set_interactive(interactive.unwrap_or(false));
    landscape.startup(params).await?;
    Ok(landscape)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::filters::{IncludeClusterByName, IncludeDeviceByDeviceType, IncludeDeviceByName};
    use landscaper_config::{CredentialsConfig, RuntimeSettings};
    use serde_json::{json, Value};

    pub(crate) fn loaded(landscape: Value, topology: Option<Value>) -> LoadedConfiguration {
        LoadedConfiguration {
            landscape: Some(serde_json::from_value(landscape).unwrap()),
            topology: topology.map(|t| serde_json::from_value(t).unwrap()),
            credentials: Some(CredentialsConfig {
                credentials: vec![
                    crate::credentials::tests::credential("lab-ssh", &["ssh"]),
                    crate::credentials::tests::credential("pdu-admin", &["basic"]),
                ],
            }),
            runtime: RuntimeSettings {
                output_directory: None,
                log_configuration: false,
            },
            sources: Vec::new(),
        }
    }

    pub(crate) fn lab_landscape() -> Value {
        json!({
            "apod": {
                "devices": [
                    {"deviceType": "network/client", "host": "10.0.0.1", "credentials": ["lab-ssh"]},
                    {"deviceType": "network/client", "host": "10.0.0.2", "role": "backup"},
                    {"deviceType": "cluster/node", "name": "node1", "host": "10.0.1.1", "group": "cluster/a"},
                    {"deviceType": "cluster/node", "name": "node2", "host": "10.0.1.2", "group": "cluster/a"},
                    {"deviceType": "cluster/node", "name": "node3", "host": "10.0.1.3", "group": "cluster/a"},
                ],
            },
            "infrastructure": {
                "services": [
                    {"serviceType": "network/service-base", "name": "build", "host": "build.lab"},
                ],
            },
        })
    }

    pub(crate) fn lab_topology() -> Value {
        json!({
            "clusters": [
                {"name": "alpha", "group": "cluster/a", "nodes": ["node1", "node2"], "spares": ["node3"]},
            ],
        })
    }

    pub(crate) async fn operational_landscape() -> Landscape {
        let landscape = Landscape::builder()
            .with_configuration(loaded(lab_landscape(), Some(lab_topology())))
            .build()
            .unwrap();
        landscape.startup(&ActivationParams::default()).await.unwrap();
        landscape
    }

    #[tokio::test]
    async fn test_startup_integrates_everything() {
        let landscape = operational_landscape().await;
        assert!(landscape.is_operational());

        assert_eq!(landscape.get_devices(&Filters::new()).len(), 5);
        assert_eq!(landscape.get_services(&Filters::new()).len(), 1);

        let clients = landscape
            .get_devices(&Filters::new().include(IncludeDeviceByDeviceType::new("network/client")));
        assert_eq!(clients.len(), 2);

        let cluster = landscape.get_cluster_by_name("alpha").unwrap();
        assert_eq!(cluster.nodes().keys().collect::<Vec<_>>(), vec!["node1", "node2"]);
        assert_eq!(cluster.spares().len(), 1);

        let found = landscape.get_clusters(&Filters::new().include(IncludeClusterByName::new("alpha")));
        assert_eq!(found.len(), 1);

        let integration = landscape.integration();
        assert_eq!(integration.coordinators_for_devices().len(), 2);
        assert_eq!(integration.coordinators_for_services().len(), 1);
        assert_eq!(integration.device_groups().len(), 1);
        assert_eq!(
            integration
                .devices_with_extension(landscaper_core::types::DeviceExtensionType::Ssh)
                .len(),
            1
        );
        assert_eq!(landscape.operational().available_devices().len(), 5);
        assert_eq!(landscape.operational().available_clusters().len(), 1);
    }

    #[tokio::test]
    async fn test_device_checkout_and_checkin() {
        let landscape = operational_landscape().await;
        let node1 = landscape
            .get_devices(&Filters::new().include(IncludeDeviceByName::new("node1")))
            .remove(0);

        landscape.checkout_device(&node1).unwrap();
        let err = landscape.checkout_device(&node1).unwrap_err();
        assert!(matches!(err, LandscapeError::Checkout { .. }));

        landscape.checkin_device(&node1).unwrap();
        assert!(landscape.operational().available_devices().contains_key("node1"));

        match landscape.checkin_device(&node1).unwrap_err() {
            LandscapeError::Checkin { message } => {
                assert!(message.starts_with("Checkin of device 'node1' that was not previously checked out."));
                assert!(message.contains("AVAILABLE POOL:\n    10.0.0.1"));
                assert!(message.ends_with("OUTSTANDING POOL:"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cluster_checkout_and_checkin() {
        let landscape = operational_landscape().await;
        let cluster = landscape.get_cluster_by_name("alpha").unwrap();
        let node2 = cluster.nodes()["node2"].clone();

        landscape.checkout_device(&node2).unwrap();
        match landscape.checkout_cluster(&cluster).unwrap_err() {
            LandscapeError::Checkout { message } => {
                assert!(message.contains("UNAVAILABLE NODES:\n    node2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        landscape.checkin_device(&node2).unwrap();

        landscape.checkout_cluster(&cluster).unwrap();
        assert!(landscape.operational().available_clusters().is_empty());
        assert!(landscape.checkout_device(&node2).is_err());
        match landscape.checkout_cluster(&cluster).unwrap_err() {
            LandscapeError::Checkout { message } => assert!(message.contains("already been checked out")),
            other => panic!("unexpected error: {other}"),
        }

        landscape.checkin_cluster(&cluster).unwrap();
        assert_eq!(landscape.operational().available_devices().len(), 5);
        assert!(matches!(
            landscape.checkin_cluster(&cluster).unwrap_err(),
            LandscapeError::Checkin { .. }
        ));
    }

    #[tokio::test]
    async fn test_cluster_nodes_stay_with_checked_out_cluster() {
        let landscape = operational_landscape().await;
        let cluster = landscape.get_cluster_by_name("alpha").unwrap();
        let node2 = cluster.nodes()["node2"].clone();

        landscape.checkout_cluster(&cluster).unwrap();
        match landscape.checkin_device(&node2).unwrap_err() {
            LandscapeError::Checkin { message } => {
                assert!(message.contains("'node2'"));
                assert!(message.contains("'alpha'"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(landscape.checkout_device(&node2).is_err());
        assert!(landscape.operational().outstanding_devices().contains_key(&node2.identity()));

        landscape.checkin_cluster(&cluster).unwrap();
        assert!(landscape.operational().outstanding_devices().is_empty());
        landscape.checkout_device(&node2).unwrap();
        landscape.checkin_device(&node2).unwrap();
    }

    #[tokio::test]
    async fn test_stage_order_enforced() {
        let landscape = Landscape::builder()
            .with_configuration(loaded(lab_landscape(), None))
            .build()
            .unwrap();
        let params = ActivationParams::default();

        let err = landscape.activate_integration(&params).await.unwrap_err();
        assert!(matches!(err, LandscapeError::Semantic { .. }));
        let err = landscape.activate_operations(&params).await.unwrap_err();
        assert!(matches!(err, LandscapeError::Semantic { .. }));

        landscape.activate_configuration(&params).await.unwrap();
        landscape.activate_configuration(&params).await.unwrap();
        assert!(landscape.is_configured());
        assert!(!landscape.is_integrated());
    }

    #[tokio::test]
    async fn test_unknown_devices_rejected_then_retried() {
        let mut document = lab_landscape();
        document["apod"]["devices"]
            .as_array_mut()
            .unwrap()
            .push(json!({"deviceType": "custom/thing", "name": "odd"}));
        let landscape = Landscape::builder()
            .with_configuration(loaded(document, None))
            .build()
            .unwrap();

        let params = ActivationParams::default();
        landscape.activate_configuration(&params).await.unwrap();
        match landscape.activate_integration(&params).await.unwrap_err() {
            LandscapeError::ConfigurationReport { failures, .. } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("deviceType=custom/thing"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!landscape.is_integrated());

        let lenient = ActivationParams {
            allow_unknown_devices: true,
            ..ActivationParams::default()
        };
        landscape.activate_integration(&lenient).await.unwrap();
        assert_eq!(landscape.get_devices(&Filters::new()).len(), 5);
    }

    #[tokio::test]
    async fn test_disabled_activation() {
        let landscape = Landscape::builder()
            .with_configuration(loaded(lab_landscape(), Some(lab_topology())))
            .build()
            .unwrap();
        let params = ActivationParams {
            disable_device_activation: true,
            disable_service_activation: true,
            ..ActivationParams::default()
        };

        landscape.activate_configuration(&params).await.unwrap();
        landscape.activate_integration(&params).await.unwrap();
        assert!(landscape.get_devices(&Filters::new()).is_empty());
        assert!(landscape.get_services(&Filters::new()).is_empty());

        let err = landscape.activate_operations(&params).await.unwrap_err();
        assert!(err.to_string().contains("clusters/alpha"));
    }

    #[tokio::test]
    async fn test_feature_validation() {
        let document = json!({
            "apod": {
                "power": [
                    {"name": "pdu1", "powerType": "DliPowerSwitch", "host": "10.9.0.1", "credential": "pdu-admin"},
                ],
                "devices": [
                    {"deviceType": "network/client", "host": "10.0.0.1", "features": {"power": {"name": "pdu1", "outlet": 2}}},
                    {"deviceType": "network/client", "host": "10.0.0.2", "features": {"power": "pdu9", "serial": "ts1"}},
                ],
            },
        });
        let landscape = Landscape::builder()
            .with_configuration(loaded(document, None))
            .build()
            .unwrap();

        match landscape.startup(&ActivationParams::default()).await.unwrap_err() {
            LandscapeError::ConfigurationReport { title, failures } => {
                assert_eq!(title, crate::layers::operational::FEATURE_FAILURES_TITLE);
                assert_eq!(failures.len(), 2);
                assert!(failures[0].contains("'pdu9'"));
                assert!(failures[1].contains("'ts1'"));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(landscape.integration().power_request_count(), 2);
        assert_eq!(landscape.integration().serial_request_count(), 1);
        let pdu = landscape.power_interface("pdu1").unwrap();
        assert_eq!(pdu.host, "10.9.0.1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connectivity_through_local_agent() {
        use crate::coordinator::tests::local_factory;
        use crate::coupling::{ClientCoupling, NodeCoupling, ServiceCoupling};

        let landscape = Landscape::builder()
            .with_configuration(loaded(lab_landscape(), Some(lab_topology())))
            .with_couplings(vec![
                Arc::new(ClientCoupling::new().with_context_factory(local_factory())),
                Arc::new(NodeCoupling::new()),
                Arc::new(ServiceCoupling::new()),
            ])
            .build()
            .unwrap();
        landscape.startup(&ActivationParams::default()).await.unwrap();

        let reports = landscape.operational().connectivity_reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_success());
        assert_eq!(reports[0].host, "10.0.0.1");

        let client = landscape
            .integration()
            .lookup_device("10.0.0.1")
            .unwrap();
        assert!(client.contacted_first().is_some());
    }

    #[tokio::test]
    async fn test_record_configuration_during_startup() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut configuration = loaded(lab_landscape(), Some(lab_topology()));
        configuration.runtime = RuntimeSettings {
            output_directory: Some(temp_dir.path().to_string_lossy().into_owned()),
            log_configuration: true,
        };

        let landscape = Landscape::builder().with_configuration(configuration).build().unwrap();
        landscape.activate_configuration(&ActivationParams::default()).await.unwrap();

        assert!(temp_dir.path().join("landscape-declared.json").is_file());
        assert!(temp_dir.path().join("topology-declared.yaml").is_file());
    }

    #[tokio::test]
    async fn test_singleton() {
        let landscape = Landscape::builder()
            .with_configuration(loaded(lab_landscape(), None))
            .build()
            .unwrap();
        let installed = install_landscape(landscape).unwrap();
        assert!(Arc::ptr_eq(&installed, &landscape_singleton().unwrap()));

        let again = Landscape::builder().build().unwrap();
        assert!(matches!(
            install_landscape(again).unwrap_err(),
            LandscapeError::Semantic { .. }
        ));

        let started = startup_landscape(&ActivationParams::default(), Some(true)).await.unwrap();
        assert!(started.is_interactive());
        assert!(started.is_operational());
    }
}
