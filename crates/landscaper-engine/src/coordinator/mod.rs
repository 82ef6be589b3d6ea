//! Coordinators
//!
//! A coordinator owns the devices or services of one integration class. It
//! creates them from their declarations, attaches protocol extensions and
//! verifies connectivity once the landscape becomes operational.
//!
//! Coordinators hold strong references to their children; children and
//! extensions only hold weak references back to the coordinator.

mod client;
mod node;
mod service;

pub use client::ClientCoordinator;
pub use node::NodeCoordinator;
pub use service::ServiceCoordinator;

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use landscaper_config::{CredentialSpec, DeviceConfig, ServiceConfig};
use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::types::{ActivationParams, DeviceExtensionType, FriendlyIdentifier};

use crate::agents::{ExpectedStatus, SystemContext};
use crate::cluster::LandscapeDeviceCluster;
use crate::credentials::CredentialManager;
use crate::device::LandscapeDevice;
use crate::extension::{ExtendedTarget, ProtocolExtension, SshExtension, DEFAULT_SSH_PORT};
use crate::group::LandscapeDeviceGroup;
use crate::service::LandscapeService;

/// Builds the system context an SSH extension runs commands through
pub type ContextFactory = Arc<dyn Fn(&SshExtension) -> Option<Arc<dyn SystemContext>> + Send + Sync>;

/// Outcome of one connectivity check
#[derive(Debug, Clone)]
pub struct ConnectivityReport {
    pub host: String,
    pub ipaddr: Option<String>,
    pub status: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub error: Option<String>,
}

impl ConnectivityReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status == Some(0)
    }

    /// One line summary used in failure reports
    pub fn summary(&self) -> String {
        let ipaddr = self.ipaddr.as_deref().unwrap_or("unknown");
        match (&self.error, self.status) {
            (Some(err), _) => format!("{} ({}): {}", self.host, ipaddr, err),
            (None, Some(status)) => format!("{} ({}): exit status {}", self.host, ipaddr, status),
            (None, None) => format!("{} ({}): no result", self.host, ipaddr),
        }
    }
}

/// Creates and manages the resources of one integration class
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Key of the coupling that created the coordinator
    fn integration_key(&self) -> &str;

    fn state(&self) -> &CoordinatorState;

    /// Give the coordinator a chance to enhance its devices
    fn activate(&self, _params: &ActivationParams) -> LandscapeResult<()> {
        Err(LandscapeError::not_overloaded(
            "activate: must be overloaded by derived coordinator types",
        ))
    }

    /// Verify connectivity with every child that can be reached
    async fn establish_connectivity(
        &self,
        _params: &ActivationParams,
    ) -> LandscapeResult<Vec<ConnectivityReport>> {
        Err(LandscapeError::not_overloaded(
            "establish_connectivity: must be overloaded by derived coordinator types",
        ))
    }

    fn create_landscape_device(
        &self,
        _config: &DeviceConfig,
        _credentials: &CredentialManager,
    ) -> LandscapeResult<(FriendlyIdentifier, Arc<LandscapeDevice>)> {
        Err(LandscapeError::not_overloaded(
            "create_landscape_device: must be overloaded by device coordinator types",
        ))
    }

    fn create_landscape_service(
        &self,
        _config: &ServiceConfig,
        _credentials: &CredentialManager,
    ) -> LandscapeResult<(FriendlyIdentifier, Arc<LandscapeService>)> {
        Err(LandscapeError::not_overloaded(
            "create_landscape_service: must be overloaded by service coordinator types",
        ))
    }

    fn create_cluster_for_devices(
        &self,
        _name: &str,
        _group: &Arc<LandscapeDeviceGroup>,
        _nodes: &[String],
        _spares: &[String],
    ) -> LandscapeResult<LandscapeDeviceCluster> {
        Err(LandscapeError::not_overloaded(
            "create_cluster_for_devices: must be overloaded by cluster coordinator types",
        ))
    }

    /// Devices created by this coordinator
    fn children(&self) -> Vec<Arc<LandscapeDevice>> {
        self.state().children()
    }

    /// Services created by this coordinator
    fn service_children(&self) -> Vec<Arc<LandscapeService>> {
        self.state().service_children()
    }

    fn lookup_device_by_key(&self, key: &str) -> Option<Arc<LandscapeDevice>> {
        self.state().lookup_device(key)
    }

    /// Run `cmd` on every reachable child
    ///
    /// With `raise_error` the first failure to run the command is returned
    /// as an error, otherwise it is captured in the report.
    async fn verify_connectivity(
        &self,
        _cmd: &str,
        _raise_error: bool,
    ) -> LandscapeResult<Vec<ConnectivityReport>> {
        Err(LandscapeError::not_overloaded(
            "verify_connectivity: must be overloaded by derived coordinator types",
        ))
    }
}

/// Bookkeeping shared by all coordinators
pub struct CoordinatorState {
    integration_key: String,
    self_ref: Weak<dyn Coordinator>,
    interactive: bool,
    context_factory: Option<ContextFactory>,
    inner: Mutex<StateInner>,
}

#[derive(Default)]
struct StateInner {
    children: IndexMap<String, Arc<LandscapeDevice>>,
    services: IndexMap<String, Arc<LandscapeService>>,
    expected: Vec<String>,
    found: Vec<String>,
    matched: Vec<String>,
    missing: Vec<String>,
}

impl CoordinatorState {
    pub fn new(
        integration_key: impl Into<String>,
        self_ref: Weak<dyn Coordinator>,
        interactive: bool,
        context_factory: Option<ContextFactory>,
    ) -> Self {
        Self {
            integration_key: integration_key.into(),
            self_ref,
            interactive,
            context_factory,
            inner: Mutex::new(StateInner::default()),
        }
    }

    pub fn integration_key(&self) -> &str {
        &self.integration_key
    }

    /// Weak reference handed to children and extensions
    pub fn self_ref(&self) -> Weak<dyn Coordinator> {
        self.self_ref.clone()
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn add_child(&self, device: Arc<LandscapeDevice>) {
        self.inner.lock().children.insert(device.identity(), device);
    }

    pub fn add_service(&self, service: Arc<LandscapeService>) {
        self.inner.lock().services.insert(service.identity(), service);
    }

    pub fn children(&self) -> Vec<Arc<LandscapeDevice>> {
        self.inner.lock().children.values().cloned().collect()
    }

    pub fn service_children(&self) -> Vec<Arc<LandscapeService>> {
        self.inner.lock().services.values().cloned().collect()
    }

    pub fn lookup_device(&self, key: &str) -> Option<Arc<LandscapeDevice>> {
        self.inner.lock().children.get(key).cloned()
    }

    pub fn lookup_service(&self, key: &str) -> Option<Arc<LandscapeService>> {
        self.inner.lock().services.get(key).cloned()
    }

    /// Find a child device by its configured name
    pub fn lookup_device_by_name(&self, name: &str) -> Option<Arc<LandscapeDevice>> {
        self.inner
            .lock()
            .children
            .values()
            .find(|dev| dev.name() == Some(name))
            .cloned()
    }

    pub fn expect_device(&self, identity: &str) {
        push_unique(&mut self.inner.lock().expected, identity);
    }

    pub fn record_found(&self, identity: &str) {
        push_unique(&mut self.inner.lock().found, identity);
    }

    pub fn record_matched(&self, identity: &str) {
        push_unique(&mut self.inner.lock().matched, identity);
    }

    pub fn record_missing(&self, identity: &str) {
        push_unique(&mut self.inner.lock().missing, identity);
    }

    pub fn expected_devices(&self) -> Vec<String> {
        self.inner.lock().expected.clone()
    }

    pub fn found_devices(&self) -> Vec<String> {
        self.inner.lock().found.clone()
    }

    pub fn matched_devices(&self) -> Vec<String> {
        self.inner.lock().matched.clone()
    }

    pub fn missing_devices(&self) -> Vec<String> {
        self.inner.lock().missing.clone()
    }

    /// Build an SSH extension for a resource and wire up its system context
    ///
    /// Fails with the reason the extension could not be built.
    pub(crate) fn ssh_extension_for(
        &self,
        target: ExtendedTarget,
        host: Option<&str>,
        credential: Option<&Arc<CredentialSpec>>,
        extra: &Map<String, Value>,
    ) -> Result<Arc<SshExtension>, &'static str> {
        let credential = credential.ok_or("missing 'ssh' credential")?;
        let host = host.ok_or("missing 'host'")?;

        let port = extra
            .get("port")
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(DEFAULT_SSH_PORT);
        let users = extra.get("users").cloned();

        let ext = Arc::new(SshExtension::new(
            Some(self.self_ref()),
            target,
            host,
            port,
            users,
            credential.clone(),
        ));

        if let Some(factory) = &self.context_factory {
            if let Some(context) = factory(&ext) {
                ext.set_system_context(context);
            }
        }

        Ok(ext)
    }
}

fn push_unique(list: &mut Vec<String>, identity: &str) {
    if !list.iter().any(|item| item == identity) {
        list.push(identity.to_string());
    }
}

/// Something connectivity can be checked on
pub(crate) struct ConnectivityTarget {
    pub identity: String,
    pub host: String,
    pub ipaddr: Option<String>,
    pub context: Arc<dyn SystemContext>,
}

impl ConnectivityTarget {
    pub(crate) async fn for_device(device: &LandscapeDevice) -> Option<Self> {
        let (host, context) = ssh_endpoint(device.extension(DeviceExtensionType::Ssh)?)?;
        Some(Self {
            identity: device.identity(),
            host,
            ipaddr: device.resolve_ipaddr().await.ok(),
            context,
        })
    }

    pub(crate) async fn for_service(service: &LandscapeService) -> Option<Self> {
        let (host, context) = ssh_endpoint(service.extension(DeviceExtensionType::Ssh)?)?;
        Some(Self {
            identity: service.identity(),
            host,
            ipaddr: service.resolve_ipaddr().await.ok(),
            context,
        })
    }
}

fn ssh_endpoint(ext: Arc<dyn ProtocolExtension>) -> Option<(String, Arc<dyn SystemContext>)> {
    let context = ext.system_context()?;
    Some((ext.binding().extid().to_string(), context))
}

/// Targets for the devices that carry an ssh context
pub(crate) async fn device_targets(devices: &[Arc<LandscapeDevice>]) -> Vec<ConnectivityTarget> {
    let mut targets = Vec::with_capacity(devices.len());
    for device in devices {
        if let Some(target) = ConnectivityTarget::for_device(device).await {
            targets.push(target);
        }
    }
    targets
}

pub(crate) async fn service_targets(services: &[Arc<LandscapeService>]) -> Vec<ConnectivityTarget> {
    let mut targets = Vec::with_capacity(services.len());
    for service in services {
        if let Some(target) = ConnectivityTarget::for_service(service).await {
            targets.push(target);
        }
    }
    targets
}

/// Run `cmd` against each target in order
pub(crate) async fn check_targets(
    targets: Vec<ConnectivityTarget>,
    cmd: &str,
    raise_error: bool,
) -> LandscapeResult<Vec<ConnectivityReport>> {
    let mut reports = Vec::with_capacity(targets.len());
    let expected = ExpectedStatus::default();

    for target in targets {
        debug!("Verifying connectivity with {} ({})", target.identity, target.host);
        match target.context.run_cmd(cmd, &expected, None).await {
            Ok(output) => reports.push(ConnectivityReport {
                host: target.host,
                ipaddr: target.ipaddr,
                status: Some(output.status),
                stdout: Some(output.stdout),
                stderr: Some(output.stderr),
                error: None,
            }),
            Err(err) => {
                if raise_error {
                    return Err(err);
                }
                warn!("Connectivity check failed for {}: {}", target.identity, err);
                reports.push(ConnectivityReport {
                    host: target.host,
                    ipaddr: target.ipaddr,
                    status: None,
                    stdout: None,
                    stderr: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    Ok(reports)
}

/// Check the devices of a coordinator and record which ones answered
pub(crate) async fn connect_children(
    state: &CoordinatorState,
    cmd: &str,
) -> LandscapeResult<Vec<ConnectivityReport>> {
    let targets = device_targets(&state.children()).await;
    let identities: Vec<String> = targets.iter().map(|t| t.identity.clone()).collect();

    let reports = check_targets(targets, cmd, false).await?;

    for (identity, report) in identities.iter().zip(&reports) {
        if report.is_success() {
            state.record_found(identity);
            state.record_matched(identity);
            if let Some(device) = state.lookup_device(identity) {
                device.mark_contacted();
            }
        } else {
            state.record_missing(identity);
        }
    }

    Ok(reports)
}

/// Check the services of a coordinator
pub(crate) async fn connect_services(
    state: &CoordinatorState,
    cmd: &str,
    raise_error: bool,
) -> LandscapeResult<Vec<ConnectivityReport>> {
    let targets = service_targets(&state.service_children()).await;
    let identities: Vec<String> = targets.iter().map(|t| t.identity.clone()).collect();

    let reports = check_targets(targets, cmd, raise_error).await?;

    for (identity, report) in identities.iter().zip(&reports) {
        if report.is_success() {
            if let Some(service) = state.lookup_service(identity) {
                service.mark_contacted();
            }
        }
    }

    Ok(reports)
}

/// Configuration error for a resource missing a required SSH setup
pub(crate) fn missing_ssh_error(type_name: &str, kind: &str, reason: &str) -> LandscapeError {
    LandscapeError::configuration(format!(
        "{} {} needs to have an 'ssh' credential. ({})",
        type_name, kind, reason
    ))
}

/// Configuration error for a declaration missing a required field
pub(crate) fn missing_field_error(type_name: &str, field: &str, declaration: &Value) -> LandscapeError {
    let rendered = serde_json::to_string_pretty(declaration).unwrap_or_default();
    LandscapeError::configuration(format!(
        "{}: declaration is missing '{}'.\nDEVICE:\n{}",
        type_name,
        field,
        landscaper_core::utils::indent_lines(&rendered, 1)
    ))
}
