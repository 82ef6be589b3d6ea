//! Integration layer
//!
//! Turns declarations into live devices and services. Each requested
//! coupling gets one coordinator, created the first time a declaration for
//! its integration key shows up.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use landscaper_config::{SerialConfig, ServiceConfig};
use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::types::{ActivationParams, DeviceExtensionType};

use crate::coordinator::Coordinator;
use crate::coupling::IntegrationCoupling;
use crate::credentials::CredentialManager;
use crate::device::LandscapeDevice;
use crate::filters::Filters;
use crate::group::LandscapeDeviceGroup;
use crate::landscape::Landscape;
use crate::power::PowerInterfaceRegistry;
use crate::service::LandscapeService;

pub const UNKNOWN_DEVICES_TITLE: &str = "ERROR Unrecognized device declarations";
pub const UNKNOWN_SERVICES_TITLE: &str = "ERROR Unrecognized service declarations";

type CoordinatorTable = IndexMap<String, Arc<dyn Coordinator>>;

#[derive(Default)]
struct IntegratedResources {
    coordinators_for_devices: CoordinatorTable,
    coordinators_for_services: CoordinatorTable,
    devices: IndexMap<String, Arc<LandscapeDevice>>,
    services: IndexMap<String, Arc<LandscapeService>>,
    device_groups: IndexMap<String, Arc<LandscapeDeviceGroup>>,
    devices_by_ext_type: IndexMap<DeviceExtensionType, IndexMap<String, Arc<LandscapeDevice>>>,
    power_request_count: usize,
    serial_request_count: usize,
    power: Option<Arc<PowerInterfaceRegistry>>,
    serial: IndexMap<String, SerialConfig>,
}

impl IntegratedResources {
    fn register_extension_association(&mut self, ext_type: DeviceExtensionType, device: &Arc<LandscapeDevice>) {
        self.devices_by_ext_type
            .entry(ext_type)
            .or_default()
            .insert(device.identity(), device.clone());
    }
}

#[derive(Default)]
struct IntegrationState {
    requested: IndexMap<String, Arc<dyn IntegrationCoupling>>,
    resources: IntegratedResources,
    initialized: bool,
}

/// Devices, services and the coordinators that own them
#[derive(Default)]
pub struct IntegrationLayer {
    state: RwLock<IntegrationState>,
}

impl IntegrationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the installed coupling with `key` for this landscape
    ///
    /// Called by couplings from `attach_to_environment`.
    pub fn register_integration_dependency(&self, landscape: &Landscape, key: &str) -> LandscapeResult<()> {
        let coupling = landscape.installation().coupling(key).ok_or_else(|| {
            LandscapeError::semantic(format!("No coupling is installed for integration key '{}'.", key))
        })?;

        debug!("Registered integration dependency {}", key);
        self.state.write().requested.insert(key.to_string(), coupling);
        Ok(())
    }

    pub fn requested_integration_keys(&self) -> Vec<String> {
        self.state.read().requested.keys().cloned().collect()
    }

    /// Associate a device with an extension type it supports
    pub fn register_device_extension_association(
        &self,
        ext_type: DeviceExtensionType,
        device: &Arc<LandscapeDevice>,
    ) {
        self.state
            .write()
            .resources
            .register_extension_association(ext_type, device);
    }

    /// Create the coordinators, devices, services and device groups
    pub fn initialize_landscape(&self, landscape: &Landscape, params: &ActivationParams) -> LandscapeResult<()> {
        let layer_config = landscape.configuration();
        let requested: Vec<Arc<dyn IntegrationCoupling>> =
            self.state.read().requested.values().cloned().collect();

        let mut resources = IntegratedResources::default();

        if layer_config.landscape_info().is_some() {
            let credentials = layer_config.credential_manager()?;

            if params.disable_device_activation {
                info!("IntegrationLayer: 'Device Activation' was disabled.");
            } else {
                self.initialize_devices(landscape, &requested, &credentials, params, &mut resources)?;

                if resources.power_request_count > 0 {
                    resources.power = Some(Arc::new(PowerInterfaceRegistry::new(
                        layer_config.power_configs(),
                        credentials.clone(),
                    )));
                }
                if resources.serial_request_count > 0 {
                    resources.serial = layer_config
                        .serial_configs()
                        .into_iter()
                        .map(|cfg| (cfg.name.clone(), cfg))
                        .collect();
                }
            }

            if params.disable_service_activation {
                info!("IntegrationLayer: 'Service Activation' was disabled.");
            } else {
                self.initialize_services(landscape, &requested, &credentials, params, &mut resources)?;
            }
        }

        initialize_device_groups(&mut resources)?;

        info!(
            "Integrated {} devices, {} services and {} device groups",
            resources.devices.len(),
            resources.services.len(),
            resources.device_groups.len()
        );

        let mut state = self.state.write();
        state.resources = resources;
        state.initialized = true;
        Ok(())
    }

    fn initialize_devices(
        &self,
        landscape: &Landscape,
        requested: &[Arc<dyn IntegrationCoupling>],
        credentials: &CredentialManager,
        params: &ActivationParams,
        resources: &mut IntegratedResources,
    ) -> LandscapeResult<()> {
        let mut unrecognized = Vec::new();

        for config in landscape.configuration().device_configs(&Filters::new()) {
            let section = config.section.clone().unwrap_or_default();
            let value = config.to_value();

            let Some(coupling) = requested
                .iter()
                .find(|c| c.key_parts().matches("apod", &section, &value))
            else {
                unrecognized.push(format!(
                    "    apod/{}: deviceType={} name={}",
                    section,
                    config.device_type,
                    config.name.as_deref().unwrap_or("-")
                ));
                continue;
            };

            let coordinator = coordinator_for(
                &mut resources.coordinators_for_devices,
                coupling.as_ref(),
                landscape,
            )?;
            let (friendly_id, device) = coordinator.create_landscape_device(&config, credentials)?;

            let identity = friendly_id.identity();
            if resources.devices.contains_key(&identity) {
                return Err(LandscapeError::configuration(format!(
                    "Duplicate device identity '{}' declared in section '{}'.",
                    identity, section
                )));
            }

            if device.is_configured_for_power() {
                resources.power_request_count += 1;
            }
            if device.is_configured_for_serial() {
                resources.serial_request_count += 1;
            }
            for ext_type in device.extensions().keys() {
                resources.register_extension_association(*ext_type, &device);
            }

            debug!("Integrated device {}", device.friendly_id().relationship());
            resources.devices.insert(identity, device);
        }

        if !unrecognized.is_empty() {
            if !params.allow_unknown_devices {
                return Err(LandscapeError::ConfigurationReport {
                    title: UNKNOWN_DEVICES_TITLE.to_string(),
                    failures: unrecognized,
                });
            }
            debug!("Ignoring {} unrecognized device declarations", unrecognized.len());
        }

        Ok(())
    }

    fn initialize_services(
        &self,
        landscape: &Landscape,
        requested: &[Arc<dyn IntegrationCoupling>],
        credentials: &CredentialManager,
        params: &ActivationParams,
        resources: &mut IntegratedResources,
    ) -> LandscapeResult<()> {
        let mut unrecognized = Vec::new();

        for config in landscape.configuration().service_configs(&Filters::new()) {
            let value = config.to_value();

            let Some(coupling) = requested
                .iter()
                .find(|c| c.key_parts().matches("infrastructure", "services", &value))
            else {
                unrecognized.push(describe_service(&config));
                continue;
            };

            let coordinator = coordinator_for(
                &mut resources.coordinators_for_services,
                coupling.as_ref(),
                landscape,
            )?;
            let (friendly_id, service) = coordinator.create_landscape_service(&config, credentials)?;

            let identity = friendly_id.identity();
            if resources.services.contains_key(&identity) {
                return Err(LandscapeError::configuration(format!(
                    "Duplicate service identity '{}'.",
                    identity
                )));
            }
            resources.services.insert(identity, service);
        }

        if !unrecognized.is_empty() {
            if !params.allow_unknown_services {
                return Err(LandscapeError::ConfigurationReport {
                    title: UNKNOWN_SERVICES_TITLE.to_string(),
                    failures: unrecognized,
                });
            }
            debug!("Ignoring {} unrecognized service declarations", unrecognized.len());
        }

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    pub fn get_devices(&self, filters: &Filters<LandscapeDevice>) -> Vec<Arc<LandscapeDevice>> {
        let candidates: Vec<_> = self.state.read().resources.devices.values().cloned().collect();
        filters.apply(candidates)
    }

    pub fn get_services(&self, filters: &Filters<LandscapeService>) -> Vec<Arc<LandscapeService>> {
        let candidates: Vec<_> = self.state.read().resources.services.values().cloned().collect();
        filters.apply(candidates)
    }

    pub fn lookup_device(&self, identity: &str) -> Option<Arc<LandscapeDevice>> {
        self.state.read().resources.devices.get(identity).cloned()
    }

    pub fn lookup_service(&self, identity: &str) -> Option<Arc<LandscapeService>> {
        self.state.read().resources.services.get(identity).cloned()
    }

    /// Devices with an extension of `ext_type` attached
    pub fn devices_with_extension(&self, ext_type: DeviceExtensionType) -> Vec<Arc<LandscapeDevice>> {
        self.state
            .read()
            .resources
            .devices_by_ext_type
            .get(&ext_type)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn device_groups(&self) -> IndexMap<String, Arc<LandscapeDeviceGroup>> {
        self.state.read().resources.device_groups.clone()
    }

    pub fn device_group(&self, label: &str) -> Option<Arc<LandscapeDeviceGroup>> {
        self.state.read().resources.device_groups.get(label).cloned()
    }

    pub fn coordinators_for_devices(&self) -> CoordinatorTable {
        self.state.read().resources.coordinators_for_devices.clone()
    }

    pub fn coordinators_for_services(&self) -> CoordinatorTable {
        self.state.read().resources.coordinators_for_services.clone()
    }

    pub fn power_request_count(&self) -> usize {
        self.state.read().resources.power_request_count
    }

    pub fn serial_request_count(&self) -> usize {
        self.state.read().resources.serial_request_count
    }

    /// Power interfaces, present when some device declared a power feature
    pub fn power_interfaces(&self) -> Option<Arc<PowerInterfaceRegistry>> {
        self.state.read().resources.power.clone()
    }

    pub fn serial_interfaces(&self) -> Vec<SerialConfig> {
        self.state.read().resources.serial.values().cloned().collect()
    }

    pub fn is_serial_interface_declared(&self, name: &str) -> bool {
        self.state.read().resources.serial.contains_key(name)
    }
}

fn coordinator_for(
    table: &mut CoordinatorTable,
    coupling: &dyn IntegrationCoupling,
    landscape: &Landscape,
) -> LandscapeResult<Arc<dyn Coordinator>> {
    let key = coupling.integration_key();
    if let Some(existing) = table.get(&key) {
        return Ok(existing.clone());
    }

    debug!("Creating coordinator for {}", key);
    let coordinator = coupling.create_coordinator(landscape)?;
    table.insert(key, coordinator.clone());
    Ok(coordinator)
}

fn describe_service(config: &ServiceConfig) -> String {
    format!(
        "    infrastructure/services: serviceType={} name={}",
        config.service_type,
        config.name.as_deref().unwrap_or("-")
    )
}

fn initialize_device_groups(resources: &mut IntegratedResources) -> LandscapeResult<()> {
    let mut members: IndexMap<String, Vec<Arc<LandscapeDevice>>> = IndexMap::new();

    for device in resources.devices.values() {
        let label = device.group();
        if !label.is_empty() {
            members.entry(label.to_string()).or_default().push(device.clone());
        }
    }

    for (label, items) in members {
        let group = LandscapeDeviceGroup::new(label.clone(), items)?;
        resources.device_groups.insert(label, Arc::new(group));
    }

    Ok(())
}
