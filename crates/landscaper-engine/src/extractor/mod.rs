//! Extraction of declarations from a running landscape
//!
//! Useful to hand a subset of a lab to another run: pick devices, cluster
//! nodes and services with filters and get back a landscape document that
//! declares only those.

use std::sync::Arc;

use serde_json::{json, Value};

use landscaper_config::{DeviceConfig, ServiceConfig};
use landscaper_core::error::LandscapeResult;

use crate::cluster::LandscapeDeviceCluster;
use crate::device::LandscapeDevice;
use crate::filters::Filters;
use crate::landscape::{landscape_singleton, Landscape};
use crate::service::LandscapeService;

/// Collects copies of declarations selected from a landscape
pub struct ConfigurationExtractor {
    landscape: Arc<Landscape>,
    devices: Vec<DeviceConfig>,
    services: Vec<ServiceConfig>,
}

impl ConfigurationExtractor {
    pub fn new(landscape: Arc<Landscape>) -> Self {
        Self {
            landscape,
            devices: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Extract from the process-wide landscape
    pub fn from_singleton() -> LandscapeResult<Self> {
        Ok(Self::new(landscape_singleton()?))
    }

    pub fn extract_devices(&mut self, filters: &Filters<LandscapeDevice>) -> &mut Self {
        for device in self.landscape.get_devices(filters) {
            self.devices.push(declared(device.device_config()));
        }
        self
    }

    /// Extract the node declarations of the selected clusters
    pub fn extract_clusters(&mut self, filters: &Filters<LandscapeDeviceCluster>) -> &mut Self {
        for cluster in self.landscape.get_clusters(filters) {
            for node in cluster.nodes().values() {
                self.devices.push(declared(node.device_config()));
            }
        }
        self
    }

    pub fn extract_services(&mut self, filters: &Filters<LandscapeService>) -> &mut Self {
        for service in self.landscape.get_services(filters) {
            self.services.push(service.service_config().clone());
        }
        self
    }

    /// The extracted landscape document
    pub fn configurations(&self) -> Value {
        let devices: Vec<Value> = self.devices.iter().map(DeviceConfig::to_value).collect();
        let services: Vec<Value> = self.services.iter().map(ServiceConfig::to_value).collect();
        json!({
            "apod": { "devices": devices },
            "infrastructure": { "services": services },
        })
    }
}

/// A declaration as written by the user, without bookkeeping fields
fn declared(config: &DeviceConfig) -> DeviceConfig {
    let mut copy = config.clone();
    copy.section = None;
    copy
}
