//! Operational layer
//!
//! Activates coordinators, verifies connectivity and builds the clusters the
//! topology declares. Devices and clusters are then handed out through
//! checkout and checkin; a resource is either available or outstanding.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::types::ActivationParams;

use crate::cluster::LandscapeDeviceCluster;
use crate::coordinator::{ConnectivityReport, Coordinator};
use crate::device::LandscapeDevice;
use crate::filters::Filters;
use crate::landscape::Landscape;

use super::configuration::TOPOLOGY_FAILURES_TITLE;

pub const CONNECTIVITY_FAILURES_TITLE: &str = "ERROR Connectivity failures";
pub const FEATURE_FAILURES_TITLE: &str = "ERROR Feature validation failures";

#[derive(Default)]
struct OperationalState {
    clusters: IndexMap<String, Arc<LandscapeDeviceCluster>>,
    clusters_pool: IndexMap<String, Arc<LandscapeDeviceCluster>>,
    clusters_outstanding: IndexMap<String, Arc<LandscapeDeviceCluster>>,
    device_pool: IndexMap<String, Arc<LandscapeDevice>>,
    device_outstanding: IndexMap<String, Arc<LandscapeDevice>>,
    connectivity: Vec<ConnectivityReport>,
}

/// Clusters and the checkout pools
#[derive(Default)]
pub struct OperationalLayer {
    state: Mutex<OperationalState>,
}

impl OperationalLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let every coordinator enhance the resources it created
    pub fn activate_coordinators(&self, landscape: &Landscape, params: &ActivationParams) -> LandscapeResult<()> {
        let integration = landscape.integration();
        for coordinator in integration.coordinators_for_devices().values() {
            coordinator.activate(params)?;
        }
        for coordinator in integration.coordinators_for_services().values() {
            coordinator.activate(params)?;
        }
        Ok(())
    }

    /// Verify connectivity with every device and service that can be reached
    pub async fn establish_connectivity(
        &self,
        landscape: &Landscape,
        params: &ActivationParams,
    ) -> LandscapeResult<Vec<ConnectivityReport>> {
        let integration = landscape.integration();
        let device_coordinators: Vec<Arc<dyn Coordinator>> =
            integration.coordinators_for_devices().into_values().collect();
        let service_coordinators: Vec<Arc<dyn Coordinator>> =
            integration.coordinators_for_services().into_values().collect();

        let mut reports = Vec::new();
        let mut failures = Vec::new();

        for coordinator in device_coordinators {
            let found = coordinator.establish_connectivity(params).await?;
            if !params.allow_missing_devices {
                failures.extend(found.iter().filter(|r| !r.is_success()).map(|r| format!("    {}", r.summary())));
            }
            reports.extend(found);
        }
        for coordinator in service_coordinators {
            let found = coordinator.establish_connectivity(params).await?;
            if !params.allow_missing_services {
                failures.extend(found.iter().filter(|r| !r.is_success()).map(|r| format!("    {}", r.summary())));
            }
            reports.extend(found);
        }

        for report in reports.iter().filter(|r| !r.is_success()) {
            warn!("Unable to reach {}", report.summary());
        }
        info!(
            "Connectivity verified with {} of {} resources",
            reports.iter().filter(|r| r.is_success()).count(),
            reports.len()
        );

        self.state.lock().connectivity = reports.clone();

        if !failures.is_empty() {
            return Err(LandscapeError::ConfigurationReport {
                title: CONNECTIVITY_FAILURES_TITLE.to_string(),
                failures,
            });
        }
        Ok(reports)
    }

    /// Reports from the last connectivity check
    pub fn connectivity_reports(&self) -> Vec<ConnectivityReport> {
        self.state.lock().connectivity.clone()
    }

    /// Build the declared clusters and fill the checkout pools
    pub fn overlay_topology(&self, landscape: &Landscape, _params: &ActivationParams) -> LandscapeResult<()> {
        let integration = landscape.integration();
        let mut clusters = IndexMap::new();

        if let Some(topology) = landscape.configuration().topology_info() {
            for spec in &topology.clusters {
                let Some(group) = integration.device_group(&spec.group) else {
                    warn!(
                        "Cluster '{}' references device group '{}' which has no devices.",
                        spec.name, spec.group
                    );
                    continue;
                };

                let coordinator = group.coordinator().ok_or_else(|| {
                    LandscapeError::semantic(format!(
                        "Device group '{}' has no coordinator to build cluster '{}'.",
                        spec.group, spec.name
                    ))
                })?;

                let cluster = coordinator.create_cluster_for_devices(&spec.name, &group, &spec.nodes, &spec.spares)?;
                debug!("Created cluster '{}' with {} nodes", spec.name, cluster.nodes().len());
                clusters.insert(spec.name.clone(), Arc::new(cluster));
            }
        }

        let devices = integration.get_devices(&Filters::new());

        let mut state = self.state.lock();
        state.device_pool = devices.into_iter().map(|d| (d.identity(), d)).collect();
        state.device_outstanding.clear();
        state.clusters_pool = clusters.clone();
        state.clusters_outstanding.clear();
        state.clusters = clusters;
        Ok(())
    }

    /// Check that the power and serial interfaces devices refer to exist
    pub fn validate_features(&self, landscape: &Landscape, params: &ActivationParams) -> LandscapeResult<()> {
        if !params.validate_features {
            return Ok(());
        }

        let integration = landscape.integration();
        let power = integration.power_interfaces();
        let mut failures = Vec::new();

        for device in integration.get_devices(&Filters::new()) {
            if let Some(feature) = device.features().get("power") {
                match feature_name(feature) {
                    Some(name) if power.as_ref().map(|p| p.is_declared(name)).unwrap_or(false) => {}
                    Some(name) => failures.push(format!(
                        "    {}: power interface '{}' is not declared",
                        device.identity(),
                        name
                    )),
                    None => failures.push(format!("    {}: power feature has no interface name", device.identity())),
                }
            }
            if let Some(feature) = device.features().get("serial") {
                match feature_name(feature) {
                    Some(name) if integration.is_serial_interface_declared(name) => {}
                    Some(name) => failures.push(format!(
                        "    {}: serial interface '{}' is not declared",
                        device.identity(),
                        name
                    )),
                    None => failures.push(format!("    {}: serial feature has no interface name", device.identity())),
                }
            }
        }

        if !failures.is_empty() {
            return Err(LandscapeError::ConfigurationReport {
                title: FEATURE_FAILURES_TITLE.to_string(),
                failures,
            });
        }
        Ok(())
    }

    /// Check that every declared cluster was built
    pub fn validate_topology(&self, landscape: &Landscape, params: &ActivationParams) -> LandscapeResult<()> {
        if !params.validate_topology {
            return Ok(());
        }
        let Some(topology) = landscape.configuration().topology_info() else {
            return Ok(());
        };

        let state = self.state.lock();
        let failures: Vec<String> = topology
            .clusters
            .iter()
            .filter(|spec| !state.clusters.contains_key(&spec.name))
            .map(|spec| {
                format!(
                    "    clusters/{}: no devices were integrated for group '{}'",
                    spec.name, spec.group
                )
            })
            .collect();

        if !failures.is_empty() {
            return Err(LandscapeError::ConfigurationReport {
                title: TOPOLOGY_FAILURES_TITLE.to_string(),
                failures,
            });
        }
        Ok(())
    }

    pub fn checkout_device(&self, device: &Arc<LandscapeDevice>) -> LandscapeResult<()> {
        let identity = device.identity();
        let mut state = self.state.lock();

        let Some(device) = state.device_pool.shift_remove(&identity) else {
            return Err(LandscapeError::Checkout {
                message: format!("The specified device '{}' is not available for checkout.", identity),
            });
        };
        state.device_outstanding.insert(identity, device);
        Ok(())
    }

    pub fn checkin_device(&self, device: &Arc<LandscapeDevice>) -> LandscapeResult<()> {
        let identity = device.identity();
        let mut state = self.state.lock();

        if let Some(cname) = holding_cluster(&state, &identity) {
            return Err(LandscapeError::Checkin {
                message: format!(
                    "Device '{}' is a node of the checked out cluster '{}' and is returned with the cluster.",
                    identity, cname
                ),
            });
        }

        let Some(device) = state.device_outstanding.shift_remove(&identity) else {
            return Err(LandscapeError::Checkin {
                message: pool_listing(
                    format!("Checkin of device '{}' that was not previously checked out.", identity),
                    state.device_pool.keys(),
                    state.device_outstanding.keys(),
                ),
            });
        };
        state.device_pool.insert(identity, device);
        Ok(())
    }

    /// Check out a cluster together with all of its nodes
    pub fn checkout_cluster(&self, cluster: &LandscapeDeviceCluster) -> LandscapeResult<()> {
        let cname = cluster.name();
        let mut state = self.state.lock();

        if !state.clusters.contains_key(cname) {
            let mut lines = vec![format!("The cluster named '{}' does not exist.", cname), "EXISTING:".to_string()];
            lines.extend(state.clusters.keys().map(|name| format!("    {}", name)));
            return Err(LandscapeError::Checkout {
                message: lines.join("\n"),
            });
        }

        if !state.clusters_pool.contains_key(cname) {
            let message = if state.clusters_outstanding.contains_key(cname) {
                format!("The specified cluster '{}' has already been checked out of the pool.", cname)
            } else {
                format!(
                    "The specified cluster '{}' was not found in the pool or outstanding clusters.",
                    cname
                )
            };
            return Err(LandscapeError::Checkout { message });
        }

        let unavailable: Vec<String> = cluster
            .nodes()
            .iter()
            .filter(|(_, node)| !state.device_pool.contains_key(&node.identity()))
            .map(|(name, _)| format!("    {}", name))
            .collect();
        if !unavailable.is_empty() {
            let mut lines = vec![
                format!("Not all of the nodes are available for cluster '{}'.", cname),
                "UNAVAILABLE NODES:".to_string(),
            ];
            lines.extend(unavailable);
            return Err(LandscapeError::Checkout {
                message: lines.join("\n"),
            });
        }

        for node in cluster.nodes().values() {
            let identity = node.identity();
            if let Some(device) = state.device_pool.shift_remove(&identity) {
                state.device_outstanding.insert(identity, device);
            }
        }
        if let Some(entry) = state.clusters_pool.shift_remove(cname) {
            state.clusters_outstanding.insert(cname.to_string(), entry);
        }
        Ok(())
    }

    /// Return a cluster and its nodes to the available pools
    pub fn checkin_cluster(&self, cluster: &LandscapeDeviceCluster) -> LandscapeResult<()> {
        let cname = cluster.name();
        let mut state = self.state.lock();

        if !state.clusters_outstanding.contains_key(cname) {
            return Err(LandscapeError::Checkin {
                message: pool_listing(
                    format!("Checkin of cluster '{}' that was not previously checked out.", cname),
                    state.clusters_pool.keys(),
                    state.clusters_outstanding.keys(),
                ),
            });
        }

        let missing: Vec<String> = cluster
            .nodes()
            .iter()
            .filter(|(_, node)| !state.device_outstanding.contains_key(&node.identity()))
            .map(|(name, _)| format!("    {}", name))
            .collect();
        if !missing.is_empty() {
            let mut lines = vec![
                format!("Not all of the nodes of cluster '{}' are checked out.", cname),
                "MISSING NODES:".to_string(),
            ];
            lines.extend(missing);
            return Err(LandscapeError::Checkin {
                message: lines.join("\n"),
            });
        }

        for node in cluster.nodes().values() {
            let identity = node.identity();
            if let Some(device) = state.device_outstanding.shift_remove(&identity) {
                state.device_pool.insert(identity, device);
            }
        }
        if let Some(entry) = state.clusters_outstanding.shift_remove(cname) {
            state.clusters_pool.insert(cname.to_string(), entry);
        }
        Ok(())
    }

    pub fn get_cluster_by_name(&self, name: &str) -> Option<Arc<LandscapeDeviceCluster>> {
        self.state.lock().clusters.get(name).cloned()
    }

    pub fn get_clusters(&self, filters: &Filters<LandscapeDeviceCluster>) -> Vec<Arc<LandscapeDeviceCluster>> {
        let candidates: Vec<_> = self.state.lock().clusters.values().cloned().collect();
        filters.apply(candidates)
    }

    pub fn available_devices(&self) -> IndexMap<String, Arc<LandscapeDevice>> {
        self.state.lock().device_pool.clone()
    }

    pub fn outstanding_devices(&self) -> IndexMap<String, Arc<LandscapeDevice>> {
        self.state.lock().device_outstanding.clone()
    }

    pub fn available_clusters(&self) -> IndexMap<String, Arc<LandscapeDeviceCluster>> {
        self.state.lock().clusters_pool.clone()
    }

    pub fn operational_clusters(&self) -> IndexMap<String, Arc<LandscapeDeviceCluster>> {
        self.state.lock().clusters.clone()
    }
}

/// Name of the checked out cluster that holds the device as a node
fn holding_cluster(state: &OperationalState, identity: &str) -> Option<String> {
    state
        .clusters_outstanding
        .values()
        .find(|cluster| cluster.nodes().values().any(|node| node.identity() == identity))
        .map(|cluster| cluster.name().to_string())
}

/// The interface name of a `power` or `serial` feature
fn feature_name(feature: &Value) -> Option<&str> {
    match feature {
        Value::String(name) => Some(name.as_str()),
        Value::Object(map) => map.get("name").and_then(Value::as_str),
        _ => None,
    }
}

fn pool_listing<'a>(
    headline: String,
    available: impl Iterator<Item = &'a String>,
    outstanding: impl Iterator<Item = &'a String>,
) -> String {
    let mut available: Vec<&String> = available.collect();
    available.sort();
    let mut outstanding: Vec<&String> = outstanding.collect();
    outstanding.sort();

    let mut lines = vec![headline, "AVAILABLE POOL:".to_string()];
    lines.extend(available.into_iter().map(|id| format!("    {}", id)));
    lines.push("OUTSTANDING POOL:".to_string());
    lines.extend(outstanding.into_iter().map(|id| format!("    {}", id)));
    lines.join("\n")
}
