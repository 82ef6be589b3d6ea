//! Coordinator for cluster nodes

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, info};

use landscaper_config::DeviceConfig;
use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::types::{ActivationParams, FriendlyIdentifier};

use super::{
    connect_children, device_targets, missing_field_error, missing_ssh_error, check_targets,
    ConnectivityReport, ContextFactory, Coordinator, CoordinatorState,
};
use crate::agents::CONNECTIVITY_COMMAND;
use crate::cluster::LandscapeDeviceCluster;
use crate::credentials::CredentialManager;
use crate::device::LandscapeDevice;
use crate::extension::ExtendedTarget;
use crate::group::LandscapeDeviceGroup;

/// Creates and manages `cluster/node` devices and the clusters they form
///
/// Nodes are identified by their `name`.
pub struct NodeCoordinator {
    state: CoordinatorState,
    must_include_ssh: bool,
}

impl NodeCoordinator {
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
}

fn select_members(
    cluster: &str,
    role: &str,
    names: &[String],
    group: &LandscapeDeviceGroup,
) -> LandscapeResult<IndexMap<String, Arc<LandscapeDevice>>> {
    let mut members = IndexMap::new();
    for name in names {
        let device = group.find_by_name(name).ok_or_else(|| {
            LandscapeError::configuration(format!(
                "Cluster '{}' declares {} '{}' which is not a member of group '{}'.",
                cluster,
                role,
                name,
                group.label()
            ))
        })?;
        members.insert(name.clone(), device);
    }
    Ok(members)
}

#[async_trait]
impl Coordinator for NodeCoordinator {
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
        let name = config
            .name
            .clone()
            .ok_or_else(|| missing_field_error("NodeCoordinator", "name", &config.to_value()))?;
        let host = config
            .host
            .clone()
            .ok_or_else(|| missing_field_error("NodeCoordinator", "host", &config.to_value()))?;

        let fid = FriendlyIdentifier::new(host, name);
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
                return Err(missing_ssh_error("NodeCoordinator", "node", reason));
            }
            Err(reason) => debug!("No ssh extension for {}: {}", device.identity(), reason),
        }

        self.state.add_child(device.clone());
        Ok((fid, device))
    }

    fn create_cluster_for_devices(
        &self,
        name: &str,
        group: &Arc<LandscapeDeviceGroup>,
        nodes: &[String],
        spares: &[String],
    ) -> LandscapeResult<LandscapeDeviceCluster> {
        let node_table = select_members(name, "node", nodes, group)?;
        let spare_table = select_members(name, "spare", spares, group)?;

        info!(
            "Created cluster '{}' with {} nodes and {} spares from group '{}'",
            name,
            node_table.len(),
            spare_table.len(),
            group.label()
        );

        Ok(LandscapeDeviceCluster::new(name, node_table, spare_table, group.clone()))
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
    use crate::credentials::tests::manager;
    use crate::device::tests::device_config;

    fn node(coord: &NodeCoordinator, name: &str, host: &str) -> Arc<LandscapeDevice> {
        let mut config = device_config("cluster/node", name, host);
        config.group = Some("cluster/primary".to_string());
        coord.create_landscape_device(&config, &manager()).unwrap().1
    }

    #[test]
    fn test_nodes_identified_by_name() {
        let coord = NodeCoordinator::new("apod:*:deviceType:cluster/node", false, false, None);
        let device = node(&coord, "node-green", "10.2.0.1");
        assert_eq!(device.identity(), "node-green");
        assert_eq!(device.full_identifier(), "10.2.0.1");
        assert_eq!(device.group(), "cluster/primary");
    }

    #[test]
    fn test_name_required() {
        let coord = NodeCoordinator::new("key", false, false, None);
        let mut config = DeviceConfig::new("cluster/node");
        config.host = Some("10.2.0.9".to_string());
        let err = coord.create_landscape_device(&config, &manager()).unwrap_err();
        match err {
            LandscapeError::Configuration { message } => assert!(message.contains("'name'")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_create_cluster() {
        let coord = NodeCoordinator::new("key", false, false, None);
        let items = vec![
            node(&coord, "node-green", "10.2.0.1"),
            node(&coord, "node-orange", "10.2.0.2"),
            node(&coord, "node-yellow", "10.2.0.3"),
        ];
        let group = Arc::new(LandscapeDeviceGroup::new("cluster/primary", items).unwrap());

        let cluster = coord
            .create_cluster_for_devices(
                "primary",
                &group,
                &["node-green".to_string(), "node-orange".to_string()],
                &["node-yellow".to_string()],
            )
            .unwrap();

        assert_eq!(cluster.name(), "primary");
        assert_eq!(cluster.nodes().keys().collect::<Vec<_>>(), vec!["node-green", "node-orange"]);
        assert_eq!(cluster.spares().len(), 1);
        assert_eq!(cluster.group().label(), "cluster/primary");
    }

    #[test]
    fn test_create_cluster_unknown_node() {
        let coord = NodeCoordinator::new("key", false, false, None);
        let items = vec![node(&coord, "node-green", "10.2.0.1")];
        let group = Arc::new(LandscapeDeviceGroup::new("cluster/primary", items).unwrap());

        let err = coord
            .create_cluster_for_devices("primary", &group, &["node-red".to_string()], &[])
            .unwrap_err();
        match err {
            LandscapeError::Configuration { message } => assert!(message.contains("node-red")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
