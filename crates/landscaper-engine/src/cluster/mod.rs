//! Device clusters

use std::sync::Arc;

use indexmap::IndexMap;

use crate::device::LandscapeDevice;
use crate::group::LandscapeDeviceGroup;

/// Nodes of a compute or storage cluster plus spares eligible to join it
#[derive(Debug)]
pub struct LandscapeDeviceCluster {
    name: String,
    nodes: IndexMap<String, Arc<LandscapeDevice>>,
    spares: IndexMap<String, Arc<LandscapeDevice>>,
    group: Arc<LandscapeDeviceGroup>,
}

impl LandscapeDeviceCluster {
    pub fn new(
        name: impl Into<String>,
        nodes: IndexMap<String, Arc<LandscapeDevice>>,
        spares: IndexMap<String, Arc<LandscapeDevice>>,
        group: Arc<LandscapeDeviceGroup>,
    ) -> Self {
        Self {
            name: name.into(),
            nodes,
            spares,
            group,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes keyed by device name
    pub fn nodes(&self) -> &IndexMap<String, Arc<LandscapeDevice>> {
        &self.nodes
    }

    /// Spares keyed by device name
    pub fn spares(&self) -> &IndexMap<String, Arc<LandscapeDevice>> {
        &self.spares
    }

    pub fn group(&self) -> &Arc<LandscapeDeviceGroup> {
        &self.group
    }
}
