//! Device groups

use std::sync::{Arc, Weak};

use landscaper_core::error::{LandscapeError, LandscapeResult};

use crate::coordinator::Coordinator;
use crate::device::LandscapeDevice;

/// Devices that share a `group` label
///
/// The group is managed by the coordinator of its first device.
pub struct LandscapeDeviceGroup {
    label: String,
    items: Vec<Arc<LandscapeDevice>>,
    coordinator: Option<Weak<dyn Coordinator>>,
}

impl LandscapeDeviceGroup {
    pub fn new(label: impl Into<String>, items: Vec<Arc<LandscapeDevice>>) -> LandscapeResult<Self> {
        let label = label.into();
        let first = items.first().ok_or_else(|| {
            LandscapeError::semantic(format!("Device group '{}' must have at least one device.", label))
        })?;
        let coordinator = first.coordinator().map(|coord| Arc::downgrade(&coord));

        Ok(Self {
            label,
            items,
            coordinator,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn items(&self) -> &[Arc<LandscapeDevice>] {
        &self.items
    }

    pub fn coordinator(&self) -> Option<Arc<dyn Coordinator>> {
        self.coordinator.as_ref().and_then(Weak::upgrade)
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<LandscapeDevice>> {
        self.items.iter().find(|dev| dev.name() == Some(name)).cloned()
    }
}

impl std::fmt::Debug for LandscapeDeviceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandscapeDeviceGroup")
            .field("label", &self.label)
            .field("items", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::NodeCoordinator;
    use crate::credentials::tests::manager;
    use crate::device::tests::device_config;

    #[test]
    fn test_empty_group_rejected() {
        let err = LandscapeDeviceGroup::new("cluster/empty", Vec::new()).unwrap_err();
        assert!(matches!(err, LandscapeError::Semantic { .. }));
    }

    #[test]
    fn test_group_coordinator_from_first_item() {
        let coord = NodeCoordinator::new("apod:*:deviceType:cluster/node", false, false, None);
        let (_, device) = coord
            .create_landscape_device(&device_config("cluster/node", "node-a", "10.3.0.1"), &manager())
            .unwrap();

        let group = LandscapeDeviceGroup::new("cluster/a", vec![device]).unwrap();
        assert_eq!(group.label(), "cluster/a");
        assert_eq!(
            group.coordinator().unwrap().integration_key(),
            "apod:*:deviceType:cluster/node"
        );
        assert!(group.find_by_name("node-a").is_some());
        assert!(group.find_by_name("node-b").is_none());
    }
}
