//! Include and exclude filters
//!
//! Selection keeps input order. Without include filters every item is a
//! candidate, otherwise an item is a candidate when any include filter
//! accepts it. A candidate is dropped when any exclude filter rejects it.

use std::borrow::Borrow;

use landscaper_config::DeviceConfig;

use crate::cluster::LandscapeDeviceCluster;
use crate::device::LandscapeDevice;
use crate::service::LandscapeService;

pub trait IncludeFilter<T>: Send + Sync {
    fn should_include(&self, item: &T) -> bool;
}

pub trait ExcludeFilter<T>: Send + Sync {
    fn should_exclude(&self, item: &T) -> bool;
}

/// Select `items` using include and exclude filters
pub fn select<T, D: Borrow<T>>(
    items: Vec<D>,
    includes: &[Box<dyn IncludeFilter<T>>],
    excludes: &[Box<dyn ExcludeFilter<T>>],
) -> Vec<D> {
    items
        .into_iter()
        .filter(|item| {
            let item = item.borrow();
            let included = includes.is_empty() || includes.iter().any(|f| f.should_include(item));
            included && !excludes.iter().any(|f| f.should_exclude(item))
        })
        .collect()
}

/// A set of include and exclude filters for one item type
pub struct Filters<T> {
    include: Vec<Box<dyn IncludeFilter<T>>>,
    exclude: Vec<Box<dyn ExcludeFilter<T>>>,
}

impl<T> Default for Filters<T> {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl<T> Filters<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, filter: impl IncludeFilter<T> + 'static) -> Self {
        self.include.push(Box::new(filter));
        self
    }

    pub fn exclude(mut self, filter: impl ExcludeFilter<T> + 'static) -> Self {
        self.exclude.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn apply<D: Borrow<T>>(&self, items: Vec<D>) -> Vec<D> {
        select(items, &self.include, &self.exclude)
    }
}

pub struct IncludeDeviceByDeviceType {
    device_type: String,
}

impl IncludeDeviceByDeviceType {
    pub fn new(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
        }
    }
}

impl IncludeFilter<LandscapeDevice> for IncludeDeviceByDeviceType {
    fn should_include(&self, item: &LandscapeDevice) -> bool {
        item.device_type() == self.device_type
    }
}

pub struct IncludeDeviceByDeviceTypeAndRole {
    device_type: String,
    role: String,
}

impl IncludeDeviceByDeviceTypeAndRole {
    pub fn new(device_type: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            role: role.into(),
        }
    }
}

impl IncludeFilter<LandscapeDevice> for IncludeDeviceByDeviceTypeAndRole {
    fn should_include(&self, item: &LandscapeDevice) -> bool {
        item.device_type() == self.device_type && item.role() == Some(self.role.as_str())
    }
}

pub struct IncludeDeviceByGroup {
    group: String,
}

impl IncludeDeviceByGroup {
    pub fn new(group: impl Into<String>) -> Self {
        Self { group: group.into() }
    }
}

impl IncludeFilter<LandscapeDevice> for IncludeDeviceByGroup {
    fn should_include(&self, item: &LandscapeDevice) -> bool {
        item.group() == self.group
    }
}

pub struct IncludeDeviceByName {
    name: String,
}

impl IncludeDeviceByName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl IncludeFilter<LandscapeDevice> for IncludeDeviceByName {
    fn should_include(&self, item: &LandscapeDevice) -> bool {
        item.name() == Some(self.name.as_str())
    }
}

pub struct IncludeDeviceByRole {
    role: String,
}

impl IncludeDeviceByRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

impl IncludeFilter<LandscapeDevice> for IncludeDeviceByRole {
    fn should_include(&self, item: &LandscapeDevice) -> bool {
        item.role() == Some(self.role.as_str())
    }
}

pub struct IncludeDeviceConfigByDeviceType {
    device_type: String,
}

impl IncludeDeviceConfigByDeviceType {
    pub fn new(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
        }
    }
}

impl IncludeFilter<DeviceConfig> for IncludeDeviceConfigByDeviceType {
    fn should_include(&self, item: &DeviceConfig) -> bool {
        item.device_type == self.device_type
    }
}

pub struct IncludeServiceByName {
    name: String,
}

impl IncludeServiceByName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl IncludeFilter<LandscapeService> for IncludeServiceByName {
    fn should_include(&self, item: &LandscapeService) -> bool {
        item.name() == Some(self.name.as_str())
    }
}

pub struct IncludeServiceByType {
    service_type: String,
}

impl IncludeServiceByType {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
        }
    }
}

impl IncludeFilter<LandscapeService> for IncludeServiceByType {
    fn should_include(&self, item: &LandscapeService) -> bool {
        item.service_type() == self.service_type
    }
}

pub struct IncludeClusterByName {
    name: String,
}

impl IncludeClusterByName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl IncludeFilter<LandscapeDeviceCluster> for IncludeClusterByName {
    fn should_include(&self, item: &LandscapeDeviceCluster) -> bool {
        item.name() == self.name
    }
}

pub struct ExcludeDeviceByName {
    name: String,
}

impl ExcludeDeviceByName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ExcludeFilter<LandscapeDevice> for ExcludeDeviceByName {
    fn should_exclude(&self, item: &LandscapeDevice) -> bool {
        item.name() == Some(self.name.as_str())
    }
}

pub struct ExcludeDeviceByRole {
    role: String,
}

impl ExcludeDeviceByRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

impl ExcludeFilter<LandscapeDevice> for ExcludeDeviceByRole {
    fn should_exclude(&self, item: &LandscapeDevice) -> bool {
        item.role() == Some(self.role.as_str())
    }
}

pub struct ExcludeDeviceByGroup {
    group: String,
}

impl ExcludeDeviceByGroup {
    pub fn new(group: impl Into<String>) -> Self {
        Self { group: group.into() }
    }
}

impl ExcludeFilter<LandscapeDevice> for ExcludeDeviceByGroup {
    fn should_exclude(&self, item: &LandscapeDevice) -> bool {
        item.group() == self.group
    }
}

pub struct ExcludeServiceByName {
    name: String,
}

impl ExcludeServiceByName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ExcludeFilter<LandscapeService> for ExcludeServiceByName {
    fn should_exclude(&self, item: &LandscapeService) -> bool {
        item.name() == Some(self.name.as_str())
    }
}
