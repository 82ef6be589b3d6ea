//! Listing commands: `devices`, `services` and `clusters`.

use landscaper_core::error::LandscapeResult;
use landscaper_engine::{
    Filters, IncludeDeviceByDeviceType, IncludeDeviceByGroup, IncludeDeviceByName, IncludeDeviceByRole,
    IncludeServiceByName, LandscapeDevice,
};

use super::{inspection_params, CommandContext};

/// Device selection given on the command line; every given field must match
#[derive(Debug, Clone, Default)]
pub struct DeviceSelection {
    pub device_type: Option<String>,
    pub role: Option<String>,
    pub group: Option<String>,
    pub name: Option<String>,
}

impl DeviceSelection {
    /// Whether a device satisfies every given criterion
    pub fn matches(&self, device: &LandscapeDevice) -> bool {
        fn check(wanted: &Option<String>, actual: Option<&str>) -> bool {
            wanted.as_deref().map_or(true, |w| actual == Some(w))
        }

        check(&self.device_type, Some(device.device_type()))
            && check(&self.role, device.role())
            && check(&self.group, Some(device.group()))
            && check(&self.name, device.name())
    }

    /// The first criterion as an include filter, the rest are applied with [`matches`](Self::matches)
    pub fn filters(&self) -> Filters<LandscapeDevice> {
        let filters = Filters::new();
        if let Some(device_type) = &self.device_type {
            filters.include(IncludeDeviceByDeviceType::new(device_type.clone()))
        } else if let Some(role) = &self.role {
            filters.include(IncludeDeviceByRole::new(role.clone()))
        } else if let Some(group) = &self.group {
            filters.include(IncludeDeviceByGroup::new(group.clone()))
        } else if let Some(name) = &self.name {
            filters.include(IncludeDeviceByName::new(name.clone()))
        } else {
            filters
        }
    }
}

pub async fn devices(selection: &DeviceSelection, ctx: &CommandContext) -> LandscapeResult<()> {
    let landscape = ctx.landscape(&inspection_params(), false).await?;

    let devices: Vec<_> = landscape
        .get_devices(&selection.filters())
        .into_iter()
        .filter(|device| selection.matches(device))
        .collect();

    if devices.is_empty() {
        ctx.output.warn("No devices match");
        return Ok(());
    }

    for device in devices {
        ctx.output.step(
            "-",
            &format!(
                "{}  type={} role={} group={} host={}",
                device.identity(),
                device.device_type(),
                device.role().unwrap_or("-"),
                if device.group().is_empty() { "-" } else { device.group() },
                device.host().unwrap_or("-"),
            ),
        );
    }
    Ok(())
}

pub async fn services(name: Option<String>, ctx: &CommandContext) -> LandscapeResult<()> {
    let landscape = ctx.landscape(&inspection_params(), false).await?;

    let filters = match name {
        Some(name) => Filters::new().include(IncludeServiceByName::new(name)),
        None => Filters::new(),
    };
    let services = landscape.get_services(&filters);

    if services.is_empty() {
        ctx.output.warn("No services match");
        return Ok(());
    }

    for service in services {
        ctx.output.step(
            "-",
            &format!(
                "{}  type={} host={}",
                service.identity(),
                service.service_type(),
                service.host().unwrap_or("-"),
            ),
        );
    }
    Ok(())
}

pub async fn clusters(ctx: &CommandContext) -> LandscapeResult<()> {
    let landscape = ctx.landscape(&inspection_params(), false).await?;
    let clusters = landscape.get_clusters(&Filters::new());

    if clusters.is_empty() {
        ctx.output.warn("No clusters declared");
        return Ok(());
    }

    for cluster in clusters {
        ctx.output.step("-", &format!("{}  group={}", cluster.name(), cluster.group().label()));
        let nodes: Vec<&str> = cluster.nodes().keys().map(String::as_str).collect();
        ctx.output.info(&format!("    nodes:  {}", nodes.join(", ")));
        if !cluster.spares().is_empty() {
            let spares: Vec<&str> = cluster.spares().keys().map(String::as_str).collect();
            ctx.output.info(&format!("    spares: {}", spares.join(", ")));
        }
    }
    Ok(())
}
