//! `landscaper check` command implementation.
//!
//! Runs every activation stage and summarizes the result.

use landscaper_core::error::LandscapeResult;
use landscaper_core::types::ActivationParams;
use landscaper_engine::Filters;

use super::CommandContext;

pub async fn execute(allow_missing: bool, allow_unknown: bool, ctx: &CommandContext) -> LandscapeResult<()> {
    let params = ActivationParams {
        allow_missing_devices: allow_missing,
        allow_missing_services: allow_missing,
        allow_unknown_devices: allow_unknown,
        allow_unknown_services: allow_unknown,
        ..ActivationParams::default()
    };

    ctx.output.step("*", "Activating landscape");
    let landscape = ctx.landscape(&params, true).await?;

    let devices = landscape.get_devices(&Filters::new());
    let services = landscape.get_services(&Filters::new());
    let clusters = landscape.get_clusters(&Filters::new());
    let groups = landscape.integration().device_groups();

    ctx.output.info(&format!("Devices:  {}", devices.len()));
    ctx.output.info(&format!("Services: {}", services.len()));
    ctx.output.info(&format!("Groups:   {}", groups.len()));
    ctx.output.info(&format!("Clusters: {}", clusters.len()));

    if let Some(power) = landscape.integration().power_interfaces() {
        ctx.output.info(&format!("Power interfaces: {}", power.names().join(", ")));
    }

    for report in landscape.operational().connectivity_reports() {
        if !report.is_success() {
            ctx.output.warn(&format!("Unreachable: {}", report.summary()));
        }
    }

    for path in landscape.configuration().recorded_files() {
        ctx.output.info(&format!("Recorded {}", path.display()));
    }

    ctx.output.success("Landscape is operational");
    Ok(())
}
