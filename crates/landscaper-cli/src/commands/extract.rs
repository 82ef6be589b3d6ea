//! `landscaper extract` command implementation.
//!
//! Writes a landscape document that declares only the selected devices,
//! cluster nodes and services.

use std::path::PathBuf;

use serde_json::Value;

use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_engine::{
    ConfigurationExtractor, Filters, IncludeClusterByName, IncludeDeviceByDeviceType, IncludeServiceByName,
};

use super::{inspection_params, CommandContext};

#[derive(Debug, Clone, Default)]
pub struct ExtractSelection {
    pub device_type: Option<String>,
    pub clusters: Vec<String>,
    pub services: Vec<String>,
}

impl ExtractSelection {
    /// Nothing selected means everything
    pub fn is_empty(&self) -> bool {
        self.device_type.is_none() && self.clusters.is_empty() && self.services.is_empty()
    }
}

pub async fn execute(selection: &ExtractSelection, out: Option<PathBuf>, ctx: &CommandContext) -> LandscapeResult<()> {
    let landscape = ctx.landscape(&inspection_params(), false).await?;
    let mut extractor = ConfigurationExtractor::new(landscape);

    if selection.is_empty() {
        extractor
            .extract_devices(&Filters::new())
            .extract_services(&Filters::new());
    } else {
        if let Some(device_type) = &selection.device_type {
            extractor.extract_devices(&Filters::new().include(IncludeDeviceByDeviceType::new(device_type.clone())));
        }
        if !selection.clusters.is_empty() {
            let filters = selection
                .clusters
                .iter()
                .fold(Filters::new(), |filters, name| filters.include(IncludeClusterByName::new(name.clone())));
            extractor.extract_clusters(&filters);
        }
        if !selection.services.is_empty() {
            let filters = selection
                .services
                .iter()
                .fold(Filters::new(), |filters, name| filters.include(IncludeServiceByName::new(name.clone())));
            extractor.extract_services(&filters);
        }
    }

    let rendered = render(&extractor.configurations())?;
    match out {
        Some(path) => {
            let path = if path.is_absolute() { path } else { ctx.cwd.join(path) };
            tokio::fs::write(&path, rendered)
                .await
                .map_err(|e| LandscapeError::io(format!("Failed to write {}", path.display()), e))?;
            ctx.output.success(&format!("Wrote {}", path.display()));
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn render(document: &Value) -> LandscapeResult<String> {
    serde_yaml::to_string(document)
        .map_err(|e| LandscapeError::configuration(format!("Failed to render the extracted landscape: {}", e)))
}
