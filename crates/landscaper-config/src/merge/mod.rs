//! Configuration layering, deep merging and environment overrides

use std::collections::HashMap;

use camino::Utf8PathBuf;
use serde_json::Value;

use landscaper_core::error::LandscapeError;

use crate::ConfigResult;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "LANDSCAPER_";

pub const ENV_LANDSCAPE_FILE: &str = "LANDSCAPER_LANDSCAPE_FILE";
pub const ENV_TOPOLOGY_FILE: &str = "LANDSCAPER_TOPOLOGY_FILE";
pub const ENV_CREDENTIALS_FILE: &str = "LANDSCAPER_CREDENTIALS_FILE";
pub const ENV_OUTPUT_DIRECTORY: &str = "LANDSCAPER_OUTPUT_DIRECTORY";
pub const ENV_LOG_CONFIGURATION: &str = "LANDSCAPER_LOG_CONFIGURATION";

/// Values that take precedence over discovered configuration files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    /// Landscape files, layered in order
    pub landscape_files: Vec<Utf8PathBuf>,
    /// Topology files, layered in order
    pub topology_files: Vec<Utf8PathBuf>,
    /// Credentials files, layered in order
    pub credentials_files: Vec<Utf8PathBuf>,
    pub output_directory: Option<String>,
    pub log_configuration: Option<bool>,
}

impl ConfigOverrides {
    /// Combine two override sets, `self` wins wherever it has a value
    pub fn or(self, fallback: ConfigOverrides) -> ConfigOverrides {
        fn pick(primary: Vec<Utf8PathBuf>, fallback: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
            if primary.is_empty() {
                fallback
            } else {
                primary
            }
        }

        ConfigOverrides {
            landscape_files: pick(self.landscape_files, fallback.landscape_files),
            topology_files: pick(self.topology_files, fallback.topology_files),
            credentials_files: pick(self.credentials_files, fallback.credentials_files),
            output_directory: self.output_directory.or(fallback.output_directory),
            log_configuration: self.log_configuration.or(fallback.log_configuration),
        }
    }
}

/// Configuration layering and merging
pub struct ConfigLayering;

impl ConfigLayering {
    /// Deep merge value trees, later layers win
    pub fn merge(layers: impl IntoIterator<Item = Value>) -> Value {
        let mut merged = Value::Object(serde_json::Map::new());
        for layer in layers {
            Self::merge_into(&mut merged, layer);
        }
        merged
    }

    /// Merge `overlay` into `base`
    ///
    /// Objects are merged key by key; arrays and scalars are replaced.
    pub fn merge_into(base: &mut Value, overlay: Value) {
        match (base, overlay) {
            (Value::Object(base_map), Value::Object(overlay_map)) => {
                for (key, value) in overlay_map {
                    match base_map.get_mut(&key) {
                        Some(existing) => Self::merge_into(existing, value),
                        None => {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
            (base, overlay) => *base = overlay,
        }
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }

    /// Interpret collected environment variables as overrides
    pub fn env_overrides(vars: &HashMap<String, String>) -> ConfigResult<ConfigOverrides> {
        let mut overrides = ConfigOverrides::default();

        for (key, value) in vars {
            match key.as_str() {
                ENV_LANDSCAPE_FILE => overrides.landscape_files = split_path_list(key, value)?,
                ENV_TOPOLOGY_FILE => overrides.topology_files = split_path_list(key, value)?,
                ENV_CREDENTIALS_FILE => overrides.credentials_files = split_path_list(key, value)?,
                ENV_OUTPUT_DIRECTORY => {
                    if !value.is_empty() {
                        overrides.output_directory = Some(value.clone());
                    }
                }
                ENV_LOG_CONFIGURATION => {
                    overrides.log_configuration = Some(parse_flag(key, value)?);
                }
                _ => {
                    // Unknown environment variable, ignore
                }
            }
        }

        Ok(overrides)
    }

    /// Layer CLI overrides over environment overrides
    pub fn merge_overrides(
        env_overrides: ConfigOverrides,
        cli_overrides: ConfigOverrides,
    ) -> ConfigOverrides {
        cli_overrides.or(env_overrides)
    }
}

fn split_path_list(key: &str, value: &str) -> ConfigResult<Vec<Utf8PathBuf>> {
    std::env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| {
            Utf8PathBuf::try_from(p).map_err(|e| LandscapeError::ConfigValidation {
                field: key.to_string(),
                reason: format!("path is not valid UTF-8: {}", e),
            })
        })
        .collect()
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(LandscapeError::ConfigValidation {
            field: key.to_string(),
            reason: format!("expected a boolean value, found '{}'", other),
        }),
    }
}
