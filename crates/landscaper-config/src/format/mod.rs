//! Document formats and format-independent parsing
//!
//! Every document is parsed into a `serde_json::Value` tree first so that
//! several files can be layered before the typed model is extracted.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use landscaper_core::error::LandscapeError;
use landscaper_core::utils::get_extension;

use crate::ConfigResult;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Determine the format from a file extension
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match get_extension(path).as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            other => Err(LandscapeError::ConfigParse {
                file: path.display().to_string(),
                message: format!(
                    "unsupported configuration file extension '{}'",
                    other.unwrap_or("")
                ),
            }),
        }
    }

    /// File extensions searched for, in preference order
    pub fn search_extensions() -> &'static [&'static str] {
        &["yaml", "yml", "json", "toml"]
    }
}

/// Parse document text into a generic value tree
pub fn parse_value(content: &str, format: ConfigFormat, origin: &str) -> ConfigResult<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let parsed = match format {
        ConfigFormat::Yaml => serde_yaml::from_str::<Value>(content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str::<Value>(content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str::<Value>(content).map_err(|e| e.to_string()),
    };

    let value = parsed.map_err(|message| LandscapeError::ConfigParse {
        file: origin.to_string(),
        message,
    })?;

    // A comment-only YAML document parses to null
    Ok(match value {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    })
}

/// Convert a value tree into a typed document
pub fn from_value<T: DeserializeOwned>(value: Value, origin: &str) -> ConfigResult<T> {
    serde_json::from_value(value).map_err(|e| LandscapeError::ConfigParse {
        file: origin.to_string(),
        message: e.to_string(),
    })
}

/// Render a value tree as YAML
pub fn to_yaml(value: &Value) -> ConfigResult<String> {
    serde_yaml::to_string(value).map_err(|e| LandscapeError::ConfigParse {
        file: "<yaml output>".to_string(),
        message: e.to_string(),
    })
}

/// Render a value tree as JSON indented by four spaces
pub fn to_json(value: &Value) -> ConfigResult<String> {
    use serde::Serialize;

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| LandscapeError::ConfigParse {
            file: "<json output>".to_string(),
            message: e.to_string(),
        })?;

    String::from_utf8(buffer).map_err(|e| LandscapeError::ConfigParse {
        file: "<json output>".to_string(),
        message: e.to_string(),
    })
}
