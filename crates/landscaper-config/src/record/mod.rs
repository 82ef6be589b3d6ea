//! Recording of the declared configuration

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use landscaper_core::error::LandscapeError;

use crate::format::{to_json, to_yaml};
use crate::ConfigResult;

/// Write `<name>-declared.yaml` and `<name>-declared.json` into `dir`
///
/// The directory is created when missing. Returns the written paths.
pub async fn record_declared(dir: &Path, name: &str, value: &Value) -> ConfigResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| LandscapeError::io(format!("Failed to create {}", dir.display()), e))?;

    let yaml_path = dir.join(format!("{}-declared.yaml", name));
    let json_path = dir.join(format!("{}-declared.json", name));

    write_file(&yaml_path, to_yaml(value)?).await?;
    write_file(&json_path, to_json(value)?).await?;

    info!("Recorded declared {} configuration to {}", name, dir.display());
    Ok(vec![yaml_path, json_path])
}

async fn write_file(path: &Path, content: String) -> ConfigResult<()> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| LandscapeError::io(format!("Failed to write {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_declared_writes_both_formats() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("results").join("run-1");
        let value = json!({"apod": {"devices": [{"deviceType": "network/client"}]}});

        let written = record_declared(&dir, "landscape", &value).await.unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.join("landscape-declared.yaml").is_file());

        let json_text = tokio::fs::read_to_string(dir.join("landscape-declared.json"))
            .await
            .unwrap();
        assert!(json_text.contains("\n    \"apod\""));
        let reparsed: Value = serde_json::from_str(&json_text).unwrap();
        assert_eq!(reparsed, value);

        let yaml_text = tokio::fs::read_to_string(dir.join("landscape-declared.yaml"))
            .await
            .unwrap();
        let reparsed: Value = serde_yaml::from_str(&yaml_text).unwrap();
        assert_eq!(reparsed, value);
    }
}
