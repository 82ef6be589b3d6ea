//! Configuration file discovery and loading

use std::collections::HashMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use landscaper_core::error::LandscapeError;

use crate::documents::{CredentialsConfig, LandscapeConfig, RuntimeSettings, TopologyConfig};
use crate::format::{from_value, parse_value, ConfigFormat};
use crate::merge::{ConfigLayering, ConfigOverrides};
use crate::ConfigResult;

/// Name of the per-user configuration directory under the home directory
pub const GLOBAL_CONFIG_DIR: &str = ".landscaper";

/// The kinds of documents the loader looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Landscape,
    Topology,
    Credentials,
    Runtime,
}

impl DocumentKind {
    /// File stem searched for during discovery
    pub fn stem(&self) -> &'static str {
        match self {
            DocumentKind::Landscape => "landscape",
            DocumentKind::Topology => "topology",
            DocumentKind::Credentials => "credentials",
            DocumentKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Where a document was loaded from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Path given on the command line
    CommandLine(Utf8PathBuf),
    /// Path taken from an environment variable
    Environment { variable: String, path: Utf8PathBuf },
    /// Found walking up from the working directory
    Project(Utf8PathBuf),
    /// Found in the per-user configuration directory
    Global(Utf8PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Utf8Path {
        match self {
            ConfigSource::CommandLine(path)
            | ConfigSource::Environment { path, .. }
            | ConfigSource::Project(path)
            | ConfigSource::Global(path) => path,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CommandLine(path) => write!(f, "{} (command line)", path),
            ConfigSource::Environment { variable, path } => write!(f, "{} (${})", path, variable),
            ConfigSource::Project(path) => write!(f, "{}", path),
            ConfigSource::Global(path) => write!(f, "{} (global)", path),
        }
    }
}

/// Everything the loader found
#[derive(Debug, Clone, Default)]
pub struct LoadedConfiguration {
    pub landscape: Option<LandscapeConfig>,
    pub topology: Option<TopologyConfig>,
    pub credentials: Option<CredentialsConfig>,
    pub runtime: RuntimeSettings,
    pub sources: Vec<(DocumentKind, ConfigSource)>,
}

impl LoadedConfiguration {
    /// Sources that contributed to a document
    pub fn sources_for(&self, kind: DocumentKind) -> Vec<&ConfigSource> {
        self.sources
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, source)| source)
            .collect()
    }
}

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Per-user configuration directory
    global_dir: Option<Utf8PathBuf>,
    /// Overrides given on the command line
    cli_overrides: ConfigOverrides,
    /// `LANDSCAPER_*` environment variables
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a loader rooted at `cwd` that honors the process environment
    pub fn new(cwd: Utf8PathBuf) -> Self {
        let global_dir = dirs::home_dir()
            .and_then(|home| Utf8PathBuf::try_from(home).ok())
            .map(|home| home.join(GLOBAL_CONFIG_DIR));

        Self {
            cwd,
            global_dir,
            cli_overrides: ConfigOverrides::default(),
            env_vars: ConfigLayering::collect_env_overrides(),
        }
    }

    pub fn with_cli_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.cli_overrides = overrides;
        self
    }

    pub fn with_env(mut self, env_vars: HashMap<String, String>) -> Self {
        self.env_vars = env_vars;
        self
    }

    pub fn with_global_dir(mut self, dir: Option<Utf8PathBuf>) -> Self {
        self.global_dir = dir;
        self
    }

    /// Find a document by stem, walking up the directory tree and then
    /// falling back to the per-user directory
    pub fn resolve_config_path(&self, stem: &str) -> Option<ConfigSource> {
        let mut current = Some(self.cwd.as_path());

        while let Some(dir) = current {
            if let Some(path) = find_with_extensions(dir, stem) {
                return Some(ConfigSource::Project(path));
            }
            current = dir.parent();
        }

        self.global_dir
            .as_deref()
            .and_then(|dir| find_with_extensions(dir, stem))
            .map(ConfigSource::Global)
    }

    /// Load all documents
    pub async fn load(&self) -> ConfigResult<LoadedConfiguration> {
        let env_overrides = ConfigLayering::env_overrides(&self.env_vars)?;
        let mut loaded = LoadedConfiguration::default();

        let sources = self.sources_for(
            DocumentKind::Landscape,
            &self.cli_overrides.landscape_files,
            &env_overrides.landscape_files,
            crate::merge::ENV_LANDSCAPE_FILE,
        );
        loaded.landscape = self
            .load_document(DocumentKind::Landscape, sources, &mut loaded.sources)
            .await?;

        let sources = self.sources_for(
            DocumentKind::Topology,
            &self.cli_overrides.topology_files,
            &env_overrides.topology_files,
            crate::merge::ENV_TOPOLOGY_FILE,
        );
        loaded.topology = self
            .load_document(DocumentKind::Topology, sources, &mut loaded.sources)
            .await?;

        let sources = self.sources_for(
            DocumentKind::Credentials,
            &self.cli_overrides.credentials_files,
            &env_overrides.credentials_files,
            crate::merge::ENV_CREDENTIALS_FILE,
        );
        let credentials: Option<CredentialsConfig> = self
            .load_document(DocumentKind::Credentials, sources, &mut loaded.sources)
            .await?;
        if let Some(credentials) = &credentials {
            credentials.validate()?;
        }
        loaded.credentials = credentials;

        let sources = self.sources_for(DocumentKind::Runtime, &[], &[], "");
        let runtime: Option<RuntimeSettings> = self
            .load_document(DocumentKind::Runtime, sources, &mut loaded.sources)
            .await?;
        let mut runtime = runtime.unwrap_or_default();

        let overrides = ConfigLayering::merge_overrides(env_overrides, self.cli_overrides.clone());
        if let Some(dir) = overrides.output_directory {
            runtime.output_directory = Some(dir);
        }
        if let Some(flag) = overrides.log_configuration {
            runtime.log_configuration = flag;
        }
        loaded.runtime = runtime;

        Ok(loaded)
    }

    fn sources_for(
        &self,
        kind: DocumentKind,
        cli_files: &[Utf8PathBuf],
        env_files: &[Utf8PathBuf],
        env_variable: &str,
    ) -> Vec<ConfigSource> {
        if !cli_files.is_empty() {
            return cli_files
                .iter()
                .map(|p| ConfigSource::CommandLine(self.absolutize(p)))
                .collect();
        }

        if !env_files.is_empty() {
            return env_files
                .iter()
                .map(|p| ConfigSource::Environment {
                    variable: env_variable.to_string(),
                    path: self.absolutize(p),
                })
                .collect();
        }

        self.resolve_config_path(kind.stem()).into_iter().collect()
    }

    async fn load_document<T: DeserializeOwned>(
        &self,
        kind: DocumentKind,
        sources: Vec<ConfigSource>,
        loaded_sources: &mut Vec<(DocumentKind, ConfigSource)>,
    ) -> ConfigResult<Option<T>> {
        if sources.is_empty() {
            debug!("No {} document found", kind);
            return Ok(None);
        }

        let mut layers = Vec::with_capacity(sources.len());
        for source in &sources {
            layers.push(load_value(source.path()).await?);
            debug!("Loaded {} document from {}", kind, source);
        }

        let origin = sources
            .iter()
            .map(|s| s.path().as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let document = from_value(ConfigLayering::merge(layers), &origin)?;

        loaded_sources.extend(sources.into_iter().map(|s| (kind, s)));
        Ok(Some(document))
    }

    fn absolutize(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

/// Read and parse a single document file
pub async fn load_value(path: &Utf8Path) -> ConfigResult<Value> {
    let format = ConfigFormat::from_path(path.as_std_path())?;
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LandscapeError::io(format!("Failed to read {}", path), e))?;
    parse_value(&content, format, path.as_str())
}

fn find_with_extensions(dir: &Utf8Path, stem: &str) -> Option<Utf8PathBuf> {
    ConfigFormat::search_extensions()
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    fn isolated_loader(cwd: Utf8PathBuf) -> ConfigLoader {
        ConfigLoader::new(cwd)
            .with_env(HashMap::new())
            .with_global_dir(None)
    }

    #[tokio::test]
    async fn test_resolve_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8(&temp_dir);
        let nested = root.join("a").join("b");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(root.join("landscape.yml"), "apod: {}\n").await.unwrap();

        let loader = isolated_loader(nested);
        let source = loader.resolve_config_path("landscape").unwrap();

        assert_eq!(source, ConfigSource::Project(root.join("landscape.yml")));
    }

    #[tokio::test]
    async fn test_global_fallback() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        tokio::fs::write(global.path().join("topology.json"), r#"{"clusters": []}"#)
            .await
            .unwrap();

        let loader = isolated_loader(utf8(&project)).with_global_dir(Some(utf8(&global)));
        let source = loader.resolve_config_path("topology").unwrap();

        assert!(matches!(source, ConfigSource::Global(_)));
    }

    #[tokio::test]
    async fn test_absent_documents_are_none() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = isolated_loader(utf8(&temp_dir)).load().await.unwrap();

        assert!(loaded.landscape.is_none());
        assert!(loaded.topology.is_none());
        assert!(loaded.credentials.is_none());
        assert!(loaded.runtime.log_configuration);
        assert!(loaded.sources.is_empty());
    }

    #[tokio::test]
    async fn test_cli_files_are_layered() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8(&temp_dir);
        tokio::fs::write(
            root.join("base.yaml"),
            "environment:\n  label: base\napod:\n  devices:\n    - deviceType: network/client\n      host: 10.0.0.1\n",
        )
        .await
        .unwrap();
        tokio::fs::write(root.join("lab.json"), r#"{"environment": {"label": "lab"}}"#)
            .await
            .unwrap();

        let overrides = ConfigOverrides {
            landscape_files: vec!["base.yaml".into(), "lab.json".into()],
            ..Default::default()
        };
        let loaded = isolated_loader(root.clone())
            .with_cli_overrides(overrides)
            .load()
            .await
            .unwrap();

        let landscape = loaded.landscape.as_ref().unwrap();
        assert_eq!(landscape.environment.as_ref().unwrap().label.as_deref(), Some("lab"));
        assert_eq!(landscape.device_configs().len(), 1);
        assert_eq!(loaded.sources_for(DocumentKind::Landscape).len(), 2);
    }

    #[tokio::test]
    async fn test_env_overrides_runtime() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8(&temp_dir);
        tokio::fs::write(root.join("runtime.toml"), "output-directory = \"/from/file\"\n")
            .await
            .unwrap();

        let env = HashMap::from([(
            crate::merge::ENV_LOG_CONFIGURATION.to_string(),
            "false".to_string(),
        )]);
        let loaded = isolated_loader(root).with_env(env).load().await.unwrap();

        assert_eq!(loaded.runtime.output_directory.as_deref(), Some("/from/file"));
        assert!(!loaded.runtime.log_configuration);
    }

    #[tokio::test]
    async fn test_invalid_credentials_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8(&temp_dir);
        tokio::fs::write(
            root.join("credentials.yaml"),
            "credentials:\n  - identifier: a\n  - identifier: a\n",
        )
        .await
        .unwrap();

        let result = isolated_loader(root).load().await;
        assert!(matches!(result, Err(LandscapeError::ConfigValidation { .. })));
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            topology_files: vec!["missing.yaml".into()],
            ..Default::default()
        };

        let result = isolated_loader(utf8(&temp_dir))
            .with_cli_overrides(overrides)
            .load()
            .await;
        assert!(matches!(result, Err(LandscapeError::Io { .. })));
    }
}
