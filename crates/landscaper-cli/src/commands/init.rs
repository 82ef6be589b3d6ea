//! `landscaper init` command implementation.
//!
//! Writes starter landscape and topology documents that the loader will
//! discover from the target directory.

use std::path::{Path, PathBuf};

use landscaper_config::loader::GLOBAL_CONFIG_DIR;
use landscaper_core::error::{LandscapeError, LandscapeResult};

use super::CommandContext;

const STARTER_LANDSCAPE: &str = r#"# Devices, power and serial resources live under `apod`,
# shared services under `infrastructure`.
environment:
  label: my-lab

apod:
  devices:
    - deviceType: network/client
      name: client-a
      host: 127.0.0.1
    - deviceType: cluster/node
      name: node1
      host: 127.0.0.1
      group: cluster/a

infrastructure:
  services: []
"#;

const STARTER_TOPOLOGY: &str = r#"clusters:
  - name: alpha
    group: cluster/a
    nodes: [node1]
"#;

/// The per-user configuration directory
pub fn global_directory() -> LandscapeResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(GLOBAL_CONFIG_DIR))
        .ok_or_else(|| LandscapeError::configuration("Unable to determine the home directory"))
}

pub async fn execute(dir: &Path, ctx: &CommandContext) -> LandscapeResult<()> {
    ctx.output.step("*", &format!("Writing starter documents to {}", dir.display()));

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| LandscapeError::io(format!("Failed to create {}", dir.display()), e))?;

    let mut written = 0;
    for (file_name, content) in [("landscape.yaml", STARTER_LANDSCAPE), ("topology.yaml", STARTER_TOPOLOGY)] {
        let path = dir.join(file_name);
        if path.exists() {
            ctx.output.info(&format!("{} already exists, skipping", file_name));
            continue;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| LandscapeError::io(format!("Failed to write {}", path.display()), e))?;
        written += 1;
    }

    if written > 0 {
        ctx.output.success("Initialized landscape documents");
        ctx.output.info("");
        ctx.output.info("Next steps:");
        ctx.output.info("  landscaper check");
        ctx.output.info("  landscaper devices");
    }
    Ok(())
}
