//! Command implementations and dispatch logic.
//!
//! Each command is an async function that takes a `CommandContext`. The
//! context knows where documents are looked up and how to bring a landscape
//! up for the commands that need one.

use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;
use tracing::{debug, info};

use landscaper_config::{ConfigLoader, ConfigOverrides, LoadedConfiguration};
use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::types::ActivationParams;
use landscaper_engine::Landscape;

pub mod check;
pub mod extract;
pub mod init;
pub mod inventory;
pub mod run;


use crate::{output::OutputHandler, Cli, Commands};

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: PathBuf,
    pub output: OutputHandler,
    pub overrides: ConfigOverrides,
}

impl CommandContext {
    pub fn new(overrides: ConfigOverrides) -> LandscapeResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| LandscapeError::io("Failed to get current directory".to_string(), e))?;

        Ok(Self {
            cwd,
            output: OutputHandler::new(),
            overrides,
        })
    }

    /// Load the documents visible from the working directory
    pub async fn load_configuration(&self) -> LandscapeResult<LoadedConfiguration> {
        let cwd = Utf8PathBuf::try_from(self.cwd.clone()).map_err(|e| {
            LandscapeError::configuration(format!(
                "The working directory is not valid UTF-8: {}",
                e.into_path_buf().display()
            ))
        })?;

        ConfigLoader::new(cwd)
            .with_cli_overrides(self.overrides.clone())
            .load()
            .await
    }

    /// Build a landscape from the loaded documents and run all activation stages
    pub async fn landscape(&self, params: &ActivationParams, record: bool) -> LandscapeResult<Arc<Landscape>> {
        let mut loaded = self.load_configuration().await?;
        if loaded.landscape.is_none() {
            return Err(LandscapeError::configuration(
                "No landscape document found. Pass --landscape or run 'landscaper init'.",
            ));
        }
        for (kind, source) in &loaded.sources {
            debug!("Using {} document {}", kind, source);
        }
        if !record {
            loaded.runtime.log_configuration = false;
        }

        let landscape = Landscape::builder().with_configuration(loaded).build()?;
        landscape.startup(params).await?;
        Ok(Arc::new(landscape))
    }
}

/// Activation parameters for commands that only look at the landscape
pub fn inspection_params() -> ActivationParams {
    ActivationParams {
        allow_missing_devices: true,
        allow_missing_services: true,
        ..ActivationParams::default()
    }
}

/// Translate the global command line options into configuration overrides
pub fn overrides_from(cli: &Cli) -> ConfigOverrides {
    ConfigOverrides {
        landscape_files: cli.landscape.iter().map(Utf8PathBuf::from).collect(),
        topology_files: cli.topology.iter().map(Utf8PathBuf::from).collect(),
        credentials_files: cli.credentials.iter().map(Utf8PathBuf::from).collect(),
        output_directory: cli.output_dir.clone(),
        log_configuration: None,
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> LandscapeResult<()> {
    match command {
        Commands::Check {
            allow_missing,
            allow_unknown,
        } => {
            info!("Checking landscape (allow_missing: {}, allow_unknown: {})", allow_missing, allow_unknown);
            check::execute(allow_missing, allow_unknown, ctx).await
        }
        Commands::Devices {
            device_type,
            role,
            group,
            name,
        } => {
            let selection = inventory::DeviceSelection {
                device_type,
                role,
                group,
                name,
            };
            info!("Listing devices: {:?}", selection);
            inventory::devices(&selection, ctx).await
        }
        Commands::Services { name } => {
            info!("Listing services (name: {:?})", name);
            inventory::services(name, ctx).await
        }
        Commands::Clusters => {
            info!("Listing clusters");
            inventory::clusters(ctx).await
        }
        Commands::Extract {
            device_type,
            cluster,
            service,
            out,
        } => {
            let selection = extract::ExtractSelection {
                device_type,
                clusters: cluster,
                services: service,
            };
            info!("Extracting configuration: {:?}", selection);
            extract::execute(&selection, out.map(PathBuf::from), ctx).await
        }
        Commands::Run {
            command,
            pattern,
            timeout,
            expect,
        } => {
            info!("Running '{}' (pattern: {}, timeout: {}s)", command, pattern, timeout);
            run::execute(&command, &pattern, timeout, expect, ctx).await
        }
        Commands::Init { global } => {
            info!("Writing starter documents (global: {})", global);
            let dir = if global {
                init::global_directory()?
            } else {
                ctx.cwd.clone()
            };
            init::execute(&dir, ctx).await
        }
        Commands::Version => {
            info!("Showing version information");
            show_version(ctx)
        }
    }
}

/// Report a word that is not a known command
pub fn unknown_command(name: &str, ctx: &CommandContext) -> LandscapeResult<()> {
    ctx.output.error(&format!("Unknown command '{}'", name));
    if let Some(suggestion) = suggest_similar_command(name) {
        ctx.output.info(&format!("Did you mean '{}'?", suggestion));
    }
    ctx.output.info("");
    ctx.output.info("Run 'landscaper help' to see available commands.");
    Err(LandscapeError::ConfigValidation {
        field: "command".to_string(),
        reason: format!("Unknown command: {}", name),
    })
}

pub fn show_help(ctx: &CommandContext) -> LandscapeResult<()> {
    ctx.output.info("Landscaper - automation landscape tooling");
    ctx.output.info("");
    ctx.output.info("Usage: landscaper [OPTIONS] [COMMAND]");
    ctx.output.info("");
    ctx.output.info("Landscape:");
    ctx.output.info("  check          Bring the landscape up and report");
    ctx.output.info("  devices        List devices");
    ctx.output.info("  services       List services");
    ctx.output.info("  clusters       List clusters");
    ctx.output.info("  extract        Write a subset of the landscape");
    ctx.output.info("");
    ctx.output.info("Utilities:");
    ctx.output.info("  run <cmd>      Run a command on the local host");
    ctx.output.info("  init           Write starter documents");
    ctx.output.info("  version        Show version information");
    ctx.output.info("");
    ctx.output.info("Run 'landscaper <command> --help' for more information on a command.");
    Ok(())
}

fn show_version(ctx: &CommandContext) -> LandscapeResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build_date = env!("BUILD_DATE");
    let target = format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS);

    ctx.output.info(&format!("Landscaper v{}", version));
    ctx.output.info(&format!("Built: {}", build_date));
    ctx.output.info(&format!("Target: {}", target));
    ctx.output.info(&format!("Rust: {}", env!("RUSTC_VERSION")));

    Ok(())
}

/// Suggest similar commands based on edit distance
pub fn suggest_similar_command(input: &str) -> Option<String> {
    let commands = [
        "check", "devices", "services", "clusters", "extract", "run", "init", "version", "help",
    ];

    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for &command in &commands {
        let distance = edit_distance(input, command);
        if distance < best_distance && distance <= 2 {
            best_distance = distance;
            best_match = Some(command);
        }
    }

    best_match.map(|s| s.to_string())
}

/// Calculate edit distance between two strings
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut previous: Vec<usize> = (0..=b_len).collect();
    let mut current = vec![0; b_len + 1];

    for i in 1..=a_len {
        current[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_len]
}
