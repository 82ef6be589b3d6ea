//! # landscaper-cli
//!
//! Command line front end for automation landscapes.
//!
//! Loads the landscape, topology and credentials documents, brings the
//! landscape up and reports on the devices, services and clusters it
//! declares.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Inspect and exercise automation landscapes
#[derive(Parser)]
#[command(name = "landscaper", version, about = "Automation landscape tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Anything that is not a known command
    #[arg(value_name = "COMMAND")]
    pub unknown: Option<String>,

    /// Landscape document, may be given more than once to layer files
    #[arg(long, global = true, value_name = "FILE")]
    pub landscape: Vec<String>,

    /// Topology document
    #[arg(long, global = true, value_name = "FILE")]
    pub topology: Option<String>,

    /// Credentials document
    #[arg(long, global = true, value_name = "FILE")]
    pub credentials: Option<String>,

    /// Directory for recorded configuration and results
    #[arg(long = "output-dir", global = true, value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring the landscape up and report what was found
    Check {
        /// Tolerate devices and services that cannot be reached
        #[arg(long)]
        allow_missing: bool,
        /// Tolerate entries no coupling recognizes
        #[arg(long)]
        allow_unknown: bool,
    },
    /// List devices
    Devices {
        #[arg(long)]
        device_type: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// List services
    Services {
        #[arg(long)]
        name: Option<String>,
    },
    /// List clusters with their nodes and spares
    Clusters,
    /// Write a landscape document declaring a subset of the landscape
    Extract {
        /// Only devices of this type
        #[arg(long)]
        device_type: Option<String>,
        /// Nodes of this cluster
        #[arg(long)]
        cluster: Vec<String>,
        /// Only services with this name
        #[arg(long)]
        service: Vec<String>,
        /// Output file, stdout when omitted
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
    /// Run a command on the local host
    Run {
        command: String,
        /// Action pattern such as single-call or do-until-success
        #[arg(long, default_value = "single-call")]
        pattern: String,
        /// Completion timeout in seconds for repeating patterns
        #[arg(long, default_value_t = 60)]
        timeout: u64,
        /// Expected exit status, may be repeated
        #[arg(long)]
        expect: Vec<i32>,
    },
    /// Write starter landscape and topology documents
    Init {
        /// Write into the per-user configuration directory
        #[arg(long)]
        global: bool,
    },
    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    info!("Starting Landscaper CLI v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    if let Err(err) = runtime.block_on(run_cli(cli)) {
        eprintln!("{}", ErrorFormatter::new().format_error(&err));
        std::process::exit(1);
    }
    Ok(())
}

async fn run_cli(cli: Cli) -> landscaper_core::error::LandscapeResult<()> {
    let ctx = CommandContext::new(commands::overrides_from(&cli))?;

    match cli.command {
        Some(command) => commands::dispatch_command(command, &ctx).await,
        None => match cli.unknown {
            Some(name) => commands::unknown_command(&name, &ctx),
            None => commands::show_help(&ctx),
        },
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "landscaper={level},landscaper_core={level},landscaper_config={level},landscaper_engine={level}",
            level = level
        ))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Landscaper encountered an unexpected error: {}", panic_info);
        eprintln!("Landscaper crashed! This is a bug.");
        eprintln!("Error: {}", panic_info);
    }));
}
