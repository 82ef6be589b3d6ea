//! System contexts and command agents
//!
//! A `SystemContext` runs commands on some system. The `LocalCommandAgent`
//! runs them on the local host; remote protocol agents plug in through the
//! same trait.

pub mod aspects;
pub mod local;
pub mod timeout;

pub use aspects::{ActionPattern, CommandAspects, ExpectedStatus, LoggingPattern};
pub use local::LocalCommandAgent;
pub use timeout::TimeoutContext;

use async_trait::async_trait;

use landscaper_core::error::LandscapeResult;

/// Command used to verify that a system context can run commands
pub const CONNECTIVITY_COMMAND: &str = "echo 'It Works'";

/// Captured result of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Something commands can be run against
#[async_trait]
pub trait SystemContext: Send + Sync {
    /// Run a command, applying `aspects` or the context defaults
    async fn run_cmd(
        &self,
        command: &str,
        expected: &ExpectedStatus,
        aspects: Option<&CommandAspects>,
    ) -> LandscapeResult<CommandOutput>;

    /// Check that the target can be reached
    async fn verify_connectivity(&self) -> LandscapeResult<bool>;
}
