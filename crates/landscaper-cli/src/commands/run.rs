//! `landscaper run` command implementation.
//!
//! Runs a shell command on the local host with the requested action
//! pattern and reports its output.

use std::time::Duration;

use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_engine::{ActionPattern, CommandAspects, ExpectedStatus, LocalCommandAgent, SystemContext};

use super::CommandContext;

/// Pause between repetitions of a repeating pattern
const REPEAT_INTERVAL: Duration = Duration::from_secs(1);

pub fn aspects_for(pattern: &str, timeout_secs: u64) -> LandscapeResult<CommandAspects> {
    let pattern: ActionPattern = pattern.parse()?;
    Ok(CommandAspects::default()
        .with_action_pattern(pattern)
        .with_completion(Duration::from_secs(timeout_secs), REPEAT_INTERVAL)
        .with_inactivity_timeout(Duration::from_secs(timeout_secs)))
}

pub async fn execute(
    command: &str,
    pattern: &str,
    timeout_secs: u64,
    expect: Vec<i32>,
    ctx: &CommandContext,
) -> LandscapeResult<()> {
    let aspects = aspects_for(pattern, timeout_secs)?;
    let expected = if expect.is_empty() {
        ExpectedStatus::default()
    } else {
        ExpectedStatus::from(expect)
    };

    let agent = LocalCommandAgent::new(aspects);
    let output = agent.run_cmd(command, &expected, None).await?;

    if !output.stdout.is_empty() {
        print!("{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }

    if !expected.matches(output.status) {
        return Err(LandscapeError::Command {
            message: format!(
                "'{}' exited with status {} (expected {:?})",
                command, output.status, expected
            ),
            source: None,
        });
    }

    ctx.output.success(&format!("Exit status {}", output.status));
    Ok(())
}
