//! Command agent for the local host

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::utils::{format_command_result, indent_lines};

use super::aspects::{ActionPattern, CommandAspects, ExpectedStatus, LoggingPattern};
use super::timeout::TimeoutContext;
use super::{CommandOutput, SystemContext};

/// Runs shell commands on the local host
#[derive(Debug, Clone, Default)]
pub struct LocalCommandAgent {
    aspects: CommandAspects,
}

impl LocalCommandAgent {
    pub fn new(aspects: CommandAspects) -> Self {
        Self { aspects }
    }

    /// Default aspects applied when a call provides none
    pub fn aspects(&self) -> &CommandAspects {
        &self.aspects
    }

    async fn run_once(
        &self,
        scope: &'static str,
        command: &str,
        aspects: &CommandAspects,
    ) -> LandscapeResult<CommandOutput> {
        let _monitor = MonitoredScope::start(scope, command, aspects.monitor_delay);

        let child = shell_command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LandscapeError::Command {
                message: format!("Failed to start '{}'", command),
                source: Some(e),
            })?;

        let output = match tokio::time::timeout(aspects.inactivity_timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| LandscapeError::Command {
                message: format!("Failed to collect the output of '{}'", command),
                source: Some(e),
            })?,
            Err(_) => {
                return Err(LandscapeError::Timeout {
                    what_for: "command completion".to_string(),
                    detail: vec![
                        format!("CMD: {}", command),
                        format!(
                            "The command did not finish within the inactivity timeout of {:.3}s",
                            aspects.inactivity_timeout.as_secs_f64()
                        ),
                    ],
                });
            }
        };

        Ok(CommandOutput {
            // Signal terminated processes carry no exit code
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_repeated(
        &self,
        scope: &'static str,
        command: &str,
        expected: &ExpectedStatus,
        aspects: &CommandAspects,
        stop_on_match: bool,
    ) -> LandscapeResult<CommandOutput> {
        let what_for = if stop_on_match {
            "command success"
        } else {
            "command failure"
        };

        let mut toctx = TimeoutContext::new(aspects.completion_timeout, aspects.completion_interval);
        toctx.mark_begin();

        loop {
            let output = self.run_once(scope, command, aspects).await?;
            log_command_result(command, &output, expected, aspects.logging_pattern);

            if expected.matches(output.status) == stop_on_match {
                return Ok(output);
            }

            if toctx.final_attempt() {
                return Err(toctx.create_timeout(what_for, command_detail(command, &output)));
            } else if !toctx.should_continue() {
                toctx.mark_final_attempt();
            }

            tokio::time::sleep(toctx.interval()).await;
        }
    }
}

#[async_trait]
impl SystemContext for LocalCommandAgent {
    async fn run_cmd(
        &self,
        command: &str,
        expected: &ExpectedStatus,
        aspects: Option<&CommandAspects>,
    ) -> LandscapeResult<CommandOutput> {
        let aspects = aspects.unwrap_or(&self.aspects);

        match aspects.action_pattern {
            ActionPattern::SingleCall => {
                let output = self.run_once("RUNCMD-SINGULAR", command, aspects).await?;
                log_command_result(command, &output, expected, aspects.logging_pattern);
                Ok(output)
            }
            ActionPattern::DoUntilSuccess => {
                self.run_repeated("RUNCMD-DO_UNTIL_SUCCESS", command, expected, aspects, true)
                    .await
            }
            ActionPattern::DoWhileSuccess => {
                self.run_repeated("RUNCMD-DO_WHILE_SUCCESS", command, expected, aspects, false)
                    .await
            }
            ActionPattern::SingleConnectedCall | ActionPattern::DoUntilConnectionFailure => {
                Err(LandscapeError::semantic(format!(
                    "The local command agent does not support the '{}' action pattern.",
                    aspects.action_pattern
                )))
            }
        }
    }

    async fn verify_connectivity(&self) -> LandscapeResult<bool> {
        Ok(true)
    }
}

/// Warns when a command outlives its monitor delay
struct MonitoredScope {
    handle: JoinHandle<()>,
}

impl MonitoredScope {
    fn start(scope: &'static str, command: &str, delay: Duration) -> Self {
        let command = command.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            warn!(
                "{}: command still running after {:.3}s. cmd={}",
                scope,
                delay.as_secs_f64(),
                command
            );
        });
        Self { handle }
    }
}

impl Drop for MonitoredScope {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

fn command_detail(command: &str, output: &CommandOutput) -> Vec<String> {
    vec![
        format!("CMD: {}", command),
        "STDOUT:".to_string(),
        indent_lines(&output.stdout, 1),
        "STDERR:".to_string(),
        indent_lines(&output.stderr, 1),
    ]
}

fn log_command_result(
    command: &str,
    output: &CommandOutput,
    expected: &ExpectedStatus,
    logging_pattern: LoggingPattern,
) {
    if expected.matches(output.status) {
        if logging_pattern.logs_success() {
            let msg = format_command_result(
                "Ran command on the local agent.",
                command,
                output.status,
                &output.stdout,
                &output.stderr,
            );
            info!("{}", msg);
        }
    } else if logging_pattern.logs_failure() {
        let msg = format_command_result(
            "Error running command on the local agent.",
            command,
            output.status,
            &output.stdout,
            &output.stderr,
        );
        warn!("{}", msg);
    }
}
