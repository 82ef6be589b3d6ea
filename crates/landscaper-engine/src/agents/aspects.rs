//! Aspects that shape how a command is run and logged

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use landscaper_core::error::LandscapeError;

/// How a command is repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionPattern {
    /// Run once and return the result
    SingleCall,
    /// Run once over an established connection
    SingleConnectedCall,
    /// Repeat until the expected status is returned
    DoUntilSuccess,
    /// Repeat while the expected status is returned
    DoWhileSuccess,
    /// Repeat until the connection drops
    DoUntilConnectionFailure,
}

impl ActionPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionPattern::SingleCall => "single-call",
            ActionPattern::SingleConnectedCall => "single-connected-call",
            ActionPattern::DoUntilSuccess => "do-until-success",
            ActionPattern::DoWhileSuccess => "do-while-success",
            ActionPattern::DoUntilConnectionFailure => "do-until-connection-failure",
        }
    }
}

impl fmt::Display for ActionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionPattern {
    type Err = LandscapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "single-call" => Ok(ActionPattern::SingleCall),
            "single-connected-call" => Ok(ActionPattern::SingleConnectedCall),
            "do-until-success" => Ok(ActionPattern::DoUntilSuccess),
            "do-while-success" => Ok(ActionPattern::DoWhileSuccess),
            "do-until-connection-failure" => Ok(ActionPattern::DoUntilConnectionFailure),
            other => Err(LandscapeError::ConfigValidation {
                field: "action_pattern".to_string(),
                reason: format!("unknown action pattern '{}'", other),
            }),
        }
    }
}

/// Which command results get logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingPattern {
    AllResults,
    SuccessOnly,
    FailureOnly,
    None,
}

impl LoggingPattern {
    pub fn logs_success(&self) -> bool {
        matches!(self, LoggingPattern::AllResults | LoggingPattern::SuccessOnly)
    }

    pub fn logs_failure(&self) -> bool {
        matches!(self, LoggingPattern::AllResults | LoggingPattern::FailureOnly)
    }
}

/// The exit status, or statuses, a command is expected to return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedStatus {
    Code(i32),
    AnyOf(Vec<i32>),
}

impl ExpectedStatus {
    pub fn matches(&self, status: i32) -> bool {
        match self {
            ExpectedStatus::Code(code) => *code == status,
            ExpectedStatus::AnyOf(codes) => codes.contains(&status),
        }
    }
}

impl Default for ExpectedStatus {
    fn default() -> Self {
        ExpectedStatus::Code(0)
    }
}

impl From<i32> for ExpectedStatus {
    fn from(code: i32) -> Self {
        ExpectedStatus::Code(code)
    }
}

impl From<Vec<i32>> for ExpectedStatus {
    fn from(codes: Vec<i32>) -> Self {
        match codes.as_slice() {
            [single] => ExpectedStatus::Code(*single),
            _ => ExpectedStatus::AnyOf(codes),
        }
    }
}

/// Timing, repetition and logging aspects of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAspects {
    pub action_pattern: ActionPattern,
    pub logging_pattern: LoggingPattern,
    /// Upper bound for repeating action patterns
    pub completion_timeout: Duration,
    /// Pause between repetitions
    pub completion_interval: Duration,
    /// Upper bound for a single run of the command
    pub inactivity_timeout: Duration,
    /// A warning is logged when a single run outlives this delay
    pub monitor_delay: Duration,
}

impl Default for CommandAspects {
    fn default() -> Self {
        Self {
            action_pattern: ActionPattern::SingleCall,
            logging_pattern: LoggingPattern::AllResults,
            completion_timeout: Duration::from_secs(600),
            completion_interval: Duration::from_secs(5),
            inactivity_timeout: Duration::from_secs(600),
            monitor_delay: Duration::from_secs(30),
        }
    }
}

impl CommandAspects {
    pub fn with_action_pattern(mut self, pattern: ActionPattern) -> Self {
        self.action_pattern = pattern;
        self
    }

    pub fn with_logging_pattern(mut self, pattern: LoggingPattern) -> Self {
        self.logging_pattern = pattern;
        self
    }

    pub fn with_completion(mut self, timeout: Duration, interval: Duration) -> Self {
        self.completion_timeout = timeout;
        self.completion_interval = interval;
        self
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_monitor_delay(mut self, delay: Duration) -> Self {
        self.monitor_delay = delay;
        self
    }
}
