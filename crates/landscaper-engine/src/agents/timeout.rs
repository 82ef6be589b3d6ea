//! Completion timeout tracking for repeated actions

use std::time::Duration;

use tokio::time::Instant;

use landscaper_core::error::LandscapeError;

/// Tracks the progress of a repeated action against a timeout
#[derive(Debug, Clone)]
pub struct TimeoutContext {
    timeout: Duration,
    interval: Duration,
    begin: Option<Instant>,
    final_attempt: bool,
}

impl TimeoutContext {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            begin: None,
            final_attempt: false,
        }
    }

    /// Start the clock
    pub fn mark_begin(&mut self) {
        self.begin = Some(Instant::now());
        self.final_attempt = false;
    }

    /// The next attempt is the last one
    pub fn mark_final_attempt(&mut self) {
        self.final_attempt = true;
    }

    pub fn final_attempt(&self) -> bool {
        self.final_attempt
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time since `mark_begin`, zero when the clock was never started
    pub fn elapsed(&self) -> Duration {
        self.begin.map(|b| b.elapsed()).unwrap_or_default()
    }

    /// Whether there is time left for another attempt
    pub fn should_continue(&self) -> bool {
        self.elapsed() < self.timeout
    }

    /// Build the timeout error for this context
    pub fn create_timeout(&self, what_for: &str, detail: Vec<String>) -> LandscapeError {
        let mut lines = vec![format!(
            "timeout={:.3}s elapsed={:.3}s",
            self.timeout.as_secs_f64(),
            self.elapsed().as_secs_f64()
        )];
        lines.extend(detail);

        LandscapeError::Timeout {
            what_for: what_for.to_string(),
            detail: lines,
        }
    }
}
