use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay after a 5xx answer, multiplied by the attempt number.
    pub status_backoff: Duration,
    /// Fixed delay after a network-level failure.
    pub network_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            status_backoff: Duration::from_secs(5),
            network_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, reason: &RetryReason, attempt: u32) -> Duration {
        match reason {
            RetryReason::Status(_) => self.status_backoff * attempt,
            RetryReason::Transport(_) => self.network_backoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    Status(StatusCode),
    Transport(String),
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Status(status) => write!(f, "upstream answered {status}"),
            RetryReason::Transport(message) => write!(f, "transport error: {message}"),
        }
    }
}

/// Result of one HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    RetryableFailure(RetryReason),
    TerminalFailure(String),
}
