//! Retry policy for a single candidate's download attempts.
//!
//! The attempt loop is an explicit state machine ([`AttemptState`]) so the retry
//! contract can be exercised without any network I/O.

use camino::Utf8PathBuf;
use std::time::Duration;

/// Delay before retry N (0-based). Attempts past the end reuse the last entry.
pub const BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_millis(1000),
    Duration::from_millis(2000),
];

/// Whether a failed attempt may be tried again.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// State of one candidate's attempt loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// About to issue attempt `n` (0-based)
    Attempting(u32),
    /// Attempt `attempt` failed with a retryable error; wait `delay`, then try `attempt + 1`
    Retrying { attempt: u32, delay: Duration },
    /// File written to this path
    Succeeded(Utf8PathBuf),
    /// Gave up with this error message
    Failed(String),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Succeeded(_) | AttemptState::Failed(_))
    }
}

/// Retry budget plus backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retries: u32,
    schedule: Vec<Duration>,
}

impl RetryPolicy {
    /// `retries` extra attempts after the first, using [`BACKOFF_SCHEDULE`].
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            schedule: BACKOFF_SCHEDULE.to_vec(),
        }
    }

    /// Replace the backoff schedule. An empty schedule means no delay between attempts.
    pub fn with_schedule(mut self, schedule: Vec<Duration>) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Total attempts a candidate may make.
    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Delay after failed attempt `attempt`, clamped to the last schedule entry.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt as usize).min(self.schedule.len().saturating_sub(1));
        self.schedule.get(index).copied().unwrap_or(Duration::ZERO)
    }

    /// Next state after attempt `attempt` finished with `outcome`.
    pub fn transition<E>(&self, attempt: u32, outcome: Result<Utf8PathBuf, E>) -> AttemptState
    where
        E: Retryable + std::fmt::Display,
    {
        match outcome {
            Ok(path) => AttemptState::Succeeded(path),
            Err(err) if attempt < self.retries && err.is_retryable() => {
                AttemptState::Retrying {
                    attempt,
                    delay: self.delay_for(attempt),
                }
            }
            Err(err) => AttemptState::Failed(err.to_string()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
