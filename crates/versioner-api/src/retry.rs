//! Response classification and the fixed backoff schedule.

use std::time::Duration;
use tokio::time::Instant;

use crate::error::is_policy_status;

/// Waits between consecutive attempts. No jitter.
pub const BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Initial attempt plus one per backoff step.
pub const MAX_ATTEMPTS: u32 = BACKOFF_SCHEDULE.len() as u32 + 1;

/// What to do with an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx
    Success,
    /// 429, 5xx and any other non-2xx outside 4xx.
    Retryable,
    /// 409, 423, 428
    PolicyRejection,
    /// Remaining 4xx.
    ClientError,
}

pub fn classify_status(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        s if is_policy_status(s) => ResponseClass::PolicyRejection,
        429 => ResponseClass::Retryable,
        400..=499 => ResponseClass::ClientError,
        _ => ResponseClass::Retryable,
    }
}

/// Tracks progress through the attempt budget for one submission.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    deadline: Option<Instant>,
}

impl RetryState {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            attempt: 0,
            deadline,
        }
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Begin the next attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Time left before the deadline; `None` without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn deadline_passed(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }

    /// Timeout for the attempt about to run: `request_timeout`, capped by
    /// whatever remains of the deadline.
    pub fn attempt_timeout(&self, request_timeout: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => request_timeout.min(remaining),
            None => request_timeout,
        }
    }

    /// Delay before the next attempt, or `None` when the budget is spent.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.attempt == 0 {
            return Some(Duration::ZERO);
        }
        BACKOFF_SCHEDULE.get(self.attempt as usize - 1).copied()
    }

    /// Whether sleeping `delay` still leaves time before the deadline.
    pub fn fits_before_deadline(&self, delay: Duration) -> bool {
        match self.remaining() {
            Some(remaining) => delay < remaining,
            None => true,
        }
    }
}
