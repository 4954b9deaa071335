//! Structured observability hooks for the submission lifecycle.
//!
//! Events are emitted with an `event = "..."` field so JSON log output can
//! be filtered on it. The API key never appears in any field.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::events::EventKind;

/// Emit event: an attempt is about to be sent.
pub fn emit_attempt_started(kind: EventKind, attempt: u32, max_attempts: u32) {
    debug!(
        event = "submission.attempt_started",
        kind = %kind,
        attempt = attempt,
        max_attempts = max_attempts,
    );
}

/// Emit event: a retryable failure, with the wait before the next attempt.
pub fn emit_retry_scheduled(
    kind: EventKind,
    attempt: u32,
    delay: Duration,
    reason: &dyn std::fmt::Display,
) {
    warn!(
        event = "submission.retry_scheduled",
        kind = %kind,
        attempt = attempt,
        delay_ms = delay.as_millis() as u64,
        reason = %reason,
    );
}

/// Emit event: submission finished with the given outcome label.
pub fn emit_submission_finished(kind: EventKind, outcome: &str, attempts: u32, duration_ms: u64) {
    info!(
        event = "submission.finished",
        kind = %kind,
        outcome = %outcome,
        attempts = attempts,
        duration_ms = duration_ms,
    );
}

/// Emit event: a failure was downgraded to `not_recorded`.
pub fn emit_soft_failure(kind: EventKind, error: &dyn std::fmt::Display) {
    warn!(event = "submission.soft_failure", kind = %kind, error = %error);
}
