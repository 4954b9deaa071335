//! Failure taxonomy for event submission.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::transport::TransportError;

/// Status codes the API uses for deployment-policy refusals.
pub const POLICY_STATUS_CODES: [u16; 3] = [409, 423, 428];

/// Whether `status` signals a policy rejection.
pub fn is_policy_status(status: u16) -> bool {
    POLICY_STATUS_CODES.contains(&status)
}

/// Decoded `detail` field of an error response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    /// `{"detail": "..."}`
    Message(String),
    /// `{"detail": [...]}`, field validation errors.
    Validation(Vec<Value>),
    /// `{"detail": {...}}`
    Structured(Map<String, Value>),
    /// Body did not match the envelope; kept verbatim.
    Raw(String),
}

impl ErrorDetail {
    /// Parse an error response body.
    pub fn from_body(body: &str) -> Self {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|doc| doc.as_object().and_then(|o| o.get("detail")).cloned());

        match detail {
            Some(Value::String(message)) => ErrorDetail::Message(message),
            Some(Value::Array(errors)) => ErrorDetail::Validation(errors),
            Some(Value::Object(fields)) => ErrorDetail::Structured(fields),
            _ => ErrorDetail::Raw(body.to_string()),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetail::Message(message) => f.write_str(message),
            ErrorDetail::Validation(errors) if errors.is_empty() => f.write_str("validation error"),
            ErrorDetail::Validation(errors) => {
                write!(f, "validation error: {}", Value::Array(errors.clone()))
            }
            ErrorDetail::Structured(fields) => match fields.get("message").and_then(Value::as_str) {
                Some(message) => f.write_str(message),
                None => write!(f, "API error: {}", Value::Object(fields.clone())),
            },
            ErrorDetail::Raw(body) if body.trim().is_empty() => f.write_str("empty response body"),
            ErrorDetail::Raw(body) => f.write_str(body),
        }
    }
}

/// Which deployment policy refused the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// 409: another deployment is in progress.
    Conflict,
    /// 423: a no-deploy window is active.
    ScheduleBlock,
    /// 428: flow, soak-time or approval requirement unmet.
    PreconditionFailed,
}

impl RejectionKind {
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            409 => Some(RejectionKind::Conflict),
            423 => Some(RejectionKind::ScheduleBlock),
            428 => Some(RejectionKind::PreconditionFailed),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            RejectionKind::Conflict => "Deployment Conflict",
            RejectionKind::ScheduleBlock => "Deployment Blocked by Schedule",
            RejectionKind::PreconditionFailed => "Deployment Precondition Failed",
        }
    }
}

/// A policy refusal (HTTP 409/423/428). Never retried, never soft-failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyRejection {
    pub status: u16,
    /// Error class reported by the server, e.g. `preflight_check_failed`.
    pub error: Option<String>,
    /// Machine-readable reason, e.g. `FLOW_VIOLATION`.
    pub code: Option<String>,
    pub message: String,
    pub rule_name: Option<String>,
    /// Earliest time a retry can succeed, as sent by the server.
    pub retry_after: Option<String>,
    pub details: Map<String, Value>,
    /// `false` when the body did not match the structured envelope.
    pub structured: bool,
}

impl PolicyRejection {
    /// Build from a 409/423/428 response.
    ///
    /// A body that is not `{"detail": {...}}` still yields a rejection,
    /// carrying only the status code and the raw body as message.
    pub fn from_response(status: u16, body: &str) -> Self {
        let fields = match ErrorDetail::from_body(body) {
            ErrorDetail::Structured(fields) => fields,
            _ => {
                return PolicyRejection {
                    status,
                    error: None,
                    code: None,
                    message: body.to_string(),
                    rule_name: None,
                    retry_after: None,
                    details: Map::new(),
                    structured: false,
                }
            }
        };

        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
        let details = match fields.get("details") {
            Some(Value::Object(details)) => details.clone(),
            _ => Map::new(),
        };
        let rule_name = details
            .get("rule_name")
            .and_then(Value::as_str)
            .map(str::to_string);

        PolicyRejection {
            status,
            error: text("error"),
            code: text("code"),
            message: text("message").unwrap_or_default(),
            rule_name,
            retry_after: text("retry_after"),
            details,
            structured: true,
        }
    }

    pub fn kind(&self) -> Option<RejectionKind> {
        RejectionKind::from_status(self.status)
    }

    /// `retry_after` parsed as an RFC 3339 timestamp, when it is one.
    pub fn retry_after_time(&self) -> Option<DateTime<Utc>> {
        self.retry_after
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

impl fmt::Display for PolicyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected (HTTP {})", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " {code}")?;
        }
        if let Some(rule) = &self.rule_name {
            write!(f, " [rule: {rule}]")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Terminal, non-policy submission failure.
///
/// These are eligible for soft-fail: with `fail_on_api_error = false` the
/// client reports them as a `not_recorded` placeholder instead.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("request failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("server error (HTTP {status}) after {attempts} attempt(s): {detail}")]
    Server {
        status: u16,
        attempts: u32,
        detail: ErrorDetail,
    },

    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: ErrorDetail },

    /// The deadline left no room for another attempt after a retryable failure.
    #[error("deadline exceeded, last failure: {last}")]
    DeadlineExceeded {
        attempts: u32,
        last: Box<SubmissionError>,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to decode response (HTTP {status}): {message}")]
    Decode { status: u16, message: String },
}

impl SubmissionError {
    /// HTTP status of the last response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            SubmissionError::Server { status, .. }
            | SubmissionError::Api { status, .. }
            | SubmissionError::Decode { status, .. } => Some(*status),
            SubmissionError::DeadlineExceeded { last, .. } => last.status(),
            SubmissionError::Transport { .. } | SubmissionError::Encode(_) => None,
        }
    }

    /// Whether the API answered with an error status (as opposed to a
    /// network failure or a local encode/decode problem).
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            SubmissionError::Server { .. } | SubmissionError::Api { .. }
        )
    }
}
