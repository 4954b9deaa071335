//! Event submission with retry, failure classification and soft-fail.
//!
//! One [`SubmissionClient::submit`] call runs at most [`MAX_ATTEMPTS`]
//! sequential attempts against the event's endpoint. Between attempts it
//! waits 1s, 2s, then 4s. Policy rejections end the loop immediately and
//! are never downgraded; every other terminal failure is downgraded to a
//! `not_recorded` placeholder when `fail_on_api_error` is off.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};

use crate::error::{ErrorDetail, PolicyRejection, SubmissionError};
use crate::events::{Event, EventKind, EventReceipt, NOT_RECORDED_STATUS};
use crate::obs;
use crate::retry::{classify_status, ResponseClass, RetryState, MAX_ATTEMPTS};
use crate::transport::{
    ApiRequest, ApiResponse, HttpTransport, Transport, TransportError, DEFAULT_REQUEST_TIMEOUT,
};

/// Submission behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// When `false`, non-policy failures yield [`SubmissionOutcome::NotRecorded`].
    pub fail_on_api_error: bool,
    /// Upper bound for a single attempt.
    pub request_timeout: Duration,
    /// Overall deadline across all attempts and waits.
    pub deadline: Option<Instant>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            fail_on_api_error: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            deadline: None,
        }
    }
}

impl ClientConfig {
    pub fn with_fail_on_api_error(mut self, fail: bool) -> Self {
        self.fail_on_api_error = fail;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `budget` from now.
    pub fn with_time_budget(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }
}

/// Placeholder result of a soft-failed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotRecorded {
    /// Always [`NOT_RECORDED_STATUS`].
    pub status: String,
    /// Why the event was not recorded.
    pub reason: String,
    /// Status of the last response, if any arrived.
    pub http_status: Option<u16>,
}

/// How a submission ended.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// The API accepted the event.
    Recorded(EventReceipt),
    /// Failed, but `fail_on_api_error` is off.
    NotRecorded(NotRecorded),
    /// Refused by a deployment policy.
    Rejected(PolicyRejection),
    /// Failed with `fail_on_api_error` on.
    Failed(SubmissionError),
}

impl SubmissionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Recorded(_) => "recorded",
            SubmissionOutcome::NotRecorded(_) => NOT_RECORDED_STATUS,
            SubmissionOutcome::Rejected(_) => "rejected",
            SubmissionOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, SubmissionOutcome::Recorded(_))
    }

    pub fn receipt(&self) -> Option<&EventReceipt> {
        match self {
            SubmissionOutcome::Recorded(receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Terminal state of the attempt loop before soft-fail is applied.
enum Halt {
    Rejected(PolicyRejection),
    Failed(SubmissionError),
}

/// Submits events through a [`Transport`].
#[derive(Clone)]
pub struct SubmissionClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl std::fmt::Debug for SubmissionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SubmissionClient {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// Client backed by [`HttpTransport`].
    pub fn http(api_url: &str, api_key: &str, config: ClientConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(api_url, api_key)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit `event` and report how it ended.
    pub async fn submit(&self, event: &Event) -> SubmissionOutcome {
        let span = info_span!(
            "versioner.submit",
            kind = %event.kind(),
            product = %event.product_name(),
            version = %event.version(),
        );
        self.run(event).instrument(span).await
    }

    async fn run(&self, event: &Event) -> SubmissionOutcome {
        let kind = event.kind();
        let started = Instant::now();
        let (result, attempts) = self.attempt_loop(event).await;

        let outcome = match result {
            Ok(receipt) => SubmissionOutcome::Recorded(receipt),
            Err(Halt::Rejected(rejection)) => SubmissionOutcome::Rejected(rejection),
            Err(Halt::Failed(err)) => self.degrade(kind, err),
        };

        obs::emit_submission_finished(
            kind,
            outcome.label(),
            attempts,
            started.elapsed().as_millis() as u64,
        );
        outcome
    }

    async fn attempt_loop(&self, event: &Event) -> (Result<EventReceipt, Halt>, u32) {
        let kind = event.kind();
        let body = match event.to_body() {
            Ok(body) => body,
            Err(e) => return (Err(Halt::Failed(e.into())), 0),
        };
        let request = ApiRequest::post(kind.endpoint(), body);
        let mut state = RetryState::new(self.config.deadline);

        loop {
            if state.deadline_passed() {
                let err = SubmissionError::Transport {
                    attempts: state.attempts(),
                    source: TransportError::DeadlineExceeded,
                };
                return (Err(Halt::Failed(err)), state.attempts());
            }

            let attempt = state.begin_attempt();
            obs::emit_attempt_started(kind, attempt, MAX_ATTEMPTS);
            let timeout = state.attempt_timeout(self.config.request_timeout);

            let failure = match self.transport.send(&request, timeout).await {
                Ok(response) => match classify_status(response.status) {
                    ResponseClass::Success => return (decode_receipt(&response), attempt),
                    ResponseClass::PolicyRejection => {
                        let rejection = PolicyRejection::from_response(response.status, &response.body);
                        return (Err(Halt::Rejected(rejection)), attempt);
                    }
                    ResponseClass::ClientError => {
                        let err = SubmissionError::Api {
                            status: response.status,
                            detail: ErrorDetail::from_body(&response.body),
                        };
                        return (Err(Halt::Failed(err)), attempt);
                    }
                    ResponseClass::Retryable => SubmissionError::Server {
                        status: response.status,
                        attempts: attempt,
                        detail: ErrorDetail::from_body(&response.body),
                    },
                },
                Err(source) => {
                    let retryable = source.is_retryable();
                    let err = SubmissionError::Transport {
                        attempts: attempt,
                        source,
                    };
                    if !retryable {
                        return (Err(Halt::Failed(err)), attempt);
                    }
                    err
                }
            };

            let Some(delay) = state.next_delay() else {
                return (Err(Halt::Failed(failure)), attempt);
            };
            if !state.fits_before_deadline(delay) {
                debug!(attempt, "deadline leaves no room for another attempt");
                let err = SubmissionError::DeadlineExceeded {
                    attempts: attempt,
                    last: Box::new(failure),
                };
                return (Err(Halt::Failed(err)), attempt);
            }

            obs::emit_retry_scheduled(kind, attempt, delay, &failure);
            tokio::time::sleep(delay).await;
        }
    }

    fn degrade(&self, kind: EventKind, err: SubmissionError) -> SubmissionOutcome {
        if self.config.fail_on_api_error {
            return SubmissionOutcome::Failed(err);
        }
        obs::emit_soft_failure(kind, &err);
        SubmissionOutcome::NotRecorded(NotRecorded {
            status: NOT_RECORDED_STATUS.to_string(),
            reason: err.to_string(),
            http_status: err.status(),
        })
    }
}

fn decode_receipt(response: &ApiResponse) -> Result<EventReceipt, Halt> {
    serde_json::from_str(&response.body).map_err(|e| {
        Halt::Failed(SubmissionError::Decode {
            status: response.status,
            message: e.to_string(),
        })
    })
}
