//! Versioner API: event submission
//!
//! Sends build and deployment events to the Versioner API with a fixed
//! retry schedule, classifies responses into success, retryable failure,
//! policy rejection and client error, and applies the soft-fail policy.
//!
//! ## Layer 1 - Transport & Submission
//!
//! Focus: one sequential submission per event, bounded attempts, no
//! retries on policy rejections.

pub mod client;
pub mod error;
pub mod events;
#[cfg(any(test, feature = "testing"))]
pub mod fakes;
pub mod obs;
pub mod retry;
pub mod transport;

pub use client::{ClientConfig, NotRecorded, SubmissionClient, SubmissionOutcome};
pub use error::{is_policy_status, ErrorDetail, PolicyRejection, RejectionKind, SubmissionError};
pub use events::{
    BuildEvent, DeploymentEvent, Event, EventKind, EventReceipt, Metadata, NOT_RECORDED_STATUS,
};
pub use retry::{classify_status, ResponseClass, BACKOFF_SCHEDULE, MAX_ATTEMPTS};
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, Transport, TransportError, DEFAULT_REQUEST_TIMEOUT,
    USER_AGENT,
};
