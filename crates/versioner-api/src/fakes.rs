//! Scripted transport for exercising the submission loop (testing only)
//!
//! `ScriptedTransport` replays a fixed list of responses in order and
//! records every request with the (tokio) instant it was sent, so tests can
//! assert attempt counts and backoff gaps under a paused clock.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use crate::error::is_policy_status;
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

/// One request observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: ApiRequest,
    pub timeout: Duration,
    pub at: Instant,
}

/// Transport answering from a script instead of the network.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<ApiResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// One response per status: a receipt for 2xx, a structured rejection
    /// for 409/423/428 and `{"detail": "..."}` otherwise.
    pub fn statuses(statuses: &[u16]) -> Self {
        Self::new(
            statuses
                .iter()
                .enumerate()
                .map(|(i, &status)| Ok(canned_response(status, i + 1)))
                .collect(),
        )
    }

    /// Time each `send` takes before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Time between consecutive requests.
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }

    /// Script entries not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

fn canned_response(status: u16, n: usize) -> ApiResponse {
    let body = if (200..300).contains(&status) {
        json!({"id": format!("evt-{n}"), "status": "completed"})
    } else if is_policy_status(status) {
        json!({
            "detail": {
                "error": "preflight_check_failed",
                "code": "FLOW_VIOLATION",
                "message": format!("rejected with HTTP {status}"),
                "details": {"rule_name": "Scripted rule"}
            }
        })
    } else {
        json!({"detail": format!("HTTP {status}")})
    };
    ApiResponse::new(status, body.to_string())
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        timeout: Duration,
    ) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            request: request.clone(),
            timeout,
            at: Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency.min(timeout)).await;
            if self.latency > timeout {
                return Err(TransportError::Timeout(timeout));
            }
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
    }
}
