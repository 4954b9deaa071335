//! End-to-end behaviour of the submission loop against a scripted transport.
//!
//! Every test runs under a paused tokio clock, so backoff gaps are exact.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use versioner_api::fakes::ScriptedTransport;
use versioner_api::{
    ApiResponse, BuildEvent, ClientConfig, DeploymentEvent, ErrorDetail, Event, RejectionKind,
    SubmissionClient, SubmissionError, SubmissionOutcome, TransportError, MAX_ATTEMPTS,
    NOT_RECORDED_STATUS,
};

fn build() -> Event {
    Event::Build(BuildEvent {
        product_name: "checkout".to_string(),
        version: "2.4.0".to_string(),
        status: "completed".to_string(),
        ..Default::default()
    })
}

fn deployment() -> Event {
    Event::Deployment(DeploymentEvent {
        product_name: "checkout".to_string(),
        version: "2.4.0".to_string(),
        environment_name: "production".to_string(),
        status: "started".to_string(),
        ..Default::default()
    })
}

fn client(transport: &Arc<ScriptedTransport>, fail_on_api_error: bool) -> SubmissionClient {
    SubmissionClient::new(
        transport.clone(),
        ClientConfig::default().with_fail_on_api_error(fail_on_api_error),
    )
}

// ---------------------------------------------------------------------------
// Retry schedule
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn server_errors_then_success_is_recorded_after_backoff() {
    let transport = Arc::new(ScriptedTransport::statuses(&[500, 500, 200]));
    let outcome = client(&transport, true).submit(&build()).await;

    match outcome {
        SubmissionOutcome::Recorded(receipt) => assert_eq!(receipt.id, "evt-3"),
        other => panic!("expected recorded, got {other:?}"),
    }
    assert_eq!(transport.attempts(), 3);
    assert_eq!(
        transport.gaps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test(start_paused = true)]
async fn retryable_failures_stop_after_four_attempts() {
    let transport = Arc::new(ScriptedTransport::statuses(&[503, 502, 500, 504, 200]));
    let start = Instant::now();
    let outcome = client(&transport, true).submit(&build()).await;

    assert_eq!(transport.attempts(), MAX_ATTEMPTS as usize);
    assert_eq!(transport.remaining(), 1);
    assert_eq!(
        transport.gaps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(start.elapsed(), Duration::from_secs(7));

    match outcome {
        SubmissionOutcome::Failed(SubmissionError::Server {
            status, attempts, ..
        }) => {
            assert_eq!(status, 504);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected server failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limiting_is_retried() {
    let transport = Arc::new(ScriptedTransport::statuses(&[429, 429, 429, 429]));
    let outcome = client(&transport, false).submit(&deployment()).await;

    assert_eq!(transport.attempts(), 4);
    match outcome {
        SubmissionOutcome::NotRecorded(placeholder) => {
            assert_eq!(placeholder.status, NOT_RECORDED_STATUS);
            assert_eq!(placeholder.http_status, Some(429));
        }
        other => panic!("expected not_recorded, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn transport_errors_are_retried() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Err(TransportError::Connect("connection refused".into())),
        Err(TransportError::Timeout(Duration::from_secs(30))),
        Ok(ApiResponse::new(201, json!({"id": "evt-9"}).to_string())),
    ]));
    let outcome = client(&transport, true).submit(&build()).await;

    assert!(outcome.is_recorded());
    assert_eq!(transport.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_transport_errors_report_attempts() {
    let transport = Arc::new(ScriptedTransport::new(
        (0..4)
            .map(|_| Err(TransportError::Connect("connection refused".into())))
            .collect(),
    ));
    let outcome = client(&transport, true).submit(&build()).await;

    match outcome {
        SubmissionOutcome::Failed(SubmissionError::Transport { attempts, source }) => {
            assert_eq!(attempts, 4);
            assert!(matches!(source, TransportError::Connect(_)));
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Client errors and soft-fail
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn client_error_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::statuses(&[404, 200]));
    let outcome = client(&transport, true).submit(&build()).await;

    assert_eq!(transport.attempts(), 1);
    match outcome {
        SubmissionOutcome::Failed(SubmissionError::Api { status, detail }) => {
            assert_eq!(status, 404);
            assert_eq!(detail, ErrorDetail::Message("HTTP 404".to_string()));
        }
        other => panic!("expected API failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn client_error_soft_fails_when_configured() {
    let transport = Arc::new(ScriptedTransport::statuses(&[404]));
    let outcome = client(&transport, false).submit(&build()).await;

    assert_eq!(transport.attempts(), 1);
    match outcome {
        SubmissionOutcome::NotRecorded(placeholder) => {
            assert_eq!(placeholder.status, "not_recorded");
            assert_eq!(placeholder.http_status, Some(404));
            assert!(placeholder.reason.contains("HTTP 404"));
        }
        other => panic!("expected not_recorded, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unauthorized_is_a_client_error() {
    let transport = Arc::new(ScriptedTransport::statuses(&[401]));
    let outcome = client(&transport, true).submit(&deployment()).await;
    assert_eq!(transport.attempts(), 1);
    assert!(matches!(
        outcome,
        SubmissionOutcome::Failed(SubmissionError::Api { status: 401, .. })
    ));
}

// ---------------------------------------------------------------------------
// Policy rejections
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn policy_rejections_are_final_regardless_of_soft_fail() {
    for (status, kind) in [
        (409, RejectionKind::Conflict),
        (423, RejectionKind::ScheduleBlock),
        (428, RejectionKind::PreconditionFailed),
    ] {
        for fail_on_api_error in [true, false] {
            let transport = Arc::new(ScriptedTransport::statuses(&[status, 200]));
            let outcome = client(&transport, fail_on_api_error)
                .submit(&deployment())
                .await;

            assert_eq!(transport.attempts(), 1, "HTTP {status} must not be retried");
            match outcome {
                SubmissionOutcome::Rejected(rejection) => {
                    assert_eq!(rejection.status, status);
                    assert_eq!(rejection.kind(), Some(kind));
                    assert_eq!(rejection.code.as_deref(), Some("FLOW_VIOLATION"));
                    assert_eq!(rejection.rule_name.as_deref(), Some("Scripted rule"));
                }
                other => panic!("expected rejection for {status}, got {other:?}"),
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn unstructured_rejection_body_is_kept_raw() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(ApiResponse::new(
        423,
        "maintenance window",
    ))]));
    let outcome = client(&transport, false).submit(&deployment()).await;

    match outcome {
        SubmissionOutcome::Rejected(rejection) => {
            assert!(!rejection.structured);
            assert_eq!(rejection.message, "maintenance window");
            assert_eq!(rejection.code, None);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rejection_after_retry_ends_the_loop() {
    let transport = Arc::new(ScriptedTransport::statuses(&[503, 409, 200]));
    let outcome = client(&transport, true).submit(&deployment()).await;

    assert_eq!(transport.attempts(), 2);
    assert!(matches!(outcome, SubmissionOutcome::Rejected(_)));
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn deadline_stops_before_backoff_would_cross_it() {
    let transport = Arc::new(ScriptedTransport::statuses(&[503, 503, 503, 503]));
    let config = ClientConfig::default().with_time_budget(Duration::from_millis(2500));
    let outcome = SubmissionClient::new(transport.clone(), config)
        .submit(&build())
        .await;

    assert_eq!(transport.attempts(), 2);
    let calls = transport.calls();
    assert_eq!(calls[1].timeout, Duration::from_millis(1500));
    match outcome {
        SubmissionOutcome::Failed(SubmissionError::DeadlineExceeded { attempts, last }) => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, SubmissionError::Server { status: 503, attempts: 2, .. }));
        }
        other => panic!("expected deadline failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn soft_failed_deadline_keeps_last_server_error() {
    let transport = Arc::new(ScriptedTransport::statuses(&[502, 502, 502, 502]));
    let config = ClientConfig::default()
        .with_time_budget(Duration::from_millis(800))
        .with_fail_on_api_error(false);
    let outcome = SubmissionClient::new(transport.clone(), config)
        .submit(&build())
        .await;

    assert_eq!(transport.attempts(), 1);
    match outcome {
        SubmissionOutcome::NotRecorded(placeholder) => {
            assert_eq!(placeholder.http_status, Some(502));
            assert!(placeholder.reason.contains("deadline exceeded"));
            assert!(placeholder.reason.contains("HTTP 502"));
        }
        other => panic!("expected not_recorded, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_caps_a_slow_attempt() {
    let transport = Arc::new(
        ScriptedTransport::statuses(&[200]).with_latency(Duration::from_secs(10)),
    );
    let config = ClientConfig::default().with_time_budget(Duration::from_secs(5));
    let outcome = SubmissionClient::new(transport.clone(), config.with_fail_on_api_error(false))
        .submit(&build())
        .await;

    assert_eq!(transport.attempts(), 1);
    assert_eq!(transport.calls()[0].timeout, Duration::from_secs(5));
    match outcome {
        SubmissionOutcome::NotRecorded(placeholder) => {
            assert_eq!(placeholder.http_status, None);
            assert!(placeholder.reason.contains("deadline exceeded"));
        }
        other => panic!("expected not_recorded, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn passed_deadline_sends_nothing() {
    let transport = Arc::new(ScriptedTransport::statuses(&[200]));
    let config = ClientConfig::default().with_deadline(Instant::now());
    let outcome = SubmissionClient::new(transport.clone(), config)
        .submit(&build())
        .await;

    assert_eq!(transport.attempts(), 0);
    assert!(matches!(
        outcome,
        SubmissionOutcome::Failed(SubmissionError::Transport { attempts: 0, .. })
    ));
}
