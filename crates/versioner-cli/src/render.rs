//! Human-facing output for submission outcomes and the exit code each maps to.

use std::io::{self, Write};
use std::process::ExitCode;

use versioner_core::api::{
    Event, EventKind, PolicyRejection, SubmissionError, SubmissionOutcome,
};
use versioner_core::{FailureClass, GitHubActions};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Recorded, or not recorded with soft-fail on.
    Success = 0,
    /// Local validation, network exhaustion, undecodable response.
    General = 1,
    /// Non-policy HTTP error from the API.
    ApiError = 4,
    /// Refused by a deployment policy.
    PolicyRejection = 5,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

impl Exit {
    pub fn for_outcome(outcome: &SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::Recorded(_) | SubmissionOutcome::NotRecorded(_) => Exit::Success,
            SubmissionOutcome::Rejected(_) => Exit::PolicyRejection,
            SubmissionOutcome::Failed(err) if err.is_api_error() => Exit::ApiError,
            SubmissionOutcome::Failed(_) => Exit::General,
        }
    }
}

/// Where and how to render.
pub struct Renderer<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
    pub verbose: bool,
    pub github: Option<&'a GitHubActions>,
    pub ui_url: Option<&'a str>,
}

impl Renderer<'_> {
    /// Print `outcome` for `event` and return the exit code.
    pub fn outcome(&mut self, event: &Event, outcome: &SubmissionOutcome) -> io::Result<Exit> {
        let kind = event.kind();
        match outcome {
            SubmissionOutcome::Recorded(receipt) => {
                writeln!(self.out, "✓ {} event tracked successfully", kind.label())?;
                writeln!(self.out, "  Event ID: {}", receipt.id)?;
                if self.verbose {
                    let ids = [
                        ("Product ID", &receipt.product_id),
                        ("Version ID", &receipt.version_id),
                        ("Environment ID", &receipt.environment_id),
                    ];
                    for (label, id) in ids {
                        if let Some(id) = id {
                            writeln!(self.out, "  {label}: {id}")?;
                        }
                    }
                }
                if let Some(github) = self.github {
                    github.report_success(event, receipt, self.ui_url);
                }
            }
            SubmissionOutcome::NotRecorded(placeholder) => {
                writeln!(
                    self.err,
                    "⚠️  Warning: {} event was not recorded: {}",
                    kind.label(),
                    placeholder.reason
                )?;
                writeln!(
                    self.err,
                    "   Continuing because fail_on_api_error is disabled."
                )?;
                writeln!(self.out, "{} event status: {}", kind.label(), placeholder.status)?;
            }
            SubmissionOutcome::Rejected(rejection) => {
                if let Some(github) = self.github {
                    github.report_rejection(self.out, rejection);
                }
                self.rejection(kind, rejection)?;
            }
            SubmissionOutcome::Failed(error) => self.failure(kind, error)?,
        }
        Ok(Exit::for_outcome(outcome))
    }

    fn failure(&mut self, kind: EventKind, error: &SubmissionError) -> io::Result<()> {
        let class = if error.is_api_error() {
            FailureClass::Api
        } else {
            FailureClass::Network
        };
        let message = error.to_string();
        if let Some(github) = self.github {
            github.report_failure(self.out, kind, class, &message);
        }
        match class {
            FailureClass::Api => writeln!(self.err, "API error: {message}"),
            FailureClass::Network => writeln!(self.err, "Error: {message}"),
        }
    }

    /// Operator guidance for a policy rejection.
    pub fn rejection(&mut self, kind: EventKind, rejection: &PolicyRejection) -> io::Result<()> {
        let err = &mut *self.err;
        if !rejection.structured {
            writeln!(err, "❌ {} Failed (HTTP {})\n", kind.label(), rejection.status)?;
            return writeln!(err, "{}", rejection.message);
        }

        let retry_after = rejection.retry_after.as_deref();
        let rule = rejection.rule_name.as_deref();
        let skip_hint = "\nTo skip checks (emergency only), add:\n  --skip-preflight-checks";

        match rejection.status {
            409 => {
                writeln!(err, "⚠️  Deployment Conflict\n")?;
                writeln!(err, "{}", rejection.message)?;
                writeln!(err, "Another deployment is in progress. Please wait and retry.")?;
            }
            423 => {
                writeln!(err, "🔒 Deployment Blocked by Schedule\n")?;
                if let Some(rule) = rule {
                    writeln!(err, "Rule: {rule}")?;
                }
                writeln!(err, "{}", rejection.message)?;
                if let Some(retry_after) = retry_after {
                    writeln!(err, "\nRetry after: {retry_after}")?;
                }
                writeln!(err, "{skip_hint}")?;
            }
            _ => {
                writeln!(err, "❌ Deployment Precondition Failed\n")?;
                writeln!(err, "Error: {}", rejection.code.as_deref().unwrap_or("unknown"))?;
                if let Some(rule) = rule {
                    writeln!(err, "Rule: {rule}")?;
                }
                writeln!(err, "{}", rejection.message)?;

                match rejection.code.as_deref() {
                    Some("FLOW_VIOLATION") => {
                        writeln!(err, "\nDeploy to required environments first, then retry.")?;
                    }
                    Some("INSUFFICIENT_SOAK_TIME") => {
                        if let Some(retry_after) = retry_after {
                            writeln!(err, "\nRetry after: {retry_after}")?;
                        }
                        writeln!(err, "\nWait for soak time to complete, then retry.")?;
                        writeln!(err, "{skip_hint}")?;
                    }
                    Some("QUALITY_APPROVAL_REQUIRED" | "APPROVAL_REQUIRED") => {
                        writeln!(err, "\nApproval required before deployment can proceed.")?;
                        writeln!(err, "Obtain approval via Versioner UI, then retry.")?;
                    }
                    _ => {
                        if let Some(retry_after) = retry_after {
                            writeln!(err, "\nRetry after: {retry_after}")?;
                        }
                        writeln!(err, "\nResolve the issue described above, then retry.")?;
                        writeln!(err, "{skip_hint}")?;
                    }
                }
            }
        }

        if !rejection.details.is_empty() {
            let details =
                serde_json::to_string_pretty(&rejection.details).unwrap_or_default();
            writeln!(err, "\nDetails:")?;
            for line in details.lines() {
                writeln!(err, "  {line}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use versioner_core::api::{
        BuildEvent, DeploymentEvent, ErrorDetail, EventReceipt, NotRecorded, TransportError,
    };

    fn deployment() -> Event {
        Event::Deployment(DeploymentEvent {
            product_name: "api".into(),
            version: "1.0.0".into(),
            environment_name: "production".into(),
            status: "started".into(),
            ..Default::default()
        })
    }

    fn render(event: &Event, outcome: &SubmissionOutcome, verbose: bool) -> (Exit, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let exit = Renderer {
            out: &mut out,
            err: &mut err,
            verbose,
            github: None,
            ui_url: None,
        }
        .outcome(event, outcome)
        .unwrap();
        (
            exit,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn rejected(status: u16, detail: serde_json::Value) -> SubmissionOutcome {
        SubmissionOutcome::Rejected(PolicyRejection::from_response(
            status,
            &json!({ "detail": detail }).to_string(),
        ))
    }

    #[test]
    fn recorded_prints_event_id() {
        let receipt = EventReceipt {
            id: "evt-1".into(),
            product_id: Some("prod-1".into()),
            ..Default::default()
        };
        let event = Event::Build(BuildEvent::default());
        let (exit, out, _) = render(&event, &SubmissionOutcome::Recorded(receipt.clone()), false);
        assert_eq!(exit, Exit::Success);
        assert_eq!(out, "✓ Build event tracked successfully\n  Event ID: evt-1\n");

        let (_, out, _) = render(&event, &SubmissionOutcome::Recorded(receipt), true);
        assert!(out.contains("  Product ID: prod-1"));
        assert!(!out.contains("Environment ID"));
    }

    #[test]
    fn not_recorded_exits_zero_with_warning() {
        let outcome = SubmissionOutcome::NotRecorded(NotRecorded {
            status: "not_recorded".into(),
            reason: "API error (HTTP 401): Unauthorized".into(),
            http_status: Some(401),
        });
        let (exit, out, err) = render(&deployment(), &outcome, false);
        assert_eq!(exit, Exit::Success);
        assert!(err.contains("was not recorded: API error (HTTP 401): Unauthorized"));
        assert_eq!(out, "Deployment event status: not_recorded\n");
    }

    #[test]
    fn failures_map_to_exit_codes() {
        let api = SubmissionOutcome::Failed(SubmissionError::Api {
            status: 422,
            detail: ErrorDetail::Message("bad".into()),
        });
        let (exit, _, err) = render(&deployment(), &api, false);
        assert_eq!(exit, Exit::ApiError);
        assert_eq!(err, "API error: API error (HTTP 422): bad\n");

        let server = SubmissionOutcome::Failed(SubmissionError::Server {
            status: 503,
            attempts: 4,
            detail: ErrorDetail::Raw(String::new()),
        });
        assert_eq!(Exit::for_outcome(&server), Exit::ApiError);

        let network = SubmissionOutcome::Failed(SubmissionError::Transport {
            attempts: 4,
            source: TransportError::Connect("refused".into()),
        });
        let (exit, _, err) = render(&deployment(), &network, false);
        assert_eq!(exit, Exit::General);
        assert!(err.starts_with("Error: request failed after 4 attempt(s)"));

        let decode = SubmissionOutcome::Failed(SubmissionError::Decode {
            status: 200,
            message: "expected value".into(),
        });
        assert_eq!(Exit::for_outcome(&decode), Exit::General);
    }

    #[test]
    fn conflict_guidance() {
        let outcome = rejected(409, json!({"code": "CONCURRENT_DEPLOYMENT", "message": "busy"}));
        let (exit, out, err) = render(&deployment(), &outcome, false);
        assert_eq!(exit, Exit::PolicyRejection);
        assert!(out.is_empty());
        assert!(err.starts_with("⚠️  Deployment Conflict\n\nbusy\n"));
        assert!(err.contains("Please wait and retry."));
    }

    #[test]
    fn schedule_block_shows_rule_and_retry_after() {
        let outcome = rejected(
            423,
            json!({
                "code": "NO_DEPLOY_WINDOW",
                "message": "Weekend freeze is active",
                "retry_after": "2025-06-02T08:00:00Z",
                "details": {"rule_name": "Weekend freeze"}
            }),
        );
        let (_, _, err) = render(&deployment(), &outcome, false);
        assert!(err.contains("Rule: Weekend freeze\n"));
        assert!(err.contains("Retry after: 2025-06-02T08:00:00Z"));
        assert!(err.contains("--skip-preflight-checks"));
        assert!(err.contains("Details:\n  {\n    \"rule_name\": \"Weekend freeze\"\n  }\n"));
    }

    #[test]
    fn precondition_guidance_per_code() {
        let cases = [
            ("FLOW_VIOLATION", "Deploy to required environments first"),
            ("INSUFFICIENT_SOAK_TIME", "Wait for soak time to complete"),
            ("QUALITY_APPROVAL_REQUIRED", "Obtain approval via Versioner UI"),
            ("APPROVAL_REQUIRED", "Obtain approval via Versioner UI"),
            ("SOMETHING_NEW", "Resolve the issue described above"),
        ];
        for (code, hint) in cases {
            let outcome = rejected(428, json!({"code": code, "message": "no"}));
            let (exit, _, err) = render(&deployment(), &outcome, false);
            assert_eq!(exit, Exit::PolicyRejection);
            assert!(err.contains(&format!("Error: {code}\n")), "{code}");
            assert!(err.contains(hint), "{code}: {err}");
        }
    }

    #[test]
    fn unstructured_rejection_prints_raw_body() {
        let outcome = SubmissionOutcome::Rejected(PolicyRejection::from_response(
            428,
            "precondition required",
        ));
        let (exit, _, err) = render(&deployment(), &outcome, false);
        assert_eq!(exit, Exit::PolicyRejection);
        assert_eq!(
            err,
            "❌ Deployment Failed (HTTP 428)\n\nprecondition required\n"
        );
    }

    #[test]
    fn exit_code_values() {
        assert_eq!(Exit::Success as u8, 0);
        assert_eq!(Exit::General as u8, 1);
        assert_eq!(Exit::ApiError as u8, 4);
        assert_eq!(Exit::PolicyRejection as u8, 5);
    }
}
