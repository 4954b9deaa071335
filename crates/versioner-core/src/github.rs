//! GitHub Actions integration: error annotations and job summaries.
//!
//! Active only when `GITHUB_ACTIONS=true`. Workflow commands go to the
//! given writer (stdout in the binary); Markdown summaries are appended to
//! `$GITHUB_STEP_SUMMARY`. Write failures are logged and otherwise ignored.

use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use versioner_api::{Event, EventKind, EventReceipt, PolicyRejection};
use versioner_cicd::EnvReader;

/// Escape a workflow-command message.
pub fn escape_workflow_command(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// `::error title=<title>::<message>`
pub fn workflow_error(title: &str, message: &str) -> String {
    format!("::error title={title}::{}", escape_workflow_command(message))
}

/// Broad class of a non-policy failure, shown in the summary heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Api,
    Network,
}

impl FailureClass {
    pub fn label(self) -> &'static str {
        match self {
            FailureClass::Api => "API Error",
            FailureClass::Network => "Network Error",
        }
    }
}

/// Annotation title for a policy rejection.
pub fn rejection_title(rejection: &PolicyRejection) -> String {
    let code = rejection.code.as_deref();
    let rule = rejection.rule_name.as_deref();
    match (rejection.status, code, rule) {
        (409, _, _) => "Deployment Conflict".to_string(),
        (423, _, Some(rule)) => format!("Deployment Blocked: {rule}"),
        (423, _, None) => "Deployment Blocked by Schedule".to_string(),
        (428, Some(code), Some(rule)) => format!("{code}: {rule}"),
        (428, Some(code), None) => code.to_string(),
        (428, None, _) => "Deployment Precondition Failed".to_string(),
        _ => "Deployment Rejected".to_string(),
    }
}

/// Markdown job summary for a policy rejection.
pub fn rejection_summary(rejection: &PolicyRejection) -> String {
    let retry_after = rejection.retry_after.as_deref();
    let mut md = String::from("## ❌ Versioner Deployment Rejected\n\n");

    match rejection.status {
        409 => md.push_str("### ⚠️ Deployment Conflict\n\n"),
        423 => md.push_str("### 🔒 Deployment Blocked by Schedule\n\n"),
        428 => md.push_str("### ❌ Deployment Precondition Failed\n\n"),
        _ => {}
    }

    if let Some(code) = &rejection.code {
        md.push_str(&format!("- **Error Code:** `{code}`\n"));
    }
    if let Some(rule) = &rejection.rule_name {
        md.push_str(&format!("- **Rule:** {rule}\n"));
    }
    md.push_str(&format!("- **Message:** {}\n", rejection.message));
    if let Some(retry_after) = retry_after {
        md.push_str(&format!("- **Retry After:** `{retry_after}`\n"));
    }

    md.push_str("\n**Action Required:**\n");
    match (rejection.status, rejection.code.as_deref()) {
        (409, _) => {
            md.push_str("- Wait for the current deployment to complete\n");
            md.push_str("- Retry this deployment\n");
        }
        (423, _) => {
            if let Some(retry_after) = retry_after {
                md.push_str(&format!("- Wait until `{retry_after}`\n"));
                md.push_str("- Retry automatically after the no-deploy window\n");
            }
            md.push_str("- Or use `--skip-preflight-checks` for emergencies\n");
        }
        (428, Some("FLOW_VIOLATION")) => {
            md.push_str("- Deploy to required environments first\n");
            md.push_str("- Then retry this deployment\n");
        }
        (428, Some("INSUFFICIENT_SOAK_TIME")) => {
            md.push_str("- Wait for the soak time requirement to be met\n");
            if let Some(retry_after) = retry_after {
                md.push_str(&format!("- Can deploy at: `{retry_after}`\n"));
            }
            md.push_str("- Or use `--skip-preflight-checks` for emergencies\n");
        }
        (428, Some("QUALITY_APPROVAL_REQUIRED" | "APPROVAL_REQUIRED")) => {
            md.push_str("- Obtain required approval via Versioner UI\n");
            md.push_str("- Then retry this deployment\n");
        }
        _ => {
            md.push_str("- Resolve the issue described above\n");
            md.push_str("- Then retry this deployment\n");
            md.push_str("- Or use `--skip-preflight-checks` for emergencies\n");
        }
    }

    if !rejection.details.is_empty() {
        let details = serde_json::to_string_pretty(&Value::Object(rejection.details.clone()))
            .unwrap_or_default();
        md.push_str(&format!("\n**Details:**\n```json\n{details}\n```\n"));
    }
    md
}

/// Markdown job summary for a non-policy failure.
pub fn failure_summary(kind: EventKind, class: FailureClass, message: &str) -> String {
    let mut md = format!("## ❌ Versioner {} Failed\n\n", kind.label());
    md.push_str(&format!("### {}\n\n", class.label()));
    md.push_str(&format!("**Error:** {message}\n\n"));

    md.push_str("**Possible Causes:**\n");
    let causes: &[&str] = match class {
        FailureClass::Api => &[
            "Invalid API key or authentication failure",
            "Validation error (check required fields)",
            "API service unavailable",
            "Rate limiting or quota exceeded",
        ],
        FailureClass::Network => &[
            "Network connectivity issues",
            "DNS resolution failure",
            "API endpoint unreachable",
            "Timeout or connection refused",
        ],
    };
    for cause in causes {
        md.push_str(&format!("- {cause}\n"));
    }

    md.push_str("\n**Action Required:**\n");
    md.push_str("- Verify your `VERSIONER_API_KEY` is set correctly\n");
    md.push_str("- Check network connectivity to Versioner API\n");
    md.push_str("- Review error message for specific guidance\n");
    md.push_str("- Contact support if issue persists\n");
    md
}

fn decorate_status(status: &str) -> String {
    let icon = match status {
        "started" | "in_progress" => "⏳",
        "completed" | "success" => "✅",
        "failed" => "❌",
        "aborted" | "cancelled" => "🚫",
        "pending" => "⏸️",
        _ => return status.to_string(),
    };
    format!("{icon} {status}")
}

/// Markdown job summary for a recorded event.
pub fn success_summary(event: &Event, receipt: &EventReceipt, ui_url: Option<&str>) -> String {
    let kind = event.kind();
    let mut md = String::from("## 🚀 Versioner Summary\n\n");
    md.push_str(&format!("- **Action:** {}\n", kind.label()));
    if let Some(environment) = event.environment_name().filter(|e| !e.is_empty()) {
        md.push_str(&format!("- **Environment:** {environment}\n"));
    }
    md.push_str(&format!("- **Status:** {}\n", decorate_status(event.status())));
    md.push_str(&format!("- **Version:** `{}`\n", event.version()));
    if let Some(sha) = event.scm_sha() {
        md.push_str(&format!("- **Git SHA:** `{sha}`\n"));
    }

    if let Some(ui_url) = ui_url.filter(|u| !u.is_empty() && !receipt.id.is_empty()) {
        let page = match kind {
            EventKind::Deployment => "deployments",
            EventKind::Build => "versions",
        };
        md.push_str(&format!(
            "\n[View in Versioner →]({ui_url}/manage/{page}?view={})\n",
            receipt.id
        ));
    }
    md
}

/// Reporter bound to a GitHub Actions run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubActions {
    summary_path: Option<PathBuf>,
}

impl GitHubActions {
    /// `Some` only when running under GitHub Actions.
    pub fn detect(env: &dyn EnvReader) -> Option<Self> {
        if !env.equals("GITHUB_ACTIONS", "true") {
            return None;
        }
        Some(Self {
            summary_path: env.non_empty("GITHUB_STEP_SUMMARY").map(PathBuf::from),
        })
    }

    pub fn summary_path(&self) -> Option<&Path> {
        self.summary_path.as_deref()
    }

    pub fn report_rejection(&self, out: &mut dyn Write, rejection: &PolicyRejection) {
        let line = workflow_error(&rejection_title(rejection), &rejection.message);
        if let Err(e) = writeln!(out, "{line}") {
            debug!(error = %e, "failed to write workflow command");
        }
        self.append_summary(&rejection_summary(rejection));
    }

    /// Annotation plus summary; skipped entirely without a summary file.
    pub fn report_failure(
        &self,
        out: &mut dyn Write,
        kind: EventKind,
        class: FailureClass,
        message: &str,
    ) {
        if self.summary_path.is_none() {
            return;
        }
        let title = format!("Versioner {} Failed", kind.label());
        if let Err(e) = writeln!(out, "{}", workflow_error(&title, message)) {
            debug!(error = %e, "failed to write workflow command");
        }
        self.append_summary(&failure_summary(kind, class, message));
    }

    pub fn report_success(&self, event: &Event, receipt: &EventReceipt, ui_url: Option<&str>) {
        self.append_summary(&success_summary(event, receipt, ui_url));
    }

    fn append_summary(&self, markdown: &str) {
        let Some(path) = &self.summary_path else {
            return;
        };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(markdown.as_bytes()));
        if let Err(e) = written {
            debug!(path = %path.display(), error = %e, "failed to write job summary");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use versioner_api::{BuildEvent, DeploymentEvent};
    use versioner_cicd::EnvSnapshot;

    fn rejection(status: u16, code: Option<&str>, rule: Option<&str>) -> PolicyRejection {
        let mut detail = json!({"message": "blocked"});
        if let Some(code) = code {
            detail["code"] = json!(code);
        }
        if let Some(rule) = rule {
            detail["details"] = json!({"rule_name": rule});
        }
        PolicyRejection::from_response(status, &json!({"detail": detail}).to_string())
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_workflow_command("50%\r\nnext"), "50%25%0D%0Anext");
        assert_eq!(
            workflow_error("T", "a\nb"),
            "::error title=T::a%0Ab"
        );
    }

    #[test]
    fn titles_per_status() {
        assert_eq!(rejection_title(&rejection(409, None, None)), "Deployment Conflict");
        assert_eq!(
            rejection_title(&rejection(423, None, Some("Freeze"))),
            "Deployment Blocked: Freeze"
        );
        assert_eq!(
            rejection_title(&rejection(423, None, None)),
            "Deployment Blocked by Schedule"
        );
        assert_eq!(
            rejection_title(&rejection(428, Some("FLOW_VIOLATION"), Some("Staging first"))),
            "FLOW_VIOLATION: Staging first"
        );
        assert_eq!(
            rejection_title(&rejection(428, Some("APPROVAL_REQUIRED"), None)),
            "APPROVAL_REQUIRED"
        );
    }

    #[test]
    fn rejection_summary_guidance() {
        let md = rejection_summary(&rejection(428, Some("FLOW_VIOLATION"), Some("Staging first")));
        assert!(md.contains("### ❌ Deployment Precondition Failed"));
        assert!(md.contains("- **Error Code:** `FLOW_VIOLATION`"));
        assert!(md.contains("- **Rule:** Staging first"));
        assert!(md.contains("Deploy to required environments first"));
        assert!(md.contains("```json\n{\n  \"rule_name\": \"Staging first\"\n}\n```"));

        let md = rejection_summary(&rejection(409, None, None));
        assert!(md.contains("Wait for the current deployment to complete"));
        assert!(!md.contains("**Details:**"));
    }

    #[test]
    fn success_summary_links_to_ui() {
        let event = Event::Deployment(DeploymentEvent {
            product_name: "api".into(),
            version: "1.2.3".into(),
            environment_name: "production".into(),
            status: "completed".into(),
            scm_sha: Some("abc123".into()),
            ..Default::default()
        });
        let receipt = EventReceipt {
            id: "dep-1".into(),
            ..Default::default()
        };
        let md = success_summary(&event, &receipt, Some("https://app.versioner.io"));
        assert!(md.contains("- **Environment:** production"));
        assert!(md.contains("- **Status:** ✅ completed"));
        assert!(md.contains("https://app.versioner.io/manage/deployments?view=dep-1"));

        let build = Event::Build(BuildEvent {
            product_name: "api".into(),
            version: "1.2.3".into(),
            status: "started".into(),
            ..Default::default()
        });
        let md = success_summary(&build, &receipt, Some("https://app.versioner.io"));
        assert!(md.contains("/manage/versions?view=dep-1"));
        assert!(!md.contains("Environment"));

        let md = success_summary(&build, &receipt, None);
        assert!(!md.contains("View in Versioner"));
    }

    #[test]
    fn inactive_outside_github_actions() {
        assert!(GitHubActions::detect(&EnvSnapshot::new()).is_none());
        assert!(GitHubActions::detect(&EnvSnapshot::new().with("GITHUB_ACTIONS", "1")).is_none());
    }

    #[test]
    fn rejection_writes_annotation_and_appends_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        std::fs::write(&path, "previous\n").unwrap();

        let env = EnvSnapshot::new()
            .with("GITHUB_ACTIONS", "true")
            .with("GITHUB_STEP_SUMMARY", path.to_string_lossy());
        let gha = GitHubActions::detect(&env).unwrap();

        let mut out = Vec::new();
        gha.report_rejection(&mut out, &rejection(423, None, Some("Weekend freeze")));

        let stdout = String::from_utf8(out).unwrap();
        assert_eq!(stdout, "::error title=Deployment Blocked: Weekend freeze::blocked\n");
        let summary = std::fs::read_to_string(&path).unwrap();
        assert!(summary.starts_with("previous\n## ❌ Versioner Deployment Rejected"));
    }

    #[test]
    fn failure_needs_summary_file() {
        let env = EnvSnapshot::new().with("GITHUB_ACTIONS", "true");
        let gha = GitHubActions::detect(&env).unwrap();
        let mut out = Vec::new();
        gha.report_failure(&mut out, EventKind::Build, FailureClass::Network, "refused");
        assert!(out.is_empty());
    }

    #[test]
    fn unwritable_summary_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvSnapshot::new()
            .with("GITHUB_ACTIONS", "true")
            .with("GITHUB_STEP_SUMMARY", dir.path().to_string_lossy());
        let gha = GitHubActions::detect(&env).unwrap();

        let mut out = Vec::new();
        gha.report_failure(&mut out, EventKind::Deployment, FailureClass::Api, "HTTP 401");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "::error title=Versioner Deployment Failed::HTTP 401\n"
        );
    }
}
