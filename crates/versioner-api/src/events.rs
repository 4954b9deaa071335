//! Event payloads and the receipts returned for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form metadata attached to an event.
pub type Metadata = Map<String, Value>;

/// Status carried by the placeholder result of a soft-failed submission.
pub const NOT_RECORDED_STATUS: &str = "not_recorded";

fn metadata_is_empty(metadata: &Option<Metadata>) -> bool {
    metadata.as_ref().map_or(true, Map::is_empty)
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Request payload for `POST /build-events/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub product_name: String,
    pub version: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoke_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_by_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "metadata_is_empty")]
    pub extra_metadata: Option<Metadata>,
}

/// Request payload for `POST /deployment-events/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub product_name: String,
    pub version: String,
    pub environment_name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoke_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_by_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_preflight_checks: bool,
    #[serde(default, skip_serializing_if = "metadata_is_empty")]
    pub extra_metadata: Option<Metadata>,
}

/// Which endpoint an event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Build,
    Deployment,
}

impl EventKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            EventKind::Build => "/build-events/",
            EventKind::Deployment => "/deployment-events/",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Build => "build",
            EventKind::Deployment => "deployment",
        }
    }

    /// Capitalised label for human-facing output.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Build => "Build",
            EventKind::Deployment => "Deployment",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Build(BuildEvent),
    Deployment(DeploymentEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Build(_) => EventKind::Build,
            Event::Deployment(_) => EventKind::Deployment,
        }
    }

    pub fn product_name(&self) -> &str {
        match self {
            Event::Build(e) => &e.product_name,
            Event::Deployment(e) => &e.product_name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Event::Build(e) => &e.version,
            Event::Deployment(e) => &e.version,
        }
    }

    pub fn status(&self) -> &str {
        match self {
            Event::Build(e) => &e.status,
            Event::Deployment(e) => &e.status,
        }
    }

    pub fn scm_sha(&self) -> Option<&str> {
        match self {
            Event::Build(e) => e.scm_sha.as_deref(),
            Event::Deployment(e) => e.scm_sha.as_deref(),
        }
    }

    /// Target environment; `None` for builds.
    pub fn environment_name(&self) -> Option<&str> {
        match self {
            Event::Build(_) => None,
            Event::Deployment(e) => Some(&e.environment_name),
        }
    }

    /// JSON request body.
    pub fn to_body(&self) -> serde_json::Result<Value> {
        match self {
            Event::Build(e) => serde_json::to_value(e),
            Event::Deployment(e) => serde_json::to_value(e),
        }
    }
}

impl From<BuildEvent> for Event {
    fn from(event: BuildEvent) -> Self {
        Event::Build(event)
    }
}

impl From<DeploymentEvent> for Event {
    fn from(event: DeploymentEvent) -> Self {
        Event::Deployment(event)
    }
}

/// Successful response body for either event kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventReceipt {
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub environment_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deployed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_event_omits_absent_fields() {
        let event = BuildEvent {
            product_name: "api".to_string(),
            version: "1.2.3".to_string(),
            status: "completed".to_string(),
            scm_sha: Some("abc".to_string()),
            extra_metadata: Some(Metadata::new()),
            ..Default::default()
        };
        let body = Event::from(event).to_body().unwrap();
        assert_eq!(
            body,
            json!({
                "product_name": "api",
                "version": "1.2.3",
                "status": "completed",
                "scm_sha": "abc"
            })
        );
    }

    #[test]
    fn deployment_event_serializes_preflight_bypass_only_when_set() {
        let mut event = DeploymentEvent {
            product_name: "api".to_string(),
            version: "1.2.3".to_string(),
            environment_name: "production".to_string(),
            status: "started".to_string(),
            ..Default::default()
        };
        let body = serde_json::to_value(&event).unwrap();
        assert!(body.get("skip_preflight_checks").is_none());

        event.skip_preflight_checks = true;
        let body = serde_json::to_value(&event).unwrap();
        assert_eq!(body["skip_preflight_checks"], json!(true));
        assert_eq!(body["environment_name"], json!("production"));
    }

    #[test]
    fn endpoints_per_kind() {
        assert_eq!(EventKind::Build.endpoint(), "/build-events/");
        assert_eq!(EventKind::Deployment.endpoint(), "/deployment-events/");
    }

    #[test]
    fn receipt_tolerates_missing_optional_fields() {
        let receipt: EventReceipt =
            serde_json::from_str(r#"{"id":"evt-1","status":"completed"}"#).unwrap();
        assert_eq!(receipt.id, "evt-1");
        assert_eq!(receipt.status.as_deref(), Some("completed"));
        assert_eq!(receipt.environment_id, None);
    }

    #[test]
    fn receipt_requires_id() {
        assert!(serde_json::from_str::<EventReceipt>(r#"{"status":"completed"}"#).is_err());
    }
}
