//! Event assembly: flags over configuration over detected values.
//!
//! Everything here runs before the network is touched. Missing required
//! fields, bad timestamps and bad metadata all fail with a [`TrackError`].

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use versioner_api::{BuildEvent, ClientConfig, DeploymentEvent, SubmissionClient};
use versioner_cicd::DetectedValues;

use crate::config::Settings;
use crate::error::{Result, TrackError};
use crate::metadata;
use crate::status;

/// Status used for builds when none is given.
pub const DEFAULT_BUILD_STATUS: &str = status::COMPLETED;

/// Status used for deployments when none is given; normalizes to `completed`.
pub const DEFAULT_DEPLOYMENT_STATUS: &str = "success";

/// Command-line values for a build event. `None` or empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub product: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
    pub source_system: Option<String>,
    pub build_number: Option<String>,
    pub scm_sha: Option<String>,
    pub scm_branch: Option<String>,
    pub scm_repository: Option<String>,
    pub build_url: Option<String>,
    pub invoke_id: Option<String>,
    pub built_by: Option<String>,
    pub built_by_email: Option<String>,
    pub built_by_name: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub extra_metadata: Option<String>,
}

/// Command-line values for a deployment event.
#[derive(Debug, Clone, Default)]
pub struct DeploymentOptions {
    pub product: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
    pub source_system: Option<String>,
    pub build_number: Option<String>,
    pub scm_sha: Option<String>,
    pub scm_repository: Option<String>,
    pub deploy_url: Option<String>,
    pub invoke_id: Option<String>,
    pub deployed_by: Option<String>,
    pub deployed_by_email: Option<String>,
    pub deployed_by_name: Option<String>,
    pub completed_at: Option<String>,
    pub extra_metadata: Option<String>,
    /// Deprecated; sent as `skip_preflight_checks`.
    pub skip_preflight_checks: bool,
}

/// Resolves one field across the three layers.
struct Layers<'a> {
    settings: &'a Settings,
}

impl Layers<'_> {
    fn pick(&self, flag: &Option<String>, key: &str, detected: Option<&str>) -> Option<String> {
        flag.as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| self.settings.get(key))
            .or(detected.filter(|v| !v.is_empty()))
            .map(str::to_string)
    }

    fn require(
        &self,
        flag: &Option<String>,
        key: &str,
        detected: Option<&str>,
        name: &'static str,
    ) -> Result<String> {
        self.pick(flag, key, detected)
            .ok_or(TrackError::MissingField(name))
    }

    fn status(&self, flag: &Option<String>, default: &str) -> String {
        let raw = self
            .pick(flag, "status", None)
            .unwrap_or_else(|| default.to_string());
        let normalized = status::normalize(&raw);
        if normalized.was_aliased {
            debug!(original = %raw, canonical = %normalized.value, "status normalized");
        }
        normalized.value
    }
}

fn parse_timestamp(field: &'static str, raw: &Option<String>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw.as_deref().filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| TrackError::InvalidTimestamp {
            field,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn resolve_metadata(
    raw: &Option<String>,
    detected: &DetectedValues,
) -> Result<Option<versioner_api::Metadata>> {
    let user = metadata::parse(raw.as_deref().unwrap_or_default())?;
    Ok(metadata::merge(
        metadata::from_detected(&detected.extra_metadata),
        user,
    ))
}

/// Assemble a build event.
pub fn build_event(
    opts: &BuildOptions,
    settings: &Settings,
    detected: &DetectedValues,
) -> Result<BuildEvent> {
    let layers = Layers { settings };
    let d = detected;

    let product_name = layers.require(&opts.product, "product", d.product.as_deref(), "product")?;
    let version = layers.require(&opts.version, "version", d.version.as_deref(), "version")?;

    Ok(BuildEvent {
        product_name,
        version,
        status: layers.status(&opts.status, DEFAULT_BUILD_STATUS),
        source_system: layers.pick(&opts.source_system, "source_system", Some(d.system.as_str())),
        build_number: layers.pick(&opts.build_number, "build_number", d.build_number.as_deref()),
        scm_sha: layers.pick(&opts.scm_sha, "scm_sha", d.scm_sha.as_deref()),
        scm_branch: layers.pick(&opts.scm_branch, "scm_branch", d.scm_branch.as_deref()),
        scm_repository: layers.pick(&opts.scm_repository, "scm_repository", d.scm_repository.as_deref()),
        build_url: layers.pick(&opts.build_url, "build_url", d.build_url.as_deref()),
        invoke_id: layers.pick(&opts.invoke_id, "invoke_id", d.invoke_id.as_deref()),
        built_by: layers.pick(&opts.built_by, "built_by", d.built_by.as_deref()),
        built_by_email: layers.pick(&opts.built_by_email, "built_by_email", d.built_by_email.as_deref()),
        built_by_name: layers.pick(&opts.built_by_name, "built_by_name", d.built_by_name.as_deref()),
        started_at: parse_timestamp("started-at", &opts.started_at)?,
        completed_at: parse_timestamp("completed-at", &opts.completed_at)?,
        extra_metadata: resolve_metadata(&opts.extra_metadata, detected)?,
    })
}

/// Assemble a deployment event.
///
/// The environment is never auto-detected. Deploy URL and actor fields
/// fall back to the detected build URL and build actor.
pub fn deployment_event(
    opts: &DeploymentOptions,
    settings: &Settings,
    detected: &DetectedValues,
) -> Result<DeploymentEvent> {
    let layers = Layers { settings };
    let d = detected;

    let product_name = layers.require(&opts.product, "product", d.product.as_deref(), "product")?;
    let environment_name = layers.require(&opts.environment, "environment", None, "environment")?;
    let version = layers.require(&opts.version, "version", d.version.as_deref(), "version")?;

    if opts.skip_preflight_checks {
        warn!(
            "--skip-preflight-checks is deprecated; use server-side rule status control \
             (disabled/report_only/enabled) instead. This flag will be removed in a future version"
        );
    }

    Ok(DeploymentEvent {
        product_name,
        version,
        environment_name,
        status: layers.status(&opts.status, DEFAULT_DEPLOYMENT_STATUS),
        source_system: layers.pick(&opts.source_system, "source_system", Some(d.system.as_str())),
        build_number: layers.pick(&opts.build_number, "build_number", d.build_number.as_deref()),
        scm_sha: layers.pick(&opts.scm_sha, "scm_sha", d.scm_sha.as_deref()),
        scm_repository: layers.pick(&opts.scm_repository, "scm_repository", d.scm_repository.as_deref()),
        deploy_url: layers.pick(&opts.deploy_url, "deploy_url", d.build_url.as_deref()),
        invoke_id: layers.pick(&opts.invoke_id, "invoke_id", d.invoke_id.as_deref()),
        deployed_by: layers.pick(&opts.deployed_by, "deployed_by", d.built_by.as_deref()),
        deployed_by_email: layers.pick(&opts.deployed_by_email, "deployed_by_email", d.built_by_email.as_deref()),
        deployed_by_name: layers.pick(&opts.deployed_by_name, "deployed_by_name", d.built_by_name.as_deref()),
        completed_at: parse_timestamp("completed-at", &opts.completed_at)?,
        skip_preflight_checks: opts.skip_preflight_checks,
        extra_metadata: resolve_metadata(&opts.extra_metadata, detected)?,
    })
}

/// Connection settings for the API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub api_url: String,
    pub api_key: String,
    pub ui_url: Option<String>,
    pub fail_on_api_error: bool,
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("ui_url", &self.ui_url)
            .field("fail_on_api_error", &self.fail_on_api_error)
            .finish()
    }
}

impl ApiSettings {
    /// Resolve from configuration. `fail_flag` is the command-line value,
    /// which beats the configured one; the default is `true`.
    pub fn resolve(settings: &Settings, fail_flag: Option<bool>) -> Result<Self> {
        let api_key = settings
            .api_key()
            .ok_or(TrackError::MissingApiKey)?
            .to_string();
        let fail_on_api_error = match fail_flag {
            Some(fail) => fail,
            None => settings.fail_on_api_error()?.unwrap_or(true),
        };

        Ok(ApiSettings {
            api_url: settings.api_url().to_string(),
            api_key,
            ui_url: settings.ui_url().map(str::to_string),
            fail_on_api_error,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default().with_fail_on_api_error(self.fail_on_api_error)
    }

    /// HTTP-backed submission client.
    ///
    /// Failing to build the HTTP client is a local setup error, like a
    /// missing API key: it is returned as [`TrackError::Client`] and is not
    /// subject to `fail_on_api_error`, which only governs API and network
    /// failures during submission.
    pub fn connect(&self) -> Result<SubmissionClient> {
        Ok(SubmissionClient::http(
            &self.api_url,
            &self.api_key,
            self.client_config(),
        )?)
    }
}
