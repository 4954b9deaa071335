//! Extraction of event fields from a detected CI/CD environment.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::env::EnvReader;
use crate::profile::{BuildUrl, ProductFallback, Profile, Repository, VersionFallback};
use crate::system::{detect_system, System};

/// Length of the commit-SHA prefix used as a version fallback.
pub const SHORT_SHA_LEN: usize = 8;

/// Values inferred from the CI/CD environment in one detection pass.
///
/// Fields that could not be derived are `None`; an empty environment
/// variable is never turned into `Some("")`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectedValues {
    pub system: System,
    pub product: Option<String>,
    pub version: Option<String>,
    pub scm_repository: Option<String>,
    pub scm_sha: Option<String>,
    pub scm_branch: Option<String>,
    pub build_number: Option<String>,
    pub build_url: Option<String>,
    pub invoke_id: Option<String>,
    pub built_by: Option<String>,
    pub built_by_email: Option<String>,
    pub built_by_name: Option<String>,
    /// System-specific `vi_*` metadata. Only variables that were non-empty
    /// appear; empty for [`System::Unknown`].
    pub extra_metadata: BTreeMap<String, String>,
}

/// Identify the CI/CD system and extract its values from `env`.
pub fn detect(env: &dyn EnvReader) -> DetectedValues {
    let system = detect_system(env);
    let detected = match system.profile() {
        Some(profile) => extract(system, profile, env),
        None => DetectedValues::default(),
    };

    debug!(
        system = %detected.system,
        product = ?detected.product,
        version = ?detected.version,
        metadata_keys = detected.extra_metadata.len(),
        "CI/CD environment detected"
    );
    detected
}

/// Build the `vi_*` metadata bag for `system` from `env`.
pub fn extra_metadata(system: System, env: &dyn EnvReader) -> BTreeMap<String, String> {
    system
        .profile()
        .map(|profile| {
            profile
                .metadata
                .iter()
                .filter_map(|(key, var)| env.non_empty(var).map(|v| (key.to_string(), v)))
                .collect()
        })
        .unwrap_or_default()
}

fn extract(system: System, profile: &Profile, env: &dyn EnvReader) -> DetectedValues {
    let scm_repository = match profile.repository {
        Repository::Var(var) => env.non_empty(var),
        Repository::GitUrl(var) => env
            .non_empty(var)
            .map(|url| normalize_git_url(&url))
            .filter(|repo| !repo.is_empty()),
        Repository::Split { owner, name } => match (env.non_empty(owner), env.non_empty(name)) {
            (Some(owner), Some(name)) => Some(format!("{owner}/{name}")),
            _ => None,
        },
        Repository::Absent => None,
    };

    let scm_sha = env.first_non_empty(profile.sha);

    let build_url = match &profile.build_url {
        BuildUrl::Var(var) => env.non_empty(var),
        BuildUrl::Template { vars, render } => vars
            .iter()
            .map(|var| env.non_empty(var))
            .collect::<Option<Vec<_>>>()
            .map(|parts| render(&parts)),
    };

    let product = match profile.product {
        ProductFallback::RepositoryName => scm_repository.as_deref().and_then(repository_name),
        ProductFallback::Var(var) => env.non_empty(var),
    };

    let version = match profile.version {
        VersionFallback::ShortSha => scm_sha.as_deref().map(short_sha),
        VersionFallback::Var(var) => env.non_empty(var),
    };

    DetectedValues {
        system,
        product,
        version,
        scm_repository,
        scm_sha,
        scm_branch: env.first_non_empty(profile.branch),
        build_number: env.first_non_empty(profile.build_number),
        build_url,
        invoke_id: env.first_non_empty(profile.invoke_id),
        built_by: env.first_non_empty(profile.built_by),
        built_by_email: env.first_non_empty(profile.built_by_email),
        built_by_name: env.first_non_empty(profile.built_by_name),
        extra_metadata: extra_metadata(system, env),
    }
}

/// Last path segment of a repository identifier, without a `.git` suffix.
fn repository_name(repository: &str) -> Option<String> {
    repository
        .rsplit('/')
        .next()
        .map(|name| name.trim_end_matches(".git"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// First [`SHORT_SHA_LEN`] characters of `sha` (all of it if shorter).
pub fn short_sha(sha: &str) -> String {
    sha.chars().take(SHORT_SHA_LEN).collect()
}

/// Reduce a Git remote URL to `host/owner/repo`.
///
/// Strips `https://`, `http://` and `git@` prefixes and a trailing `.git`,
/// then turns the first `:` (the SSH `host:owner/repo` separator) into `/`.
pub fn normalize_git_url(url: &str) -> String {
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let url = url.strip_prefix("git@").unwrap_or(url);
    let url = url.strip_suffix(".git").unwrap_or(url);
    url.replacen(':', "/", 1)
}
