//! Layered configuration: `VERSIONER_<KEY>` environment variables over a
//! YAML config file.
//!
//! Command-line flags sit above both layers and are applied by the caller
//! (see [`crate::track`]).

use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use versioner_cicd::EnvReader;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://api.versioner.io";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "VERSIONER_";

/// Every key understood in the config file and as `VERSIONER_<KEY>`.
pub const KEYS: &[&str] = &[
    "api_url",
    "api_key",
    "ui_url",
    "fail_on_api_error",
    "product",
    "version",
    "environment",
    "status",
    "source_system",
    "build_number",
    "scm_sha",
    "scm_branch",
    "scm_repository",
    "build_url",
    "deploy_url",
    "invoke_id",
    "built_by",
    "built_by_email",
    "built_by_name",
    "deployed_by",
    "deployed_by_email",
    "deployed_by_name",
];

/// Candidate config file locations, in lookup order.
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("versioner").join("config.yaml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".versioner").join("config.yaml"));
    }
    paths.push(PathBuf::from("config.yaml"));
    paths
}

/// Resolved configuration values, environment already applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<&'static str, String>,
    source: Option<PathBuf>,
}

impl Settings {
    /// Load from `explicit` (must exist) or the first existing default path,
    /// then apply environment overrides.
    pub fn load(explicit: Option<&Path>, env: &dyn EnvReader) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_paths().into_iter().find(|p| p.is_file()),
        };

        let Some(path) = path else {
            debug!("no config file found");
            return Ok(Self::from_file_values(BTreeMap::new(), None, env));
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let file = parse_yaml(&text, &path.display().to_string())?;
        debug!(path = %path.display(), keys = file.len(), "loaded config file");
        Ok(Self::from_file_values(file, Some(path), env))
    }

    /// Build from YAML text instead of a file.
    pub fn from_yaml_str(text: &str, env: &dyn EnvReader) -> Result<Self, ConfigError> {
        let file = parse_yaml(text, "<inline>")?;
        Ok(Self::from_file_values(file, None, env))
    }

    /// Environment only, no file.
    pub fn from_env(env: &dyn EnvReader) -> Self {
        Self::from_file_values(BTreeMap::new(), None, env)
    }

    fn from_file_values(
        mut file: BTreeMap<String, String>,
        source: Option<PathBuf>,
        env: &dyn EnvReader,
    ) -> Self {
        let mut values = BTreeMap::new();
        for &key in KEYS {
            let env_key = format!("{ENV_PREFIX}{}", key.to_uppercase());
            let value = env
                .non_empty(&env_key)
                .or_else(|| file.remove(key).filter(|v| !v.is_empty()));
            if let Some(value) = value {
                values.insert(key, value);
            }
        }
        for unknown in file.keys() {
            warn!(key = %unknown, "ignoring unknown config key");
        }
        Settings { values, source }
    }

    /// Set a value directly, as a command-line flag would.
    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Config file the values came from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn api_url(&self) -> &str {
        self.get("api_url").unwrap_or(DEFAULT_API_URL)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.get("api_key")
    }

    /// Versioner web UI base URL, used for links in job summaries.
    pub fn ui_url(&self) -> Option<&str> {
        self.get("ui_url").map(|u| u.trim_end_matches('/'))
    }

    /// Configured soft-fail toggle; `None` when unset.
    pub fn fail_on_api_error(&self) -> Result<Option<bool>, ConfigError> {
        self.get("fail_on_api_error")
            .map(|raw| parse_bool("fail_on_api_error", raw))
            .transpose()
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn parse_yaml(text: &str, origin: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let doc: Value = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })?;

    let mapping = match doc {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(ConfigError::NotAMapping {
                origin: origin.to_string(),
            })
        }
    };

    let mut values = BTreeMap::new();
    for (key, value) in mapping {
        let key = match key {
            Value::String(key) => key,
            _ => {
                return Err(ConfigError::NotAMapping {
                    origin: origin.to_string(),
                })
            }
        };
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(ConfigError::InvalidValue {
                    key,
                    origin: origin.to_string(),
                })
            }
        };
        values.insert(key, value);
    }
    Ok(values)
}
