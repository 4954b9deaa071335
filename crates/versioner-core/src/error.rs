//! Local failures raised before anything is sent over the network.

use std::path::PathBuf;

use versioner_api::TransportError;

/// Errors produced by user-supplied metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("extra_metadata exceeds maximum size of {limit} bytes (got {actual} bytes)")]
    SizeExceeded { limit: usize, actual: usize },

    #[error("invalid JSON for extra_metadata: {0}")]
    Malformed(String),
}

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config {origin} must be a mapping of keys to values")]
    NotAMapping { origin: String },

    #[error("config key {key} in {origin} must be a scalar value")]
    InvalidValue { key: String, origin: String },

    #[error("{key} must be a boolean, got {value:?}")]
    InvalidBool { key: String, value: String },
}

/// Errors that stop an event before submission.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("--{0} is required")]
    MissingField(&'static str),

    #[error("API key is required. Set VERSIONER_API_KEY environment variable or use --api-key flag")]
    MissingApiKey,

    #[error("invalid {field} timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create API client: {0}")]
    Client(#[from] TransportError),
}

/// Result type for event assembly.
pub type Result<T> = std::result::Result<T, TrackError>;
