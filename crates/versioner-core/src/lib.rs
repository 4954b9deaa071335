//! Versioner Core: from command line to submittable event
//!
//! Normalizes status values, parses and merges `extra_metadata`, layers
//! configuration over auto-detected values, and reports outcomes to GitHub
//! Actions.
//!
//! ## Layer 2 - Assembly
//!
//! Re-exports the detection ([`versioner_cicd`]) and submission
//! ([`versioner_api`]) layers so the binary depends on this crate alone.

pub mod config;
pub mod error;
pub mod github;
pub mod metadata;
pub mod status;
pub mod telemetry;
pub mod track;

pub use config::{Settings, DEFAULT_API_URL};
pub use error::{ConfigError, MetadataError, Result, TrackError};
pub use github::{FailureClass, GitHubActions};
pub use status::{normalize, NormalizedStatus};
pub use telemetry::LogOptions;
pub use track::{build_event, deployment_event, ApiSettings, BuildOptions, DeploymentOptions};

pub use versioner_api as api;
pub use versioner_cicd as cicd;
