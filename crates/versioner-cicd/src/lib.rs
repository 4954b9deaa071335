//! Versioner CI/CD: environment auto-detection
//!
//! Identifies which CI/CD system the process runs under and infers event
//! fields (product, version, SCM details, build URL, actor) plus a
//! `vi_*` metadata bag from that system's environment variables.
//!
//! ## Layer 0 - Environment
//!
//! Focus: deterministic detection from an explicit [`EnvReader`], never
//! from ad-hoc `std::env` reads.

pub mod detect;
pub mod env;
mod profile;
pub mod system;

pub use detect::{detect, extra_metadata, normalize_git_url, short_sha, DetectedValues};
pub use env::{EnvReader, EnvSnapshot, ProcessEnv};
pub use system::{detect_system, System, UnknownSystem, DETECTION_ORDER};
