//! Supported CI/CD systems and their detection markers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::env::EnvReader;

/// A CI/CD system the process may be running under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum System {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
    #[serde(rename = "jenkins")]
    Jenkins,
    #[serde(rename = "circleci")]
    CircleCi,
    #[serde(rename = "bitbucket")]
    Bitbucket,
    #[serde(rename = "azure-devops")]
    AzureDevOps,
    #[serde(rename = "travis")]
    Travis,
    #[serde(rename = "rundeck")]
    Rundeck,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

/// Probe order. The first system whose marker is present wins.
pub const DETECTION_ORDER: [System; 8] = [
    System::GitHub,
    System::GitLab,
    System::Jenkins,
    System::CircleCi,
    System::Bitbucket,
    System::AzureDevOps,
    System::Travis,
    System::Rundeck,
];

impl System {
    /// Wire name, as sent in `source_system`.
    pub fn as_str(self) -> &'static str {
        match self {
            System::GitHub => "github",
            System::GitLab => "gitlab",
            System::Jenkins => "jenkins",
            System::CircleCi => "circleci",
            System::Bitbucket => "bitbucket",
            System::AzureDevOps => "azure-devops",
            System::Travis => "travis",
            System::Rundeck => "rundeck",
            System::Unknown => "unknown",
        }
    }

    /// Whether this system's "running under X" marker is present in `env`.
    ///
    /// Each system checks a distinct variable, so at most the detection order
    /// decides between systems whose markers are set simultaneously.
    pub fn marker_present(self, env: &dyn EnvReader) -> bool {
        match self {
            System::GitHub => env.equals("GITHUB_ACTIONS", "true"),
            System::GitLab => env.equals("GITLAB_CI", "true"),
            System::Jenkins => env.non_empty("JENKINS_URL").is_some(),
            System::CircleCi => env.equals("CIRCLECI", "true"),
            System::Bitbucket => env.non_empty("BITBUCKET_BUILD_NUMBER").is_some(),
            System::AzureDevOps => env.equals("TF_BUILD", "True"),
            System::Travis => env.equals("TRAVIS", "true"),
            System::Rundeck => env.non_empty("RD_JOB_ID").is_some(),
            System::Unknown => false,
        }
    }

    pub fn is_known(self) -> bool {
        self != System::Unknown
    }
}

/// Identify the CI/CD system from marker variables.
pub fn detect_system(env: &dyn EnvReader) -> System {
    DETECTION_ORDER
        .into_iter()
        .find(|system| system.marker_present(env))
        .unwrap_or(System::Unknown)
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name that is not a known system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown CI/CD system: {0}")]
pub struct UnknownSystem(pub String);

impl FromStr for System {
    type Err = UnknownSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DETECTION_ORDER
            .into_iter()
            .chain(std::iter::once(System::Unknown))
            .find(|system| system.as_str() == s)
            .ok_or_else(|| UnknownSystem(s.to_string()))
    }
}
