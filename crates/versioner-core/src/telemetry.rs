//! Log setup for the `versioner` binary.
//!
//! Logs go to stderr; stdout carries results and GitHub workflow commands.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const OWN_CRATES: [&str; 4] = ["versioner", "versioner_api", "versioner_cicd", "versioner_core"];

/// Logging flags from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// `--verbose`: debug output from our own crates.
    pub verbose: bool,
    /// `--debug`: trace output from our own crates, debug from the HTTP stack.
    pub debug: bool,
    /// `--json`: newline-delimited JSON log lines.
    pub json: bool,
}

impl LogOptions {
    /// Filter directives used when `RUST_LOG` is unset.
    pub fn directives(&self) -> String {
        let (own, deps) = if self.debug {
            ("trace", "debug")
        } else if self.verbose {
            ("debug", "warn")
        } else {
            return "warn".to_string();
        };
        let mut directives = deps.to_string();
        for name in OWN_CRATES {
            directives.push_str(&format!(",{name}={own}"));
        }
        directives
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    /// Install the global subscriber. Later calls are ignored.
    pub fn init(&self) {
        let json = self
            .json
            .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr).json());
        let plain = (!self.json)
            .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

        tracing_subscriber::registry()
            .with(self.filter())
            .with(json)
            .with(plain)
            .try_init()
            .ok();
    }
}
