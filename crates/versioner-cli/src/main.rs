//! Versioner CLI
//!
//! The `versioner` command reports build and deployment events from CI/CD
//! pipelines to the Versioner API.
//!
//! ## Commands
//!
//! - `track build`: record a build lifecycle event
//! - `track deployment`: record a deployment lifecycle event
//! - `version`: print the CLI version
//!
//! Exit codes: 0 success, 1 general error, 4 API error, 5 policy rejection.

mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};

use versioner_core::api::{Event, SubmissionOutcome};
use versioner_core::cicd::{detect, DetectedValues, ProcessEnv};
use versioner_core::{
    build_event, deployment_event, ApiSettings, BuildOptions, DeploymentOptions, GitHubActions,
    LogOptions, Settings,
};

use render::{Exit, Renderer};

#[derive(Parser)]
#[command(name = "versioner")]
#[command(author = "Versioner")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track build and deployment events with Versioner", long_about = None)]
struct Cli {
    /// Config file (default: first of $CONFIG_HOME/versioner/config.yaml,
    /// ~/.versioner/config.yaml, ./config.yaml)
    #[arg(long, global = true, env = "VERSIONER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Debug output (includes HTTP requests and responses)
    #[arg(long, global = true)]
    debug: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Versioner API URL (default: https://api.versioner.io)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Versioner API key (prefer the VERSIONER_API_KEY environment variable)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track build and deployment events
    Track {
        #[command(subcommand)]
        target: TrackTarget,
    },

    /// Print the CLI version
    Version,
}

#[derive(Subcommand)]
enum TrackTarget {
    /// Track a build event
    Build(BuildArgs),

    /// Track a deployment event
    ///
    /// With status=started the API runs preflight checks: concurrent
    /// deployments (409), no-deploy windows (423), and flow, soak-time or
    /// approval requirements (428).
    Deployment(DeploymentArgs),
}

#[derive(Args, Debug, Default)]
struct BuildArgs {
    /// Product/application name
    #[arg(long)]
    product: Option<String>,

    /// Version string
    #[arg(long)]
    version: Option<String>,

    /// Build status (pending, started, completed, failed, aborted) [default: completed]
    #[arg(long)]
    status: Option<String>,

    /// Source system (github, jenkins, gitlab, ...)
    #[arg(long)]
    source_system: Option<String>,

    /// Build number from the CI system
    #[arg(long)]
    build_number: Option<String>,

    /// Git commit SHA
    #[arg(long)]
    scm_sha: Option<String>,

    /// Git branch name
    #[arg(long)]
    scm_branch: Option<String>,

    /// Source control repository (e.g. owner/repo)
    #[arg(long)]
    scm_repository: Option<String>,

    /// Link to the CI/CD build run
    #[arg(long)]
    build_url: Option<String>,

    /// Invocation/run ID from the CI system
    #[arg(long)]
    invoke_id: Option<String>,

    /// User identifier (username, email or ID)
    #[arg(long)]
    built_by: Option<String>,

    #[arg(long)]
    built_by_email: Option<String>,

    #[arg(long)]
    built_by_name: Option<String>,

    /// Build start timestamp (RFC 3339)
    #[arg(long)]
    started_at: Option<String>,

    /// Build completion timestamp (RFC 3339)
    #[arg(long)]
    completed_at: Option<String>,

    /// Additional metadata as a JSON object (max 100KB)
    #[arg(long)]
    extra_metadata: Option<String>,

    /// Fail if the API is unreachable or returns an error [default: true]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    fail_on_api_error: Option<bool>,
}

#[derive(Args, Debug, Default)]
struct DeploymentArgs {
    /// Product/application name
    #[arg(long)]
    product: Option<String>,

    /// Environment name
    #[arg(long)]
    environment: Option<String>,

    /// Version string
    #[arg(long)]
    version: Option<String>,

    /// Deployment status (pending, started, completed, failed, aborted) [default: success]
    #[arg(long)]
    status: Option<String>,

    /// Source system (github, jenkins, gitlab, ...)
    #[arg(long)]
    source_system: Option<String>,

    /// Build number from the CI system
    #[arg(long)]
    build_number: Option<String>,

    /// Git commit SHA
    #[arg(long)]
    scm_sha: Option<String>,

    /// Source control repository (e.g. owner/repo)
    #[arg(long)]
    scm_repository: Option<String>,

    /// Link to the deployment run/logs
    #[arg(long)]
    deploy_url: Option<String>,

    /// Invocation/run ID from the CI system
    #[arg(long)]
    invoke_id: Option<String>,

    /// User identifier (username, email or ID)
    #[arg(long)]
    deployed_by: Option<String>,

    #[arg(long)]
    deployed_by_email: Option<String>,

    #[arg(long)]
    deployed_by_name: Option<String>,

    /// Deployment completion timestamp (RFC 3339)
    #[arg(long)]
    completed_at: Option<String>,

    /// Additional metadata as a JSON object (max 100KB)
    #[arg(long)]
    extra_metadata: Option<String>,

    /// Fail if the API is unreachable or returns an error [default: true]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    fail_on_api_error: Option<bool>,

    /// Skip preflight checks (deprecated, emergency use only)
    #[arg(long)]
    skip_preflight_checks: bool,
}

impl From<BuildArgs> for BuildOptions {
    fn from(a: BuildArgs) -> Self {
        BuildOptions {
            product: a.product,
            version: a.version,
            status: a.status,
            source_system: a.source_system,
            build_number: a.build_number,
            scm_sha: a.scm_sha,
            scm_branch: a.scm_branch,
            scm_repository: a.scm_repository,
            build_url: a.build_url,
            invoke_id: a.invoke_id,
            built_by: a.built_by,
            built_by_email: a.built_by_email,
            built_by_name: a.built_by_name,
            started_at: a.started_at,
            completed_at: a.completed_at,
            extra_metadata: a.extra_metadata,
        }
    }
}

impl From<DeploymentArgs> for DeploymentOptions {
    fn from(a: DeploymentArgs) -> Self {
        DeploymentOptions {
            product: a.product,
            environment: a.environment,
            version: a.version,
            status: a.status,
            source_system: a.source_system,
            build_number: a.build_number,
            scm_sha: a.scm_sha,
            scm_repository: a.scm_repository,
            deploy_url: a.deploy_url,
            invoke_id: a.invoke_id,
            deployed_by: a.deployed_by,
            deployed_by_email: a.deployed_by_email,
            deployed_by_name: a.deployed_by_name,
            completed_at: a.completed_at,
            extra_metadata: a.extra_metadata,
            skip_preflight_checks: a.skip_preflight_checks,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    LogOptions {
        verbose: cli.verbose,
        debug: cli.debug,
        json: cli.json,
    }
    .init();

    match run(cli).await {
        Ok(exit) => exit.into(),
        Err(err) => {
            eprintln!("Error: {err:#}");
            Exit::General.into()
        }
    }
}

async fn run(cli: Cli) -> Result<Exit> {
    let target = match cli.command {
        Commands::Version => {
            println!("versioner {}", env!("CARGO_PKG_VERSION"));
            return Ok(Exit::Success);
        }
        Commands::Track { target } => target,
    };

    let env = ProcessEnv;
    let settings = load_settings(cli.config.as_deref(), cli.api_url, cli.api_key, &env)?;
    let detected = detect(&env);

    let (event, fail_flag) = match target {
        TrackTarget::Build(args) => {
            let fail = args.fail_on_api_error;
            let event = build_event(&BuildOptions::from(args), &settings, &detected)?;
            (Event::Build(event), fail)
        }
        TrackTarget::Deployment(args) => {
            let fail = args.fail_on_api_error;
            let event = deployment_event(&DeploymentOptions::from(args), &settings, &detected)?;
            (Event::Deployment(event), fail)
        }
    };

    let api = ApiSettings::resolve(&settings, fail_flag)?;
    log_event(&event, &detected, &api);

    let client = api.connect()?;
    let outcome = client.submit(&event).await;
    render_outcome(&event, &outcome, &api, cli.verbose)
}

fn load_settings(
    config: Option<&Path>,
    api_url: Option<String>,
    api_key: Option<String>,
    env: &ProcessEnv,
) -> Result<Settings> {
    let mut settings =
        Settings::load(config, env).context("failed to load configuration")?;
    if let Some(path) = settings.source() {
        debug!(path = %path.display(), "using config file");
    }

    if let Some(url) = api_url.filter(|u| !u.is_empty()) {
        settings = settings.with("api_url", url);
    }
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        warn!(
            "passing the API key via --api-key is visible in process lists; \
             prefer the VERSIONER_API_KEY environment variable or a config file"
        );
        settings = settings.with("api_key", key);
    }
    Ok(settings)
}

fn log_event(event: &Event, detected: &DetectedValues, api: &ApiSettings) {
    debug!(
        kind = %event.kind(),
        detected_system = %detected.system,
        product = %event.product_name(),
        version = %event.version(),
        environment = ?event.environment_name(),
        status = %event.status(),
        scm_sha = ?event.scm_sha(),
        api_url = %api.api_url,
        fail_on_api_error = api.fail_on_api_error,
        "tracking event"
    );
}

fn render_outcome(
    event: &Event,
    outcome: &SubmissionOutcome,
    api: &ApiSettings,
    verbose: bool,
) -> Result<Exit> {
    let github = GitHubActions::detect(&ProcessEnv);
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    let exit = Renderer {
        out: &mut out,
        err: &mut err,
        verbose,
        github: github.as_ref(),
        ui_url: api.ui_url.as_deref(),
    }
    .outcome(event, outcome)
    .context("failed to write output")?;

    out.flush().ok();
    Ok(exit)
}
