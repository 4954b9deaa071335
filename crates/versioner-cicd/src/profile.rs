//! Per-system variable tables.
//!
//! Every supported system is described by one static [`Profile`]. The
//! extraction routine in [`crate::detect`] is shared; systems differ only
//! in which variables they read and how their build URL is assembled.

use crate::system::System;

/// Where the repository identifier comes from.
pub(crate) enum Repository {
    /// A slug such as `owner/repo`, read verbatim.
    Var(&'static str),
    /// A raw Git remote URL, normalised with [`crate::normalize_git_url`].
    GitUrl(&'static str),
    /// `owner` and `name` held in two variables, joined with `/`.
    Split {
        owner: &'static str,
        name: &'static str,
    },
    /// The system has no repository concept.
    Absent,
}

/// How the build URL is obtained.
pub(crate) enum BuildUrl {
    /// The system exports a ready-made URL.
    Var(&'static str),
    /// Rendered from the listed variables, only when all are non-empty.
    Template {
        vars: &'static [&'static str],
        render: fn(&[String]) -> String,
    },
}

/// Product name fallback.
pub(crate) enum ProductFallback {
    /// Last path segment of the detected repository.
    RepositoryName,
    /// A dedicated job/project name variable.
    Var(&'static str),
}

/// Version fallback.
pub(crate) enum VersionFallback {
    /// First 8 characters of the detected commit SHA.
    ShortSha,
    /// A build number or execution id variable.
    Var(&'static str),
}

/// Table describing one CI/CD system.
///
/// List-valued fields hold alternatives; the first non-empty one wins.
pub(crate) struct Profile {
    pub repository: Repository,
    pub sha: &'static [&'static str],
    pub branch: &'static [&'static str],
    pub build_number: &'static [&'static str],
    pub invoke_id: &'static [&'static str],
    pub build_url: BuildUrl,
    pub built_by: &'static [&'static str],
    pub built_by_email: &'static [&'static str],
    pub built_by_name: &'static [&'static str],
    pub product: ProductFallback,
    pub version: VersionFallback,
    /// `(metadata key, variable)` pairs for the `vi_` metadata bag.
    pub metadata: &'static [(&'static str, &'static str)],
}

impl System {
    /// The variable table for this system; `None` for [`System::Unknown`].
    pub(crate) fn profile(self) -> Option<&'static Profile> {
        match self {
            System::GitHub => Some(&GITHUB),
            System::GitLab => Some(&GITLAB),
            System::Jenkins => Some(&JENKINS),
            System::CircleCi => Some(&CIRCLECI),
            System::Bitbucket => Some(&BITBUCKET),
            System::AzureDevOps => Some(&AZURE_DEVOPS),
            System::Travis => Some(&TRAVIS),
            System::Rundeck => Some(&RUNDECK),
            System::Unknown => None,
        }
    }
}

fn github_run_url(parts: &[String]) -> String {
    format!("{}/{}/actions/runs/{}", parts[0], parts[1], parts[2])
}

fn bitbucket_pipeline_url(parts: &[String]) -> String {
    format!(
        "https://bitbucket.org/{}/pipelines/results/{}",
        parts[0], parts[1]
    )
}

fn rundeck_execution_url(parts: &[String]) -> String {
    format!("{}/project/{}/execution/show/{}", parts[0], parts[1], parts[2])
}

static GITHUB: Profile = Profile {
    repository: Repository::Var("GITHUB_REPOSITORY"),
    sha: &["GITHUB_SHA"],
    branch: &["GITHUB_REF_NAME"],
    build_number: &["GITHUB_RUN_NUMBER"],
    invoke_id: &["GITHUB_RUN_ID"],
    build_url: BuildUrl::Template {
        vars: &["GITHUB_SERVER_URL", "GITHUB_REPOSITORY", "GITHUB_RUN_ID"],
        render: github_run_url,
    },
    built_by: &["GITHUB_ACTOR"],
    built_by_email: &[],
    built_by_name: &[],
    product: ProductFallback::RepositoryName,
    version: VersionFallback::ShortSha,
    metadata: &[
        ("vi_gh_workflow", "GITHUB_WORKFLOW"),
        ("vi_gh_job", "GITHUB_JOB"),
        ("vi_gh_run_attempt", "GITHUB_RUN_ATTEMPT"),
        ("vi_gh_event_name", "GITHUB_EVENT_NAME"),
        ("vi_gh_ref", "GITHUB_REF"),
        ("vi_gh_head_ref", "GITHUB_HEAD_REF"),
        ("vi_gh_base_ref", "GITHUB_BASE_REF"),
    ],
};

static GITLAB: Profile = Profile {
    repository: Repository::Var("CI_PROJECT_PATH"),
    sha: &["CI_COMMIT_SHA"],
    branch: &["CI_COMMIT_REF_NAME"],
    build_number: &["CI_PIPELINE_IID"],
    invoke_id: &["CI_PIPELINE_ID"],
    build_url: BuildUrl::Var("CI_PIPELINE_URL"),
    built_by: &["GITLAB_USER_LOGIN"],
    built_by_email: &["GITLAB_USER_EMAIL"],
    built_by_name: &["GITLAB_USER_NAME"],
    product: ProductFallback::RepositoryName,
    version: VersionFallback::ShortSha,
    metadata: &[
        ("vi_gl_pipeline_id", "CI_PIPELINE_ID"),
        ("vi_gl_pipeline_url", "CI_PIPELINE_URL"),
        ("vi_gl_job_id", "CI_JOB_ID"),
        ("vi_gl_job_name", "CI_JOB_NAME"),
        ("vi_gl_job_url", "CI_JOB_URL"),
        ("vi_gl_pipeline_source", "CI_PIPELINE_SOURCE"),
    ],
};

static JENKINS: Profile = Profile {
    repository: Repository::GitUrl("GIT_URL"),
    sha: &["GIT_COMMIT"],
    branch: &["GIT_BRANCH"],
    build_number: &["BUILD_NUMBER"],
    invoke_id: &["BUILD_ID"],
    build_url: BuildUrl::Var("BUILD_URL"),
    built_by: &["BUILD_USER"],
    built_by_email: &["BUILD_USER_EMAIL"],
    built_by_name: &[],
    product: ProductFallback::RepositoryName,
    version: VersionFallback::Var("BUILD_NUMBER"),
    metadata: &[
        ("vi_jenkins_job_name", "JOB_NAME"),
        ("vi_jenkins_build_url", "BUILD_URL"),
        ("vi_jenkins_node_name", "NODE_NAME"),
        ("vi_jenkins_executor_number", "EXECUTOR_NUMBER"),
    ],
};

static CIRCLECI: Profile = Profile {
    repository: Repository::Split {
        owner: "CIRCLE_PROJECT_USERNAME",
        name: "CIRCLE_PROJECT_REPONAME",
    },
    sha: &["CIRCLE_SHA1"],
    branch: &["CIRCLE_BRANCH", "CIRCLE_TAG"],
    build_number: &["CIRCLE_BUILD_NUM"],
    invoke_id: &["CIRCLE_WORKFLOW_ID"],
    build_url: BuildUrl::Var("CIRCLE_BUILD_URL"),
    built_by: &["CIRCLE_USERNAME"],
    built_by_email: &[],
    built_by_name: &[],
    product: ProductFallback::Var("CIRCLE_PROJECT_REPONAME"),
    version: VersionFallback::ShortSha,
    metadata: &[
        ("vi_circle_workflow_id", "CIRCLE_WORKFLOW_ID"),
        ("vi_circle_workflow_job_id", "CIRCLE_WORKFLOW_JOB_ID"),
        ("vi_circle_job_name", "CIRCLE_JOB"),
        ("vi_circle_node_index", "CIRCLE_NODE_INDEX"),
    ],
};

static BITBUCKET: Profile = Profile {
    repository: Repository::Var("BITBUCKET_REPO_FULL_NAME"),
    sha: &["BITBUCKET_COMMIT"],
    branch: &["BITBUCKET_BRANCH", "BITBUCKET_TAG"],
    build_number: &["BITBUCKET_BUILD_NUMBER"],
    invoke_id: &["BITBUCKET_PIPELINE_UUID"],
    build_url: BuildUrl::Template {
        vars: &["BITBUCKET_REPO_FULL_NAME", "BITBUCKET_BUILD_NUMBER"],
        render: bitbucket_pipeline_url,
    },
    built_by: &[],
    built_by_email: &[],
    built_by_name: &[],
    product: ProductFallback::Var("BITBUCKET_REPO_SLUG"),
    version: VersionFallback::ShortSha,
    metadata: &[
        ("vi_bb_pipeline_uuid", "BITBUCKET_PIPELINE_UUID"),
        ("vi_bb_step_uuid", "BITBUCKET_STEP_UUID"),
        ("vi_bb_workspace", "BITBUCKET_WORKSPACE"),
        ("vi_bb_repo_slug", "BITBUCKET_REPO_SLUG"),
    ],
};

static AZURE_DEVOPS: Profile = Profile {
    repository: Repository::Var("BUILD_REPOSITORY_NAME"),
    sha: &["BUILD_SOURCEVERSION"],
    branch: &["BUILD_SOURCEBRANCHNAME"],
    build_number: &["BUILD_BUILDNUMBER"],
    invoke_id: &["BUILD_BUILDID"],
    build_url: BuildUrl::Var("BUILD_BUILDURI"),
    built_by: &["BUILD_REQUESTEDFOR"],
    built_by_email: &["BUILD_REQUESTEDFOREMAIL"],
    built_by_name: &[],
    product: ProductFallback::RepositoryName,
    version: VersionFallback::Var("BUILD_BUILDNUMBER"),
    metadata: &[
        ("vi_azure_build_id", "BUILD_BUILDID"),
        ("vi_azure_definition_name", "BUILD_DEFINITIONNAME"),
        ("vi_azure_agent_name", "AGENT_NAME"),
        ("vi_azure_team_project", "SYSTEM_TEAMPROJECT"),
    ],
};

static TRAVIS: Profile = Profile {
    repository: Repository::Var("TRAVIS_REPO_SLUG"),
    sha: &["TRAVIS_COMMIT"],
    branch: &["TRAVIS_BRANCH", "TRAVIS_TAG"],
    build_number: &["TRAVIS_BUILD_NUMBER"],
    invoke_id: &["TRAVIS_BUILD_ID"],
    build_url: BuildUrl::Var("TRAVIS_BUILD_WEB_URL"),
    built_by: &[],
    built_by_email: &[],
    built_by_name: &[],
    product: ProductFallback::RepositoryName,
    version: VersionFallback::ShortSha,
    metadata: &[
        ("vi_travis_build_id", "TRAVIS_BUILD_ID"),
        ("vi_travis_job_id", "TRAVIS_JOB_ID"),
        ("vi_travis_job_number", "TRAVIS_JOB_NUMBER"),
        ("vi_travis_event_type", "TRAVIS_EVENT_TYPE"),
    ],
};

static RUNDECK: Profile = Profile {
    repository: Repository::Absent,
    sha: &[],
    branch: &[],
    build_number: &["RD_JOB_EXECID"],
    invoke_id: &["RD_JOB_EXECID"],
    build_url: BuildUrl::Template {
        vars: &["RD_JOB_SERVERURL", "RD_JOB_PROJECT", "RD_JOB_EXECID"],
        render: rundeck_execution_url,
    },
    built_by: &["RD_JOB_USERNAME", "RD_JOB_USER_NAME"],
    built_by_email: &[],
    built_by_name: &[],
    product: ProductFallback::Var("RD_JOB_NAME"),
    version: VersionFallback::Var("RD_JOB_EXECID"),
    metadata: &[
        ("vi_rd_job_id", "RD_JOB_ID"),
        ("vi_rd_job_execid", "RD_JOB_EXECID"),
        ("vi_rd_job_serverurl", "RD_JOB_SERVERURL"),
        ("vi_rd_job_project", "RD_JOB_PROJECT"),
        ("vi_rd_job_name", "RD_JOB_NAME"),
        ("vi_rd_job_group", "RD_JOB_GROUP"),
        ("vi_rd_job_url", "RD_JOB_URL"),
    ],
};
