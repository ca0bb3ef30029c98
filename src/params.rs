//! Tool argument shapes and the typed tool request.
//!
//! Each tool has a parameter struct; its JSON Schema (advertised in
//! `tools/list`) and its validation (serde deserialization) both come from
//! the same type.

use std::sync::Arc;

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Toolset;
use crate::error::GithubOrgError;
use crate::github::RunStatus;

fn default_true() -> bool {
    true
}

fn default_base() -> String {
    "main".to_string()
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct CreateRepositoryParams {
    #[schemars(description = "Repository name")]
    pub name: String,

    #[schemars(description = "Repository description")]
    #[serde(default)]
    pub description: Option<String>,

    #[schemars(description = "Create as private repository (default: false)")]
    #[serde(default)]
    pub private: bool,

    #[schemars(description = "Initialize with a README (default: true)")]
    #[serde(default = "default_true")]
    pub auto_init: bool,

    #[schemars(description = "Gitignore template (e.g. Node, Go, Python)")]
    #[serde(default)]
    pub gitignore_template: Option<String>,

    #[schemars(description = "License template (e.g. mit, apache-2.0)")]
    #[serde(default)]
    pub license_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct CreateIssueParams {
    #[schemars(description = "Repository in owner/repo format (e.g. vertikon/ecosystem)")]
    pub repo: String,

    #[schemars(description = "Issue title")]
    pub title: String,

    #[schemars(description = "Issue body (supports Markdown)")]
    pub body: String,

    #[schemars(description = "Labels to add")]
    #[serde(default)]
    pub labels: Option<Vec<String>>,

    #[schemars(description = "Users to assign")]
    #[serde(default)]
    pub assignees: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct CreatePullRequestParams {
    #[schemars(description = "Repository in owner/repo format")]
    pub repo: String,

    #[schemars(description = "Pull request title")]
    pub title: String,

    #[schemars(description = "Pull request description")]
    pub body: String,

    #[schemars(description = "Branch with changes")]
    pub head: String,

    #[schemars(description = "Target branch (default: main)")]
    #[serde(default = "default_base")]
    pub base: String,

    #[schemars(description = "Create as draft pull request")]
    #[serde(default)]
    pub draft: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct SearchCodeParams {
    #[schemars(description = "Search query (GitHub code search syntax)")]
    pub query: String,

    #[schemars(description = "Limit to one repository (owner/repo, or a repo of the organization)")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Programming language")]
    #[serde(default)]
    pub language: Option<String>,

    #[schemars(description = "File path pattern")]
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct ListWorkflowRunsParams {
    #[schemars(description = "Repository in owner/repo format")]
    pub repo: String,

    #[schemars(description = "Workflow file name or ID")]
    #[serde(default)]
    pub workflow: Option<String>,

    #[schemars(description = "Branch name")]
    #[serde(default)]
    pub branch: Option<String>,

    #[schemars(description = "Filter by status: completed, in_progress, queued")]
    #[serde(default)]
    pub status: Option<RunStatus>,

    #[schemars(description = "Number of runs to fetch (default: 10, max: 100)")]
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct RepoStatsParams {
    #[schemars(description = "Repository in owner/repo format")]
    pub repo: String,
}

/// The supported tools, without arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    CreateRepository,
    CreateIssue,
    CreatePullRequest,
    SearchCode,
    ListWorkflowRuns,
    GetRepoStats,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::CreateRepository,
        ToolKind::CreateIssue,
        ToolKind::CreatePullRequest,
        ToolKind::SearchCode,
        ToolKind::ListWorkflowRuns,
        ToolKind::GetRepoStats,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::CreateRepository => "create_repository",
            ToolKind::CreateIssue => "create_issue",
            ToolKind::CreatePullRequest => "create_pull_request",
            ToolKind::SearchCode => "search_code",
            ToolKind::ListWorkflowRuns => "list_workflow_runs",
            ToolKind::GetRepoStats => "get_repo_stats",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::CreateRepository => "Create a new GitHub repository in the organization",
            ToolKind::CreateIssue => "Create a new issue in a repository",
            ToolKind::CreatePullRequest => "Create a new pull request",
            ToolKind::SearchCode => {
                "Search code in the organization's repositories using GitHub code search syntax"
            }
            ToolKind::ListWorkflowRuns => "List GitHub Actions workflow runs for a repository",
            ToolKind::GetRepoStats => {
                "Get repository statistics: stars, forks, open issues and PRs, releases, languages and commit count"
            }
        }
    }

    pub fn toolset(&self) -> Toolset {
        match self {
            ToolKind::CreateRepository | ToolKind::SearchCode | ToolKind::GetRepoStats => {
                Toolset::Repos
            }
            ToolKind::CreateIssue => Toolset::Issues,
            ToolKind::CreatePullRequest => Toolset::PullRequests,
            ToolKind::ListWorkflowRuns => Toolset::Actions,
        }
    }

    /// Whether the tool creates something on GitHub.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            ToolKind::CreateRepository | ToolKind::CreateIssue | ToolKind::CreatePullRequest
        )
    }

    /// JSON Schema of the tool's arguments.
    pub fn input_schema(&self) -> Arc<JsonObject> {
        match self {
            ToolKind::CreateRepository => schema_for::<CreateRepositoryParams>(),
            ToolKind::CreateIssue => schema_for::<CreateIssueParams>(),
            ToolKind::CreatePullRequest => schema_for::<CreatePullRequestParams>(),
            ToolKind::SearchCode => schema_for::<SearchCodeParams>(),
            ToolKind::ListWorkflowRuns => schema_for::<ListWorkflowRunsParams>(),
            ToolKind::GetRepoStats => schema_for::<RepoStatsParams>(),
        }
    }
}

fn schema_for<T: JsonSchema>() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(map)) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    CreateRepository(CreateRepositoryParams),
    CreateIssue(CreateIssueParams),
    CreatePullRequest(CreatePullRequestParams),
    SearchCode(SearchCodeParams),
    ListWorkflowRuns(ListWorkflowRunsParams),
    GetRepoStats(RepoStatsParams),
}

impl ToolRequest {
    /// Resolve `name` and validate `arguments` against that tool's shape.
    pub fn parse(name: &str, arguments: Option<JsonObject>) -> Result<Self, GithubOrgError> {
        let kind = ToolKind::from_name(name)
            .ok_or_else(|| GithubOrgError::Validation(format!("Unknown tool: {}", name)))?;
        let args = arguments.unwrap_or_default();

        Ok(match kind {
            ToolKind::CreateRepository => Self::CreateRepository(parse_args(kind, args)?),
            ToolKind::CreateIssue => Self::CreateIssue(parse_args(kind, args)?),
            ToolKind::CreatePullRequest => Self::CreatePullRequest(parse_args(kind, args)?),
            ToolKind::SearchCode => Self::SearchCode(parse_args(kind, args)?),
            ToolKind::ListWorkflowRuns => Self::ListWorkflowRuns(parse_args(kind, args)?),
            ToolKind::GetRepoStats => Self::GetRepoStats(parse_args(kind, args)?),
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::CreateRepository(_) => ToolKind::CreateRepository,
            ToolRequest::CreateIssue(_) => ToolKind::CreateIssue,
            ToolRequest::CreatePullRequest(_) => ToolKind::CreatePullRequest,
            ToolRequest::SearchCode(_) => ToolKind::SearchCode,
            ToolRequest::ListWorkflowRuns(_) => ToolKind::ListWorkflowRuns,
            ToolRequest::GetRepoStats(_) => ToolKind::GetRepoStats,
        }
    }
}

fn parse_args<T: DeserializeOwned>(kind: ToolKind, args: JsonObject) -> Result<T, GithubOrgError> {
    serde_json::from_value(serde_json::Value::Object(args)).map_err(|e| {
        GithubOrgError::Validation(format!("Invalid arguments for {}: {}", kind.name(), e))
    })
}
