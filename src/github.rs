//! GitHub upstream: the operations the dispatcher needs, behind a trait so
//! tests can count and inspect calls, plus the octocrab-backed client.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{Config, ConfigError};
use crate::error::{GithubOrgError, UpstreamError};

pub type UpstreamResult = Result<Value, UpstreamError>;

/// An `owner/name` repository coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: &str, name: &str) -> Result<Self, GithubOrgError> {
        sanitize_github_name(owner, "owner")?;
        sanitize_github_name(name, "repo")?;
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Split a combined `owner/repo` argument.
    pub fn parse(full: &str) -> Result<Self, GithubOrgError> {
        let (owner, name) = full.split_once('/').ok_or_else(|| {
            GithubOrgError::Validation(format!(
                "repo must be in owner/repo format, got '{}'",
                full
            ))
        })?;
        Self::new(owner, name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Validate that a GitHub owner/repo name doesn't contain characters that
/// could be used for URL injection in raw API routes.
pub fn sanitize_github_name(name: &str, field: &str) -> Result<(), GithubOrgError> {
    if name.is_empty() {
        return Err(GithubOrgError::Validation(format!(
            "{} must not be empty",
            field
        )));
    }
    for ch in ['/', '?', '#', '%', '\0', ' ', '\n', '\t'] {
        if name.contains(ch) {
            return Err(GithubOrgError::Validation(format!(
                "{} contains invalid character '{}'",
                field,
                ch.escape_default()
            )));
        }
    }
    Ok(())
}

// -- Upstream request bodies --

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRepository {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub private: bool,
    pub auto_init: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitignore_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    InProgress,
    Queued,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRunsQuery {
    /// Workflow file name or numeric id; `None` lists runs of every workflow.
    pub workflow: Option<String>,
    pub branch: Option<String>,
    pub status: Option<RunStatus>,
    pub per_page: u8,
}

/// The GitHub operations this server consumes. Each call is one upstream
/// request; paging and throttling are left to the implementation.
#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn create_org_repo(&self, org: &str, repo: &NewRepository) -> UpstreamResult;

    async fn create_issue(&self, repo: &RepoRef, issue: &NewIssue) -> UpstreamResult;

    async fn create_pull(&self, repo: &RepoRef, pull: &NewPullRequest) -> UpstreamResult;

    async fn search_code(&self, query: &str, per_page: u8) -> UpstreamResult;

    async fn list_workflow_runs(&self, repo: &RepoRef, query: &WorkflowRunsQuery)
        -> UpstreamResult;

    /// Repositories of `org`, most recently updated first.
    async fn list_org_repos(&self, org: &str) -> UpstreamResult;

    /// The README metadata object, with base64 `content`.
    async fn get_readme(&self, repo: &RepoRef) -> UpstreamResult;

    /// Open issues, most recently updated first.
    async fn list_open_issues(&self, repo: &RepoRef, per_page: u8) -> UpstreamResult;

    /// Open pull requests, most recently updated first.
    async fn list_open_pulls(&self, repo: &RepoRef, per_page: u8) -> UpstreamResult;

    /// Run a GraphQL query and return its `data` object.
    async fn graphql(&self, query: &str, variables: Value) -> UpstreamResult;
}

// -- octocrab implementation --

#[derive(Serialize)]
struct ListParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    sort: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    direction: Option<&'a str>,
    per_page: u8,
}

#[derive(Serialize)]
struct SearchParams<'a> {
    q: &'a str,
    per_page: u8,
}

#[derive(Serialize)]
struct RunsParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<RunStatus>,
    per_page: u8,
}

#[derive(Clone)]
pub struct OctocrabClient {
    github: Arc<octocrab::Octocrab>,
}

impl OctocrabClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let invalid = |e: octocrab::Error| ConfigError::InvalidApiUrl {
            url: config.api_url.clone(),
            reason: e.to_string(),
        };
        let github = octocrab::OctocrabBuilder::new()
            .base_uri(config.api_url.as_str())
            .map_err(invalid)?
            .personal_token(config.token.clone())
            .build()
            .map_err(invalid)?;
        Ok(Self {
            github: Arc::new(github),
        })
    }

    async fn get_json<P: Serialize + ?Sized>(
        &self,
        route: &str,
        params: Option<&P>,
    ) -> UpstreamResult {
        tracing::debug!(route, "GitHub GET");
        self.github.get(route, params).await.map_err(|e| {
            let err = UpstreamError::from(e);
            tracing::warn!(route, status = ?err.status, error = %err.message, "GitHub GET failed");
            err
        })
    }

    async fn post_json<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> UpstreamResult {
        tracing::debug!(route, "GitHub POST");
        self.github.post(route, Some(body)).await.map_err(|e| {
            let err = UpstreamError::from(e);
            tracing::warn!(route, status = ?err.status, error = %err.message, "GitHub POST failed");
            err
        })
    }
}

fn open_by_update(per_page: u8) -> ListParams<'static> {
    ListParams {
        state: Some("open"),
        sort: "updated",
        direction: Some("desc"),
        per_page,
    }
}

#[async_trait]
impl GithubApi for OctocrabClient {
    async fn create_org_repo(&self, org: &str, repo: &NewRepository) -> UpstreamResult {
        self.post_json(&format!("/orgs/{}/repos", org), repo).await
    }

    async fn create_issue(&self, repo: &RepoRef, issue: &NewIssue) -> UpstreamResult {
        let route = format!("/repos/{}/{}/issues", repo.owner, repo.name);
        self.post_json(&route, issue).await
    }

    async fn create_pull(&self, repo: &RepoRef, pull: &NewPullRequest) -> UpstreamResult {
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        self.post_json(&route, pull).await
    }

    async fn search_code(&self, query: &str, per_page: u8) -> UpstreamResult {
        let params = SearchParams { q: query, per_page };
        self.get_json("/search/code", Some(&params)).await
    }

    async fn list_workflow_runs(
        &self,
        repo: &RepoRef,
        query: &WorkflowRunsQuery,
    ) -> UpstreamResult {
        let route = match &query.workflow {
            Some(workflow) => format!(
                "/repos/{}/{}/actions/workflows/{}/runs",
                repo.owner, repo.name, workflow
            ),
            None => format!("/repos/{}/{}/actions/runs", repo.owner, repo.name),
        };
        let params = RunsParams {
            branch: query.branch.as_deref(),
            status: query.status,
            per_page: query.per_page,
        };
        self.get_json(&route, Some(&params)).await
    }

    async fn list_org_repos(&self, org: &str) -> UpstreamResult {
        let params = ListParams {
            state: None,
            sort: "updated",
            direction: None,
            per_page: 100,
        };
        self.get_json(&format!("/orgs/{}/repos", org), Some(&params))
            .await
    }

    async fn get_readme(&self, repo: &RepoRef) -> UpstreamResult {
        let route = format!("/repos/{}/{}/readme", repo.owner, repo.name);
        self.get_json(&route, None::<&()>).await
    }

    async fn list_open_issues(&self, repo: &RepoRef, per_page: u8) -> UpstreamResult {
        let route = format!("/repos/{}/{}/issues", repo.owner, repo.name);
        self.get_json(&route, Some(&open_by_update(per_page))).await
    }

    async fn list_open_pulls(&self, repo: &RepoRef, per_page: u8) -> UpstreamResult {
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        self.get_json(&route, Some(&open_by_update(per_page))).await
    }

    async fn graphql(&self, query: &str, variables: Value) -> UpstreamResult {
        tracing::debug!("GitHub GraphQL");
        let body: Value = self
            .github
            .graphql(&json!({ "query": query, "variables": variables }))
            .await
            .map_err(UpstreamError::from)?;
        graphql_data(body)
    }
}

/// GitHub answers GraphQL errors with HTTP 200 and an `errors` array.
pub fn graphql_data(mut body: Value) -> UpstreamResult {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if let Some(first) = errors.first() {
            let message = first
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("GraphQL query failed");
            return Err(UpstreamError::new(None, message));
        }
    }
    match body.get_mut("data") {
        Some(data) => Ok(data.take()),
        None => Err(UpstreamError::new(None, "GraphQL response has no data")),
    }
}

/// Decode a base64 file body (GitHub wraps it with embedded newlines).
pub fn decode_base64_content(content: &str) -> Result<String, UpstreamError> {
    let cleaned: String = content.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| UpstreamError::new(None, format!("invalid base64 content: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
