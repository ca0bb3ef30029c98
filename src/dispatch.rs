//! Routes validated tool calls and resource reads to exactly one upstream
//! operation, applying toolset gating, read-only mode and the cache.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{json, Value};

use crate::cache::TtlCache;
use crate::config::{Config, Toolset};
use crate::error::{GithubOrgError, UpstreamError};
use crate::github::{
    decode_base64_content, sanitize_github_name, GithubApi, NewIssue, NewPullRequest,
    NewRepository, RepoRef, WorkflowRunsQuery,
};
use crate::params::{
    CreateIssueParams, CreatePullRequestParams, CreateRepositoryParams, ListWorkflowRunsParams,
    RepoStatsParams, SearchCodeParams, ToolKind, ToolRequest,
};
use crate::resources::{self, MimeType, ResourceDescriptor, ResourceRoute};

const SEARCH_PAGE_SIZE: u8 = 20;
const RESOURCE_PAGE_SIZE: u8 = 30;

pub const REPO_STATS_QUERY: &str = r#"
query RepoStats($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    name
    description
    stargazerCount
    forkCount
    issues(states: OPEN) { totalCount }
    pullRequests(states: OPEN) { totalCount }
    releases { totalCount }
    diskUsage
    primaryLanguage { name }
    languages(first: 10) {
      edges {
        node { name }
        size
      }
    }
    defaultBranchRef {
      target {
        ... on Commit {
          history { totalCount }
        }
      }
    }
  }
}
"#;

/// A successful response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub mime_type: MimeType,
    pub text: String,
}

impl Payload {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            mime_type: MimeType::PlainText,
            text: text.into(),
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            mime_type: MimeType::Markdown,
            text: text.into(),
        }
    }

    /// Pretty-printed JSON. `Value`'s alternate `Display` is infallible.
    pub fn json(value: &Value) -> Self {
        Self {
            mime_type: MimeType::Json,
            text: format!("{:#}", value),
        }
    }
}

pub struct Dispatcher {
    config: Arc<Config>,
    github: Arc<dyn GithubApi>,
    cache: TtlCache<Value>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, github: Arc<dyn GithubApi>) -> Self {
        let cache = TtlCache::new(config.cache_enabled, config.cache_ttl);
        Self::with_cache(config, github, cache)
    }

    pub fn with_cache(
        config: Arc<Config>,
        github: Arc<dyn GithubApi>,
        cache: TtlCache<Value>,
    ) -> Self {
        Self {
            config,
            github,
            cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tools whose toolset is enabled, in declaration order.
    pub fn tools(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|kind| self.config.toolset_enabled(kind.toolset()))
            .collect()
    }

    /// Resources advertised to clients; empty when `context` is disabled.
    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        if !self.config.toolset_enabled(Toolset::Context) {
            return Vec::new();
        }
        resources::advertised(&self.config.org, &self.config.default_repo)
    }

    /// Validate and run a raw tool call.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<Payload, GithubOrgError> {
        // Disabled tools are rejected before their arguments are looked at.
        if let Some(kind) = ToolKind::from_name(name) {
            self.ensure_enabled(kind)?;
        }
        let request = ToolRequest::parse(name, arguments)?;
        self.invoke(request).await
    }

    pub async fn invoke(&self, request: ToolRequest) -> Result<Payload, GithubOrgError> {
        let kind = request.kind();
        self.ensure_enabled(kind)?;
        if kind.is_mutating() && self.config.read_only {
            return Err(GithubOrgError::ReadOnly(read_only_message(kind)));
        }
        tracing::debug!(tool = kind.name(), "invoking tool");

        match request {
            ToolRequest::CreateRepository(params) => self.create_repository(params).await,
            ToolRequest::CreateIssue(params) => self.create_issue(params).await,
            ToolRequest::CreatePullRequest(params) => self.create_pull_request(params).await,
            ToolRequest::SearchCode(params) => self.search_code(params).await,
            ToolRequest::ListWorkflowRuns(params) => self.list_workflow_runs(params).await,
            ToolRequest::GetRepoStats(params) => self.get_repo_stats(params).await,
        }
    }

    fn ensure_enabled(&self, kind: ToolKind) -> Result<(), GithubOrgError> {
        let toolset = kind.toolset();
        if self.config.toolset_enabled(toolset) {
            Ok(())
        } else {
            Err(GithubOrgError::Validation(format!(
                "Tool '{}' is not available: toolset '{}' is disabled",
                kind.name(),
                toolset
            )))
        }
    }

    async fn create_repository(
        &self,
        params: CreateRepositoryParams,
    ) -> Result<Payload, GithubOrgError> {
        sanitize_github_name(&self.config.org, "org")?;
        let body = NewRepository {
            name: params.name,
            description: params.description,
            private: params.private,
            auto_init: params.auto_init,
            gitignore_template: params.gitignore_template,
            license_template: params.license_template,
        };

        let created = self
            .github
            .create_org_repo(&self.config.org, &body)
            .await
            .map_err(|e| {
                creation_error(e, || {
                    format!("Repository '{}' already exists or name is invalid", body.name)
                })
            })?;

        let url = str_field(&created, "html_url").or_else(|| str_field(&created, "full_name"));
        Ok(Payload::plain(format!(
            "Repository created successfully!\nURL: {}\nClone URL: {}\nSSH URL: {}",
            url.unwrap_or(UNAVAILABLE),
            str_field(&created, "clone_url").unwrap_or(UNAVAILABLE),
            str_field(&created, "ssh_url").unwrap_or(UNAVAILABLE),
        )))
    }

    async fn create_issue(&self, params: CreateIssueParams) -> Result<Payload, GithubOrgError> {
        let repo = RepoRef::parse(&params.repo)?;
        let body = NewIssue {
            title: params.title,
            body: params.body,
            labels: params.labels,
            assignees: params.assignees,
        };

        let created = self
            .github
            .create_issue(&repo, &body)
            .await
            .map_err(|e| {
                let detail = e.message.clone();
                creation_error(e, || format!("Issue could not be created in {}: {}", repo, detail))
            })?;

        Ok(Payload::plain(format!(
            "Issue created: {}",
            created_link(&created)
        )))
    }

    async fn create_pull_request(
        &self,
        params: CreatePullRequestParams,
    ) -> Result<Payload, GithubOrgError> {
        let repo = RepoRef::parse(&params.repo)?;
        let body = NewPullRequest {
            title: params.title,
            body: params.body,
            head: params.head,
            base: params.base,
            draft: params.draft,
        };

        let created = self
            .github
            .create_pull(&repo, &body)
            .await
            .map_err(|e| {
                let detail = e.message.clone();
                creation_error(e, || {
                    format!("Pull request could not be created in {}: {}", repo, detail)
                })
            })?;

        Ok(Payload::plain(format!(
            "Pull request created: {}",
            created_link(&created)
        )))
    }

    async fn search_code(&self, params: SearchCodeParams) -> Result<Payload, GithubOrgError> {
        let query = build_search_query(&self.config.org, &params);
        tracing::debug!(query = %query, "searching code");
        let results = self.github.search_code(&query, SEARCH_PAGE_SIZE).await?;
        Ok(Payload::json(&results))
    }

    async fn list_workflow_runs(
        &self,
        params: ListWorkflowRunsParams,
    ) -> Result<Payload, GithubOrgError> {
        let repo = RepoRef::parse(&params.repo)?;
        if let Some(workflow) = &params.workflow {
            sanitize_github_name(workflow, "workflow")?;
        }
        let query = WorkflowRunsQuery {
            workflow: params.workflow,
            branch: params.branch,
            status: params.status,
            per_page: params.limit.clamp(1, 100) as u8,
        };

        let runs = self.github.list_workflow_runs(&repo, &query).await?;
        Ok(Payload::json(&runs))
    }

    async fn get_repo_stats(&self, params: RepoStatsParams) -> Result<Payload, GithubOrgError> {
        let repo = RepoRef::parse(&params.repo)?;
        let variables = json!({ "owner": repo.owner, "name": repo.name });
        let stats = self.github.graphql(REPO_STATS_QUERY, variables).await?;
        Ok(Payload::json(&stats))
    }

    /// Resolve and read a `github://` resource.
    pub async fn read_resource(&self, uri: &str) -> Result<Payload, GithubOrgError> {
        if !self.config.toolset_enabled(Toolset::Context) {
            return Err(GithubOrgError::UnknownResource(uri.to_string()));
        }
        let route = resources::resolve(uri)?;
        tracing::debug!(uri, route = ?route, "reading resource");

        match route {
            ResourceRoute::OrgRepositories => {
                let org = self.config.org.as_str();
                sanitize_github_name(org, "org")?;
                let key = format!("repos:{}", org);
                let repos = self
                    .cache
                    .get_or_try_fetch(&key, || self.github.list_org_repos(org))
                    .await?;
                Ok(Payload::json(&repos))
            }
            ResourceRoute::Readme(repo) => {
                let readme = self.github.get_readme(&repo).await?;
                let content = readme
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| UpstreamError::new(None, "README response has no content"))?;
                Ok(Payload::markdown(decode_base64_content(content)?))
            }
            ResourceRoute::OpenIssues(repo) => {
                let issues = self
                    .github
                    .list_open_issues(&repo, RESOURCE_PAGE_SIZE)
                    .await?;
                Ok(Payload::json(&issues))
            }
            ResourceRoute::OpenPulls(repo) => {
                let pulls = self.github.list_open_pulls(&repo, RESOURCE_PAGE_SIZE).await?;
                Ok(Payload::json(&pulls))
            }
        }
    }
}

/// `query`, then the repository (or organization) scope, then language and
/// path qualifiers.
pub fn build_search_query(org: &str, params: &SearchCodeParams) -> String {
    let mut query = params.query.clone();
    match &params.repo {
        Some(repo) => query.push_str(&format!(" repo:{}", repo)),
        None => query.push_str(&format!(" org:{}", org)),
    }
    if let Some(language) = &params.language {
        query.push_str(&format!(" language:{}", language));
    }
    if let Some(path) = &params.path {
        query.push_str(&format!(" path:{}", path));
    }
    query
}

fn read_only_message(kind: ToolKind) -> String {
    let action = match kind {
        ToolKind::CreateRepository => "Repository creation",
        ToolKind::CreateIssue => "Issue creation",
        ToolKind::CreatePullRequest => "Pull request creation",
        other => other.name(),
    };
    format!("{} disabled in read-only mode", action)
}

/// 422 on a creation means the target already exists or a field was
/// rejected; everything else is passed through.
fn creation_error(err: UpstreamError, conflict: impl FnOnce() -> String) -> GithubOrgError {
    if err.is_unprocessable() {
        GithubOrgError::Conflict(conflict())
    } else {
        GithubOrgError::Upstream(err)
    }
}

const UNAVAILABLE: &str = "(unavailable)";

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Web URL of a created issue or pull request, else its number.
fn created_link(created: &Value) -> String {
    if let Some(url) = str_field(created, "html_url") {
        return url.to_string();
    }
    match created.get("number").and_then(Value::as_u64) {
        Some(number) => format!("#{} (URL unavailable)", number),
        None => "URL unavailable".to_string(),
    }
}
