//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use crate::cache::Clock;
use crate::error::UpstreamError;
use crate::github::{
    GithubApi, NewIssue, NewPullRequest, NewRepository, RepoRef, UpstreamResult,
    WorkflowRunsQuery,
};

/// A clock that only moves when told to.
#[derive(Clone)]
pub(crate) struct ManualClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap()
    }
}

/// One recorded upstream call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateOrgRepo { org: String, repo: NewRepository },
    CreateIssue { repo: RepoRef, issue: NewIssue },
    CreatePull { repo: RepoRef, pull: NewPullRequest },
    SearchCode { query: String, per_page: u8 },
    ListWorkflowRuns { repo: RepoRef, query: WorkflowRunsQuery },
    ListOrgRepos { org: String },
    GetReadme { repo: RepoRef },
    ListOpenIssues { repo: RepoRef, per_page: u8 },
    ListOpenPulls { repo: RepoRef, per_page: u8 },
    Graphql { query: String, variables: Value },
}

/// Records every call and answers with canned payloads, or with a fixed
/// failure when built with [`StubGithub::failing`].
#[derive(Default)]
pub(crate) struct StubGithub {
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<UpstreamError>>,
}

impl StubGithub {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing(status: Option<u16>, message: &str) -> Arc<Self> {
        let stub = Self::default();
        *stub.failure.lock().unwrap() = Some(UpstreamError::new(status, message));
        Arc::new(stub)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: Call, response: Value) -> UpstreamResult {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }
}

pub(crate) const README_TEXT: &str = "# Ecosystem\n\nShared platform code.\n";

#[async_trait]
impl GithubApi for StubGithub {
    async fn create_org_repo(&self, org: &str, repo: &NewRepository) -> UpstreamResult {
        let response = json!({
            "full_name": format!("{}/{}", org, repo.name),
            "html_url": format!("https://github.com/{}/{}", org, repo.name),
            "clone_url": format!("https://github.com/{}/{}.git", org, repo.name),
            "ssh_url": format!("git@github.com:{}/{}.git", org, repo.name),
        });
        self.record(
            Call::CreateOrgRepo {
                org: org.to_string(),
                repo: repo.clone(),
            },
            response,
        )
    }

    async fn create_issue(&self, repo: &RepoRef, issue: &NewIssue) -> UpstreamResult {
        let response = json!({
            "number": 7,
            "html_url": format!("https://github.com/{}/issues/7", repo),
        });
        self.record(
            Call::CreateIssue {
                repo: repo.clone(),
                issue: issue.clone(),
            },
            response,
        )
    }

    async fn create_pull(&self, repo: &RepoRef, pull: &NewPullRequest) -> UpstreamResult {
        let response = json!({
            "number": 12,
            "html_url": format!("https://github.com/{}/pull/12", repo),
        });
        self.record(
            Call::CreatePull {
                repo: repo.clone(),
                pull: pull.clone(),
            },
            response,
        )
    }

    async fn search_code(&self, query: &str, per_page: u8) -> UpstreamResult {
        let response = json!({ "total_count": 1, "items": [{ "path": "src/main.go" }] });
        self.record(
            Call::SearchCode {
                query: query.to_string(),
                per_page,
            },
            response,
        )
    }

    async fn list_workflow_runs(
        &self,
        repo: &RepoRef,
        query: &WorkflowRunsQuery,
    ) -> UpstreamResult {
        let response = json!({ "total_count": 1, "workflow_runs": [{ "id": 1, "status": "completed" }] });
        self.record(
            Call::ListWorkflowRuns {
                repo: repo.clone(),
                query: query.clone(),
            },
            response,
        )
    }

    async fn list_org_repos(&self, org: &str) -> UpstreamResult {
        let response = json!([{ "full_name": format!("{}/ecosystem", org) }]);
        self.record(
            Call::ListOrgRepos {
                org: org.to_string(),
            },
            response,
        )
    }

    async fn get_readme(&self, repo: &RepoRef) -> UpstreamResult {
        let encoded = base64::engine::general_purpose::STANDARD.encode(README_TEXT);
        let response = json!({ "name": "README.md", "encoding": "base64", "content": encoded });
        self.record(Call::GetReadme { repo: repo.clone() }, response)
    }

    async fn list_open_issues(&self, repo: &RepoRef, per_page: u8) -> UpstreamResult {
        let response = json!([{ "number": 3, "state": "open" }]);
        self.record(
            Call::ListOpenIssues {
                repo: repo.clone(),
                per_page,
            },
            response,
        )
    }

    async fn list_open_pulls(&self, repo: &RepoRef, per_page: u8) -> UpstreamResult {
        let response = json!([{ "number": 4, "state": "open" }]);
        self.record(
            Call::ListOpenPulls {
                repo: repo.clone(),
                per_page,
            },
            response,
        )
    }

    async fn graphql(&self, query: &str, variables: Value) -> UpstreamResult {
        let response = json!({ "repository": { "name": variables["name"], "stargazerCount": 42 } });
        self.record(
            Call::Graphql {
                query: query.to_string(),
                variables,
            },
            response,
        )
    }
}
