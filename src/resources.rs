//! `github://` resource identifiers.
//!
//! An identifier is split into path segments and run through [`RULES`] in
//! order; the first rule whose predicate accepts the segments builds the
//! route. Order matters: `acme/repositories/...` is always the organization
//! listing, whatever follows.

use crate::error::GithubOrgError;
use crate::github::RepoRef;

pub const SCHEME: &str = "github://";

/// MIME kind of a textual payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeType {
    PlainText,
    Json,
    Markdown,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::PlainText => "text/plain",
            MimeType::Json => "application/json",
            MimeType::Markdown => "text/markdown",
        }
    }
}

/// What a resource identifier points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRoute {
    /// Repositories of the configured organization.
    OrgRepositories,
    Readme(RepoRef),
    OpenIssues(RepoRef),
    OpenPulls(RepoRef),
}

impl ResourceRoute {
    pub fn mime_type(&self) -> MimeType {
        match self {
            ResourceRoute::Readme(_) => MimeType::Markdown,
            _ => MimeType::Json,
        }
    }
}

struct Rule {
    matches: fn(&[&str]) -> bool,
    build: fn(&[&str]) -> Result<ResourceRoute, GithubOrgError>,
}

const RULES: &[Rule] = &[
    Rule {
        matches: is_repositories,
        build: org_repositories,
    },
    Rule {
        matches: is_readme,
        build: readme,
    },
    Rule {
        matches: is_issues,
        build: open_issues,
    },
    Rule {
        matches: is_pulls,
        build: open_pulls,
    },
];

fn is_repositories(segments: &[&str]) -> bool {
    segment_is(segments, 1, "repositories")
}

fn is_readme(segments: &[&str]) -> bool {
    segment_is(segments, 2, "readme")
}

fn is_issues(segments: &[&str]) -> bool {
    segment_is(segments, 2, "issues")
}

fn is_pulls(segments: &[&str]) -> bool {
    segment_is(segments, 2, "pulls")
}

fn org_repositories(_: &[&str]) -> Result<ResourceRoute, GithubOrgError> {
    Ok(ResourceRoute::OrgRepositories)
}

fn readme(segments: &[&str]) -> Result<ResourceRoute, GithubOrgError> {
    repo_of(segments).map(ResourceRoute::Readme)
}

fn open_issues(segments: &[&str]) -> Result<ResourceRoute, GithubOrgError> {
    repo_of(segments).map(ResourceRoute::OpenIssues)
}

fn open_pulls(segments: &[&str]) -> Result<ResourceRoute, GithubOrgError> {
    repo_of(segments).map(ResourceRoute::OpenPulls)
}

fn segment_is(segments: &[&str], index: usize, expected: &str) -> bool {
    segments.get(index).is_some_and(|s| *s == expected)
}

// Only called once a rule has seen at least three segments.
fn repo_of(segments: &[&str]) -> Result<RepoRef, GithubOrgError> {
    RepoRef::new(segments[0], segments[1])
}

/// Resolve an identifier, with or without the `github://` prefix.
pub fn resolve(uri: &str) -> Result<ResourceRoute, GithubOrgError> {
    let path = uri.strip_prefix(SCHEME).unwrap_or(uri);
    let segments: Vec<&str> = path.split('/').collect();

    let rule = RULES
        .iter()
        .find(|rule| (rule.matches)(&segments))
        .ok_or_else(|| GithubOrgError::UnknownResource(uri.to_string()))?;
    (rule.build)(&segments)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: MimeType,
}

/// The concrete resources advertised for an organization and its default
/// repository.
pub fn advertised(org: &str, default_repo: &str) -> Vec<ResourceDescriptor> {
    let repo_uri = format!("{}{}/{}", SCHEME, org, default_repo);
    vec![
        ResourceDescriptor {
            uri: format!("{}{}/repositories", SCHEME, org),
            name: "Organization Repositories",
            description: "All repositories of the organization, most recently updated first",
            mime_type: MimeType::Json,
        },
        ResourceDescriptor {
            uri: format!("{}/readme", repo_uri),
            name: "Main README",
            description: "README of the default repository",
            mime_type: MimeType::Markdown,
        },
        ResourceDescriptor {
            uri: format!("{}/issues", repo_uri),
            name: "Open Issues",
            description: "Open issues of the default repository",
            mime_type: MimeType::Json,
        },
        ResourceDescriptor {
            uri: format!("{}/pulls", repo_uri),
            name: "Pull Requests",
            description: "Open pull requests of the default repository",
            mime_type: MimeType::Json,
        },
    ]
}
