use rmcp::model::ErrorData;
use serde_json::json;

/// A failure reported by GitHub (or by the transport used to reach it).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamError {
    /// HTTP status when GitHub answered, `None` for transport failures.
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// GitHub answers 422 when a resource already exists or a field is invalid.
    pub fn is_unprocessable(&self) -> bool {
        self.status == Some(422)
    }
}

impl From<octocrab::Error> for UpstreamError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => Self {
                status: Some(source.status_code.as_u16()),
                message: source.message.clone(),
            },
            _ => Self {
                status: None,
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GithubOrgError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    ReadOnly(String),

    #[error("{0}")]
    Conflict(String),

    #[error("GitHub API error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),
}

impl GithubOrgError {
    /// Stable machine-readable kind, sent alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            GithubOrgError::Validation(_) => "validation",
            GithubOrgError::ReadOnly(_) => "permission_denied",
            GithubOrgError::Conflict(_) => "conflict",
            GithubOrgError::Upstream(_) => "upstream",
            GithubOrgError::UnknownResource(_) => "unknown_resource",
        }
    }

    pub fn to_mcp_error(&self) -> ErrorData {
        let data = Some(json!({ "kind": self.kind() }));
        match self {
            GithubOrgError::Validation(_) => ErrorData::invalid_params(self.to_string(), data),
            GithubOrgError::ReadOnly(_) | GithubOrgError::Conflict(_) => {
                ErrorData::invalid_request(self.to_string(), data)
            }
            GithubOrgError::UnknownResource(_) => {
                ErrorData::resource_not_found(self.to_string(), data)
            }
            GithubOrgError::Upstream(_) => ErrorData::internal_error(self.to_string(), data),
        }
    }
}
