//! Startup configuration.
//!
//! Every setting is a CLI flag that falls back to an environment variable.
//! The result is an immutable [`Config`] built once in `main` and shared
//! with the dispatcher and the GitHub client.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GITHUB_TOKEN is required (or pass --token)")]
    MissingToken,

    #[error(
        "unknown toolset '{0}' (expected one of: context, repos, issues, pull_requests, actions, code_security)"
    )]
    UnknownToolset(String),

    #[error("invalid GitHub API URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

/// Capability groups a tool can belong to. Only enabled groups are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toolset {
    Context,
    Repos,
    Issues,
    PullRequests,
    Actions,
    CodeSecurity,
}

impl Toolset {
    pub const ALL: [Toolset; 6] = [
        Toolset::Context,
        Toolset::Repos,
        Toolset::Issues,
        Toolset::PullRequests,
        Toolset::Actions,
        Toolset::CodeSecurity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Toolset::Context => "context",
            Toolset::Repos => "repos",
            Toolset::Issues => "issues",
            Toolset::PullRequests => "pull_requests",
            Toolset::Actions => "actions",
            Toolset::CodeSecurity => "code_security",
        }
    }
}

impl fmt::Display for Toolset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Toolset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Toolset::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::UnknownToolset(name.to_string()))
    }
}

/// MCP server exposing organization-scoped GitHub operations
#[derive(Debug, Parser)]
#[command(name = "mcp-github-org", version, about)]
pub struct Args {
    /// GitHub personal access token.
    /// Falls back to GITHUB_PERSONAL_ACCESS_TOKEN when GITHUB_TOKEN is unset.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Organization that owns created repositories and scopes code search
    #[arg(long, env = "GITHUB_ORG", default_value = "vertikon")]
    pub org: String,

    /// Repository advertised by the resource listing
    #[arg(long, env = "GITHUB_DEFAULT_REPO", default_value = "ecosystem")]
    pub default_repo: String,

    /// Server name reported to MCP clients
    #[arg(long, env = "MCP_SERVER_NAME", default_value = "vertikon-mcp-ultra")]
    pub server_name: String,

    /// Cache the organization repository listing
    #[arg(long, env = "ENABLE_CACHE")]
    pub enable_cache: bool,

    /// Cache time-to-live in seconds
    #[arg(long, env = "CACHE_TTL", default_value_t = 300)]
    pub cache_ttl: u64,

    /// GitHub REST API base URL (GraphQL is served from <url>/graphql)
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// Reject every tool that creates something on GitHub
    #[arg(long, env = "GITHUB_READ_ONLY")]
    pub read_only: bool,

    /// Comma-separated toolsets to enable
    #[arg(
        long,
        env = "GITHUB_TOOLSETS",
        value_delimiter = ',',
        default_value = "context,repos,issues,pull_requests,actions,code_security"
    )]
    pub toolsets: Vec<Toolset>,
}

impl Args {
    /// Resolve the token (`--token` > GITHUB_TOKEN > GITHUB_PERSONAL_ACCESS_TOKEN)
    /// and freeze the settings.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let fallback = std::env::var("GITHUB_PERSONAL_ACCESS_TOKEN").ok();
        let token = resolve_token(self.token, fallback)?;

        Ok(Config {
            token,
            org: self.org,
            default_repo: self.default_repo,
            server_name: self.server_name,
            cache_enabled: self.enable_cache,
            cache_ttl: Duration::from_secs(self.cache_ttl),
            api_url: self.api_url,
            read_only: self.read_only,
            toolsets: self.toolsets,
        })
    }
}

/// Pick the first non-empty token.
pub fn resolve_token(
    primary: Option<String>,
    fallback: Option<String>,
) -> Result<String, ConfigError> {
    primary
        .into_iter()
        .chain(fallback)
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
        .ok_or(ConfigError::MissingToken)
}

#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub org: String,
    pub default_repo: String,
    pub server_name: String,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub api_url: String,
    pub read_only: bool,
    pub toolsets: Vec<Toolset>,
}

impl Config {
    /// Defaults for everything except the token and organization.
    pub fn new(token: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            org: org.into(),
            default_repo: "ecosystem".to_string(),
            server_name: "vertikon-mcp-ultra".to_string(),
            cache_enabled: false,
            cache_ttl: Duration::from_secs(300),
            api_url: "https://api.github.com".to_string(),
            read_only: false,
            toolsets: Toolset::ALL.to_vec(),
        }
    }

    pub fn toolset_enabled(&self, toolset: Toolset) -> bool {
        self.toolsets.contains(&toolset)
    }
}

// Hand-written so the token never ends up in logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("default_repo", &self.default_repo)
            .field("server_name", &self.server_name)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_ttl", &self.cache_ttl)
            .field("api_url", &self.api_url)
            .field("read_only", &self.read_only)
            .field("toolsets", &self.toolsets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_token_prefers_primary() {
        let token = resolve_token(Some("ghp_a".into()), Some("ghp_b".into())).unwrap();
        assert_eq!(token, "ghp_a");
    }

    #[test]
    fn test_resolve_token_skips_empty_primary() {
        let token = resolve_token(Some("  ".into()), Some("ghp_b".into())).unwrap();
        assert_eq!(token, "ghp_b");
    }

    #[test]
    fn test_resolve_token_missing() {
        assert!(matches!(
            resolve_token(None, None),
            Err(ConfigError::MissingToken)
        ));
        assert!(matches!(
            resolve_token(Some(String::new()), None),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn test_toolset_from_str() {
        assert_eq!("repos".parse::<Toolset>().unwrap(), Toolset::Repos);
        assert_eq!(
            " pull_requests ".parse::<Toolset>().unwrap(),
            Toolset::PullRequests
        );
        assert_eq!("ACTIONS".parse::<Toolset>().unwrap(), Toolset::Actions);
        assert!("wiki".parse::<Toolset>().is_err());
    }

    #[test]
    fn test_args_parse_flags() {
        let args = Args::try_parse_from([
            "mcp-github-org",
            "--token",
            "ghp_test",
            "--org",
            "acme",
            "--enable-cache",
            "--cache-ttl",
            "60",
            "--read-only",
            "--toolsets",
            "repos,issues",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.token, "ghp_test");
        assert_eq!(config.org, "acme");
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(config.read_only);
        assert_eq!(config.toolsets, vec![Toolset::Repos, Toolset::Issues]);
        assert!(!config.toolset_enabled(Toolset::Actions));
    }

    #[test]
    fn test_args_rejects_unknown_toolset() {
        let result = Args::try_parse_from([
            "mcp-github-org",
            "--token",
            "ghp_test",
            "--toolsets",
            "repos,wiki",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_new_defaults() {
        let config = Config::new("ghp_test", "acme");
        assert_eq!(config.default_repo, "ecosystem");
        assert!(!config.cache_enabled);
        assert!(!config.read_only);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(Toolset::ALL.iter().all(|t| config.toolset_enabled(*t)));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = Config::new("ghp_secret", "acme");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("acme"));
    }
}
