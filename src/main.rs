use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mcp_github_org::config::Args;
use mcp_github_org::dispatch::Dispatcher;
use mcp_github_org::github::OctocrabClient;
use mcp_github_org::server::GithubOrgServer;
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "mcp_github_org=info";

/// `RUST_LOG` when set and valid, `mcp_github_org=info` otherwise.
fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Logs go to stderr; stdout carries the MCP protocol.
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = env_filter(std::env::var("RUST_LOG").ok().as_deref());
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = match args.into_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    let github = OctocrabClient::new(&config).context("Failed to create GitHub client")?;

    tracing::info!(
        org = %config.org,
        default_repo = %config.default_repo,
        server = %config.server_name,
        read_only = config.read_only,
        cache_enabled = config.cache_enabled,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        toolsets = ?config.toolsets,
        "Starting mcp-github-org server"
    );

    let dispatcher = Dispatcher::new(config, Arc::new(github));
    let service = GithubOrgServer::new(Arc::new(dispatcher));
    let running = service.serve(stdio()).await?;
    running.waiting().await?;

    Ok(())
}
