//! MCP server scoped to one GitHub organization.
//!
//! Tools create repositories, issues and pull requests, search the
//! organization's code, list workflow runs and report repository statistics.
//! Resources under `github://<org>/` expose the repository list, READMEs,
//! open issues and open pull requests.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod github;
pub mod params;
pub mod resources;
pub mod server;

#[cfg(test)]
mod testing;
