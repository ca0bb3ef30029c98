use std::sync::Arc;

use rmcp::model::*;
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::dispatch::{Dispatcher, Payload};
use crate::error::GithubOrgError;

/// MCP front end: converts protocol requests into dispatcher calls and
/// dispatcher results into protocol responses.
#[derive(Clone)]
pub struct GithubOrgServer {
    dispatcher: Arc<Dispatcher>,
}

impl GithubOrgServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn tool_list(&self) -> Result<ListToolsResult, ErrorData> {
        let tools: Vec<Value> = self
            .dispatcher
            .tools()
            .into_iter()
            .map(|kind| {
                json!({
                    "name": kind.name(),
                    "description": kind.description(),
                    "inputSchema": Value::Object((*kind.input_schema()).clone()),
                })
            })
            .collect();
        from_json(json!({ "tools": tools }))
    }

    pub fn resource_list(&self) -> Result<ListResourcesResult, ErrorData> {
        let resources: Vec<Value> = self
            .dispatcher
            .resources()
            .into_iter()
            .map(|r| {
                json!({
                    "uri": r.uri,
                    "name": r.name,
                    "description": r.description,
                    "mimeType": r.mime_type.as_str(),
                })
            })
            .collect();
        from_json(json!({ "resources": resources }))
    }

    pub async fn run_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ErrorData> {
        let payload = self
            .dispatcher
            .call_tool(name, arguments)
            .await
            .map_err(|e| rejected("tool", name, e))?;
        Ok(CallToolResult::success(vec![Content::text(payload.text)]))
    }

    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        let payload = self
            .dispatcher
            .read_resource(uri)
            .await
            .map_err(|e| rejected("resource", uri, e))?;
        resource_contents(uri, payload)
    }
}

fn rejected(what: &str, subject: &str, err: GithubOrgError) -> ErrorData {
    tracing::warn!(what, subject, kind = err.kind(), error = %err, "request failed");
    err.to_mcp_error()
}

fn resource_contents(uri: &str, payload: Payload) -> Result<ReadResourceResult, ErrorData> {
    from_json(json!({
        "contents": [{
            "uri": uri,
            "mimeType": payload.mime_type.as_str(),
            "text": payload.text,
        }]
    }))
}

/// Build a protocol result from its JSON wire form.
fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, ErrorData> {
    serde_json::from_value(value).map_err(|e| ErrorData::internal_error(e.to_string(), None))
}

impl ServerHandler for GithubOrgServer {
    fn get_info(&self) -> ServerInfo {
        let config = self.dispatcher.config();
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: config.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "GitHub server for the '{}' organization. Use create_repository, create_issue \
                 and create_pull_request to create things, search_code to search the \
                 organization's code, list_workflow_runs for CI runs and get_repo_stats for \
                 repository statistics. Resources under github://{}/ expose the repository \
                 list, READMEs, open issues and open pull requests.",
                config.org, config.org
            )),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        self.tool_list()
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        tracing::debug!(tool = %request.name, "tools/call");
        self.run_tool(&request.name, request.arguments).await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        self.resource_list()
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        tracing::debug!(uri = %request.uri, "resources/read");
        self.read(&request.uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Toolset};
    use crate::testing::{StubGithub, README_TEXT};

    fn make_server(config: Config) -> (GithubOrgServer, Arc<StubGithub>) {
        let github = StubGithub::new();
        let dispatcher = Dispatcher::new(Arc::new(config), github.clone());
        (GithubOrgServer::new(Arc::new(dispatcher)), github)
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Value {
        serde_json::to_value(value).unwrap()
    }

    #[test]
    fn test_get_info_uses_server_name() {
        let mut config = Config::new("ghp_test", "acme");
        config.server_name = "acme-github".to_string();
        let (server, _) = make_server(config);

        let info = server.get_info();
        assert_eq!(info.server_info.name, "acme-github");
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
        assert!(info.instructions.unwrap().contains("acme"));
    }

    #[test]
    fn test_tool_list_has_schemas() {
        let (server, _) = make_server(Config::new("ghp_test", "acme"));

        let listed = to_json(&server.tool_list().unwrap());
        let tools = listed["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 6);
        assert_eq!(tools[0]["name"], "create_repository");
        for tool in tools {
            assert_eq!(tool["inputSchema"]["type"], "object", "{}", tool["name"]);
            assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
        }
    }

    #[test]
    fn test_tool_list_respects_toolsets() {
        let mut config = Config::new("ghp_test", "acme");
        config.toolsets = vec![Toolset::Actions, Toolset::PullRequests];
        let (server, _) = make_server(config);

        let listed = to_json(&server.tool_list().unwrap());
        let names: Vec<&str> = listed["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, vec!["create_pull_request", "list_workflow_runs"]);
    }

    #[test]
    fn test_resource_list() {
        let (server, _) = make_server(Config::new("ghp_test", "acme"));

        let listed = to_json(&server.resource_list().unwrap());
        let resources = listed["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 4);
        assert_eq!(resources[1]["uri"], "github://acme/ecosystem/readme");
        assert_eq!(resources[1]["mimeType"], "text/markdown");
    }

    #[tokio::test]
    async fn test_run_tool_returns_text() {
        let (server, github) = make_server(Config::new("ghp_test", "acme"));
        let arguments = json!({ "repo": "acme/app", "title": "Bug", "body": "Steps" });

        let result = server
            .run_tool("create_issue", arguments.as_object().cloned())
            .await
            .unwrap();

        let result = to_json(&result);
        assert_eq!(
            result["content"][0]["text"],
            "Issue created: https://github.com/acme/app/issues/7"
        );
        assert_eq!(github.call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_tool_error_carries_kind() {
        let mut config = Config::new("ghp_test", "acme");
        config.read_only = true;
        let (server, github) = make_server(config);
        let arguments = json!({ "name": "demo" });

        let err = server
            .run_tool("create_repository", arguments.as_object().cloned())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::INVALID_REQUEST);
        assert_eq!(err.data, Some(json!({ "kind": "permission_denied" })));
        assert_eq!(github.call_count(), 0);
    }

    #[tokio::test]
    async fn test_read_returns_typed_contents() {
        let (server, _) = make_server(Config::new("ghp_test", "acme"));

        let result = to_json(&server.read("github://acme/ecosystem/readme").await.unwrap());
        let contents = &result["contents"][0];
        assert_eq!(contents["uri"], "github://acme/ecosystem/readme");
        assert_eq!(contents["mimeType"], "text/markdown");
        assert_eq!(contents["text"], README_TEXT);
    }

    #[tokio::test]
    async fn test_read_unknown_resource() {
        let (server, _) = make_server(Config::new("ghp_test", "acme"));

        let err = server.read("github://acme/ecosystem/wiki").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
    }
}
