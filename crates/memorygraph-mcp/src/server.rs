//! MCP server core: routes JSON-RPC requests to the tool dispatcher.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools::{ServerState, ToolRegistry};

/// MCP server over one repository.
pub struct McpServer {
    state: Arc<ServerState>,
    registry: ToolRegistry,
    initialized: bool,
}

impl McpServer {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self {
            state,
            registry: ToolRegistry::new(),
            initialized: false,
        }
    }

    /// Handle one incoming JSON-RPC request. Notifications return `None`.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        if !self.initialized
            && request.method != "initialize"
            && request.method != "notifications/initialized"
        {
            warn!("Rejecting request '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::server_not_initialized(),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("Unknown method: {method}");
                Err(JsonRpcError::method_not_found(method))
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(params) => serde_json::from_value(params)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        // Use the client's version when it is older than ours; clients
        // reject servers that answer with a newer protocol version
        let negotiated = if request.protocol_version.as_str() < MCP_VERSION {
            request.protocol_version
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;
        let result = InitializeResult {
            protocol_version: negotiated,
            capabilities: ServerCapabilities {
                tools: Some(serde_json::json!({})),
            },
            server_info: ServerInfo {
                name: "memorygraph".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Persistent knowledge-graph memory. Store problems, solutions, errors, \
                 fixes, and decisions as typed memories; link them with typed \
                 relationships (SOLVES, CAUSES, REQUIRES, ...). Use recall_memories for \
                 natural language queries and search_memories with tags for acronyms and \
                 exact terms."
                    .to_string(),
            ),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = self.registry.visible_tools(self.state.config.tool_profile);
        serde_json::to_value(ListToolsResult { tools })
            .map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(params) => serde_json::from_value(params)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("Missing tool call parameters")),
        };

        // Single table lookup; unknown names become isError results so the
        // transport keeps serving
        let call_result = match self.registry.handler(&request.name) {
            Some(handler) => match handler(&self.state, request.arguments).await {
                Ok(payload) => CallToolResult::success(&payload),
                Err(message) => {
                    warn!("Tool {} failed: {message}", request.name);
                    CallToolResult::error(&message)
                }
            },
            None => CallToolResult::error(&format!("Unknown tool: {}", request.name)),
        };

        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use memorygraph_core::backend::sqlite::SqliteBackend;
    use memorygraph_core::config::{Config, ToolProfile};
    use memorygraph_core::repository::MemoryRepository;
    use serde_json::json;
    use tempfile::tempdir;

    async fn server_with_profile(profile: ToolProfile) -> (tempfile::TempDir, McpServer) {
        let dir = tempdir().unwrap();
        let backend = SqliteBackend::create(Some(dir.path().join("server.db")))
            .await
            .unwrap();
        let mut config = Config::default();
        config.tool_profile = profile;
        let state = Arc::new(ServerState {
            repository: MemoryRepository::new(Arc::new(backend)),
            config,
        });
        (dir, McpServer::new(state))
    }

    fn request(method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    async fn initialize(server: &mut McpServer) {
        let response = server
            .handle_request(request("initialize", Some(json!({}))))
            .await
            .unwrap();
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_rejects_before_initialize() {
        let (_dir, mut server) = server_with_profile(ToolProfile::Core).await;
        let response = server.handle_request(request("tools/list", None)).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32003);
    }

    #[tokio::test]
    async fn test_tools_list_respects_profile() {
        let (_dir, mut server) = server_with_profile(ToolProfile::Core).await;
        initialize(&mut server).await;
        let response = server.handle_request(request("tools/list", None)).await.unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 9);

        let (_dir, mut server) = server_with_profile(ToolProfile::Extended).await;
        initialize(&mut server).await;
        let response = server.handle_request(request("tools/list", None)).await.unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 11);
    }

    #[tokio::test]
    async fn test_store_and_recall_round_trip() {
        let (_dir, mut server) = server_with_profile(ToolProfile::Core).await;
        initialize(&mut server).await;

        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({
                    "name": "store_memory",
                    "arguments": {
                        "type": "solution",
                        "title": "Fixed Redis timeout",
                        "content": "Raised timeout to 30s",
                        "tags": ["redis", "timeout"],
                        "importance": 0.8,
                    },
                })),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(false));

        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({
                    "name": "recall_memories",
                    "arguments": { "query": "timeout" },
                })),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(false));

        let text = result["content"][0]["text"].as_str().unwrap();
        let payload: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["count"], json!(1));
        let match_info = &payload["memories"][0]["match_info"];
        assert!(match_info["matched_fields"]
            .as_array()
            .unwrap()
            .contains(&json!("title")));
        assert_eq!(match_info["match_quality"], json!("high"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let (_dir, mut server) = server_with_profile(ToolProfile::Core).await;
        initialize(&mut server).await;

        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({ "name": "definitely_not_a_tool", "arguments": {} })),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        assert!(result["content"][0]["text"].as_str().unwrap().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_serving() {
        let (_dir, mut server) = server_with_profile(ToolProfile::Core).await;
        initialize(&mut server).await;

        // Invalid arguments produce an isError result, not a protocol error
        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({
                    "name": "store_memory",
                    "arguments": { "type": "nonsense", "title": "t", "content": "c" },
                })),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));

        // And the server still answers
        let response = server.handle_request(request("ping", None)).await.unwrap();
        assert!(response.error.is_none());
    }
}
