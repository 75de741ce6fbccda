//! MCP message shapes: initialize, tools/list, tools/call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::MCP_VERSION;

/// Client's initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Value>,
}

fn default_protocol_version() -> String {
    MCP_VERSION.to_string()
}

impl Default for InitializeRequest {
    fn default() -> Self {
        Self {
            protocol_version: default_protocol_version(),
            capabilities: Value::Null,
            client_info: None,
        }
    }
}

/// Server's initialize response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// One tool in the tools/list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescription {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescription>,
}

/// tools/call parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// One content block of a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
        }
    }
}

/// tools/call result: `{content: [{type: "text", text}], isError}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Success result carrying a JSON payload as pretty-printed text.
    pub fn success(payload: &Value) -> Self {
        Self {
            content: vec![ToolResultContent::text(
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string()),
            )],
            is_error: Some(false),
        }
    }

    /// Error result carrying the message text.
    pub fn error(message: &str) -> Self {
        Self {
            content: vec![ToolResultContent::text(
                serde_json::json!({ "error": message }).to_string(),
            )],
            is_error: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_tool_result_shape() {
        let result = CallToolResult::success(&serde_json::json!({ "memory_id": "m1" }));
        let raw = serde_json::to_value(&result).unwrap();
        assert_eq!(raw["isError"], serde_json::json!(false));
        assert_eq!(raw["content"][0]["type"], serde_json::json!("text"));
        assert!(raw["content"][0]["text"].as_str().unwrap().contains("m1"));

        let err = CallToolResult::error("boom");
        let raw = serde_json::to_value(&err).unwrap();
        assert_eq!(raw["isError"], serde_json::json!(true));
        assert!(raw["content"][0]["text"].as_str().unwrap().contains("boom"));
    }

    #[test]
    fn test_initialize_request_defaults() {
        let request: InitializeRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.protocol_version, MCP_VERSION);
    }
}
