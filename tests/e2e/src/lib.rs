//! Shared harness for end-to-end journey tests.
//!
//! Every test gets an isolated temporary database; dropping the harness
//! removes it.

use std::sync::Arc;

use tempfile::TempDir;

use memorygraph_core::backend::sqlite::SqliteBackend;
use memorygraph_core::config::Config;
use memorygraph_core::model::{Memory, MemoryType};
use memorygraph_core::repository::MemoryRepository;
use memorygraph_mcp::server::McpServer;
use memorygraph_mcp::tools::ServerState;

/// An isolated repository over a temporary SQLite file.
pub struct TestStore {
    pub repository: MemoryRepository,
    /// Kept alive so the database file survives the test body
    _temp_dir: TempDir,
}

impl TestStore {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let backend = SqliteBackend::create(Some(temp_dir.path().join("e2e.db")))
            .await
            .expect("sqlite backend");
        Self {
            repository: MemoryRepository::new(Arc::new(backend)),
            _temp_dir: temp_dir,
        }
    }

    /// Path usable for sibling files (exports, second databases).
    pub fn path(&self, name: &str) -> std::path::PathBuf {
        self._temp_dir.path().join(name)
    }

    pub async fn store(&self, memory_type: MemoryType, title: &str, content: &str) -> String {
        self.repository
            .store_memory(Memory::new(memory_type, title, content))
            .await
            .expect("store memory")
    }
}

/// An MCP server wired to an isolated repository, for dispatch-level tests.
pub struct TestServer {
    pub server: McpServer,
    pub state: Arc<ServerState>,
    _temp_dir: TempDir,
}

impl TestServer {
    pub async fn new(config: Config) -> Self {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let backend = SqliteBackend::create(Some(temp_dir.path().join("server.db")))
            .await
            .expect("sqlite backend");
        let state = Arc::new(ServerState {
            repository: MemoryRepository::new(Arc::new(backend)),
            config,
        });
        Self {
            server: McpServer::new(Arc::clone(&state)),
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Initialize the protocol and return self for chaining.
    pub async fn initialized(mut self) -> Self {
        let response = self
            .server
            .handle_request(request("initialize", Some(serde_json::json!({}))))
            .await
            .expect("initialize response");
        assert!(response.error.is_none(), "initialize failed");
        self
    }

    /// Call a tool and return the parsed JSON payload plus the error flag.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> (serde_json::Value, bool) {
        let response = self
            .server
            .handle_request(request(
                "tools/call",
                Some(serde_json::json!({ "name": name, "arguments": arguments })),
            ))
            .await
            .expect("tool response");
        let result = response.result.expect("tool result");
        let is_error = result["isError"].as_bool().unwrap_or(false);
        let text = result["content"][0]["text"].as_str().unwrap_or("{}");
        let payload = serde_json::from_str(text).unwrap_or(serde_json::Value::Null);
        (payload, is_error)
    }
}

fn request(
    method: &str,
    params: Option<serde_json::Value>,
) -> memorygraph_mcp::protocol::types::JsonRpcRequest {
    memorygraph_mcp::protocol::types::JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(1)),
        method: method.to_string(),
        params,
    }
}
