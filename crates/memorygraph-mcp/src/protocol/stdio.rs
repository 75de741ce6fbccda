//! Line-delimited JSON-RPC over stdin/stdout.
//!
//! One request per line in, one response per line out. Logging goes to
//! stderr so stdout stays clean for the protocol. The read loop is async and
//! cancels cleanly when the caller drops the future (ctrl-c handling lives
//! in the binary).

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, warn};

use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::server::McpServer;

/// Minimal response used when even error serialization fails.
const FALLBACK_ERROR: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// stdio transport for the MCP server.
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }

    /// Serve requests until stdin closes.
    pub async fn run(self, mut server: McpServer) -> std::io::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            debug!("Received: {} bytes", line.len());

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Failed to parse request: {e}");
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    Self::write_response(&mut stdout, &response).await?;
                    continue;
                }
            };

            if let Some(response) = server.handle_request(request).await {
                Self::write_response(&mut stdout, &response).await?;
            }
        }
        Ok(())
    }

    async fn write_response(
        stdout: &mut tokio::io::Stdout,
        response: &JsonRpcResponse,
    ) -> std::io::Result<()> {
        let payload = match serde_json::to_string(response) {
            Ok(payload) => payload,
            Err(e) => {
                // Send a minimal error response so the client doesn't hang
                error!("Failed to serialize response: {e}");
                FALLBACK_ERROR.to_string()
            }
        };
        debug!("Sending: {} bytes", payload.len());
        stdout.write_all(payload.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}
