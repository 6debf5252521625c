//! Transport layer for the MCP server.
//!
//! Stdio is the only transport: the server runs as a subprocess of an MCP
//! client and speaks JSON-RPC over stdin/stdout. Logs go to stderr.

use rmcp::service::{serve_server, RoleServer, RunningService};
use rmcp::transport::io::stdio;

use super::tools::MathServer;
use crate::error::{AppError, McpError};

/// Stdio transport handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioTransport;

impl StdioTransport {
    /// Creates a stdio transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Starts serving `server` over stdin/stdout.
    ///
    /// The returned service runs until the client disconnects; await
    /// `waiting()` on it to block until then.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Mcp`] if the initialization handshake fails.
    pub async fn serve(
        self,
        server: MathServer,
    ) -> Result<RunningService<RoleServer, MathServer>, AppError> {
        serve_server(server, stdio()).await.map_err(|e| {
            AppError::Mcp(McpError::Internal {
                message: e.to_string(),
            })
        })
    }
}
