//! MCP server implementation.
//!
//! This module provides:
//! - [`MathServer`]: the five `math_*` tools over a [`MathService`](crate::agent::MathService)
//! - [`AskRequest`] and [`FeedbackRequest`]: tool parameters with JSON schemas
//! - [`StdioTransport`]: stdin/stdout transport
//! - [`McpServer`]: production wiring and the serve loop
//!
//! # Example
//!
//! ```no_run
//! use math_router::config::Config;
//! use math_router::server::McpServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! McpServer::new(config).run_stdio().await?;
//! # Ok(())
//! # }
//! ```

mod mcp;
mod requests;
mod tools;
mod transport;

pub use mcp::{McpServer, ProductionAgent, IN_MEMORY_DATABASE};
pub use requests::{AskRequest, FeedbackRequest};
pub use tools::{MathServer, ToolFailure};
pub use transport::StdioTransport;
