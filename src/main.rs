//! Math Router binary entry point.
//!
//! This binary provides a stdio-based MCP server for math questions.
//! All logs go to stderr; stdout is reserved for MCP JSON-RPC messages.
//! Set `LOG_FORMAT=json` for structured log lines.
//!
//! Coverage is excluded because the main function cannot be unit tested
//! as it requires the full MCP protocol handshake over stdio.

// Enable the coverage attribute when running with nightly for llvm-cov exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use math_router::config::Config;
use math_router::server::McpServer;
use tracing_subscriber::EnvFilter;

#[cfg_attr(coverage_nightly, coverage(off))]
fn init_logging() {
    let filter = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    // Load .env before reading LOG_LEVEL
    let _ = dotenvy::dotenv();
    init_logging();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "math-router starting");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration error");
            std::process::exit(1);
        }
    };

    tracing::info!(
        database = %config.database_path,
        collection = %config.qdrant_collection,
        model = %config.gemini_model,
        high_threshold = config.routing.high_threshold,
        low_threshold = config.routing.low_threshold,
        timeout_ms = config.request_timeout_ms,
        "Configuration loaded"
    );

    let server = McpServer::new(config);
    if let Err(e) = server.run_stdio().await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }

    tracing::info!("math-router shutdown complete");
}
