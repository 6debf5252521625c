//! Main MCP server orchestration.
//!
//! Wires the production collaborators (Qdrant, Tavily, Gemini, `SQLite`)
//! into a [`MathAgent`], restores adapted thresholds, starts the periodic
//! adaptation loop and serves the tools over stdio.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::agent::{AdaptationLoop, MathAgent, MathService};
use crate::clients::{GeminiClient, QdrantRetriever, TavilySearcher};
use crate::composer::SolutionComposer;
use crate::config::Config;
use crate::error::AppError;
use crate::feedback::FeedbackAdapter;
use crate::guardrails::Guardrails;
use crate::routing::RoutingEngine;
use crate::scoring::ConfidenceScorer;
use crate::storage::SqliteStorage;

use super::tools::MathServer;
use super::transport::StdioTransport;

/// In-memory database marker accepted for `DATABASE_PATH`.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// The agent as deployed.
pub type ProductionAgent =
    MathAgent<QdrantRetriever<GeminiClient>, TavilySearcher, GeminiClient, SqliteStorage>;

/// Main MCP server that orchestrates all components.
#[derive(Debug)]
pub struct McpServer {
    config: Config,
}

impl McpServer {
    /// Creates a new MCP server with the given configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Open the ledger database named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the database cannot be opened or
    /// migrated.
    pub async fn open_storage(&self) -> Result<SqliteStorage, AppError> {
        let storage = if self.config.database_path == IN_MEMORY_DATABASE {
            SqliteStorage::new_in_memory().await?
        } else {
            SqliteStorage::new(&self.config.database_path).await?
        };
        Ok(storage)
    }

    /// Build the agent over the production collaborators.
    ///
    /// Nothing is contacted here; collaborators are first used by `ask` or
    /// `health`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Collaborator`] if an HTTP client cannot be built.
    pub fn build_agent(&self, storage: SqliteStorage) -> Result<ProductionAgent, AppError> {
        let config = &self.config;
        let routing = &config.routing;

        let gemini = GeminiClient::new(
            config.gemini_api_key.clone(),
            &config.gemini_model,
            &config.gemini_embedding_model,
            config.http_settings(&config.gemini_url),
        )?;
        let knowledge = QdrantRetriever::new(
            &config.qdrant_collection,
            config.qdrant_api_key.clone(),
            Arc::new(gemini.clone()),
            config.http_settings(&config.qdrant_url),
        )?;
        let web = TavilySearcher::new(
            config.tavily_api_key.clone(),
            config.http_settings(&config.tavily_url),
        )?;

        let engine = RoutingEngine::new(
            knowledge,
            web,
            SolutionComposer::new(gemini, routing.generation_timeout()),
            Guardrails::new(routing.guardrails.clone()),
            ConfidenceScorer::new(routing.scoring),
            routing.engine_settings(),
        );

        Ok(MathAgent::new(
            engine,
            routing.initial_weights(),
            storage,
            FeedbackAdapter::new(routing.adaptation),
        )
        .with_adapt_every(routing.adapt_every_n_feedback))
    }

    /// Runs the server using stdio transport.
    ///
    /// Blocks until the client disconnects or the process is interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Storage initialization fails
    /// - A collaborator client cannot be built
    /// - The MCP handshake fails
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run_stdio(&self) -> Result<(), AppError> {
        let storage = self.open_storage().await?;
        let agent = self.build_agent(storage)?;

        let revision = agent.restore_weights().await?;
        let weights = agent.weights();
        tracing::info!(
            revision,
            kb_high = weights.thresholds.kb_high,
            web_high = weights.thresholds.web_high,
            low = weights.thresholds.low,
            floor = weights.thresholds.floor,
            "Routing weights loaded"
        );

        let service: Arc<dyn MathService> = Arc::new(agent);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval_secs = self.config.routing.adapt_interval_secs;
        let adaptation = (interval_secs > 0).then(|| {
            let task = AdaptationLoop::new(Arc::clone(&service), Duration::from_secs(interval_secs));
            tokio::spawn(task.run(shutdown_rx))
        });

        let server = MathServer::new(service);
        let running = StdioTransport::new().serve(server).await?;
        tracing::info!("MCP server ready on stdio");

        tokio::select! {
            reason = running.waiting() => tracing::info!(?reason, "MCP client disconnected"),
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
        }

        let _ = shutdown_tx.send(true);
        if let Some(handle) = adaptation {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Adaptation loop ended abnormally");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::agent::HealthStatus;
    use crate::config::SecretString;

    fn test_config() -> Config {
        let mut config = Config::new(SecretString::new("gemini-key"), SecretString::new("tavily-key"));
        config.database_path = IN_MEMORY_DATABASE.into();
        // Nothing listens on port 1
        config.gemini_url = "http://127.0.0.1:1".into();
        config.qdrant_url = "http://127.0.0.1:1".into();
        config.tavily_url = "http://127.0.0.1:1".into();
        config.request_timeout_ms = 1000;
        config.max_retries = 0;
        config
    }

    #[test]
    fn test_mcp_server_config_accessor() {
        let server = McpServer::new(test_config());
        assert_eq!(server.config().max_retries, 0);
        assert!(format!("{server:?}").contains("McpServer"));
        assert!(!format!("{server:?}").contains("gemini-key"));
    }

    #[tokio::test]
    async fn test_build_agent_uses_configured_thresholds() {
        let mut config = test_config();
        config.routing.high_threshold = 0.85;
        config.routing.adapt_every_n_feedback = 3;
        let server = McpServer::new(config);

        let storage = server.open_storage().await.unwrap();
        let agent = server.build_agent(storage).unwrap();

        assert!((agent.weights().thresholds.kb_high - 0.85).abs() < f64::EPSILON);
        assert_eq!(agent.engine().knowledge().collection(), "math_knowledge_base");
        assert_eq!(agent.restore_weights().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_health_with_unreachable_collaborators() {
        let server = McpServer::new(test_config());
        let agent = server.build_agent(server.open_storage().await.unwrap()).unwrap();

        let report = agent.health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.dependencies["ledger"], true);
        assert_eq!(report.dependencies["knowledge_base"], false);
        assert_eq!(report.dependencies["web_search"], false);
        assert_eq!(report.dependencies["generation"], false);
        assert_eq!(report.feedback_entries, Some(0));
    }
}
