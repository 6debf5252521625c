//! Tool definitions with rmcp macros.
//!
//! Five tools are exposed:
//! - `math_ask`: answer a math question
//! - `math_feedback`: rate an emitted answer
//! - `math_health`: probe every dependency
//! - `math_feedback_analytics`: ledger summary and threshold history
//! - `math_metrics`: request metrics per route and outcome
//!
//! Outcomes the caller can act on (rejected questions, insufficient
//! evidence, unknown responses, bad ratings) come back as tool errors
//! carrying `{"code", "message"}`. Storage and internal failures are
//! protocol errors.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler};
use serde::Serialize;

use super::requests::{AskRequest, FeedbackRequest};
use crate::agent::MathService;
use crate::error::{AskError, FeedbackError, McpError};

const INSTRUCTIONS: &str = "Math question answering. Call math_ask with a question; the answer \
comes from the curated knowledge base when it is confident enough and from web search \
otherwise. Rate answers with math_feedback using the returned response_id so routing \
thresholds can adapt.";

/// Machine-readable body of a tool error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolFailure {
    /// Stable outcome code.
    pub code: &'static str,
    /// Human-readable explanation.
    pub message: String,
}

impl ToolFailure {
    fn into_result(self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::error(vec![Content::json(self)?]))
    }
}

impl From<&AskError> for ToolFailure {
    fn from(error: &AskError) -> Self {
        let message = match error {
            AskError::InputRejected { reason } => reason.user_message().to_string(),
            AskError::InsufficientEvidence { .. } => {
                "Cannot answer confidently: insufficient evidence.".to_string()
            }
            AskError::ServiceUnavailable { .. } => {
                "The answering service is temporarily unavailable.".to_string()
            }
        };
        Self {
            code: error.code(),
            message,
        }
    }
}

impl From<McpError> for ErrorData {
    fn from(error: McpError) -> Self {
        match error {
            McpError::InvalidParameters { .. } => Self::invalid_params(error.to_string(), None),
            McpError::Internal { .. } => Self::internal_error(error.to_string(), None),
        }
    }
}

fn success<T: Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::json(value)?]))
}

fn internal(error: &impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(error.to_string(), None)
}

/// MCP server exposing a [`MathService`].
#[derive(Clone)]
pub struct MathServer {
    service: Arc<dyn MathService>,
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for MathServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MathServer").finish_non_exhaustive()
    }
}

#[tool_router]
impl MathServer {
    /// Create a server over `service`.
    #[must_use]
    pub fn new(service: Arc<dyn MathService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    /// The service behind the tools.
    #[must_use]
    pub fn service(&self) -> &Arc<dyn MathService> {
        &self.service
    }

    #[tool(
        description = "Answer a math question with step-by-step working, a final answer, \
        confidence and cited sources. Optional topic and difficulty_level steer the explanation."
    )]
    async fn math_ask(
        &self,
        Parameters(req): Parameters<AskRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let question = req.into_question()?;
        match self.service.ask(question).await {
            Ok(response) => success(&response),
            Err(e) => ToolFailure::from(&e).into_result(),
        }
    }

    #[tool(
        description = "Rate an answer from math_ask: response_id, rating 1-5, is_helpful, \
        optional comment and suggested_improvement."
    )]
    async fn math_feedback(
        &self,
        Parameters(req): Parameters<FeedbackRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = match req.into_feedback() {
            Ok(feedback) => self.service.submit_feedback(feedback).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(ack) => success(&ack),
            Err(e @ FeedbackError::UnknownResponse { .. }) => ToolFailure {
                code: "UNKNOWN_RESPONSE",
                message: e.to_string(),
            }
            .into_result(),
            Err(e @ FeedbackError::InvalidRating { .. }) => ToolFailure {
                code: "INVALID_RATING",
                message: e.to_string(),
            }
            .into_result(),
            Err(FeedbackError::Storage(e)) => Err(internal(&e)),
        }
    }

    #[tool(description = "Report reachability of the knowledge base, web search, generation \
    model and feedback ledger.")]
    async fn math_health(&self) -> Result<CallToolResult, ErrorData> {
        success(&self.service.health().await)
    }

    #[tool(description = "Summarise collected feedback, current routing thresholds and their \
    adjustment history.")]
    async fn math_feedback_analytics(&self) -> Result<CallToolResult, ErrorData> {
        let report = self
            .service
            .feedback_report()
            .await
            .map_err(|e| internal(&e))?;
        success(&report)
    }

    #[tool(description = "Request counts, latency and confidence per route, outcome counts and \
    recent escalations.")]
    #[allow(clippy::unused_async)]
    async fn math_metrics(&self) -> Result<CallToolResult, ErrorData> {
        success(&self.service.metrics())
    }
}

#[tool_handler]
impl ServerHandler for MathServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.into()),
            ..Default::default()
        }
    }
}
