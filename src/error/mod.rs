//! Error types for the math routing engine.
//!
//! This module defines a hierarchical error system:
//! - [`AppError`]: Top-level application errors
//! - [`AskError`]: User-facing outcomes of `ask` that are not a [`Response`]
//! - [`CollaboratorError`]: Knowledge base, web search and generation failures
//! - [`FeedbackError`]: Feedback submission failures
//! - [`StorageError`]: Database operation errors
//! - [`McpError`]: MCP protocol errors
//! - [`ConfigError`]: Configuration errors
//!
//! Retrieval timeouts, malformed generations and output guardrail rejections
//! are recovered inside the engine and surface as
//! [`RecoveredCondition`](crate::model::RecoveredCondition) entries on the
//! response, never as errors.
//!
//! All errors implement `Send + Sync` for async compatibility.
//!
//! [`Response`]: crate::model::Response

use thiserror::Error;

use crate::guardrails::InputRejection;

/// Top-level application error.
///
/// Wraps all subsystem errors for unified handling in the binary and server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Ask pipeline error.
    #[error("Ask error: {0}")]
    Ask(#[from] AskError),

    /// Collaborator error.
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Feedback error.
    #[error("Feedback error: {0}")]
    Feedback(#[from] FeedbackError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// MCP protocol error.
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Outcomes of `ask` that do not produce a response.
///
/// `InputRejected` and `InsufficientEvidence` are user-facing and must be
/// presented as such; only `ServiceUnavailable` is a fault of the service.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AskError {
    /// The question failed the input guardrail.
    #[error("Question rejected: {reason}")]
    InputRejected {
        /// Why the question was rejected.
        reason: InputRejection,
    },

    /// Neither the knowledge base nor web search produced usable evidence.
    #[error("Cannot answer confidently: insufficient evidence (kb {kb_score:.2}, web {web_score:.2})")]
    InsufficientEvidence {
        /// Knowledge base confidence.
        kb_score: f64,
        /// Web search confidence.
        web_score: f64,
    },

    /// Every collaborator the request needed was unreachable.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Description of the outage.
        message: String,
    },
}

impl AskError {
    /// Returns true if the caller can fix the problem by changing the question.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InputRejected { .. } | Self::InsufficientEvidence { .. }
        )
    }

    /// Stable machine-readable code for the outcome.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InputRejected { .. } => "INPUT_REJECTED",
            Self::InsufficientEvidence { .. } => "INSUFFICIENT_EVIDENCE",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
        }
    }
}

/// Errors from the knowledge base, web search and generation collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Authentication failed due to an invalid API key.
    #[error("{service}: authentication failed")]
    AuthenticationFailed {
        /// Collaborator name.
        service: String,
    },

    /// Request was rate limited.
    #[error("{service}: rate limited, retry after {retry_after_seconds}s")]
    RateLimited {
        /// Collaborator name.
        service: String,
        /// Seconds to wait before retrying.
        retry_after_seconds: u64,
    },

    /// The collaborator is overloaded.
    #[error("{service}: overloaded")]
    Overloaded {
        /// Collaborator name.
        service: String,
    },

    /// Request timed out.
    #[error("{service}: timeout after {timeout_ms}ms")]
    Timeout {
        /// Collaborator name.
        service: String,
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Network communication error.
    #[error("{service}: network error: {message}")]
    Network {
        /// Collaborator name.
        service: String,
        /// Description of the network error.
        message: String,
    },

    /// Unexpected status or body.
    #[error("{service}: unexpected response: {message}")]
    UnexpectedResponse {
        /// Collaborator name.
        service: String,
        /// Description of what was unexpected.
        message: String,
    },

    /// The generation collaborator answered, but not in the requested shape.
    #[error("{service}: malformed output: {message}")]
    Malformed {
        /// Collaborator name.
        service: String,
        /// Description of what is missing.
        message: String,
    },
}

impl CollaboratorError {
    /// Returns true if this error is retryable at the HTTP layer.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Overloaded { .. }
                | Self::Timeout { .. }
                | Self::Network { .. }
        )
    }

    /// Returns true if the collaborator could not be reached at all.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::AuthenticationFailed { .. }
        )
    }
}

/// Feedback submission errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedbackError {
    /// The referenced response was never emitted by this engine.
    #[error("Unknown response: {response_id}")]
    UnknownResponse {
        /// The response reference that was not found.
        response_id: String,
    },

    /// Rating outside the accepted scale.
    #[error("Invalid rating {rating}: must be between {min} and {max}")]
    InvalidRating {
        /// Submitted rating.
        rating: i64,
        /// Lowest accepted rating.
        min: u8,
        /// Highest accepted rating.
        max: u8,
    },

    /// The ledger could not be written.
    #[error("Ledger storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Storage errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Failed to connect to the database.
    #[error("Database connection failed: {message}")]
    ConnectionFailed {
        /// Description of the connection failure.
        message: String,
    },

    /// A database query failed.
    #[error("Query failed: {query} - {message}")]
    QueryFailed {
        /// The query that failed.
        query: String,
        /// Description of the failure.
        message: String,
    },

    /// Database migration failed.
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed {
        /// The migration version that failed.
        version: String,
        /// Description of the failure.
        message: String,
    },

    /// Internal storage error.
    #[error("Internal storage error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

/// MCP protocol errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum McpError {
    /// Invalid parameters for a tool.
    #[error("Invalid parameters for {tool}: {message}")]
    InvalidParameters {
        /// The tool name.
        tool: String,
        /// Description of what's invalid.
        message: String,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required configuration is missing.
    #[error("Missing required: {var}")]
    MissingRequired {
        /// The missing variable name.
        var: String,
    },

    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}
