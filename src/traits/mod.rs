//! Trait definitions for the engine's collaborators.
//!
//! This module defines traits for:
//! - [`KnowledgeRetriever`]: semantic search over the curated knowledge base
//! - [`WebSearcher`]: external web search
//! - [`SolutionGenerator`]: structured generation by a language model
//! - [`Embedder`]: text embeddings for knowledge base lookups
//! - [`LedgerStore`]: append-only persistence for responses, feedback and
//!   threshold adjustments
//! - [`TimeProvider`]: time abstraction for testing
//!
//! It also re-exports the boundary types from the `types` submodule.
//!
//! # Mocking
//!
//! All traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.
//!
//! # Example
//!
//! ```
//! use math_router::traits::{TimeProvider, RealTimeProvider};
//!
//! let time_provider = RealTimeProvider;
//! let now = time_provider.now();
//! println!("Current time: {now}");
//! ```

mod types;

pub use types::{
    EvidenceItem, GeneratedSolution, GenerationRequest, RetrievalResult, SourceKind,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{CollaboratorError, StorageError};
use crate::feedback::ThresholdAdjustment;
use crate::model::{Feedback, FeedbackRecord, ResponseEntry, Route};

/// Knowledge base semantic search.
///
/// Implementations must be read-only: searching never changes the index.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Return up to `top_k` matches ranked by similarity.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if the knowledge base cannot be queried.
    async fn search(&self, query: &str, top_k: usize)
        -> Result<RetrievalResult, CollaboratorError>;

    /// Returns true if the knowledge base is reachable.
    async fn ping(&self) -> bool;
}

/// External web search.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Return up to `top_k` snippets ranked by relevance, each with a
    /// source URL for citation.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if the search provider fails.
    async fn search(&self, query: &str, top_k: usize)
        -> Result<RetrievalResult, CollaboratorError>;

    /// Returns true if the search provider is reachable.
    async fn ping(&self) -> bool;
}

/// Structured solution generation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SolutionGenerator: Send + Sync {
    /// Turn a question and its evidence into steps, explanation, final
    /// answer and difficulty.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Malformed`] when the model answered in
    /// an unusable shape, other variants when it could not be called.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedSolution, CollaboratorError>;

    /// Returns true if the generation service is reachable.
    async fn ping(&self) -> bool;
}

/// Text embedding.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a query for similarity search.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if the embedding service fails.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;
}

/// Append-only persistence for emitted responses and their feedback.
///
/// There is deliberately no update or delete operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Register an emitted response so feedback can reference it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    async fn record_response(&self, entry: &ResponseEntry) -> Result<(), StorageError>;

    /// Look up the route a response used.
    ///
    /// Returns `None` if the response is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    async fn response_route(&self, response_id: &str) -> Result<Option<Route>, StorageError>;

    /// Append one feedback entry; the store assigns the sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    async fn append_feedback(
        &self,
        feedback_id: &str,
        route: Route,
        feedback: &Feedback,
    ) -> Result<FeedbackRecord, StorageError>;

    /// All feedback entries in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>, StorageError>;

    /// The newest `limit` entries recorded against `route`, in submission
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    async fn recent_feedback(
        &self,
        route: Route,
        limit: usize,
    ) -> Result<Vec<FeedbackRecord>, StorageError>;

    /// Number of feedback entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    async fn feedback_count(&self) -> Result<u64, StorageError>;

    /// Append the threshold changes made by one adaptation run.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    async fn append_adjustments(
        &self,
        revision: u64,
        adjustments: &[ThresholdAdjustment],
    ) -> Result<(), StorageError>;

    /// Every recorded threshold change with its weights revision, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    async fn list_adjustments(&self) -> Result<Vec<(u64, ThresholdAdjustment)>, StorageError>;
}

/// Time provider trait for deterministic testing.
#[cfg_attr(test, mockall::automock)]
pub trait TimeProvider: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time provider using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
