//! HTTP clients for the external collaborators.
//!
//! - [`GeminiClient`]: solution generation and query embeddings
//! - [`QdrantRetriever`]: knowledge base vector search
//! - [`TavilySearcher`]: web search
//!
//! All of them share [`JsonClient`], which maps HTTP failures onto
//! [`CollaboratorError`](crate::error::CollaboratorError) and retries the
//! retryable ones with exponential backoff.

mod gemini;
mod http;
mod qdrant;
mod tavily;

pub use gemini::GeminiClient;
pub use http::{
    status_error, HttpSettings, JsonClient, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_TIMEOUT_MS,
};
pub use qdrant::{QdrantRetriever, DEFAULT_SOURCE};
pub use tavily::{TavilySearcher, EXCLUDE_DOMAINS, INCLUDE_DOMAINS, QUERY_PREFIX};
