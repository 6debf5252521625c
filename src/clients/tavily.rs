//! Tavily web search restricted to educational math sites.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{HttpSettings, JsonClient};
use crate::config::SecretString;
use crate::error::CollaboratorError;
use crate::traits::{EvidenceItem, RetrievalResult, SourceKind, WebSearcher};

const SERVICE: &str = "tavily";

/// Prefix steering results towards worked solutions.
pub const QUERY_PREFIX: &str = "mathematics solve step by step:";

/// Domains searched.
pub const INCLUDE_DOMAINS: &[&str] = &[
    "khanacademy.org",
    "mathway.com",
    "wolframalpha.com",
    "stackoverflow.com",
    "math.stackexchange.com",
];

/// Domains never returned.
pub const EXCLUDE_DOMAINS: &[&str] = &["pinterest.com", "instagram.com"];

const PING_QUERY: &str = "pythagorean theorem";

/// Tavily search client.
#[derive(Clone)]
pub struct TavilySearcher {
    http: JsonClient,
    api_key: SecretString,
}

impl std::fmt::Debug for TavilySearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearcher")
            .field("base_url", &self.http.settings().base_url)
            .finish_non_exhaustive()
    }
}

impl TavilySearcher {
    /// Create a searcher.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Network`] if the HTTP client cannot be built.
    pub fn new(api_key: SecretString, settings: HttpSettings) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http: JsonClient::new(SERVICE, settings)?,
            api_key,
        })
    }

    async fn run(&self, query: &str, max_results: usize) -> Result<Vec<TavilyResult>, CollaboratorError> {
        let body = SearchRequest {
            query: format!("{QUERY_PREFIX} {query}"),
            search_depth: "advanced",
            max_results,
            include_domains: INCLUDE_DOMAINS,
            exclude_domains: EXCLUDE_DOMAINS,
        };
        let bearer = format!("Bearer {}", self.api_key.expose());
        let response: SearchResponse = self
            .http
            .post_json("search", &[("authorization", bearer.as_str())], &body)
            .await?;
        Ok(response.results)
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str, top_k: usize) -> Result<RetrievalResult, CollaboratorError> {
        let start = Instant::now();
        let results = self.run(query, top_k).await?;
        let items: Vec<EvidenceItem> = results
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .take(top_k)
            .map(|r| {
                let content = match r.title.as_deref().map(str::trim) {
                    Some(title) if !title.is_empty() => format!("{title}: {}", r.content.trim()),
                    _ => r.content.trim().to_string(),
                };
                EvidenceItem::new(SourceKind::WebSearch, content, r.url, r.score)
            })
            .collect();

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(results = items.len(), latency_ms, "Web search completed");
        Ok(RetrievalResult::new(SourceKind::WebSearch, items, latency_ms))
    }

    async fn ping(&self) -> bool {
        match self.run(PING_QUERY, 1).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(service = SERVICE, error = %e, "Health probe failed");
                false
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    query: String,
    search_depth: &'static str,
    max_results: usize,
    include_domains: &'static [&'static str],
    exclude_domains: &'static [&'static str],
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}
