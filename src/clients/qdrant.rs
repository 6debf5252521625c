//! Qdrant knowledge base retriever.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::http::{HttpSettings, JsonClient};
use crate::config::SecretString;
use crate::error::CollaboratorError;
use crate::traits::{Embedder, EvidenceItem, KnowledgeRetriever, RetrievalResult, SourceKind};

const SERVICE: &str = "qdrant";
const API_KEY_HEADER: &str = "api-key";

/// Source label used when a point has none.
pub const DEFAULT_SOURCE: &str = "Knowledge Base";

/// Vector search over a Qdrant collection.
pub struct QdrantRetriever<E: Embedder> {
    http: JsonClient,
    collection: String,
    api_key: Option<SecretString>,
    embedder: Arc<E>,
}

impl<E: Embedder> std::fmt::Debug for QdrantRetriever<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantRetriever")
            .field("base_url", &self.http.settings().base_url)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl<E: Embedder> QdrantRetriever<E> {
    /// Create a retriever.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Network`] if the HTTP client cannot be built.
    pub fn new(
        collection: impl Into<String>,
        api_key: Option<SecretString>,
        embedder: Arc<E>,
        settings: HttpSettings,
    ) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http: JsonClient::new(SERVICE, settings)?,
            collection: collection.into(),
            api_key,
            embedder,
        })
    }

    /// Collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn headers(&self) -> Vec<(&'static str, &str)> {
        self.api_key
            .as_ref()
            .map(|k| (API_KEY_HEADER, k.expose()))
            .into_iter()
            .collect()
    }

    fn to_evidence(&self, point: ScoredPoint) -> Option<EvidenceItem> {
        let content = payload_str(&point.payload, "content")?;
        let label = payload_str(&point.payload, "source").unwrap_or(DEFAULT_SOURCE);
        let id = match &point.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let source_id = format!("{label} ({}/{id})", self.collection);
        Some(EvidenceItem::new(
            SourceKind::KnowledgeBase,
            content,
            source_id,
            point.score,
        ))
    }
}

fn payload_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<E: Embedder> KnowledgeRetriever for QdrantRetriever<E> {
    async fn search(&self, query: &str, top_k: usize) -> Result<RetrievalResult, CollaboratorError> {
        let start = Instant::now();
        let vector = self.embedder.embed(query).await?;
        let body = SearchRequest {
            vector,
            limit: top_k,
            with_payload: true,
        };
        let path = format!("collections/{}/points/search", self.collection);
        let response: SearchResponse = self.http.post_json(&path, &self.headers(), &body).await?;

        let items: Vec<EvidenceItem> = response
            .result
            .into_iter()
            .filter_map(|p| self.to_evidence(p))
            .collect();

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(
            collection = %self.collection,
            results = items.len(),
            latency_ms,
            "Knowledge base search completed"
        );
        Ok(RetrievalResult::new(SourceKind::KnowledgeBase, items, latency_ms))
    }

    async fn ping(&self) -> bool {
        let path = format!("collections/{}", self.collection);
        self.http.probe(Method::GET, &path, &self.headers()).await
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f64,
    #[serde(default)]
    payload: Map<String, Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::traits::MockEmbedder;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder() -> Arc<MockEmbedder> {
        let mut mock = MockEmbedder::new();
        mock.expect_embed().returning(|_| Ok(vec![0.5, 0.5]));
        Arc::new(mock)
    }

    fn retriever(server: &MockServer, api_key: Option<&str>) -> QdrantRetriever<MockEmbedder> {
        let settings = HttpSettings::new(server.uri()).with_max_retries(0);
        QdrantRetriever::new(
            "math_knowledge_base",
            api_key.map(SecretString::new),
            embedder(),
            settings,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_maps_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/math_knowledge_base/points/search"))
            .and(header("api-key", "qd-key"))
            .and(body_partial_json(json!({"limit": 3, "with_payload": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"id": 7, "score": 0.93, "payload": {"content": "Quadratic formula", "source": "Algebra notes"}},
                    {"id": "a1", "score": 0.41, "payload": {"content": "Completing the square"}},
                    {"id": 9, "score": 0.40, "payload": {}},
                ],
                "status": "ok"
            })))
            .mount(&server)
            .await;

        let result = retriever(&server, Some("qd-key"))
            .search("solve x^2 - 4 = 0", 3)
            .await
            .unwrap();

        assert_eq!(result.kind, SourceKind::KnowledgeBase);
        assert_eq!(result.len(), 2);
        assert_eq!(result.items[0].source_id, "Algebra notes (math_knowledge_base/7)");
        assert_eq!(result.items[1].source_id, "Knowledge Base (math_knowledge_base/a1)");
        assert!((result.max_relevance() - 0.93).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let server = MockServer::start().await;
        let mut mock = MockEmbedder::new();
        mock.expect_embed().returning(|_| {
            Err(CollaboratorError::Network {
                service: "gemini".into(),
                message: "down".into(),
            })
        });
        let settings = HttpSettings::new(server.uri());
        let retriever = QdrantRetriever::new("c", None, Arc::new(mock), settings).unwrap();

        let err = retriever.search("q", 3).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Network { .. }));
    }

    #[tokio::test]
    async fn test_ping_checks_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/math_knowledge_base"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;

        assert!(retriever(&server, None).ping().await);
    }
}
