//! Gemini client for solution generation and query embeddings.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::http::{HttpSettings, JsonClient};
use crate::composer::{parse_generation, system_prompt, user_prompt};
use crate::config::SecretString;
use crate::error::CollaboratorError;
use crate::traits::{Embedder, GeneratedSolution, GenerationRequest, SolutionGenerator};

const SERVICE: &str = "gemini";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Sampling settings sent with every generation.
const TEMPERATURE: f64 = 0.2;
const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    http: JsonClient,
    api_key: SecretString,
    model: String,
    embedding_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.http.settings().base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Network`] if the HTTP client cannot be built.
    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
        settings: HttpSettings,
    ) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http: JsonClient::new(SERVICE, settings)?,
            api_key,
            model: model.into(),
            embedding_model: embedding_model.into(),
        })
    }

    /// Generation model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> [(&'static str, &str); 1] {
        [(API_KEY_HEADER, self.api_key.expose())]
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        let body = GenerateRequest {
            system_instruction: Content::text(system_prompt()),
            contents: vec![Content::user(user_prompt(request))],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: "application/json",
            },
        };
        let path = format!("models/{}:generateContent", self.model);
        let response: GenerateResponse = self.http.post_json(&path, &self.headers(), &body).await?;

        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(malformed(format!("prompt blocked: {reason}")));
        }

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(malformed("empty candidate".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl SolutionGenerator for GeminiClient {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedSolution, CollaboratorError> {
        let text = self.generate_text(&request).await?;
        parse_generation(&text).map_err(|e| {
            tracing::warn!(attempt = request.attempt, error = %e, "Unparseable generation");
            malformed(e.to_string())
        })
    }

    async fn ping(&self) -> bool {
        let path = format!("models/{}", self.model);
        self.http.probe(Method::GET, &path, &self.headers()).await
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        let body = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content::text(text),
        };
        let path = format!("models/{}:embedContent", self.embedding_model);
        let response: EmbedResponse = self.http.post_json(&path, &self.headers(), &body).await?;
        if response.embedding.values.is_empty() {
            return Err(malformed("empty embedding".to_string()));
        }
        Ok(response.embedding.values)
    }
}

fn malformed(message: String) -> CollaboratorError {
    CollaboratorError::Malformed {
        service: SERVICE.into(),
        message,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }

    fn user(text: String) -> Self {
        Self {
            role: Some("user".into()),
            ..Self::text(text)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    #[serde(default)]
    values: Vec<f32>,
}
