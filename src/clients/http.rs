//! Shared JSON-over-HTTP plumbing for the collaborator clients.
//!
//! Provides status-code mapping onto [`CollaboratorError`] and retry with
//! exponential backoff for retryable failures.

use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CollaboratorError;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default maximum retries.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default initial retry delay in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
/// Retry-after used when a 429 response does not say.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Transport settings of one collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff in milliseconds, doubled per retry.
    pub retry_delay_ms: u64,
}

impl HttpSettings {
    /// Settings with defaults for everything but the URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }

    /// Set timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set maximum retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial retry delay in milliseconds.
    #[must_use]
    pub const fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }
}

/// A reqwest client bound to one collaborator.
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: Client,
    service: &'static str,
    settings: HttpSettings,
}

impl JsonClient {
    /// Build a client.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Network`] if the HTTP client cannot be built.
    pub fn new(service: &'static str, settings: HttpSettings) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| CollaboratorError::Network {
                service: service.to_string(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            service,
            settings,
        })
    }

    /// Collaborator name used in errors and logs.
    #[must_use]
    pub const fn service(&self) -> &'static str {
        self.service
    }

    /// Transport settings.
    #[must_use]
    pub const fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Absolute URL for a path below the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body and decode a JSON response, retrying retryable
    /// failures with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns the last [`CollaboratorError`] once retries are exhausted, or
    /// the first non-retryable one.
    pub async fn post_json<B, R>(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<R, CollaboratorError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let mut delay = self.settings.retry_delay_ms;
        let mut attempt = 0;

        loop {
            let request = with_headers(self.client.post(&url), headers).json(body);
            match self.execute(&url, request).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        service = self.service,
                        error = %e,
                        attempt,
                        delay_ms = delay,
                        "Retrying collaborator request"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Returns true if a request to `path` succeeds with a 2xx status.
    pub async fn probe(&self, method: Method, path: &str, headers: &[(&str, &str)]) -> bool {
        let url = self.url(path);
        let request = with_headers(self.client.request(method, &url), headers);
        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(service = self.service, status = %response.status(), "Health probe failed");
                false
            }
            Err(e) => {
                tracing::warn!(service = self.service, error = %e, "Health probe failed");
                false
            }
        }
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        url: &str,
        request: RequestBuilder,
    ) -> Result<R, CollaboratorError> {
        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            if e.is_timeout() {
                tracing::error!(service = self.service, url, elapsed_ms, "Request timed out");
                CollaboratorError::Timeout {
                    service: self.service.to_string(),
                    timeout_ms: self.settings.timeout_ms,
                }
            } else {
                tracing::error!(service = self.service, url, elapsed_ms, error = %e, "Request failed");
                CollaboratorError::Network {
                    service: self.service.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        tracing::debug!(
            service = self.service,
            url,
            %status,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Collaborator response received"
        );

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(self.service, status, retry_after, &body));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| CollaboratorError::UnexpectedResponse {
                service: self.service.to_string(),
                message: format!("Failed to parse response: {e}"),
            })
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&str, &str)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}

/// Map a non-success status onto a collaborator error.
#[must_use]
pub fn status_error(
    service: &str,
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> CollaboratorError {
    let service = service.to_string();
    match status.as_u16() {
        401 | 403 => CollaboratorError::AuthenticationFailed { service },
        429 => CollaboratorError::RateLimited {
            service,
            retry_after_seconds: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        502..=504 | 529 => CollaboratorError::Overloaded { service },
        _ => {
            let body: String = body.chars().take(200).collect();
            CollaboratorError::UnexpectedResponse {
                service,
                message: format!("Status {status}: {body}"),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, max_retries: u32) -> JsonClient {
        let settings = HttpSettings::new(server.uri())
            .with_max_retries(max_retries)
            .with_retry_delay_ms(1)
            .with_timeout_ms(2_000);
        JsonClient::new("test", settings).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error("s", StatusCode::UNAUTHORIZED, None, ""),
            CollaboratorError::AuthenticationFailed { .. }
        ));
        assert_eq!(
            status_error("s", StatusCode::TOO_MANY_REQUESTS, Some(7), ""),
            CollaboratorError::RateLimited {
                service: "s".into(),
                retry_after_seconds: 7
            }
        );
        assert!(matches!(
            status_error("s", StatusCode::SERVICE_UNAVAILABLE, None, ""),
            CollaboratorError::Overloaded { .. }
        ));
        assert!(matches!(
            status_error("s", StatusCode::BAD_REQUEST, None, "bad"),
            CollaboratorError::UnexpectedResponse { .. }
        ));
    }

    #[test]
    fn test_url_joining() {
        let settings = HttpSettings::new("http://localhost:6333/");
        let client = JsonClient::new("qdrant", settings).unwrap();
        assert_eq!(client.url("/collections/x"), "http://localhost:6333/collections/x");
    }

    #[tokio::test]
    async fn test_post_json_success_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("x-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let value: Value = client(&server, 0)
            .post_json("echo", &[("x-key", "secret")], &json!({"q": 1}))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1})))
            .mount(&server)
            .await;

        let value: Value = client(&server, 3).post_json("x", &[], &json!({})).await.unwrap();
        assert_eq!(value["ok"], 1);
    }

    #[tokio::test]
    async fn test_auth_failure_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let result: Result<Value, _> = client(&server, 3).post_json("x", &[], &json!({})).await;
        assert!(matches!(result, Err(CollaboratorError::AuthenticationFailed { .. })));
    }

    #[tokio::test]
    async fn test_invalid_json_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result: Result<Value, _> = client(&server, 0).post_json("x", &[], &json!({})).await;
        assert!(matches!(result, Err(CollaboratorError::UnexpectedResponse { .. })));
    }

    #[tokio::test]
    async fn test_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let c = client(&server, 0);
        assert!(c.probe(Method::GET, "healthz", &[]).await);
        assert!(!c.probe(Method::GET, "missing", &[]).await);
    }
}
