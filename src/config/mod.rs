//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading (with `.env` support)
//! - Configuration validation
//! - Default value handling
//! - Secure API key storage via [`SecretString`]
//!
//! # Example
//!
//! ```
//! use math_router::config::{Config, RoutingConfig, SecretString};
//!
//! // Use Config::from_env() in production
//! let config = Config::new(SecretString::new("AIza-example"), SecretString::new("tvly-example"));
//! assert_eq!(config.routing, RoutingConfig::default());
//!
//! let debug = format!("{config:?}");
//! assert!(debug.contains("<REDACTED>"));
//! assert!(!debug.contains("tvly-example"));
//! ```

mod routing;
mod secret;
mod validation;

pub use routing::{
    RoutingConfig, DEFAULT_ADAPT_EVERY_N_FEEDBACK, DEFAULT_ADAPT_INTERVAL_SECS,
    DEFAULT_GENERATION_TIMEOUT_MS, DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD,
    DEFAULT_MINIMUM_FLOOR, DEFAULT_RETRIEVAL_TIMEOUT_MS, DEFAULT_TOP_K_KB, DEFAULT_TOP_K_WEB,
};
pub use secret::SecretString;
pub use validation::{
    validate_config, validate_routing, MAX_ADAPTATION_STEP, MAX_RETRIES, MAX_TIMEOUT_MS,
    MAX_TOP_K, MIN_RETRIEVAL_TIMEOUT_MS, MIN_TIMEOUT_MS,
};

use std::str::FromStr;

use crate::clients::HttpSettings;
use crate::error::ConfigError;

/// Default database path.
pub const DEFAULT_DATABASE_PATH: &str = "./data/math_router.db";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default collaborator request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default maximum retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini generation model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default Gemini embedding model.
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Default Qdrant URL.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";

/// Default Qdrant collection.
pub const DEFAULT_QDRANT_COLLECTION: &str = "math_knowledge_base";

/// Default Tavily API URL.
pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";

/// Application configuration.
///
/// Use [`Config::from_env`] to load it. API keys are [`SecretString`]s and
/// never appear in `Debug` output.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Gemini API key.
    pub gemini_api_key: SecretString,
    /// Tavily API key.
    pub tavily_api_key: SecretString,
    /// Qdrant API key, for secured deployments.
    pub qdrant_api_key: Option<SecretString>,
    /// Gemini API base URL.
    pub gemini_url: String,
    /// Gemini generation model.
    pub gemini_model: String,
    /// Gemini embedding model.
    pub gemini_embedding_model: String,
    /// Qdrant URL.
    pub qdrant_url: String,
    /// Qdrant collection holding the knowledge base.
    pub qdrant_collection: String,
    /// Tavily API URL.
    pub tavily_url: String,
    /// `SQLite` database path, or `:memory:`.
    pub database_path: String,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
    /// Collaborator request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Retries of retryable collaborator failures.
    pub max_retries: u32,
    /// Engine settings.
    pub routing: RoutingConfig,
}

impl Config {
    /// Configuration with the given keys and defaults elsewhere.
    #[must_use]
    pub fn new(gemini_api_key: SecretString, tavily_api_key: SecretString) -> Self {
        Self {
            gemini_api_key,
            tavily_api_key,
            qdrant_api_key: None,
            gemini_url: DEFAULT_GEMINI_URL.into(),
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
            gemini_embedding_model: DEFAULT_GEMINI_EMBEDDING_MODEL.into(),
            qdrant_url: DEFAULT_QDRANT_URL.into(),
            qdrant_collection: DEFAULT_QDRANT_COLLECTION.into(),
            tavily_url: DEFAULT_TAVILY_URL.into(),
            database_path: DEFAULT_DATABASE_PATH.into(),
            log_level: DEFAULT_LOG_LEVEL.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            routing: RoutingConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `GEMINI_API_KEY`
    /// - `TAVILY_API_KEY`
    ///
    /// Optional collaborator variables: `QDRANT_API_KEY`, `GEMINI_URL`,
    /// `GEMINI_MODEL`, `GEMINI_EMBEDDING_MODEL`, `QDRANT_URL`,
    /// `QDRANT_COLLECTION`, `TAVILY_URL`, `DATABASE_PATH`, `LOG_LEVEL`,
    /// `REQUEST_TIMEOUT_MS`, `MAX_RETRIES`. Routing variables are listed on
    /// [`RoutingConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required key is missing, a value does not
    /// parse, or the result fails [`validate_config`].
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let defaults = Self::new(required_secret("GEMINI_API_KEY")?, required_secret("TAVILY_API_KEY")?);

        let config = Self {
            qdrant_api_key: std::env::var("QDRANT_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::new),
            gemini_url: env_or("GEMINI_URL", &defaults.gemini_url),
            gemini_model: env_or("GEMINI_MODEL", &defaults.gemini_model),
            gemini_embedding_model: env_or(
                "GEMINI_EMBEDDING_MODEL",
                &defaults.gemini_embedding_model,
            ),
            qdrant_url: env_or("QDRANT_URL", &defaults.qdrant_url),
            qdrant_collection: env_or("QDRANT_COLLECTION", &defaults.qdrant_collection),
            tavily_url: env_or("TAVILY_URL", &defaults.tavily_url),
            database_path: env_or("DATABASE_PATH", &defaults.database_path),
            log_level: env_or("LOG_LEVEL", &defaults.log_level),
            request_timeout_ms: parse_env("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
            max_retries: parse_env("MAX_RETRIES", defaults.max_retries)?,
            routing: RoutingConfig::from_env()?,
            ..defaults
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Transport settings for a collaborator at `base_url`.
    #[must_use]
    pub fn http_settings(&self, base_url: &str) -> HttpSettings {
        HttpSettings::new(base_url)
            .with_timeout_ms(self.request_timeout_ms)
            .with_max_retries(self.max_retries)
    }
}

fn required_secret(name: &str) -> Result<SecretString, ConfigError> {
    std::env::var(name)
        .map(SecretString::new)
        .map_err(|_| ConfigError::MissingRequired { var: name.into() })
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

/// Parse an environment variable, using a default if it is not set.
pub(crate) fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: name.into(),
            reason: e.to_string(),
        })
    })
}
