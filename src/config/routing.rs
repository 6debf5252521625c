//! Routing, retrieval and adaptation settings.
//!
//! # Example
//!
//! ```
//! use math_router::config::RoutingConfig;
//!
//! let config = RoutingConfig::default();
//! assert!(config.minimum_floor < config.low_threshold);
//! assert!(config.low_threshold < config.high_threshold);
//! ```

use std::time::Duration;

use super::parse_env;
use crate::error::ConfigError;
use crate::feedback::AdaptationConfig;
use crate::guardrails::{GuardrailConfig, DEFAULT_MAX_QUESTION_LENGTH, DEFAULT_MIN_MATH_RELEVANCE};
use crate::routing::{EngineSettings, RetrievalStrategy, RoutingWeights, ThresholdSnapshot};
use crate::scoring::ScoringWeights;

/// Default acceptance threshold of a single route.
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.8;
/// Default threshold below which a path is considered weak.
pub const DEFAULT_LOW_THRESHOLD: f64 = 0.4;
/// Default minimum merged confidence for a hybrid answer.
pub const DEFAULT_MINIMUM_FLOOR: f64 = 0.2;
/// Default knowledge base results.
pub const DEFAULT_TOP_K_KB: usize = 3;
/// Default web results.
pub const DEFAULT_TOP_K_WEB: usize = 3;
/// Default retrieval timeout in milliseconds.
pub const DEFAULT_RETRIEVAL_TIMEOUT_MS: u64 = 800;
/// Default generation timeout in milliseconds.
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 30_000;
/// Default adapt trigger, in feedback entries.
pub const DEFAULT_ADAPT_EVERY_N_FEEDBACK: u64 = 10;
/// Default background adaptation interval (5 minutes).
pub const DEFAULT_ADAPT_INTERVAL_SECS: u64 = 300;

/// Settings of the decision engine and its adaptation loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    /// Initial acceptance threshold for a single route.
    pub high_threshold: f64,
    /// Threshold below which a path is weak.
    pub low_threshold: f64,
    /// Minimum merged confidence for a hybrid answer.
    pub minimum_floor: f64,
    /// Knowledge base results requested.
    pub top_k_kb: usize,
    /// Web results requested.
    pub top_k_web: usize,
    /// Per-retrieval timeout in milliseconds.
    pub retrieval_timeout_ms: u64,
    /// Per-attempt generation timeout in milliseconds.
    pub generation_timeout_ms: u64,
    /// Retriever scheduling.
    pub strategy: RetrievalStrategy,
    /// Input limits.
    pub guardrails: GuardrailConfig,
    /// Confidence formula weights.
    pub scoring: ScoringWeights,
    /// Feedback-driven threshold adaptation.
    pub adaptation: AdaptationConfig,
    /// Run adaptation after this many feedback entries; 0 disables.
    pub adapt_every_n_feedback: u64,
    /// Background adaptation interval in seconds; 0 disables.
    pub adapt_interval_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            minimum_floor: DEFAULT_MINIMUM_FLOOR,
            top_k_kb: DEFAULT_TOP_K_KB,
            top_k_web: DEFAULT_TOP_K_WEB,
            retrieval_timeout_ms: DEFAULT_RETRIEVAL_TIMEOUT_MS,
            generation_timeout_ms: DEFAULT_GENERATION_TIMEOUT_MS,
            strategy: RetrievalStrategy::Sequential,
            guardrails: GuardrailConfig::default(),
            scoring: ScoringWeights::default(),
            adaptation: AdaptationConfig::default(),
            adapt_every_n_feedback: DEFAULT_ADAPT_EVERY_N_FEEDBACK,
            adapt_interval_secs: DEFAULT_ADAPT_INTERVAL_SECS,
        }
    }
}

impl RoutingConfig {
    /// Load routing settings from environment variables, defaulting any
    /// that are unset. Values are not validated here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a variable is set but
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let adaptation = AdaptationConfig {
            window_size: parse_env("FEEDBACK_WINDOW_SIZE", defaults.adaptation.window_size)?,
            step: parse_env("ADAPTATION_STEP", defaults.adaptation.step)?,
            success_rate_floor: parse_env(
                "SUCCESS_RATE_FLOOR",
                defaults.adaptation.success_rate_floor,
            )?,
            success_rate_ceiling: parse_env(
                "SUCCESS_RATE_CEILING",
                defaults.adaptation.success_rate_ceiling,
            )?,
            min_feedback_for_adaptation: parse_env(
                "MIN_FEEDBACK_FOR_ADAPTATION",
                defaults.adaptation.min_feedback_for_adaptation,
            )?,
        };
        let scoring = ScoringWeights {
            relevance_weight: parse_env(
                "SCORE_RELEVANCE_WEIGHT",
                defaults.scoring.relevance_weight,
            )?,
            count_weight: parse_env("SCORE_COUNT_WEIGHT", defaults.scoring.count_weight)?,
            count_half_saturation: parse_env(
                "SCORE_COUNT_HALF_SATURATION",
                defaults.scoring.count_half_saturation,
            )?,
            agreement_bonus: parse_env("SCORE_AGREEMENT_BONUS", defaults.scoring.agreement_bonus)?,
        };

        Ok(Self {
            high_threshold: parse_env("HIGH_THRESHOLD", defaults.high_threshold)?,
            low_threshold: parse_env("LOW_THRESHOLD", defaults.low_threshold)?,
            minimum_floor: parse_env("MINIMUM_FLOOR", defaults.minimum_floor)?,
            top_k_kb: parse_env("TOP_K_KB", defaults.top_k_kb)?,
            top_k_web: parse_env("TOP_K_WEB", defaults.top_k_web)?,
            retrieval_timeout_ms: parse_env("RETRIEVAL_TIMEOUT_MS", defaults.retrieval_timeout_ms)?,
            generation_timeout_ms: parse_env(
                "GENERATION_TIMEOUT_MS",
                defaults.generation_timeout_ms,
            )?,
            strategy: parse_env("RETRIEVAL_STRATEGY", defaults.strategy)?,
            guardrails: GuardrailConfig {
                max_question_length: parse_env(
                    "MAX_QUESTION_LENGTH",
                    DEFAULT_MAX_QUESTION_LENGTH,
                )?,
                min_math_relevance: parse_env("MIN_MATH_RELEVANCE", DEFAULT_MIN_MATH_RELEVANCE)?,
            },
            scoring,
            adaptation,
            adapt_every_n_feedback: parse_env(
                "ADAPT_EVERY_N_FEEDBACK",
                defaults.adapt_every_n_feedback,
            )?,
            adapt_interval_secs: parse_env("ADAPT_INTERVAL_SECS", defaults.adapt_interval_secs)?,
        })
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub const fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            top_k_kb: self.top_k_kb,
            top_k_web: self.top_k_web,
            retrieval_timeout: Duration::from_millis(self.retrieval_timeout_ms),
            strategy: self.strategy,
        }
    }

    /// Per-attempt generation timeout.
    #[must_use]
    pub const fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Initial thresholds, identical for both routes.
    #[must_use]
    pub const fn thresholds(&self) -> ThresholdSnapshot {
        ThresholdSnapshot::new(self.high_threshold, self.low_threshold, self.minimum_floor)
    }

    /// Routing weights to start the service with.
    #[must_use]
    pub fn initial_weights(&self) -> RoutingWeights {
        RoutingWeights::new(self.thresholds())
    }
}
