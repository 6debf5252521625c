//! Configuration validation.
//!
//! Ensures values are within acceptable ranges before the service starts.

use super::{Config, RoutingConfig};
use crate::error::ConfigError;
use crate::routing::{FLOOR_LOWER_BOUND, MIN_THRESHOLD_GAP};

/// Minimum allowed collaborator request timeout in milliseconds.
pub const MIN_TIMEOUT_MS: u64 = 1000;

/// Maximum allowed timeout in milliseconds (5 minutes).
pub const MAX_TIMEOUT_MS: u64 = 300_000;

/// Minimum allowed retrieval timeout in milliseconds.
pub const MIN_RETRIEVAL_TIMEOUT_MS: u64 = 50;

/// Maximum allowed retry count.
pub const MAX_RETRIES: u32 = 10;

/// Maximum results requested from one retriever.
pub const MAX_TOP_K: usize = 20;

/// Largest threshold change allowed per adaptation.
pub const MAX_ADAPTATION_STEP: f64 = 0.2;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

fn invalid(var: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.into(),
        reason: reason.into(),
    }
}

/// Validate the full configuration.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming the first offending variable.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    for (var, key) in [
        ("GEMINI_API_KEY", &config.gemini_api_key),
        ("TAVILY_API_KEY", &config.tavily_api_key),
    ] {
        if key.is_blank() {
            return Err(invalid(var, "must not be empty"));
        }
    }

    if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&config.request_timeout_ms) {
        return Err(invalid(
            "REQUEST_TIMEOUT_MS",
            format!("must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS} ms"),
        ));
    }

    if config.max_retries > MAX_RETRIES {
        return Err(invalid(
            "MAX_RETRIES",
            format!("must be between 0 and {MAX_RETRIES}"),
        ));
    }

    for (var, url) in [
        ("GEMINI_URL", &config.gemini_url),
        ("QDRANT_URL", &config.qdrant_url),
        ("TAVILY_URL", &config.tavily_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(var, "must be an http(s) URL"));
        }
    }

    if config.qdrant_collection.trim().is_empty() {
        return Err(invalid("QDRANT_COLLECTION", "must not be empty"));
    }

    validate_routing(&config.routing)
}

/// Validate routing settings on their own.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming the first offending variable.
pub fn validate_routing(routing: &RoutingConfig) -> Result<(), ConfigError> {
    if !routing.high_threshold.is_finite() || routing.high_threshold > 1.0 {
        return Err(invalid("HIGH_THRESHOLD", "must be at most 1.0"));
    }
    if !routing.minimum_floor.is_finite() || routing.minimum_floor < FLOOR_LOWER_BOUND {
        return Err(invalid(
            "MINIMUM_FLOOR",
            format!("must be at least {FLOOR_LOWER_BOUND}"),
        ));
    }
    if !routing.low_threshold.is_finite()
        || routing.low_threshold < routing.minimum_floor + MIN_THRESHOLD_GAP
    {
        return Err(invalid(
            "LOW_THRESHOLD",
            "must be greater than MINIMUM_FLOOR",
        ));
    }
    if routing.high_threshold < routing.low_threshold + MIN_THRESHOLD_GAP {
        return Err(invalid(
            "HIGH_THRESHOLD",
            "must be greater than LOW_THRESHOLD",
        ));
    }

    for (var, top_k) in [("TOP_K_KB", routing.top_k_kb), ("TOP_K_WEB", routing.top_k_web)] {
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(invalid(var, format!("must be between 1 and {MAX_TOP_K}")));
        }
    }

    if !(MIN_RETRIEVAL_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&routing.retrieval_timeout_ms) {
        return Err(invalid(
            "RETRIEVAL_TIMEOUT_MS",
            format!("must be between {MIN_RETRIEVAL_TIMEOUT_MS} and {MAX_TIMEOUT_MS} ms"),
        ));
    }
    if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&routing.generation_timeout_ms) {
        return Err(invalid(
            "GENERATION_TIMEOUT_MS",
            format!("must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS} ms"),
        ));
    }

    if routing.guardrails.max_question_length == 0 {
        return Err(invalid("MAX_QUESTION_LENGTH", "must be positive"));
    }
    if !(0.0..=1.0).contains(&routing.guardrails.min_math_relevance) {
        return Err(invalid("MIN_MATH_RELEVANCE", "must be within [0, 1]"));
    }

    let adaptation = &routing.adaptation;
    if adaptation.window_size == 0 {
        return Err(invalid("FEEDBACK_WINDOW_SIZE", "must be positive"));
    }
    if !(adaptation.step > 0.0 && adaptation.step <= MAX_ADAPTATION_STEP) {
        return Err(invalid(
            "ADAPTATION_STEP",
            format!("must be within (0, {MAX_ADAPTATION_STEP}]"),
        ));
    }
    if !(0.0..=1.0).contains(&adaptation.success_rate_floor) {
        return Err(invalid("SUCCESS_RATE_FLOOR", "must be within [0, 1]"));
    }
    if !(0.0..=1.0).contains(&adaptation.success_rate_ceiling)
        || adaptation.success_rate_ceiling <= adaptation.success_rate_floor
    {
        return Err(invalid(
            "SUCCESS_RATE_CEILING",
            "must be within [0, 1] and greater than SUCCESS_RATE_FLOOR",
        ));
    }
    if adaptation.min_feedback_for_adaptation == 0 {
        return Err(invalid("MIN_FEEDBACK_FOR_ADAPTATION", "must be positive"));
    }

    let scoring = &routing.scoring;
    for (var, weight) in [
        ("SCORE_RELEVANCE_WEIGHT", scoring.relevance_weight),
        ("SCORE_COUNT_WEIGHT", scoring.count_weight),
        ("SCORE_AGREEMENT_BONUS", scoring.agreement_bonus),
    ] {
        if !(0.0..=1.0).contains(&weight) {
            return Err(invalid(var, "must be within [0, 1]"));
        }
    }
    if (scoring.relevance_weight + scoring.count_weight - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(invalid(
            "SCORE_COUNT_WEIGHT",
            "SCORE_RELEVANCE_WEIGHT and SCORE_COUNT_WEIGHT must sum to 1",
        ));
    }
    if !(scoring.count_half_saturation > 0.0 && scoring.count_half_saturation.is_finite()) {
        return Err(invalid("SCORE_COUNT_HALF_SATURATION", "must be positive"));
    }

    Ok(())
}
