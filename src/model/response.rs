//! Responses emitted by `ask`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Route, Solution, SolutionStatus};
use crate::guardrails::OutputRejection;
use crate::routing::RouteDecision;
use crate::scoring::ConfidenceScore;
use crate::traits::SourceKind;

/// A failure the engine absorbed while producing a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum RecoveredCondition {
    /// A retrieval call exceeded its timeout; treated as an empty result.
    RetrievalTimeout {
        /// Source that timed out.
        source: SourceKind,
        /// Timeout applied.
        timeout_ms: u64,
    },
    /// A retrieval call failed; treated as an empty result.
    RetrievalFailed {
        /// Source that failed.
        source: SourceKind,
        /// Failure description.
        message: String,
    },
    /// Web results without a citable source were dropped.
    UncitedResultsDiscarded {
        /// Number of results dropped.
        count: usize,
    },
    /// The generator returned an unusable solution.
    GenerationMalformed {
        /// Attempt number (1-based).
        attempt: u32,
        /// What was wrong.
        message: String,
    },
    /// The output guardrail rejected a generated solution.
    OutputRejected {
        /// Attempt number (1-based).
        attempt: u32,
        /// Rejection reason.
        reason: OutputRejection,
    },
}

/// The answer to one accepted question.
///
/// Immutable after emission. `response_id` is the reference used by
/// feedback submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// External response reference (timestamp-derived).
    pub response_id: String,
    /// Request id of the originating question.
    pub request_id: String,
    /// Question text.
    pub question: String,
    /// Route used to gather evidence.
    pub route_used: Route,
    /// The solution.
    pub solution: Solution,
    /// Confidence supporting the solution.
    pub confidence: ConfidenceScore,
    /// Source identifiers cited, in evidence order, without duplicates.
    pub sources: Vec<String>,
    /// Wall-clock time spent answering, in milliseconds.
    pub response_time_ms: u64,
    /// Whether the solution was generated or degraded.
    pub status: SolutionStatus,
    /// Set when the solution is a best-effort extraction.
    pub low_confidence: bool,
    /// Routing audit record.
    pub decision: RouteDecision,
    /// Conditions recovered along the way.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recovered: Vec<RecoveredCondition>,
    /// Emission time.
    pub created_at: DateTime<Utc>,
}

/// Generate a response reference from the emission time.
///
/// A random suffix keeps references unique when two responses are
/// emitted within the same microsecond.
#[must_use]
pub fn generate_response_id(at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "resp-{}-{}",
        at.format("%Y%m%dT%H%M%S%.6fZ"),
        &suffix[..8]
    )
}
