//! Feedback records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Route;

/// Lowest accepted rating.
pub const MIN_RATING: u8 = 1;

/// Highest accepted rating.
pub const MAX_RATING: u8 = 5;

/// User feedback on one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Reference of the response being rated.
    pub response_id: String,
    /// Rating on the 1..=5 scale.
    pub rating: u8,
    /// Whether the answer helped.
    pub is_helpful: bool,
    /// Free-text comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Suggested improvement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_improvement: Option<String>,
}

impl Feedback {
    /// Create feedback without free text.
    #[must_use]
    pub fn new(response_id: impl Into<String>, rating: u8, is_helpful: bool) -> Self {
        Self {
            response_id: response_id.into(),
            rating,
            is_helpful,
            comment: None,
            suggested_improvement: None,
        }
    }

    /// Attach a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attach a suggested improvement.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_improvement = Some(suggestion.into());
        self
    }
}

/// One append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Position in the ledger, starting at 1.
    pub sequence: u64,
    /// Generated feedback id.
    pub feedback_id: String,
    /// Route of the rated response.
    pub route: Route,
    /// Submitted feedback.
    pub feedback: Feedback,
    /// When the entry was appended.
    pub recorded_at: DateTime<Utc>,
}

/// Acknowledgement returned by `submit_feedback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAck {
    /// Generated feedback id.
    pub feedback_id: String,
    /// Ledger sequence assigned.
    pub sequence: u64,
    /// Status string.
    pub status: String,
    /// Message for the user.
    pub message: String,
}

/// A response registered for later feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    /// Response reference.
    pub response_id: String,
    /// Route used.
    pub route: Route,
    /// Confidence value reported.
    pub confidence: f64,
    /// Question text.
    pub question: String,
    /// Emission time.
    pub created_at: DateTime<Utc>,
}
