//! Incoming questions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mathematical topic hint supplied with a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Algebra.
    Algebra,
    /// Calculus.
    Calculus,
    /// Geometry.
    Geometry,
    /// Statistics and probability.
    Statistics,
    /// Trigonometry.
    Trigonometry,
    /// Linear algebra.
    LinearAlgebra,
    /// Anything else.
    Other,
}

impl Topic {
    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Algebra => "algebra",
            Self::Calculus => "calculus",
            Self::Geometry => "geometry",
            Self::Statistics => "statistics",
            Self::Trigonometry => "trigonometry",
            Self::LinearAlgebra => "linear_algebra",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "algebra" => Ok(Self::Algebra),
            "calculus" => Ok(Self::Calculus),
            "geometry" => Ok(Self::Geometry),
            "statistics" => Ok(Self::Statistics),
            "trigonometry" => Ok(Self::Trigonometry),
            "linear_algebra" => Ok(Self::LinearAlgebra),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown topic: {other}")),
        }
    }
}

/// Difficulty level, both requested by the user and assessed on a solution.
///
/// `Unknown` is only produced for degraded solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Introductory material.
    Beginner,
    /// Standard coursework.
    Intermediate,
    /// Upper-level material.
    Advanced,
    /// Not assessed.
    Unknown,
}

impl Difficulty {
    /// Wire name of the difficulty.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Unknown => "unknown",
        }
    }

    /// Extract a difficulty from free text produced by a model.
    ///
    /// Looks for the first known level mentioned anywhere in the text;
    /// returns `None` when none is present.
    #[must_use]
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        [Self::Beginner, Self::Intermediate, Self::Advanced]
            .into_iter()
            .find(|level| lower.contains(level.as_str()))
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!(
                "unknown difficulty: {other} (expected beginner, intermediate or advanced)"
            )),
        }
    }
}

/// A question submitted to the engine.
///
/// Immutable once constructed; `request_id` identifies it in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Generated request identifier.
    pub request_id: String,
    /// Raw question text.
    pub text: String,
    /// Optional topic hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
    /// Optional requested difficulty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<Difficulty>,
    /// Optional extra context from the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// When the question was received.
    pub submitted_at: DateTime<Utc>,
}

impl Question {
    /// Create a question with a fresh request id.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            topic: None,
            difficulty_level: None,
            context: None,
            submitted_at: Utc::now(),
        }
    }

    /// Set the topic hint.
    #[must_use]
    pub const fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }

    /// Set the requested difficulty.
    #[must_use]
    pub const fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty_level = Some(difficulty);
        self
    }

    /// Set extra context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Short prefix of the text for log lines.
    #[must_use]
    pub fn preview(&self) -> String {
        let mut preview: String = self.text.chars().take(50).collect();
        if self.text.chars().count() > 50 {
            preview.push_str("...");
        }
        preview
    }
}
