//! Tool request types with JSON schemas.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{FeedbackError, McpError};
use crate::feedback::validate_rating;
use crate::model::{Difficulty, Feedback, Question, Topic};

/// Request for `math_ask`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskRequest {
    /// The math question.
    pub question: String,
    /// Topic hint: algebra, calculus, geometry, statistics, trigonometry,
    /// linear_algebra or other.
    pub topic: Option<String>,
    /// Requested difficulty: beginner, intermediate or advanced.
    pub difficulty_level: Option<String>,
    /// Extra context to take into account.
    pub context: Option<String>,
}

impl AskRequest {
    /// Convert into a [`Question`].
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidParameters`] for an unknown topic or
    /// difficulty.
    pub fn into_question(self) -> Result<Question, McpError> {
        let invalid = |message: String| McpError::InvalidParameters {
            tool: "math_ask".into(),
            message,
        };
        let mut question = Question::new(self.question);
        if let Some(topic) = non_blank(self.topic) {
            question = question.with_topic(topic.parse::<Topic>().map_err(invalid)?);
        }
        if let Some(level) = non_blank(self.difficulty_level) {
            question = question.with_difficulty(level.parse::<Difficulty>().map_err(invalid)?);
        }
        if let Some(context) = non_blank(self.context) {
            question = question.with_context(context);
        }
        Ok(question)
    }
}

/// Request for `math_feedback`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackRequest {
    /// `response_id` of the answer being rated.
    pub response_id: String,
    /// Rating from 1 (poor) to 5 (excellent).
    pub rating: i64,
    /// Whether the answer helped.
    pub is_helpful: bool,
    /// Free-text comment.
    pub comment: Option<String>,
    /// What would have made the answer better.
    pub suggested_improvement: Option<String>,
}

impl FeedbackRequest {
    /// Convert into [`Feedback`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError::InvalidRating`] when the rating is off the scale.
    pub fn into_feedback(self) -> Result<Feedback, FeedbackError> {
        let rating = validate_rating(self.rating)?;
        let mut feedback = Feedback::new(self.response_id.trim(), rating, self.is_helpful);
        if let Some(comment) = non_blank(self.comment) {
            feedback = feedback.with_comment(comment);
        }
        if let Some(suggestion) = non_blank(self.suggested_improvement) {
            feedback = feedback.with_suggestion(suggestion);
        }
        Ok(feedback)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
