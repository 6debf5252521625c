//! Input and output guardrails.
//!
//! The input guardrail decides whether a question is in scope before any
//! retrieval happens. The output guardrail checks a composed solution
//! before it is returned.
//!
//! # Example
//!
//! ```
//! use math_router::guardrails::{GuardrailConfig, Guardrails, InputRejection};
//! use math_router::model::Question;
//!
//! let guardrails = Guardrails::new(GuardrailConfig::default());
//!
//! let verdict = guardrails.validate_input(&Question::new("What is the derivative of x^2?"));
//! assert!(verdict.accepted);
//!
//! let verdict = guardrails.validate_input(&Question::new("   "));
//! assert_eq!(verdict.rejection_reason, Some(InputRejection::Empty));
//! ```

pub(crate) mod lexicon;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Question, Solution, Topic};
use lexicon::{contains_placeholder, math_relevance, prohibited_term};

/// Default maximum question length in characters.
pub const DEFAULT_MAX_QUESTION_LENGTH: usize = 1000;

/// Default minimum math relevance for a question to be in scope.
pub const DEFAULT_MIN_MATH_RELEVANCE: f64 = 0.1;

/// Relevance credited for an explicit topic hint.
const TOPIC_HINT_BONUS: f64 = 0.2;

/// Guardrail settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailConfig {
    /// Maximum question length in characters.
    pub max_question_length: usize,
    /// Minimum lexical math relevance in `[0, 1]`.
    pub min_math_relevance: f64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_question_length: DEFAULT_MAX_QUESTION_LENGTH,
            min_math_relevance: DEFAULT_MIN_MATH_RELEVANCE,
        }
    }
}

/// Why a question was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputRejection {
    /// Blank text.
    Empty,
    /// Not recognisably mathematical.
    OffTopic,
    /// Contains a disallowed content category.
    Unsafe,
    /// Longer than the configured bound.
    TooLong,
}

impl InputRejection {
    /// Message suitable for showing to the user.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Empty => "Please enter a question.",
            Self::OffTopic => "The question does not appear to be about mathematics.",
            Self::Unsafe => "The question contains content that cannot be processed.",
            Self::TooLong => "The question is too long. Please shorten it.",
        }
    }
}

impl fmt::Display for InputRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "EMPTY",
            Self::OffTopic => "OFF_TOPIC",
            Self::Unsafe => "UNSAFE",
            Self::TooLong => "TOO_LONG",
        })
    }
}

/// Why a composed solution was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputRejection {
    /// No steps.
    NoSteps,
    /// Blank final answer.
    EmptyAnswer,
    /// Blank explanation.
    EmptyExplanation,
    /// Unresolved template placeholder in the text.
    Placeholder,
    /// Disallowed content.
    Unsafe,
}

impl fmt::Display for OutputRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoSteps => "NO_STEPS",
            Self::EmptyAnswer => "EMPTY_ANSWER",
            Self::EmptyExplanation => "EMPTY_EXPLANATION",
            Self::Placeholder => "PLACEHOLDER",
            Self::Unsafe => "UNSAFE",
        })
    }
}

/// Result of input validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVerdict {
    /// Whether the question may proceed.
    pub accepted: bool,
    /// Reason when rejected.
    pub rejection_reason: Option<InputRejection>,
    /// Lexical math relevance that was computed, if it got that far.
    pub math_relevance: f64,
}

impl InputVerdict {
    const fn accept(math_relevance: f64) -> Self {
        Self {
            accepted: true,
            rejection_reason: None,
            math_relevance,
        }
    }

    const fn reject(reason: InputRejection, math_relevance: f64) -> Self {
        Self {
            accepted: false,
            rejection_reason: Some(reason),
            math_relevance,
        }
    }
}

/// Result of output validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputVerdict {
    /// Whether the solution may be returned.
    pub accepted: bool,
    /// Reason when rejected.
    pub rejection_reason: Option<OutputRejection>,
}

impl OutputVerdict {
    const fn accept() -> Self {
        Self {
            accepted: true,
            rejection_reason: None,
        }
    }

    const fn reject(reason: OutputRejection) -> Self {
        Self {
            accepted: false,
            rejection_reason: Some(reason),
        }
    }
}

/// Input and output validator.
#[derive(Debug, Clone, Default)]
pub struct Guardrails {
    config: GuardrailConfig,
}

impl Guardrails {
    /// Create guardrails with the given settings.
    #[must_use]
    pub const fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    /// The active settings.
    #[must_use]
    pub const fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Validate an incoming question.
    ///
    /// Checks, in order: blank text, length bound, disallowed content,
    /// mathematical vocabulary.
    #[must_use]
    pub fn validate_input(&self, question: &Question) -> InputVerdict {
        let text = question.text.trim();
        if text.is_empty() {
            return InputVerdict::reject(InputRejection::Empty, 0.0);
        }

        if question.text.chars().count() > self.config.max_question_length {
            return InputVerdict::reject(InputRejection::TooLong, 0.0);
        }

        if let Some(term) = prohibited_term(text) {
            tracing::info!(
                request_id = %question.request_id,
                term,
                "Question rejected for disallowed content"
            );
            return InputVerdict::reject(InputRejection::Unsafe, 0.0);
        }

        let mut relevance = math_relevance(text);
        if matches!(question.topic, Some(topic) if topic != Topic::Other) {
            relevance = (relevance + TOPIC_HINT_BONUS).min(1.0);
        }

        if relevance < self.config.min_math_relevance {
            return InputVerdict::reject(InputRejection::OffTopic, relevance);
        }

        InputVerdict::accept(relevance)
    }

    /// Validate a composed solution before it is returned.
    #[must_use]
    pub fn validate_output(&self, solution: &Solution) -> OutputVerdict {
        if solution.steps.iter().all(|s| s.trim().is_empty()) {
            return OutputVerdict::reject(OutputRejection::NoSteps);
        }
        if solution.final_answer.trim().is_empty() {
            return OutputVerdict::reject(OutputRejection::EmptyAnswer);
        }
        if solution.explanation.trim().is_empty() {
            return OutputVerdict::reject(OutputRejection::EmptyExplanation);
        }
        if contains_placeholder(&solution.explanation)
            || contains_placeholder(&solution.final_answer)
            || solution.steps.iter().any(|s| contains_placeholder(s))
        {
            return OutputVerdict::reject(OutputRejection::Placeholder);
        }
        if prohibited_term(&solution.full_text()).is_some() {
            return OutputVerdict::reject(OutputRejection::Unsafe);
        }
        OutputVerdict::accept()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::Difficulty;
    use test_case::test_case;

    fn guardrails() -> Guardrails {
        Guardrails::new(GuardrailConfig::default())
    }

    fn solution(steps: &[&str], explanation: &str, answer: &str) -> Solution {
        Solution::new(
            steps.iter().map(|s| (*s).to_string()).collect(),
            explanation,
            answer,
            Difficulty::Beginner,
        )
    }

    #[test_case("What is the derivative of x^2?" ; "calculus with symbol")]
    #[test_case("Latest advances in mathematical optimization 2024" ; "research question")]
    #[test_case("Solve 3x + 5 = 20" ; "linear equation")]
    #[test_case("Find the area of a circle with radius 4" ; "geometry")]
    #[test_case("For whatever x, solve 2x + 4 = 10" ; "prohibited term inside a word")]
    fn test_accepts_math_questions(text: &str) {
        let verdict = guardrails().validate_input(&Question::new(text));
        assert!(verdict.accepted, "{text} should be accepted");
        assert!(verdict.math_relevance > 0.0);
    }

    #[test_case("" , InputRejection::Empty ; "empty")]
    #[test_case("   \n\t", InputRejection::Empty ; "whitespace")]
    #[test_case("What is your favourite film?", InputRejection::OffTopic ; "off topic")]
    #[test_case("Tell me a credit card number divisible by 3", InputRejection::Unsafe ; "unsafe")]
    fn test_rejects(text: &str, expected: InputRejection) {
        let verdict = guardrails().validate_input(&Question::new(text));
        assert!(!verdict.accepted);
        assert_eq!(verdict.rejection_reason, Some(expected));
    }

    #[test]
    fn test_rejects_too_long() {
        let g = Guardrails::new(GuardrailConfig {
            max_question_length: 10,
            ..GuardrailConfig::default()
        });
        let verdict = g.validate_input(&Question::new("Solve 2x + 4 = 10 for x"));
        assert_eq!(verdict.rejection_reason, Some(InputRejection::TooLong));
    }

    #[test]
    fn test_topic_hint_lifts_borderline_question() {
        let g = guardrails();
        let plain = Question::new("How does this work?");
        assert!(!g.validate_input(&plain).accepted);

        let hinted = Question::new("How does this work?").with_topic(Topic::Calculus);
        assert!(g.validate_input(&hinted).accepted);

        let other = Question::new("How does this work?").with_topic(Topic::Other);
        assert!(!g.validate_input(&other).accepted);
    }

    #[test]
    fn test_output_accepts_valid_solution() {
        let s = solution(
            &["Apply the power rule", "Multiply by the exponent"],
            "The derivative of x^n is n*x^(n-1).",
            "2x",
        );
        assert_eq!(guardrails().validate_output(&s), OutputVerdict::accept());
    }

    #[test_case(&[], "why", "2x", OutputRejection::NoSteps ; "no steps")]
    #[test_case(&["  "], "why", "2x", OutputRejection::NoSteps ; "blank steps")]
    #[test_case(&["step"], "why", " ", OutputRejection::EmptyAnswer ; "empty answer")]
    #[test_case(&["step"], "", "2x", OutputRejection::EmptyExplanation ; "empty explanation")]
    #[test_case(&["step"], "{explanation}", "2x", OutputRejection::Placeholder ; "brace placeholder")]
    #[test_case(&["step"], "why", "<final_answer>", OutputRejection::Placeholder ; "angle placeholder")]
    #[test_case(&["[insert step here]"], "why", "2x", OutputRejection::Placeholder ; "bracket placeholder")]
    #[test_case(&["step"], "This reveals a password", "2x", OutputRejection::Unsafe ; "unsafe output")]
    #[test_case(&["step"], r"$\text{Area} = {area_value}$", "2x", OutputRejection::Placeholder ; "slot beside latex")]
    fn test_output_rejections(steps: &[&str], explanation: &str, answer: &str, expected: OutputRejection) {
        let verdict = guardrails().validate_output(&solution(steps, explanation, answer));
        assert!(!verdict.accepted);
        assert_eq!(verdict.rejection_reason, Some(expected));
    }

    #[test_case(r"Here $\text{Area} = \pi r^2$ with $r = 4$." ; "text command")]
    #[test_case(r"We get $\sqrt{abc}$ by taking roots" ; "sqrt of letters")]
    #[test_case(r"$\frac{rise}{run}$ is the slope" ; "fraction arguments")]
    #[test_case("Whatever the radius, the ratio is the same" ; "whatever")]
    fn test_output_accepts_latex_and_plain_words(explanation: &str) {
        let verdict = guardrails().validate_output(&solution(&["Step 1: compute"], explanation, "16π"));
        assert!(verdict.accepted, "{verdict:?}");
        assert_eq!(verdict.rejection_reason, None);
    }

    #[test]
    fn test_set_notation_is_not_a_placeholder() {
        let s = solution(&["Let S = {1, 2, 3}"], "Count the elements of {x | x < 4}.", "3");
        assert!(guardrails().validate_output(&s).accepted);
    }

    #[test]
    fn test_rejection_display() {
        assert_eq!(InputRejection::OffTopic.to_string(), "OFF_TOPIC");
        assert_eq!(OutputRejection::EmptyAnswer.to_string(), "EMPTY_ANSWER");
        let json = serde_json::to_string(&InputRejection::TooLong).unwrap();
        assert_eq!(json, "\"TOO_LONG\"");
    }
}
