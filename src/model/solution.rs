//! Structured solutions.

use serde::{Deserialize, Serialize};

use super::Difficulty;

/// Explanation attached to solutions assembled from raw evidence.
pub const DEGRADED_EXPLANATION: &str = "automatically extracted, unverified";

/// A step-by-step solution.
///
/// `steps` is never empty on a successfully composed solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Ordered solution steps.
    pub steps: Vec<String>,
    /// Explanation of the approach.
    pub explanation: String,
    /// Final answer.
    pub final_answer: String,
    /// Difficulty assessment.
    pub difficulty: Difficulty,
}

impl Solution {
    /// Create a solution.
    #[must_use]
    pub fn new(
        steps: Vec<String>,
        explanation: impl Into<String>,
        final_answer: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            steps,
            explanation: explanation.into(),
            final_answer: final_answer.into(),
            difficulty,
        }
    }

    /// All solution text concatenated, for content screening.
    #[must_use]
    pub fn full_text(&self) -> String {
        format!(
            "{} {} {}",
            self.explanation,
            self.steps.join(" "),
            self.final_answer
        )
    }
}

/// Whether a solution came from the generator or from the degrade path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    /// Generated and validated.
    Success,
    /// Assembled from evidence after generation or validation failed twice.
    Degraded,
}

/// Normalise generated steps.
///
/// Trims each step, drops blanks and prefixes `Step N:` unless the step
/// already starts with its number.
#[must_use]
pub fn format_steps(steps: &[String]) -> Vec<String> {
    steps
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, step)| {
            let number = (i + 1).to_string();
            let lower = step.to_lowercase();
            if step.starts_with(&number) || lower.starts_with(&format!("step {number}")) {
                step.to_string()
            } else {
                format!("Step {number}: {step}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_steps_numbers_and_drops_blanks() {
        let steps = vec![
            "  Apply the power rule ".to_string(),
            String::new(),
            "2. Multiply by the exponent".to_string(),
            "Step 3: Simplify".to_string(),
        ];
        assert_eq!(
            format_steps(&steps),
            vec![
                "Step 1: Apply the power rule".to_string(),
                "2. Multiply by the exponent".to_string(),
                "Step 3: Simplify".to_string(),
            ]
        );
    }

    #[test]
    fn test_format_steps_empty() {
        assert!(format_steps(&[String::new(), "   ".into()]).is_empty());
    }

    #[test]
    fn test_full_text() {
        let s = Solution::new(
            vec!["a".into(), "b".into()],
            "why",
            "42",
            Difficulty::Beginner,
        );
        assert_eq!(s.full_text(), "why a b 42");
    }
}
