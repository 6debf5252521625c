//! Solution composition.
//!
//! [`SolutionComposer`] turns evidence into a [`Solution`] through the
//! [`SolutionGenerator`] interface. Each attempt is generated, normalised,
//! checked for structure and passed through the output guardrail. A failed
//! attempt is retried once; a second failure yields a degraded solution
//! built from the evidence itself, so composition never fails outright.

mod parsing;
mod prompts;
mod retry;

pub use parsing::{extract_json, parse_generation, ParseError};
pub use prompts::{system_prompt, user_prompt};
pub use retry::{retry_bounded, Bounded};

use std::str::FromStr;
use std::time::Duration;

use crate::guardrails::lexicon::prohibited_term;
use crate::guardrails::Guardrails;
use crate::model::{
    format_steps, Difficulty, Question, RecoveredCondition, Route, Solution, SolutionStatus,
    DEGRADED_EXPLANATION,
};
use crate::traits::{EvidenceItem, GeneratedSolution, GenerationRequest, SolutionGenerator};

/// Attempts per composition: the first try plus exactly one retry.
pub const MAX_COMPOSE_ATTEMPTS: u32 = 2;

/// Step used by a degraded solution when there is no evidence to quote.
pub const NO_EVIDENCE_STEP: &str = "No supporting material could be retrieved for this question.";

/// Outcome of [`SolutionComposer::compose`].
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    /// The solution, generated or degraded.
    pub solution: Solution,
    /// Which of the two it is.
    pub status: SolutionStatus,
    /// Generation attempts made.
    pub attempts: u32,
    /// Failures absorbed along the way.
    pub recovered: Vec<RecoveredCondition>,
}

/// Composes solutions through a generator.
pub struct SolutionComposer<G: SolutionGenerator> {
    generator: G,
    generation_timeout: Duration,
}

impl<G: SolutionGenerator> std::fmt::Debug for SolutionComposer<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolutionComposer")
            .field("generation_timeout", &self.generation_timeout)
            .finish_non_exhaustive()
    }
}

impl<G: SolutionGenerator> SolutionComposer<G> {
    /// Create a composer.
    #[must_use]
    pub const fn new(generator: G, generation_timeout: Duration) -> Self {
        Self {
            generator,
            generation_timeout,
        }
    }

    /// The underlying generator.
    #[must_use]
    pub const fn generator(&self) -> &G {
        &self.generator
    }

    /// Compose a solution for `question` from `evidence`.
    pub async fn compose(
        &self,
        question: &Question,
        evidence: &[EvidenceItem],
        route: Route,
        guardrails: &Guardrails,
    ) -> Composition {
        let outcome = retry_bounded(MAX_COMPOSE_ATTEMPTS, |attempt| {
            self.attempt(question, evidence, route, guardrails, attempt)
        })
        .await;

        match outcome {
            Bounded::Succeeded {
                value,
                attempts,
                failures,
            } => Composition {
                solution: value,
                status: SolutionStatus::Success,
                attempts,
                recovered: failures,
            },
            Bounded::Exhausted { failures } => {
                tracing::warn!(
                    request_id = %question.request_id,
                    %route,
                    attempts = failures.len(),
                    "Generation failed twice, returning degraded solution"
                );
                Composition {
                    solution: degraded_solution(evidence),
                    status: SolutionStatus::Degraded,
                    attempts: MAX_COMPOSE_ATTEMPTS,
                    recovered: failures,
                }
            }
        }
    }

    async fn attempt(
        &self,
        question: &Question,
        evidence: &[EvidenceItem],
        route: Route,
        guardrails: &Guardrails,
        attempt: u32,
    ) -> Result<Solution, RecoveredCondition> {
        let request = GenerationRequest {
            question: question.text.clone(),
            context: question.context.clone(),
            topic: question.topic,
            requested_difficulty: question.difficulty_level,
            evidence: evidence.to_vec(),
            route,
            attempt,
        };

        let generated =
            match tokio::time::timeout(self.generation_timeout, self.generator.generate(request))
                .await
            {
                Ok(Ok(generated)) => generated,
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "Generation attempt failed");
                    return Err(RecoveredCondition::GenerationMalformed {
                        attempt,
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    tracing::warn!(attempt, "Generation attempt timed out");
                    return Err(RecoveredCondition::GenerationMalformed {
                        attempt,
                        message: format!(
                            "generation timed out after {}ms",
                            self.generation_timeout.as_millis()
                        ),
                    });
                }
            };

        let solution = into_solution(generated, question).map_err(|message| {
            tracing::warn!(attempt, %message, "Generated solution is malformed");
            RecoveredCondition::GenerationMalformed { attempt, message }
        })?;

        let verdict = guardrails.validate_output(&solution);
        if let Some(reason) = verdict.rejection_reason {
            tracing::warn!(attempt, %reason, "Output guardrail rejected solution");
            return Err(RecoveredCondition::OutputRejected { attempt, reason });
        }
        Ok(solution)
    }
}

/// Normalise a generated solution and check its structure.
fn into_solution(generated: GeneratedSolution, question: &Question) -> Result<Solution, String> {
    let steps = format_steps(&generated.steps);
    if steps.is_empty() {
        return Err("no solution steps".into());
    }
    let final_answer = generated.final_answer.trim();
    if final_answer.is_empty() {
        return Err("missing final answer".into());
    }

    let difficulty = generated
        .difficulty
        .as_deref()
        .and_then(|d| Difficulty::from_str(d).ok().or_else(|| Difficulty::detect(d)))
        .or(question.difficulty_level)
        .unwrap_or(Difficulty::Intermediate);

    Ok(Solution::new(
        steps,
        generated.explanation.trim(),
        final_answer,
        difficulty,
    ))
}

/// Best-effort solution quoted from the evidence.
///
/// Snippets carrying disallowed content are left out, the same screen the
/// output guardrail applies to generated text.
#[must_use]
pub fn degraded_solution(evidence: &[EvidenceItem]) -> Solution {
    let snippets: Vec<String> = evidence
        .iter()
        .filter(|e| match prohibited_term(&e.content) {
            Some(term) => {
                tracing::debug!(source = %e.source_id, term, "Dropping disallowed snippet");
                false
            }
            None => true,
        })
        .map(|e| e.content.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    let final_answer = snippets
        .first()
        .cloned()
        .unwrap_or_else(|| NO_EVIDENCE_STEP.to_string());
    let steps = if snippets.is_empty() {
        vec![NO_EVIDENCE_STEP.to_string()]
    } else {
        snippets
    };

    Solution::new(steps, DEGRADED_EXPLANATION, final_answer, Difficulty::Unknown)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::guardrails::{GuardrailConfig, OutputRejection};
    use crate::traits::{MockSolutionGenerator, SourceKind};
    use pretty_assertions::assert_eq;

    fn evidence() -> Vec<EvidenceItem> {
        vec![
            EvidenceItem::new(SourceKind::KnowledgeBase, "d/dx x^n = n x^(n-1)", "kb:1", 0.9),
            EvidenceItem::new(SourceKind::KnowledgeBase, "  ", "kb:2", 0.5),
            EvidenceItem::new(SourceKind::KnowledgeBase, "So d/dx x^2 = 2x", "kb:3", 0.4),
        ]
    }

    fn good() -> GeneratedSolution {
        GeneratedSolution {
            steps: vec!["Apply the power rule".into(), "Multiply 2 by x^1".into()],
            explanation: "The power rule lowers the exponent by one.".into(),
            final_answer: "2x".into(),
            difficulty: Some("beginner".into()),
        }
    }

    fn no_answer() -> GeneratedSolution {
        GeneratedSolution {
            final_answer: String::new(),
            ..good()
        }
    }

    fn placeholder() -> GeneratedSolution {
        GeneratedSolution {
            explanation: "{explanation}".into(),
            ..good()
        }
    }

    fn composer(mock: MockSolutionGenerator) -> SolutionComposer<MockSolutionGenerator> {
        SolutionComposer::new(mock, Duration::from_secs(5))
    }

    async fn compose(mock: MockSolutionGenerator) -> Composition {
        let question = Question::new("What is the derivative of x^2?");
        let guardrails = Guardrails::new(GuardrailConfig::default());
        composer(mock)
            .compose(&question, &evidence(), Route::KnowledgeBase, &guardrails)
            .await
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let mut mock = MockSolutionGenerator::new();
        mock.expect_generate().times(1).returning(|_| Ok(good()));

        let composition = compose(mock).await;
        assert_eq!(composition.status, SolutionStatus::Success);
        assert_eq!(composition.attempts, 1);
        assert_eq!(composition.solution.steps[0], "Step 1: Apply the power rule");
        assert_eq!(composition.solution.difficulty, Difficulty::Beginner);
        assert!(composition.recovered.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_then_success_retries_once() {
        let mut mock = MockSolutionGenerator::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|r| r.attempt == 1)
            .returning(|_| Ok(no_answer()));
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|r| r.attempt == 2)
            .returning(|_| Ok(good()));

        let composition = compose(mock).await;
        assert_eq!(composition.status, SolutionStatus::Success);
        assert_eq!(composition.attempts, 2);
        assert_eq!(
            composition.recovered,
            vec![RecoveredCondition::GenerationMalformed {
                attempt: 1,
                message: "missing final answer".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_output_rejection_twice_degrades() {
        let mut mock = MockSolutionGenerator::new();
        mock.expect_generate().times(2).returning(|_| Ok(placeholder()));

        let composition = compose(mock).await;
        assert_eq!(composition.status, SolutionStatus::Degraded);
        assert_eq!(composition.attempts, 2);
        assert_eq!(
            composition.recovered,
            vec![
                RecoveredCondition::OutputRejected {
                    attempt: 1,
                    reason: OutputRejection::Placeholder
                },
                RecoveredCondition::OutputRejected {
                    attempt: 2,
                    reason: OutputRejection::Placeholder
                },
            ]
        );
        let solution = composition.solution;
        assert_eq!(solution.explanation, DEGRADED_EXPLANATION);
        assert_eq!(solution.difficulty, Difficulty::Unknown);
        assert_eq!(solution.final_answer, "d/dx x^n = n x^(n-1)");
        assert_eq!(solution.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_generator_errors_degrade() {
        let mut mock = MockSolutionGenerator::new();
        mock.expect_generate().times(2).returning(|_| {
            Err(CollaboratorError::Network {
                service: "gemini".into(),
                message: "connection reset".into(),
            })
        });

        let composition = compose(mock).await;
        assert_eq!(composition.status, SolutionStatus::Degraded);
        assert_eq!(composition.recovered.len(), 2);
    }

    #[tokio::test]
    async fn test_generation_timeout_counts_as_malformed() {
        struct Slow;

        #[async_trait::async_trait]
        impl SolutionGenerator for Slow {
            async fn generate(
                &self,
                _request: GenerationRequest,
            ) -> Result<GeneratedSolution, CollaboratorError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(good())
            }

            async fn ping(&self) -> bool {
                true
            }
        }

        let composer = SolutionComposer::new(Slow, Duration::from_millis(10));
        let guardrails = Guardrails::new(GuardrailConfig::default());
        let question = Question::new("Solve 3x + 5 = 20");
        let composition = composer
            .compose(&question, &[], Route::WebSearch, &guardrails)
            .await;
        assert_eq!(composition.status, SolutionStatus::Degraded);
        assert_eq!(composition.solution.steps, vec![NO_EVIDENCE_STEP.to_string()]);
        assert!(matches!(
            composition.recovered[0],
            RecoveredCondition::GenerationMalformed { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_degraded_solution_skips_disallowed_snippets() {
        let mut evidence = evidence();
        evidence.insert(
            0,
            EvidenceItem::new(SourceKind::WebSearch, "Type your password to see x^2", "https://a.example", 0.95),
        );
        let solution = degraded_solution(&evidence);
        assert_eq!(solution.final_answer, "d/dx x^n = n x^(n-1)");
        assert!(solution.steps.iter().all(|s| !s.contains("password")));
        assert_eq!(solution.steps.len(), 2);
    }

    #[test]
    fn test_degraded_solution_with_only_disallowed_evidence() {
        let evidence = vec![EvidenceItem::new(
            SourceKind::WebSearch,
            "credit card generator",
            "https://b.example",
            0.9,
        )];
        let solution = degraded_solution(&evidence);
        assert_eq!(solution.final_answer, NO_EVIDENCE_STEP);
        assert!(solution.steps.iter().any(|s| s.contains(NO_EVIDENCE_STEP)));
    }

    #[test]
    fn test_unknown_difficulty_falls_back() {
        let question = Question::new("x").with_difficulty(Difficulty::Advanced);
        let generated = GeneratedSolution {
            difficulty: Some("hard-ish".into()),
            ..good()
        };
        let solution = into_solution(generated, &question).unwrap();
        assert_eq!(solution.difficulty, Difficulty::Advanced);
    }
}
