//! Recovery paths: retrieval timeouts and failures, generation retries and
//! degraded answers.

use std::time::Duration;

use pretty_assertions::assert_eq;

use math_router::agent::MathService;
use math_router::error::{AskError, CollaboratorError};
use math_router::guardrails::OutputRejection;
use math_router::model::{Question, RecoveredCondition, Route, SolutionStatus, DEGRADED_EXPLANATION};
use math_router::traits::{GeneratedSolution, SourceKind};

use super::fakes::{agent, good_solution, malformed, FakeGenerator, FakeSource};

fn confident_kb() -> FakeSource {
    FakeSource::kb().with_item("Power rule: d/dx x^n = n x^(n-1)", "kb/1", 0.95)
}

const QUESTION: &str = "What is the derivative of x^2?";

#[tokio::test]
async fn test_malformed_generation_retried_once_then_succeeds() {
    let generator = FakeGenerator::new().then(malformed());
    let agent = agent(confident_kb(), FakeSource::web(), generator.clone());

    let response = agent.ask(Question::new(QUESTION)).await.unwrap();

    assert_eq!(response.status, SolutionStatus::Success);
    assert!(!response.low_confidence);
    assert_eq!(generator.calls.count(), 2);
    let attempts: Vec<u32> = generator.requests().iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2]);
    assert!(matches!(
        response.recovered.as_slice(),
        [RecoveredCondition::GenerationMalformed { attempt: 1, .. }]
    ));
}

#[tokio::test]
async fn test_two_failures_degrade_after_exactly_one_retry() {
    let generator = FakeGenerator::new().then(malformed()).then(malformed());
    let agent = agent(confident_kb(), FakeSource::web(), generator.clone());

    let response = agent.ask(Question::new(QUESTION)).await.unwrap();

    assert_eq!(generator.calls.count(), 2);
    assert_eq!(response.status, SolutionStatus::Degraded);
    assert!(response.low_confidence);
    assert_eq!(response.route_used, Route::KnowledgeBase);
    assert_eq!(response.solution.explanation, DEGRADED_EXPLANATION);
    assert!(!response.solution.steps.is_empty());
    assert_eq!(response.recovered.len(), 2);

    let metrics = agent.metrics();
    assert_eq!(metrics.answered, 1);
    assert!(metrics.degraded_rate > 0.0);
}

#[tokio::test]
async fn test_output_guardrail_rejection_triggers_retry() {
    let unsafe_solution = GeneratedSolution {
        final_answer: "Send me your password".into(),
        ..good_solution()
    };
    let generator = FakeGenerator::new().then(Ok(unsafe_solution));
    let agent = agent(confident_kb(), FakeSource::web(), generator.clone());

    let response = agent.ask(Question::new(QUESTION)).await.unwrap();

    assert_eq!(generator.calls.count(), 2);
    assert_eq!(response.status, SolutionStatus::Success);
    assert_eq!(response.solution.final_answer, "2x");
    assert_eq!(
        response.recovered,
        vec![RecoveredCondition::OutputRejected {
            attempt: 1,
            reason: OutputRejection::Unsafe
        }]
    );
}

#[tokio::test]
async fn test_structurally_empty_solution_is_retried() {
    let empty = GeneratedSolution {
        steps: vec!["   ".into()],
        ..good_solution()
    };
    let generator = FakeGenerator::new().then(Ok(empty.clone())).then(Ok(empty));
    let agent = agent(confident_kb(), FakeSource::web(), generator.clone());

    let response = agent.ask(Question::new(QUESTION)).await.unwrap();

    assert_eq!(generator.calls.count(), 2);
    assert_eq!(response.status, SolutionStatus::Degraded);
}

#[tokio::test(start_paused = true)]
async fn test_knowledge_base_timeout_treated_as_empty() {
    let kb = confident_kb().with_delay(Duration::from_secs(5));
    let web = FakeSource::web().with_item(
        "The derivative of x^2 is 2x",
        "https://www.khanacademy.org/d",
        0.9,
    );
    let agent = agent(kb, web, FakeGenerator::new());

    let response = agent.ask(Question::new(QUESTION)).await.unwrap();

    assert_eq!(response.route_used, Route::WebSearch);
    assert!(response.recovered.iter().any(|c| matches!(
        c,
        RecoveredCondition::RetrievalTimeout {
            source: SourceKind::KnowledgeBase,
            ..
        }
    )));
}

#[tokio::test]
async fn test_web_failure_falls_back_to_knowledge_base_evidence() {
    let kb = FakeSource::kb().with_item("Power rule: d/dx x^n = n x^(n-1)", "kb/1", 0.6);
    let web = FakeSource::web().failing(CollaboratorError::Overloaded {
        service: "tavily".into(),
    });
    let agent = agent(kb, web, FakeGenerator::new());

    let response = agent.ask(Question::new(QUESTION)).await.unwrap();

    // kb is mid-range and web is empty: the merged evidence is the kb alone
    assert_eq!(response.route_used, Route::Hybrid);
    assert_eq!(response.sources, vec!["kb/1".to_string()]);
    assert!(response.recovered.iter().any(|c| matches!(
        c,
        RecoveredCondition::RetrievalFailed {
            source: SourceKind::WebSearch,
            ..
        }
    )));
}

#[tokio::test]
async fn test_both_sources_unreachable_is_service_unavailable() {
    let network = |service: &str| CollaboratorError::Network {
        service: service.into(),
        message: "connection refused".into(),
    };
    let kb = FakeSource::kb().failing(network("qdrant"));
    let web = FakeSource::web().failing(network("tavily"));
    let agent = agent(kb, web, FakeGenerator::new());

    let err = agent.ask(Question::new(QUESTION)).await.unwrap_err();

    assert!(matches!(err, AskError::ServiceUnavailable { .. }));
    assert!(!err.is_user_facing());

    let health = agent.health().await;
    assert_eq!(health.dependencies["knowledge_base"], false);
    assert_eq!(health.dependencies["generation"], true);
}

#[tokio::test]
async fn test_uncited_web_results_discarded() {
    let kb = FakeSource::kb();
    let web = FakeSource::web()
        .with_item("The derivative of x^2 is 2x", "https://www.khanacademy.org/d", 0.9)
        .with_item("An uncited snippet", "", 0.95);
    let generator = FakeGenerator::new();
    let agent = agent(kb, web, generator.clone());

    let response = agent.ask(Question::new(QUESTION)).await.unwrap();

    assert_eq!(response.route_used, Route::WebSearch);
    assert_eq!(generator.requests()[0].evidence.len(), 1);
    assert!(response
        .recovered
        .contains(&RecoveredCondition::UncitedResultsDiscarded { count: 1 }));
}
