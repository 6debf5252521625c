//! Routing scenarios.

use std::time::Duration;

use pretty_assertions::assert_eq;

use math_router::agent::MathService;
use math_router::error::AskError;
use math_router::guardrails::InputRejection;
use math_router::model::{Difficulty, Question, Route, SolutionStatus, Topic};
use math_router::routing::RoutingState;

use super::fakes::{agent, concurrent_agent, FakeGenerator, FakeSource};

#[tokio::test]
async fn test_confident_knowledge_base_skips_web_search() {
    let kb = FakeSource::kb().with_item(
        "Power rule: d/dx x^n = n x^(n-1)",
        "Calculus notes (math_knowledge_base/7)",
        0.95,
    );
    let web = FakeSource::web().with_item("2x", "https://www.khanacademy.org/d", 0.9);
    let web_calls = web.calls.clone();
    let agent = agent(kb, web, FakeGenerator::new());

    let response = agent
        .ask(Question::new("What is the derivative of x^2?"))
        .await
        .unwrap();

    assert_eq!(response.route_used, Route::KnowledgeBase);
    assert_eq!(web_calls.count(), 0);
    assert!(response.decision.web_skipped);
    assert_eq!(response.status, SolutionStatus::Success);
    assert_eq!(response.solution.final_answer, "2x");
    assert_eq!(
        response.sources,
        vec!["Calculus notes (math_knowledge_base/7)".to_string()]
    );

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["route_used"], "knowledge_base");
}

#[tokio::test]
async fn test_weak_knowledge_base_escalates_to_web_search() {
    let kb = FakeSource::kb().with_item("Linear programming basics", "kb/3", 0.2);
    let web = FakeSource::web().with_item(
        "Recent work on first-order methods for large-scale optimization",
        "https://math.stackexchange.com/q/1",
        0.85,
    );
    let agent = agent(kb, web, FakeGenerator::new());

    let response = agent
        .ask(Question::new("Latest advances in mathematical optimization 2024"))
        .await
        .unwrap();

    assert_eq!(response.route_used, Route::WebSearch);
    assert_eq!(
        response.sources,
        vec!["https://math.stackexchange.com/q/1".to_string()]
    );
    assert!(response.decision.web_score.unwrap() >= response.decision.thresholds.web_high);

    let metrics = agent.metrics();
    assert_eq!(metrics.total_escalations, 1);
    assert_eq!(metrics.recent_escalations[0].to, "web_search");
}

#[tokio::test]
async fn test_mid_range_scores_route_hybrid_with_merged_evidence() {
    let kb = FakeSource::kb()
        .with_item("The chain rule composes derivatives", "kb/1", 0.5)
        .with_item("Derivative of sin is cos", "kb/2", 0.45);
    let web = FakeSource::web()
        .with_item("The chain rule composes derivatives", "https://example.org/chain", 0.55)
        .with_item("Worked chain rule examples with exercises", "https://www.khanacademy.org/c", 0.5);
    let generator = FakeGenerator::new();
    let agent = agent(kb, web, generator.clone());

    let response = agent
        .ask(Question::new("Differentiate sin(x^2) using the chain rule"))
        .await
        .unwrap();

    assert_eq!(response.route_used, Route::Hybrid);
    assert!(response.decision.hybrid_score.is_some());

    // The duplicated snippet appears once.
    let evidence = &generator.requests()[0].evidence;
    let chain = evidence
        .iter()
        .filter(|e| e.content == "The chain rule composes derivatives")
        .count();
    assert_eq!(chain, 1);
    assert_eq!(evidence.len(), 3);

    assert!(response.sources.contains(&"kb/2".to_string()));
    assert!(response
        .sources
        .contains(&"https://www.khanacademy.org/c".to_string()));
}

#[tokio::test]
async fn test_both_paths_weak_is_insufficient_evidence() {
    let kb = FakeSource::kb().with_item("Unrelated note", "kb/9", 0.1);
    let web = FakeSource::web().with_item("Unrelated page", "https://example.org/x", 0.2);
    let generator = FakeGenerator::new();
    let generator_calls = generator.calls.clone();
    let agent = agent(kb, web, generator);

    let err = agent
        .ask(Question::new("Prove the Riemann hypothesis for this function"))
        .await
        .unwrap_err();

    assert!(matches!(err, AskError::InsufficientEvidence { .. }));
    assert_eq!(err.code(), "INSUFFICIENT_EVIDENCE");
    assert_eq!(generator_calls.count(), 0);
}

#[tokio::test]
async fn test_empty_question_issues_no_retrieval() {
    let kb = FakeSource::kb().with_item("anything", "kb/1", 0.9);
    let web = FakeSource::web().with_item("anything", "https://example.org", 0.9);
    let (kb_calls, web_calls) = (kb.calls.clone(), web.calls.clone());
    let agent = agent(kb, web, FakeGenerator::new());

    let err = agent.ask(Question::new("")).await.unwrap_err();

    assert_eq!(
        err,
        AskError::InputRejected {
            reason: InputRejection::Empty
        }
    );
    assert_eq!(kb_calls.count(), 0);
    assert_eq!(web_calls.count(), 0);
}

#[tokio::test]
async fn test_off_topic_question_rejected() {
    let kb = FakeSource::kb();
    let kb_calls = kb.calls.clone();
    let agent = agent(kb, FakeSource::web(), FakeGenerator::new());

    let err = agent
        .ask(Question::new("Who won the football game yesterday?"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AskError::InputRejected {
            reason: InputRejection::OffTopic
        }
    );
    assert_eq!(kb_calls.count(), 0);
}

#[tokio::test]
async fn test_question_fields_reach_generation() {
    let kb = FakeSource::kb().with_item("Area of a circle is pi r^2", "kb/4", 0.95);
    let generator = FakeGenerator::new();
    let agent = agent(kb, FakeSource::web(), generator.clone());

    let question = Question::new("Find the area of a circle with radius 3")
        .with_topic(Topic::Geometry)
        .with_difficulty(Difficulty::Beginner)
        .with_context("Leave the answer in terms of pi");
    agent.ask(question).await.unwrap();

    let request = &generator.requests()[0];
    assert_eq!(request.topic, Some(Topic::Geometry));
    assert_eq!(request.requested_difficulty, Some(Difficulty::Beginner));
    assert_eq!(
        request.context.as_deref(),
        Some("Leave the answer in terms of pi")
    );
    assert_eq!(request.route, Route::KnowledgeBase);
    assert_eq!(request.attempt, 1);
}

#[tokio::test]
async fn test_decision_trail_records_states() {
    let kb = FakeSource::kb().with_item("Pythagorean theorem a^2 + b^2 = c^2", "kb/5", 0.95);
    let agent = agent(kb, FakeSource::web(), FakeGenerator::new());

    let response = agent
        .ask(Question::new("State the Pythagorean theorem for a right triangle"))
        .await
        .unwrap();

    let states = &response.decision.states;
    assert_eq!(states.first(), Some(&RoutingState::Received));
    assert_eq!(states[1], RoutingState::Validating);
    assert_eq!(states.last(), Some(&RoutingState::Done));
    assert!(states.contains(&RoutingState::AcceptKb));
    assert!(!states.contains(&RoutingState::RetrievingWeb));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_strategy_queries_both_but_routes_the_same() {
    let kb = FakeSource::kb()
        .with_item("Power rule: d/dx x^n = n x^(n-1)", "kb/1", 0.95)
        .with_delay(Duration::from_millis(50));
    let web = FakeSource::web()
        .with_item("2x", "https://www.khanacademy.org/d", 0.9)
        .with_delay(Duration::from_millis(500));
    let web_calls = web.calls.clone();
    let agent = concurrent_agent(kb, web, FakeGenerator::new());

    let started = tokio::time::Instant::now();
    let response = agent
        .ask(Question::new("What is the derivative of x^2?"))
        .await
        .unwrap();

    assert_eq!(response.route_used, Route::KnowledgeBase);
    // Issued up front, then abandoned once the knowledge base was accepted.
    assert_eq!(web_calls.count(), 1);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(response.decision.web_skipped);
    assert_eq!(response.decision.web_score, None);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_strategy_waits_for_weak_knowledge_base() {
    let kb = FakeSource::kb()
        .with_item("Optimization survey from 1990", "kb/9", 0.2)
        .with_delay(Duration::from_millis(300));
    let web = FakeSource::web()
        .with_item(
            "2024 advances in mathematical optimization",
            "https://math.stackexchange.com/q/1",
            0.85,
        )
        .with_delay(Duration::from_millis(10));
    let kb_calls = kb.calls.clone();
    let agent = concurrent_agent(kb, web, FakeGenerator::new());

    let response = agent
        .ask(Question::new("Latest advances in mathematical optimization 2024"))
        .await
        .unwrap();

    assert_eq!(kb_calls.count(), 1);
    assert_eq!(response.route_used, Route::WebSearch);
    assert!(!response.decision.web_skipped);
}
