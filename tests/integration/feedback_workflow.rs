//! Feedback ledger, analytics and threshold adaptation.

use pretty_assertions::assert_eq;

use math_router::agent::{MathService, FEEDBACK_RECORDED};
use math_router::error::FeedbackError;
use math_router::model::{Feedback, Question, Route};

use super::fakes::{agent, FakeAgent, FakeGenerator, FakeSource};

fn kb_agent() -> FakeAgent {
    let kb = FakeSource::kb().with_item("Power rule: d/dx x^n = n x^(n-1)", "kb/1", 0.95);
    agent(kb, FakeSource::web(), FakeGenerator::new())
}

async fn answer(agent: &FakeAgent) -> String {
    agent
        .ask(Question::new("What is the derivative of x^3?"))
        .await
        .unwrap()
        .response_id
}

#[tokio::test]
async fn test_ledger_keeps_entries_in_submission_order() {
    let agent = kb_agent();
    let mut submitted = Vec::new();
    for rating in [5u8, 2, 4, 1] {
        let response_id = answer(&agent).await;
        let feedback = Feedback::new(&response_id, rating, rating >= 3)
            .with_comment(format!("rated {rating}"));
        let ack = agent.submit_feedback(feedback.clone()).await.unwrap();
        assert_eq!(ack.status, FEEDBACK_RECORDED);
        submitted.push(feedback);
    }

    let entries = agent.ledger().entries().await.unwrap();
    assert_eq!(entries.len(), 4);
    for (i, (entry, feedback)) in entries.iter().zip(&submitted).enumerate() {
        assert_eq!(entry.sequence, i as u64 + 1);
        assert_eq!(&entry.feedback, feedback);
        assert_eq!(entry.route, Route::KnowledgeBase);
    }
}

#[tokio::test]
async fn test_rejected_feedback_is_not_recorded() {
    let agent = kb_agent();
    let response_id = answer(&agent).await;

    let unknown = agent
        .submit_feedback(Feedback::new("resp-never-issued", 4, true))
        .await
        .unwrap_err();
    assert!(matches!(unknown, FeedbackError::UnknownResponse { .. }));

    let bad_rating = agent
        .submit_feedback(Feedback::new(&response_id, 0, false))
        .await
        .unwrap_err();
    assert!(matches!(bad_rating, FeedbackError::InvalidRating { rating: 0, .. }));

    assert_eq!(agent.ledger().len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_feedback_report_summarises_ledger() {
    let agent = kb_agent();
    for (rating, helpful) in [(5u8, true), (4, true), (1, false)] {
        let response_id = answer(&agent).await;
        agent
            .submit_feedback(
                Feedback::new(&response_id, rating, helpful).with_suggestion("show more steps"),
            )
            .await
            .unwrap();
    }

    let report = agent.feedback_report().await.unwrap();
    let analytics = &report.analytics;
    assert_eq!(analytics.total_feedback, 3);
    assert!((analytics.average_rating - 10.0 / 3.0).abs() < 1e-9);
    assert!((analytics.helpful_percentage - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(analytics.rating_distribution[&5], 1);
    assert_eq!(analytics.rating_distribution[&3], 0);
    assert_eq!(analytics.by_route[&Route::KnowledgeBase].count, 3);
    assert!(report.threshold_history.is_empty());
}

#[tokio::test]
async fn test_unhelpful_knowledge_base_raises_its_threshold() {
    let agent = kb_agent();
    let before = agent.weights().thresholds;
    for _ in 0..3 {
        let response_id = answer(&agent).await;
        agent
            .submit_feedback(Feedback::new(&response_id, 1, false))
            .await
            .unwrap();
    }

    let report = agent.adapt().await.unwrap();
    assert!(report.changed);
    assert_eq!(report.feedback_seen, 3);
    assert_eq!(report.adjustments.len(), 1);
    assert_eq!(report.adjustments[0].route, Route::KnowledgeBase);

    let after = agent.weights().thresholds;
    assert!(after.kb_high > before.kb_high);
    assert!((after.web_high - before.web_high).abs() < f64::EPSILON);
    assert!(after.is_ordered());

    let history = agent.feedback_report().await.unwrap().threshold_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].revision, report.revision);
}

#[tokio::test]
async fn test_adapt_twice_without_feedback_is_idempotent() {
    let agent = kb_agent();
    for _ in 0..3 {
        let response_id = answer(&agent).await;
        agent
            .submit_feedback(Feedback::new(&response_id, 5, true))
            .await
            .unwrap();
    }

    agent.adapt().await.unwrap();
    let first = agent.weights();
    let second_report = agent.adapt().await.unwrap();
    let second = agent.weights();

    assert!(!second_report.changed);
    assert_eq!(*first, *second);
}

#[tokio::test]
async fn test_adapt_every_n_feedback_runs_automatically() {
    let agent = kb_agent().with_adapt_every(3);
    let revision = agent.weights().revision;
    for _ in 0..3 {
        let response_id = answer(&agent).await;
        agent
            .submit_feedback(Feedback::new(&response_id, 1, false))
            .await
            .unwrap();
    }

    let weights = agent.weights();
    assert!(weights.revision > revision);
    assert_eq!(weights.feedback_cursor, 3);
    assert!(weights.thresholds.kb_high > 0.8);
}

#[tokio::test]
async fn test_health_reports_ledger_size() {
    let agent = kb_agent();
    let response_id = answer(&agent).await;
    agent
        .submit_feedback(Feedback::new(&response_id, 4, true))
        .await
        .unwrap();

    let health = agent.health().await;
    assert_eq!(health.feedback_entries, Some(1));
    assert_eq!(health.dependencies.len(), 4);
}
