//! The service facade: `ask`, `submit_feedback` and `health`.
//!
//! [`MathAgent`] ties the routing engine to the adaptive weights, the
//! feedback ledger and the metrics collector. [`MathService`] is the
//! object-safe view of it that the MCP server and the background adaptation
//! task work against.

mod background;
mod health;

pub use background::AdaptationLoop;
pub use health::{HealthReport, HealthStatus};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AskError, FeedbackError, StorageError};
use crate::feedback::{
    AdaptReport, FeedbackAdapter, FeedbackAnalytics, FeedbackLedger, ThresholdAdjustment,
};
use crate::metrics::{AskOutcome, EscalationEvent, MetricsCollector, MetricsSummary, RequestEvent, Timer};
use crate::model::{
    generate_response_id, Feedback, FeedbackAck, Question, Response, ResponseEntry, Route,
    SolutionStatus,
};
use crate::routing::{RoutedAnswer, RoutingEngine, RoutingWeights, WeightsStore};
use crate::traits::{
    EvidenceItem, KnowledgeRetriever, LedgerStore, RealTimeProvider, SolutionGenerator,
    TimeProvider, WebSearcher,
};

/// Status string of an accepted feedback submission.
pub const FEEDBACK_RECORDED: &str = "recorded";

/// A threshold change with the weights revision it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    /// Weights revision.
    pub revision: u64,
    /// The change.
    #[serde(flatten)]
    pub adjustment: ThresholdAdjustment,
}

/// Feedback analytics with the routing state they drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReport {
    /// Ledger summary.
    pub analytics: FeedbackAnalytics,
    /// Routing weights in force.
    pub weights: RoutingWeights,
    /// Every threshold change so far, oldest first.
    pub threshold_history: Vec<AdjustmentEntry>,
}

/// Operations exposed to callers.
#[async_trait]
pub trait MathService: Send + Sync {
    /// Answer a math question.
    ///
    /// # Errors
    ///
    /// Returns [`AskError`] when no response is produced.
    async fn ask(&self, question: Question) -> Result<Response, AskError>;

    /// Record feedback on an emitted response.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError`] for unknown responses, bad ratings or
    /// storage failures.
    async fn submit_feedback(&self, feedback: Feedback) -> Result<FeedbackAck, FeedbackError>;

    /// Probe every dependency.
    async fn health(&self) -> HealthReport;

    /// Summarise the feedback ledger.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the ledger cannot be read.
    async fn feedback_report(&self) -> Result<FeedbackReport, StorageError>;

    /// Recompute routing weights from the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the ledger cannot be read or written.
    async fn adapt(&self) -> Result<AdaptReport, StorageError>;

    /// Request metrics.
    fn metrics(&self) -> MetricsSummary;
}

/// The answering service.
pub struct MathAgent<K, W, G, L>
where
    K: KnowledgeRetriever,
    W: WebSearcher,
    G: SolutionGenerator,
    L: LedgerStore,
{
    engine: RoutingEngine<K, W, G>,
    weights: WeightsStore,
    ledger: FeedbackLedger<L>,
    adapter: FeedbackAdapter,
    metrics: Arc<MetricsCollector>,
    time: Arc<dyn TimeProvider>,
    adapt_every_n_feedback: u64,
}

impl<K, W, G, L> std::fmt::Debug for MathAgent<K, W, G, L>
where
    K: KnowledgeRetriever,
    W: WebSearcher,
    G: SolutionGenerator,
    L: LedgerStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MathAgent")
            .field("engine", &self.engine)
            .field("adapter", &self.adapter)
            .field("adapt_every_n_feedback", &self.adapt_every_n_feedback)
            .finish_non_exhaustive()
    }
}

impl<K, W, G, L> MathAgent<K, W, G, L>
where
    K: KnowledgeRetriever,
    W: WebSearcher,
    G: SolutionGenerator,
    L: LedgerStore,
{
    /// Create an agent.
    #[must_use]
    pub fn new(
        engine: RoutingEngine<K, W, G>,
        initial_weights: RoutingWeights,
        ledger: L,
        adapter: FeedbackAdapter,
    ) -> Self {
        Self {
            engine,
            weights: WeightsStore::new(initial_weights),
            ledger: FeedbackLedger::new(ledger),
            adapter,
            metrics: Arc::new(MetricsCollector::new()),
            time: Arc::new(RealTimeProvider),
            adapt_every_n_feedback: 0,
        }
    }

    /// Run adaptation after every `n` feedback entries; 0 disables.
    #[must_use]
    pub const fn with_adapt_every(mut self, n: u64) -> Self {
        self.adapt_every_n_feedback = n;
        self
    }

    /// Use a shared metrics collector.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Use a custom clock.
    #[must_use]
    pub fn with_time_provider(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = time;
        self
    }

    /// The routing engine.
    #[must_use]
    pub const fn engine(&self) -> &RoutingEngine<K, W, G> {
        &self.engine
    }

    /// Routing weights in force.
    #[must_use]
    pub fn weights(&self) -> Arc<RoutingWeights> {
        self.weights.snapshot()
    }

    /// The feedback ledger.
    #[must_use]
    pub const fn ledger(&self) -> &FeedbackLedger<L> {
        &self.ledger
    }

    /// Reinstate thresholds recorded by earlier runs.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the ledger cannot be read.
    pub async fn restore_weights(&self) -> Result<u64, StorageError> {
        self.adapter.restore(&self.weights, self.ledger.store()).await
    }

    fn observe_failure(&self, question: &Question, error: &AskError, latency_ms: u64) {
        let outcome = match error {
            AskError::InputRejected { .. } => AskOutcome::InputRejected,
            AskError::InsufficientEvidence { .. } => AskOutcome::InsufficientEvidence,
            AskError::ServiceUnavailable { .. } => AskOutcome::Failed,
        };
        self.metrics.record(RequestEvent::new(None, outcome, latency_ms));

        if let AskError::InsufficientEvidence { kb_score, web_score } = error {
            self.metrics.record_escalation(EscalationEvent::new(
                Route::KnowledgeBase.as_str(),
                "rejected",
                format!("kb {kb_score:.3} and web {web_score:.3} below thresholds"),
            ));
        }

        if error.is_user_facing() {
            tracing::info!(
                request_id = %question.request_id,
                code = error.code(),
                latency_ms,
                "Question not answered"
            );
        } else {
            tracing::error!(
                request_id = %question.request_id,
                error = %error,
                latency_ms,
                "Question failed"
            );
        }
    }

    fn observe_answer(&self, response: &Response) {
        let outcome = match response.status {
            SolutionStatus::Success => AskOutcome::Answered,
            SolutionStatus::Degraded => AskOutcome::Degraded,
        };
        self.metrics.record(
            RequestEvent::new(Some(response.route_used), outcome, response.response_time_ms)
                .with_confidence(response.confidence.value),
        );

        if response.route_used != Route::KnowledgeBase {
            self.metrics.record_escalation(EscalationEvent::new(
                Route::KnowledgeBase.as_str(),
                response.route_used.as_str(),
                format!(
                    "kb {:.3} below acceptance {:.3}",
                    response.decision.kb_score, response.decision.thresholds.kb_high
                ),
            ));
        }
    }

    fn build_response(&self, question: Question, answer: RoutedAnswer, elapsed_ms: u64) -> Response {
        let created_at = self.time.now();
        let RoutedAnswer {
            decision,
            confidence,
            evidence,
            composition,
            recovered,
        } = answer;

        Response {
            response_id: generate_response_id(created_at),
            request_id: question.request_id,
            question: question.text,
            route_used: decision.route,
            solution: composition.solution,
            confidence,
            sources: cited_sources(&evidence),
            response_time_ms: elapsed_ms,
            status: composition.status,
            low_confidence: composition.status == SolutionStatus::Degraded,
            decision,
            recovered,
            created_at,
        }
    }
}

/// Source identifiers in evidence order, without duplicates.
#[must_use]
pub fn cited_sources(evidence: &[EvidenceItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    evidence
        .iter()
        .filter(|item| item.is_cited())
        .filter(|item| seen.insert(item.source_id.as_str()))
        .map(|item| item.source_id.clone())
        .collect()
}

#[async_trait]
impl<K, W, G, L> MathService for MathAgent<K, W, G, L>
where
    K: KnowledgeRetriever,
    W: WebSearcher,
    G: SolutionGenerator,
    L: LedgerStore,
{
    async fn ask(&self, question: Question) -> Result<Response, AskError> {
        let timer = Timer::start();
        let weights = self.weights.snapshot();
        tracing::info!(
            request_id = %question.request_id,
            question = %question.preview(),
            weights_revision = weights.revision,
            "Question received"
        );

        let answer = match self.engine.answer(&question, &weights).await {
            Ok(answer) => answer,
            Err(e) => {
                self.observe_failure(&question, &e, timer.elapsed_ms());
                return Err(e);
            }
        };

        let response = self.build_response(question, answer, timer.elapsed_ms());

        let entry = ResponseEntry {
            response_id: response.response_id.clone(),
            route: response.route_used,
            confidence: response.confidence.value,
            question: response.question.clone(),
            created_at: response.created_at,
        };
        if let Err(e) = self.ledger.register_response(&entry).await {
            tracing::error!(
                response_id = %response.response_id,
                error = %e,
                "Failed to register response; feedback on it will be refused"
            );
        }

        self.observe_answer(&response);
        tracing::info!(
            request_id = %response.request_id,
            response_id = %response.response_id,
            route = %response.route_used,
            confidence = response.confidence.value,
            status = ?response.status,
            elapsed_ms = response.response_time_ms,
            "Question answered"
        );
        Ok(response)
    }

    async fn submit_feedback(&self, feedback: Feedback) -> Result<FeedbackAck, FeedbackError> {
        let record = self.ledger.record(feedback).await?;

        if self.adapt_every_n_feedback > 0 && record.sequence % self.adapt_every_n_feedback == 0 {
            if let Err(e) = self.adapt().await {
                tracing::warn!(error = %e, "Adaptation after feedback failed");
            }
        }

        Ok(FeedbackAck {
            feedback_id: record.feedback_id,
            sequence: record.sequence,
            status: FEEDBACK_RECORDED.into(),
            message: "Thank you for your feedback.".into(),
        })
    }

    async fn health(&self) -> HealthReport {
        let (knowledge, web, generator, stored) = tokio::join!(
            self.engine.knowledge().ping(),
            self.engine.web().ping(),
            self.engine.generator().ping(),
            self.ledger.len(),
        );

        let mut dependencies = BTreeMap::new();
        dependencies.insert("knowledge_base".to_string(), knowledge);
        dependencies.insert("web_search".to_string(), web);
        dependencies.insert("generation".to_string(), generator);
        dependencies.insert("ledger".to_string(), stored.is_ok());

        let status = HealthStatus::from_checks(dependencies.values());
        if status != HealthStatus::Healthy {
            tracing::warn!(?status, ?dependencies, "Health check found unreachable dependencies");
        }

        HealthReport {
            status,
            dependencies,
            weights_revision: self.weights.snapshot().revision,
            feedback_entries: stored.ok(),
            checked_at: self.time.now(),
        }
    }

    async fn feedback_report(&self) -> Result<FeedbackReport, StorageError> {
        let records = self.ledger.entries().await?;
        let history = self.ledger.store().list_adjustments().await?;
        Ok(FeedbackReport {
            analytics: FeedbackAnalytics::from_records(&records),
            weights: RoutingWeights::clone(&self.weights.snapshot()),
            threshold_history: history
                .into_iter()
                .map(|(revision, adjustment)| AdjustmentEntry {
                    revision,
                    adjustment,
                })
                .collect(),
        })
    }

    async fn adapt(&self) -> Result<AdaptReport, StorageError> {
        self.adapter.adapt(&self.weights, self.ledger.store()).await
    }

    fn metrics(&self) -> MetricsSummary {
        self.metrics.summary()
    }
}
