//! Routing decision engine.
//!
//! [`RoutingEngine`] runs one question through the whole pipeline:
//! input guardrail, knowledge-base retrieval and scoring, web retrieval
//! and scoring when needed, the routing policy, composition and the output
//! guardrail. The lifecycle is tracked by a [`StateMachine`].
//!
//! # Policy
//!
//! The knowledge base is always searched first. With thresholds read once
//! per request from a [`ThresholdSnapshot`]:
//!
//! 1. `kb >= kb_high` accepts the knowledge base; web search is skipped
//!    (see [`RetrievalStrategy::Concurrent`] for the one exception).
//! 2. Otherwise web search runs. `web >= web_high` with `kb < low` accepts
//!    web search.
//! 3. `kb < low` and `web < low` is rejected as insufficient evidence.
//! 4. Anything else merges both result sets. A merged score below the
//!    minimum floor is rejected as insufficient evidence.
//!
//! Equal scores prefer the knowledge base, both in the policy and in the
//! merged evidence order.

mod merge;
mod state;
mod weights;

pub use merge::{merge_evidence, NEAR_DUPLICATE_OVERLAP};
pub use state::{RoutingState, StateMachine, TransitionError};
pub use weights::{
    RouteStats, RoutingWeights, ThresholdSnapshot, WeightsStore, WeightsUpdate,
    FLOOR_LOWER_BOUND, MIN_THRESHOLD_GAP,
};

use std::future::Future;
use std::str::FromStr;
use std::time::{Duration, Instant};

use futures_util::future::Either;
use serde::{Deserialize, Serialize};

use crate::composer::{Composition, SolutionComposer};
use crate::error::{AskError, CollaboratorError};
use crate::guardrails::Guardrails;
use crate::model::{Question, RecoveredCondition, Route};
use crate::scoring::{ConfidenceScore, ConfidenceScorer};
use crate::traits::{
    EvidenceItem, KnowledgeRetriever, RetrievalResult, SolutionGenerator, SourceKind, WebSearcher,
};

/// How the two retrievers are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Knowledge base first; web search only when the knowledge base is
    /// not accepted.
    #[default]
    Sequential,
    /// Both searches issued together. Lower latency on web and hybrid
    /// routes.
    ///
    /// This gives up the guarantee that a confident knowledge base never
    /// triggers a web-search call: the call is issued before the knowledge
    /// base has been scored. When the knowledge base finishes first and is
    /// accepted, the pending web search is dropped unread. Otherwise both
    /// results are awaited before scoring, so the decision and the merged
    /// evidence do not depend on completion order.
    Concurrent,
}

impl FromStr for RetrievalStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(format!(
                "unknown retrieval strategy: {other} (expected sequential or concurrent)"
            )),
        }
    }
}

/// Tie-break applied when the two paths scored the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Knowledge base preferred over live search.
    PreferKnowledgeBase,
}

/// Audit record of one routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Chosen route.
    pub route: Route,
    /// Knowledge base confidence.
    pub kb_score: f64,
    /// Web confidence, when web search ran.
    pub web_score: Option<f64>,
    /// Merged confidence, when the route is hybrid.
    pub hybrid_score: Option<f64>,
    /// Thresholds the decision was made with.
    pub thresholds: ThresholdSnapshot,
    /// Tie-break applied, if any.
    pub tie_break: Option<TieBreak>,
    /// Whether the decision was made without web evidence.
    pub web_skipped: bool,
    /// Revision of the routing weights used.
    pub weights_revision: u64,
    /// States visited.
    pub states: Vec<RoutingState>,
}

/// Result of applying the policy to scored evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// Answer from this route.
    Accept(Route),
    /// Not enough evidence on either path.
    Reject,
}

/// Decision after scoring the knowledge base alone.
#[must_use]
pub fn accept_knowledge_base(kb_score: f64, thresholds: &ThresholdSnapshot) -> bool {
    kb_score >= thresholds.kb_high
}

/// Decision after scoring both paths.
///
/// `hybrid_score` is the score of the merged evidence and only matters
/// when neither single path is accepted.
#[must_use]
pub fn decide(
    kb_score: f64,
    web_score: f64,
    hybrid_score: f64,
    thresholds: &ThresholdSnapshot,
) -> PolicyOutcome {
    if accept_knowledge_base(kb_score, thresholds) {
        return PolicyOutcome::Accept(Route::KnowledgeBase);
    }
    if web_score >= thresholds.web_high && kb_score < thresholds.low && web_score > kb_score {
        return PolicyOutcome::Accept(Route::WebSearch);
    }
    if kb_score < thresholds.low && web_score < thresholds.low {
        return PolicyOutcome::Reject;
    }
    if hybrid_score < thresholds.floor {
        return PolicyOutcome::Reject;
    }
    PolicyOutcome::Accept(Route::Hybrid)
}

/// Settings of the engine that do not change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Knowledge base results requested.
    pub top_k_kb: usize,
    /// Web results requested.
    pub top_k_web: usize,
    /// Timeout of each retrieval call.
    pub retrieval_timeout: Duration,
    /// Retriever scheduling.
    pub strategy: RetrievalStrategy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            top_k_kb: 3,
            top_k_web: 3,
            retrieval_timeout: Duration::from_millis(800),
            strategy: RetrievalStrategy::Sequential,
        }
    }
}

/// Everything produced for an accepted question.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedAnswer {
    /// Routing audit record.
    pub decision: RouteDecision,
    /// Confidence of the chosen evidence.
    pub confidence: ConfidenceScore,
    /// Evidence handed to the composer.
    pub evidence: Vec<EvidenceItem>,
    /// Composition outcome.
    pub composition: Composition,
    /// Recovered retrieval and composition conditions.
    pub recovered: Vec<RecoveredCondition>,
}

/// One retrieval call after timeout handling.
#[derive(Debug)]
struct Retrieved {
    result: RetrievalResult,
    recovered: Vec<RecoveredCondition>,
    unreachable: bool,
}

/// Orchestrates guardrails, retrievers, scorer and composer.
pub struct RoutingEngine<K, W, G>
where
    K: KnowledgeRetriever,
    W: WebSearcher,
    G: SolutionGenerator,
{
    knowledge: K,
    web: W,
    composer: SolutionComposer<G>,
    guardrails: Guardrails,
    scorer: ConfidenceScorer,
    settings: EngineSettings,
}

impl<K, W, G> std::fmt::Debug for RoutingEngine<K, W, G>
where
    K: KnowledgeRetriever,
    W: WebSearcher,
    G: SolutionGenerator,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("composer", &self.composer)
            .field("guardrails", &self.guardrails)
            .field("scorer", &self.scorer)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<K, W, G> RoutingEngine<K, W, G>
where
    K: KnowledgeRetriever,
    W: WebSearcher,
    G: SolutionGenerator,
{
    /// Create an engine.
    #[must_use]
    pub const fn new(
        knowledge: K,
        web: W,
        composer: SolutionComposer<G>,
        guardrails: Guardrails,
        scorer: ConfidenceScorer,
        settings: EngineSettings,
    ) -> Self {
        Self {
            knowledge,
            web,
            composer,
            guardrails,
            scorer,
            settings,
        }
    }

    /// The knowledge retriever.
    #[must_use]
    pub const fn knowledge(&self) -> &K {
        &self.knowledge
    }

    /// The web searcher.
    #[must_use]
    pub const fn web(&self) -> &W {
        &self.web
    }

    /// The solution generator.
    #[must_use]
    pub const fn generator(&self) -> &G {
        self.composer.generator()
    }

    /// The engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Answer one question with the given weights snapshot.
    ///
    /// # Errors
    ///
    /// - [`AskError::InputRejected`] if the input guardrail refuses the question
    /// - [`AskError::InsufficientEvidence`] if neither path is usable
    /// - [`AskError::ServiceUnavailable`] if every retrieval call failed to connect
    pub async fn answer(
        &self,
        question: &Question,
        weights: &RoutingWeights,
    ) -> Result<RoutedAnswer, AskError> {
        let thresholds = weights.thresholds;
        let mut machine = StateMachine::new();

        step(&mut machine, RoutingState::Validating)?;
        let verdict = self.guardrails.validate_input(question);
        if let Some(reason) = verdict.rejection_reason {
            step(&mut machine, RoutingState::Rejected)?;
            tracing::info!(
                request_id = %question.request_id,
                %reason,
                math_relevance = verdict.math_relevance,
                "Question rejected by input guardrail"
            );
            return Err(AskError::InputRejected { reason });
        }

        step(&mut machine, RoutingState::RetrievingKb)?;
        let (kb, early_web) = match self.settings.strategy {
            RetrievalStrategy::Sequential => (self.search_kb(&question.text).await, None),
            RetrievalStrategy::Concurrent => self.search_both(&question.text, &thresholds).await,
        };
        let mut recovered = kb.recovered.clone();

        step(&mut machine, RoutingState::ScoringKb)?;
        let kb_score = self.scorer.score_one(&kb.result);
        tracing::debug!(
            request_id = %question.request_id,
            kb_score = kb_score.value,
            kb_results = kb.result.len(),
            "Scored knowledge base"
        );

        if accept_knowledge_base(kb_score.value, &thresholds) {
            step(&mut machine, RoutingState::AcceptKb)?;
            let decision = RouteDecision {
                route: Route::KnowledgeBase,
                kb_score: kb_score.value,
                web_score: None,
                hybrid_score: None,
                thresholds,
                tie_break: None,
                web_skipped: true,
                weights_revision: weights.revision,
                states: Vec::new(),
            };
            return self
                .finish(question, machine, decision, kb_score, kb.result.items, recovered)
                .await;
        }

        step(&mut machine, RoutingState::RetrievingWeb)?;
        let web = match early_web {
            Some(web) => web,
            None => self.search_web(&question.text).await,
        };
        recovered.extend(web.recovered.iter().cloned());

        if kb.unreachable && web.unreachable {
            tracing::error!(
                request_id = %question.request_id,
                "Knowledge base and web search both unreachable"
            );
            return Err(AskError::ServiceUnavailable {
                message: "knowledge base and web search are unreachable".into(),
            });
        }

        step(&mut machine, RoutingState::ScoringWeb)?;
        let web_score = self.scorer.score_one(&web.result);
        let hybrid_score = self.scorer.score(&[&kb.result, &web.result]);
        let tie_break = (kb_score.value.total_cmp(&web_score.value).is_eq()
            && !kb.result.is_empty())
        .then_some(TieBreak::PreferKnowledgeBase);

        let outcome = decide(
            kb_score.value,
            web_score.value,
            hybrid_score.value,
            &thresholds,
        );
        tracing::debug!(
            request_id = %question.request_id,
            kb_score = kb_score.value,
            web_score = web_score.value,
            hybrid_score = hybrid_score.value,
            ?outcome,
            "Routing decision"
        );

        let (route, confidence, evidence) = match outcome {
            PolicyOutcome::Reject => {
                step(&mut machine, RoutingState::Rejected)?;
                tracing::info!(
                    request_id = %question.request_id,
                    kb_score = kb_score.value,
                    web_score = web_score.value,
                    "Insufficient evidence"
                );
                return Err(AskError::InsufficientEvidence {
                    kb_score: kb_score.value,
                    web_score: web_score.value,
                });
            }
            PolicyOutcome::Accept(Route::KnowledgeBase) => {
                step(&mut machine, RoutingState::AcceptKb)?;
                (Route::KnowledgeBase, kb_score, kb.result.items)
            }
            PolicyOutcome::Accept(Route::WebSearch) => {
                step(&mut machine, RoutingState::AcceptWeb)?;
                (Route::WebSearch, web_score, web.result.items)
            }
            PolicyOutcome::Accept(Route::Hybrid) => {
                step(&mut machine, RoutingState::AcceptHybrid)?;
                let merged = merge_evidence(&kb.result, &web.result);
                (Route::Hybrid, hybrid_score, merged)
            }
        };

        let decision = RouteDecision {
            route,
            kb_score: kb_score.value,
            web_score: Some(web_score.value),
            hybrid_score: (route == Route::Hybrid).then_some(hybrid_score.value),
            thresholds,
            tie_break,
            web_skipped: false,
            weights_revision: weights.revision,
            states: Vec::new(),
        };
        self.finish(question, machine, decision, confidence, evidence, recovered)
            .await
    }

    async fn finish(
        &self,
        question: &Question,
        mut machine: StateMachine,
        mut decision: RouteDecision,
        confidence: ConfidenceScore,
        evidence: Vec<EvidenceItem>,
        mut recovered: Vec<RecoveredCondition>,
    ) -> Result<RoutedAnswer, AskError> {
        let composition = self
            .composer
            .compose(question, &evidence, decision.route, &self.guardrails)
            .await;

        for _ in 0..composition.attempts {
            step(&mut machine, RoutingState::Composing)?;
            step(&mut machine, RoutingState::ValidatingOutput)?;
        }
        step(&mut machine, RoutingState::Done)?;

        recovered.extend(composition.recovered.iter().cloned());
        decision.states = machine.into_trail();

        Ok(RoutedAnswer {
            decision,
            confidence,
            evidence,
            composition,
            recovered,
        })
    }

    async fn search_kb(&self, query: &str) -> Retrieved {
        let top_k = self.settings.top_k_kb;
        self.bounded(SourceKind::KnowledgeBase, self.knowledge.search(query, top_k))
            .await
    }

    /// Run both searches at once. The web search is abandoned if the
    /// knowledge base completes first with an accepted score.
    async fn search_both(
        &self,
        query: &str,
        thresholds: &ThresholdSnapshot,
    ) -> (Retrieved, Option<Retrieved>) {
        let kb = std::pin::pin!(self.search_kb(query));
        let web = std::pin::pin!(self.search_web(query));
        match futures_util::future::select(kb, web).await {
            Either::Left((kb, pending_web)) => {
                if accept_knowledge_base(self.scorer.score_one(&kb.result).value, thresholds) {
                    tracing::debug!("Knowledge base accepted, abandoning web search");
                    (kb, None)
                } else {
                    (kb, Some(pending_web.await))
                }
            }
            Either::Right((web, pending_kb)) => (pending_kb.await, Some(web)),
        }
    }

    async fn search_web(&self, query: &str) -> Retrieved {
        let top_k = self.settings.top_k_web;
        let mut retrieved = self
            .bounded(SourceKind::WebSearch, self.web.search(query, top_k))
            .await;
        let dropped = retrieved.result.retain_cited();
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded web results without a source");
            retrieved
                .recovered
                .push(RecoveredCondition::UncitedResultsDiscarded { count: dropped });
        }
        retrieved
    }

    /// Run a retrieval call under the retrieval timeout. Timeouts and
    /// failures become empty results.
    async fn bounded<F>(&self, source: SourceKind, call: F) -> Retrieved
    where
        F: Future<Output = Result<RetrievalResult, CollaboratorError>>,
    {
        let timeout = self.settings.retrieval_timeout;
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, call).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok(mut result)) => {
                // Results are keyed by the slot they were requested for.
                result.kind = source;
                for item in &mut result.items {
                    item.kind = source;
                }
                Retrieved {
                    result,
                    recovered: Vec::new(),
                    unreachable: false,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(%source, error = %e, elapsed_ms, "Retrieval failed");
                Retrieved {
                    result: RetrievalResult::empty(source, elapsed_ms),
                    recovered: vec![RecoveredCondition::RetrievalFailed {
                        source,
                        message: e.to_string(),
                    }],
                    unreachable: e.is_connectivity(),
                }
            }
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(%source, timeout_ms, "Retrieval timed out");
                Retrieved {
                    result: RetrievalResult::empty(source, elapsed_ms),
                    recovered: vec![RecoveredCondition::RetrievalTimeout { source, timeout_ms }],
                    unreachable: false,
                }
            }
        }
    }
}

fn step(machine: &mut StateMachine, next: RoutingState) -> Result<(), AskError> {
    machine.advance(next).map_err(|e| {
        tracing::error!(error = %e, "Routing state machine violated");
        AskError::ServiceUnavailable {
            message: e.to_string(),
        }
    })
}
