//! Hand-written collaborator fakes.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use math_router::agent::MathAgent;
use math_router::composer::SolutionComposer;
use math_router::config::RoutingConfig;
use math_router::error::CollaboratorError;
use math_router::feedback::{AdaptationConfig, FeedbackAdapter};
use math_router::guardrails::Guardrails;
use math_router::routing::{RetrievalStrategy, RoutingEngine};
use math_router::scoring::ConfidenceScorer;
use math_router::storage::InMemoryLedger;
use math_router::traits::{
    EvidenceItem, GeneratedSolution, GenerationRequest, KnowledgeRetriever, LedgerStore,
    RetrievalResult, SolutionGenerator, SourceKind, WebSearcher,
};

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A retriever serving fixed evidence, usable as knowledge base or web search.
#[derive(Debug, Clone)]
pub struct FakeSource {
    kind: SourceKind,
    items: Vec<EvidenceItem>,
    delay: Duration,
    failure: Option<CollaboratorError>,
    reachable: bool,
    pub calls: Calls,
}

impl FakeSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            delay: Duration::ZERO,
            failure: None,
            reachable: true,
            calls: Calls::default(),
        }
    }

    pub fn kb() -> Self {
        Self::new(SourceKind::KnowledgeBase)
    }

    pub fn web() -> Self {
        Self::new(SourceKind::WebSearch)
    }

    pub fn with_item(mut self, content: &str, source_id: &str, relevance: f64) -> Self {
        self.items
            .push(EvidenceItem::new(self.kind, content, source_id, relevance));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, error: CollaboratorError) -> Self {
        self.failure = Some(error);
        self.reachable = false;
        self
    }

    async fn serve(&self, top_k: usize) -> Result<RetrievalResult, CollaboratorError> {
        self.calls.bump();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let items = self.items.iter().take(top_k).cloned().collect();
        Ok(RetrievalResult::new(self.kind, items, 1))
    }
}

#[async_trait]
impl KnowledgeRetriever for FakeSource {
    async fn search(&self, _query: &str, top_k: usize) -> Result<RetrievalResult, CollaboratorError> {
        self.serve(top_k).await
    }

    async fn ping(&self) -> bool {
        self.reachable
    }
}

#[async_trait]
impl WebSearcher for FakeSource {
    async fn search(&self, _query: &str, top_k: usize) -> Result<RetrievalResult, CollaboratorError> {
        self.serve(top_k).await
    }

    async fn ping(&self) -> bool {
        self.reachable
    }
}

pub fn good_solution() -> GeneratedSolution {
    GeneratedSolution {
        steps: vec![
            "Apply the power rule d/dx x^n = n x^(n-1)".into(),
            "With n = 2 this gives 2x".into(),
        ],
        explanation: "The power rule lowers the exponent by one and multiplies by it.".into(),
        final_answer: "2x".into(),
        difficulty: Some("beginner".into()),
    }
}

pub fn malformed() -> Result<GeneratedSolution, CollaboratorError> {
    Err(CollaboratorError::Malformed {
        service: "fake".into(),
        message: "not JSON".into(),
    })
}

/// A generator replaying scripted outcomes, then answering well.
#[derive(Debug, Clone, Default)]
pub struct FakeGenerator {
    script: Arc<Mutex<VecDeque<Result<GeneratedSolution, CollaboratorError>>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    pub calls: Calls,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, outcome: Result<GeneratedSolution, CollaboratorError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SolutionGenerator for FakeGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedSolution, CollaboratorError> {
        self.calls.bump();
        self.requests.lock().unwrap().push(request);
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(good_solution()))
    }

    async fn ping(&self) -> bool {
        true
    }
}

pub type FakeAgent<L = InMemoryLedger> = MathAgent<FakeSource, FakeSource, FakeGenerator, L>;

/// Adaptation tuned so a handful of ratings moves thresholds.
pub fn eager_adaptation() -> AdaptationConfig {
    AdaptationConfig {
        min_feedback_for_adaptation: 3,
        ..AdaptationConfig::default()
    }
}

pub fn agent_with<L: LedgerStore>(
    kb: FakeSource,
    web: FakeSource,
    generator: FakeGenerator,
    ledger: L,
    routing: &RoutingConfig,
) -> FakeAgent<L> {
    let engine = RoutingEngine::new(
        kb,
        web,
        SolutionComposer::new(generator, routing.generation_timeout()),
        Guardrails::new(routing.guardrails.clone()),
        ConfidenceScorer::new(routing.scoring),
        routing.engine_settings(),
    );
    MathAgent::new(
        engine,
        routing.initial_weights(),
        ledger,
        FeedbackAdapter::new(routing.adaptation),
    )
}

pub fn agent(kb: FakeSource, web: FakeSource, generator: FakeGenerator) -> FakeAgent {
    let routing = RoutingConfig {
        adaptation: eager_adaptation(),
        ..RoutingConfig::default()
    };
    agent_with(kb, web, generator, InMemoryLedger::new(), &routing)
}

pub fn concurrent_agent(kb: FakeSource, web: FakeSource, generator: FakeGenerator) -> FakeAgent {
    let routing = RoutingConfig {
        strategy: RetrievalStrategy::Concurrent,
        ..RoutingConfig::default()
    };
    agent_with(kb, web, generator, InMemoryLedger::new(), &routing)
}
