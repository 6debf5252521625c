//! Metrics collection.
//!
//! This module provides:
//! - Per-route request tracking with latency and confidence
//! - Outcome counts (answered, degraded, rejected, failed)
//! - Escalation events when a request moves past the knowledge base
//!
//! # Example
//!
//! ```
//! use math_router::metrics::{AskOutcome, MetricsCollector, RequestEvent};
//! use math_router::model::Route;
//!
//! let metrics = MetricsCollector::new();
//! metrics.record(RequestEvent::new(Some(Route::KnowledgeBase), AskOutcome::Answered, 120).with_confidence(0.9));
//! metrics.record(RequestEvent::new(Some(Route::Hybrid), AskOutcome::Degraded, 900).with_confidence(0.5));
//! metrics.record(RequestEvent::new(None, AskOutcome::InputRejected, 1));
//!
//! let summary = metrics.summary();
//! assert_eq!(summary.total_requests, 3);
//! assert_eq!(summary.answered, 2);
//! assert_eq!(summary.by_route.len(), 2);
//! ```

#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::model::Route;

/// Events kept before the oldest are dropped.
const MAX_EVENTS: usize = 10_000;

/// Escalations returned in a summary.
const RECENT_ESCALATIONS: usize = 50;

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// How one `ask` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskOutcome {
    /// Solution returned with status success.
    Answered,
    /// Solution returned with status degraded.
    Degraded,
    /// Question failed the input guardrail.
    InputRejected,
    /// Neither path met the thresholds.
    InsufficientEvidence,
    /// Collaborators unreachable or internal failure.
    Failed,
}

impl AskOutcome {
    /// Wire name of the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::Degraded => "degraded",
            Self::InputRejected => "input_rejected",
            Self::InsufficientEvidence => "insufficient_evidence",
            Self::Failed => "failed",
        }
    }

    /// Returns true if a solution was returned.
    #[must_use]
    pub const fn is_answered(self) -> bool {
        matches!(self, Self::Answered | Self::Degraded)
    }
}

/// A single request recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// Route used, if the request got that far.
    pub route: Option<Route>,
    /// Outcome.
    pub outcome: AskOutcome,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
    /// Reported confidence, when answered.
    pub confidence: Option<f64>,
    /// Timestamp (Unix epoch seconds).
    pub timestamp: u64,
}

impl RequestEvent {
    /// Create a new event.
    #[must_use]
    pub fn new(route: Option<Route>, outcome: AskOutcome, latency_ms: u64) -> Self {
        Self {
            route,
            outcome,
            latency_ms,
            confidence: None,
            timestamp: unix_now(),
        }
    }

    /// Attach the reported confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A request that could not be answered from the knowledge base alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationEvent {
    /// Where routing started.
    pub from: String,
    /// Where it ended: a route name or `rejected`.
    pub to: String,
    /// Why it escalated.
    pub reason: String,
    /// Timestamp.
    pub timestamp: u64,
}

impl EscalationEvent {
    /// Create a new escalation event.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
            timestamp: unix_now(),
        }
    }
}

/// Summary statistics for a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RouteSummary {
    /// Requests answered on this route.
    pub total: u64,
    /// Of which degraded.
    pub degraded: u64,
    /// Average latency in milliseconds.
    pub avg_latency_ms: f64,
    /// Minimum latency in milliseconds.
    pub min_latency_ms: u64,
    /// Maximum latency in milliseconds.
    pub max_latency_ms: u64,
    /// Average reported confidence.
    pub avg_confidence: f64,
}

/// Overall metrics summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricsSummary {
    /// Requests recorded.
    pub total_requests: u64,
    /// Requests that produced a solution.
    pub answered: u64,
    /// Share of answered requests that were degraded.
    pub degraded_rate: f64,
    /// Count per outcome.
    pub by_outcome: BTreeMap<String, u64>,
    /// Per-route summaries.
    pub by_route: BTreeMap<Route, RouteSummary>,
    /// Most recent escalations, oldest first.
    pub recent_escalations: Vec<EscalationEvent>,
    /// Escalations recorded in total.
    pub total_escalations: u64,
}

/// Thread-safe metrics collector.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    events: RwLock<VecDeque<RequestEvent>>,
    escalations: RwLock<VecDeque<EscalationEvent>>,
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T) {
    if buffer.len() >= MAX_EVENTS {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request.
    pub fn record(&self, event: RequestEvent) {
        match self.events.write() {
            Ok(mut events) => push_bounded(&mut events, event),
            Err(poison_error) => {
                tracing::warn!(error = %poison_error, "Recording into poisoned metrics lock");
                push_bounded(&mut poison_error.into_inner(), event);
            }
        }
    }

    /// Record an escalation.
    pub fn record_escalation(&self, escalation: EscalationEvent) {
        tracing::debug!(
            from = %escalation.from,
            to = %escalation.to,
            reason = %escalation.reason,
            "Routing escalated"
        );
        match self.escalations.write() {
            Ok(mut escalations) => push_bounded(&mut escalations, escalation),
            Err(poison_error) => {
                tracing::warn!(error = %poison_error, "Recording into poisoned metrics lock");
                push_bounded(&mut poison_error.into_inner(), escalation);
            }
        }
    }

    /// Get summary statistics.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let events = self.events_snapshot();
        let escalations = self.escalations();

        let mut by_outcome: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_route: BTreeMap<Route, Vec<&RequestEvent>> = BTreeMap::new();
        for event in &events {
            *by_outcome
                .entry(event.outcome.as_str().to_string())
                .or_default() += 1;
            if let (Some(route), true) = (event.route, event.outcome.is_answered()) {
                by_route.entry(route).or_default().push(event);
            }
        }

        let by_route = by_route
            .into_iter()
            .map(|(route, route_events)| (route, summarize(&route_events)))
            .collect();

        let answered = events.iter().filter(|e| e.outcome.is_answered()).count() as u64;
        let degraded = events
            .iter()
            .filter(|e| e.outcome == AskOutcome::Degraded)
            .count() as u64;
        let degraded_rate = if answered > 0 {
            degraded as f64 / answered as f64
        } else {
            0.0
        };

        let total_escalations = escalations.len() as u64;
        let recent_escalations = escalations
            .into_iter()
            .rev()
            .take(RECENT_ESCALATIONS)
            .rev()
            .collect();

        MetricsSummary {
            total_requests: events.len() as u64,
            answered,
            degraded_rate,
            by_outcome,
            by_route,
            recent_escalations,
            total_escalations,
        }
    }

    /// Requests answered on a route.
    #[must_use]
    pub fn requests_by_route(&self, route: Route) -> Vec<RequestEvent> {
        self.events_snapshot()
            .into_iter()
            .filter(|e| e.route == Some(route))
            .collect()
    }

    /// Recorded escalations, oldest first.
    #[must_use]
    pub fn escalations(&self) -> Vec<EscalationEvent> {
        match self.escalations.read() {
            Ok(e) => e.iter().cloned().collect(),
            Err(poison_error) => {
                tracing::warn!(
                    error = %poison_error,
                    "Reading escalations from poisoned lock, using recovered data"
                );
                poison_error.into_inner().iter().cloned().collect()
            }
        }
    }

    /// Number of recorded requests.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.events.read().map(|e| e.len() as u64).unwrap_or(0)
    }

    fn events_snapshot(&self) -> Vec<RequestEvent> {
        match self.events.read() {
            Ok(e) => e.iter().cloned().collect(),
            Err(poison_error) => {
                tracing::warn!(
                    error = %poison_error,
                    "Reading events from poisoned lock, using recovered data"
                );
                poison_error.into_inner().iter().cloned().collect()
            }
        }
    }
}

fn summarize(events: &[&RequestEvent]) -> RouteSummary {
    let total = events.len() as u64;
    if total == 0 {
        return RouteSummary::default();
    }
    let degraded = events
        .iter()
        .filter(|e| e.outcome == AskOutcome::Degraded)
        .count() as u64;
    let latencies: Vec<u64> = events.iter().map(|e| e.latency_ms).collect();
    let confidences: Vec<f64> = events.iter().filter_map(|e| e.confidence).collect();
    let avg_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    RouteSummary {
        total,
        degraded,
        avg_latency_ms: latencies.iter().sum::<u64>() as f64 / total as f64,
        min_latency_ms: latencies.iter().copied().min().unwrap_or(0),
        max_latency_ms: latencies.iter().copied().max().unwrap_or(0),
        avg_confidence,
    }
}

/// Timer for measuring operation latency.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}
