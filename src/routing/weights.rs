//! Process-wide adaptive routing state.
//!
//! [`RoutingWeights`] is initialised from configuration at start-up, read
//! by the engine through [`WeightsStore::snapshot`] once per request, and
//! replaced only through [`WeightsStore::begin_update`], which admits a
//! single writer at a time. Readers see either the old or the new value as
//! a whole.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use crate::model::Route;

/// Smallest distance kept between adjacent thresholds.
pub const MIN_THRESHOLD_GAP: f64 = 0.01;

/// Lowest value the minimum floor may take.
pub const FLOOR_LOWER_BOUND: f64 = 0.01;

/// Thresholds in force for one request.
///
/// Each route has its own acceptance threshold: `kb_high` for the knowledge
/// base, `web_high` for web search and `floor` for a hybrid merge. `low`
/// is fixed by configuration. The ordering
/// `floor < low < kb_high, web_high <= 1.0` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSnapshot {
    /// Knowledge base acceptance threshold.
    pub kb_high: f64,
    /// Web search acceptance threshold.
    pub web_high: f64,
    /// Low-confidence threshold.
    pub low: f64,
    /// Minimum floor for hybrid evidence.
    pub floor: f64,
}

impl ThresholdSnapshot {
    /// Thresholds with one shared high threshold.
    #[must_use]
    pub const fn new(high: f64, low: f64, floor: f64) -> Self {
        Self {
            kb_high: high,
            web_high: high,
            low,
            floor,
        }
    }

    /// Acceptance threshold of a route.
    #[must_use]
    pub const fn acceptance(&self, route: Route) -> f64 {
        match route {
            Route::KnowledgeBase => self.kb_high,
            Route::WebSearch => self.web_high,
            Route::Hybrid => self.floor,
        }
    }

    /// Returns a copy with a route's acceptance threshold set, clamped so
    /// the ordering invariant still holds.
    #[must_use]
    pub fn with_acceptance(mut self, route: Route, value: f64) -> Self {
        let value = if value.is_nan() {
            self.acceptance(route)
        } else {
            value
        };
        match route {
            Route::KnowledgeBase => self.kb_high = self.clamp_high(value),
            Route::WebSearch => self.web_high = self.clamp_high(value),
            Route::Hybrid => {
                self.floor = value
                    .min(self.low - MIN_THRESHOLD_GAP)
                    .max(FLOOR_LOWER_BOUND);
            }
        }
        self
    }

    fn clamp_high(&self, value: f64) -> f64 {
        value.max(self.low + MIN_THRESHOLD_GAP).min(1.0)
    }

    /// Returns true if `floor < low < kb_high <= 1` and `low < web_high <= 1`.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.floor > 0.0
            && self.floor < self.low
            && self.low < self.kb_high
            && self.low < self.web_high
            && self.kb_high <= 1.0
            && self.web_high <= 1.0
    }
}

/// Recent outcome statistics for one route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteStats {
    /// Helpful ratio over the rolling window; `None` with no feedback.
    pub success_rate: Option<f64>,
    /// Feedback entries in the window.
    pub samples: usize,
    /// Highest ledger sequence of this route already taken into account.
    /// A route is only re-adjusted once newer entries arrive for it.
    #[serde(default)]
    pub last_sequence: u64,
}

/// Adaptive routing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingWeights {
    /// Current thresholds.
    pub thresholds: ThresholdSnapshot,
    /// Per-route success statistics from the last adaptation.
    pub route_stats: BTreeMap<Route, RouteStats>,
    /// Ledger length consumed by the last adaptation.
    pub feedback_cursor: u64,
    /// Incremented every time thresholds or statistics change.
    pub revision: u64,
    /// Time of the last change.
    pub updated_at: Option<DateTime<Utc>>,
}

impl RoutingWeights {
    /// Initial weights from configured thresholds.
    #[must_use]
    pub fn new(thresholds: ThresholdSnapshot) -> Self {
        Self {
            thresholds,
            route_stats: Route::ALL
                .iter()
                .map(|r| (*r, RouteStats::default()))
                .collect(),
            feedback_cursor: 0,
            revision: 0,
            updated_at: None,
        }
    }

    /// Statistics for a route.
    #[must_use]
    pub fn stats(&self, route: Route) -> RouteStats {
        self.route_stats.get(&route).copied().unwrap_or_default()
    }
}

/// Shared holder of the current [`RoutingWeights`].
#[derive(Debug)]
pub struct WeightsStore {
    current: RwLock<Arc<RoutingWeights>>,
    writer: Mutex<()>,
}

impl WeightsStore {
    /// Create a store holding `initial`.
    #[must_use]
    pub fn new(initial: RoutingWeights) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
        }
    }

    /// The weights in force right now.
    ///
    /// The returned value never changes; later updates install a new one.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RoutingWeights> {
        match self.current.read() {
            Ok(current) => Arc::clone(&current),
            Err(poison_error) => {
                tracing::warn!(
                    error = %poison_error,
                    "Reading routing weights from poisoned lock, using recovered data"
                );
                Arc::clone(&poison_error.into_inner())
            }
        }
    }

    /// Wait for exclusive update access.
    ///
    /// Readers are not blocked while the update is prepared; the new value
    /// becomes visible atomically on [`WeightsUpdate::commit`].
    pub async fn begin_update(&self) -> WeightsUpdate<'_> {
        let guard = self.writer.lock().await;
        WeightsUpdate {
            store: self,
            base: self.snapshot(),
            _guard: guard,
        }
    }

    fn install(&self, weights: Arc<RoutingWeights>) {
        match self.current.write() {
            Ok(mut current) => *current = weights,
            Err(poison_error) => {
                tracing::warn!(
                    error = %poison_error,
                    "Writing routing weights through poisoned lock"
                );
                *poison_error.into_inner() = weights;
            }
        }
    }
}

/// Exclusive update access to a [`WeightsStore`].
#[derive(Debug)]
pub struct WeightsUpdate<'a> {
    store: &'a WeightsStore,
    base: Arc<RoutingWeights>,
    _guard: MutexGuard<'a, ()>,
}

impl WeightsUpdate<'_> {
    /// The weights the update starts from.
    #[must_use]
    pub fn base(&self) -> &RoutingWeights {
        &self.base
    }

    /// Install new weights and release the writer lock.
    pub fn commit(self, weights: RoutingWeights) -> Arc<RoutingWeights> {
        let weights = Arc::new(weights);
        self.store.install(Arc::clone(&weights));
        weights
    }
}
