//! Routing adaptation from feedback.
//!
//! For every route the helpful ratio over the last `window_size` entries
//! is compared with two bounds. Below `success_rate_floor` the route's
//! acceptance threshold is raised by `step`; above `success_rate_ceiling`
//! it is lowered by `step`. Routes with fewer than
//! `min_feedback_for_adaptation` entries in their window are left alone.
//!
//! Each route keeps the sequence of the newest entry it has consumed, and a
//! route is only nudged when its own window gained entries since then.
//! Feedback for one route therefore never moves another route's threshold,
//! and adapting again without new feedback changes nothing.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::model::{FeedbackRecord, Route};
use crate::routing::{RouteStats, RoutingWeights, WeightsStore};
use crate::traits::LedgerStore;

/// Adaptation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationConfig {
    /// Feedback entries per route considered.
    pub window_size: usize,
    /// Threshold change per adaptation.
    pub step: f64,
    /// Helpful ratio below which a route's threshold is raised.
    pub success_rate_floor: f64,
    /// Helpful ratio above which a route's threshold is lowered.
    pub success_rate_ceiling: f64,
    /// Entries needed in a window before the route is adjusted.
    pub min_feedback_for_adaptation: usize,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            step: 0.02,
            success_rate_floor: 0.5,
            success_rate_ceiling: 0.85,
            min_feedback_for_adaptation: 5,
        }
    }
}

/// One threshold change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAdjustment {
    /// Route adjusted.
    pub route: Route,
    /// Threshold before.
    pub from: f64,
    /// Threshold after.
    pub to: f64,
    /// Helpful ratio that triggered the change.
    pub success_rate: f64,
}

/// What an adaptation run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptReport {
    /// Whether new weights were installed.
    pub changed: bool,
    /// Revision in force afterwards.
    pub revision: u64,
    /// Ledger entries considered.
    pub feedback_seen: u64,
    /// Threshold changes applied.
    pub adjustments: Vec<ThresholdAdjustment>,
}

/// Recomputes routing weights from the feedback ledger.
#[derive(Debug, Clone, Default)]
pub struct FeedbackAdapter {
    config: AdaptationConfig,
}

impl FeedbackAdapter {
    /// Create an adapter.
    #[must_use]
    pub const fn new(config: AdaptationConfig) -> Self {
        Self { config }
    }

    /// The adaptation parameters.
    #[must_use]
    pub const fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    /// Recompute weights from the ledger and install them.
    ///
    /// Holds the store's writer lock for the whole run; concurrent requests
    /// keep reading the previous snapshot until the new one is committed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the ledger cannot be read or the
    /// adjustments cannot be recorded; the weights are left unchanged.
    pub async fn adapt<L>(&self, weights: &WeightsStore, ledger: &L) -> Result<AdaptReport, StorageError>
    where
        L: LedgerStore + ?Sized,
    {
        let update = weights.begin_update().await;
        let base = update.base();

        let count = ledger.feedback_count().await?;
        if count == base.feedback_cursor {
            tracing::debug!(feedback = count, "No new feedback, weights unchanged");
            return Ok(AdaptReport {
                changed: false,
                revision: base.revision,
                feedback_seen: count,
                adjustments: Vec::new(),
            });
        }

        let records = self.recent_windows(ledger).await?;
        let (mut next, adjustments) = self.recompute(base, &records);
        next.feedback_cursor = count;
        let revision = next.revision;
        let feedback_seen = count;
        if !adjustments.is_empty() {
            ledger.append_adjustments(revision, &adjustments).await?;
        }
        update.commit(next);

        for adj in &adjustments {
            tracing::info!(
                route = %adj.route,
                from = adj.from,
                to = adj.to,
                success_rate = adj.success_rate,
                "Routing threshold adjusted"
            );
        }

        Ok(AdaptReport {
            changed: true,
            revision,
            feedback_seen,
            adjustments,
        })
    }

    /// Rebuild weights after a restart from the recorded adjustment history.
    ///
    /// Recorded threshold changes are replayed in order and feedback already
    /// in the ledger counts as consumed. Returns the restored revision.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the ledger cannot be read.
    pub async fn restore<L>(&self, weights: &WeightsStore, ledger: &L) -> Result<u64, StorageError>
    where
        L: LedgerStore + ?Sized,
    {
        let history = ledger.list_adjustments().await?;
        let feedback_count = ledger.feedback_count().await?;
        let windows = self.recent_windows(ledger).await?;

        let update = weights.begin_update().await;
        let route_stats = self.window_stats(update.base(), &windows);
        let next = replay_adjustments(update.base(), &history, feedback_count, route_stats);
        let revision = next.revision;
        tracing::info!(
            revision,
            adjustments = history.len(),
            feedback_count,
            kb_high = next.thresholds.kb_high,
            web_high = next.thresholds.web_high,
            "Routing weights restored"
        );
        update.commit(next);
        Ok(revision)
    }

    /// The newest `window_size` entries of every route, by sequence.
    async fn recent_windows<L>(&self, ledger: &L) -> Result<Vec<FeedbackRecord>, StorageError>
    where
        L: LedgerStore + ?Sized,
    {
        let mut records = Vec::new();
        for route in Route::ALL {
            records.extend(ledger.recent_feedback(route, self.config.window_size).await?);
        }
        records.sort_by_key(|r| r.sequence);
        Ok(records)
    }

    /// Pure recomputation of the weights from ledger records.
    ///
    /// `records` is the ledger, or at least the newest `window_size` entries
    /// of each route, in sequence order.
    #[must_use]
    pub fn recompute(
        &self,
        base: &RoutingWeights,
        records: &[FeedbackRecord],
    ) -> (RoutingWeights, Vec<ThresholdAdjustment>) {
        let stats = self.window_stats(base, records);
        let mut thresholds = base.thresholds;
        let mut adjustments = Vec::new();

        for route in Route::ALL {
            let consumed = base.stats(route).last_sequence;
            let RouteStats {
                success_rate: Some(rate),
                samples,
                last_sequence,
            } = stats.get(&route).copied().unwrap_or_default()
            else {
                continue;
            };
            if samples < self.config.min_feedback_for_adaptation || last_sequence <= consumed {
                continue;
            }

            let current = thresholds.acceptance(route);
            let target = if rate < self.config.success_rate_floor {
                current + self.config.step
            } else if rate > self.config.success_rate_ceiling {
                current - self.config.step
            } else {
                continue;
            };

            thresholds = thresholds.with_acceptance(route, target);
            let applied = thresholds.acceptance(route);
            if (applied - current).abs() > f64::EPSILON {
                adjustments.push(ThresholdAdjustment {
                    route,
                    from: current,
                    to: applied,
                    success_rate: rate,
                });
            }
        }

        let next = RoutingWeights {
            thresholds,
            route_stats: stats,
            feedback_cursor: u64::try_from(records.len()).unwrap_or(u64::MAX),
            revision: base.revision + 1,
            updated_at: Some(Utc::now()),
        };
        (next, adjustments)
    }

    /// Helpful ratio over the last `window_size` entries of each route.
    ///
    /// A route's `last_sequence` never moves backwards from `base`.
    fn window_stats(
        &self,
        base: &RoutingWeights,
        records: &[FeedbackRecord],
    ) -> BTreeMap<Route, RouteStats> {
        Route::ALL
            .into_iter()
            .map(|route| {
                let window: Vec<&FeedbackRecord> = records
                    .iter()
                    .rev()
                    .filter(|r| r.route == route)
                    .take(self.config.window_size)
                    .collect();
                let samples = window.len();
                let newest = window.first().map_or(0, |r| r.sequence);
                let success_rate = (samples > 0).then(|| {
                    let helpful = window.iter().filter(|r| r.feedback.is_helpful).count();
                    #[allow(clippy::cast_precision_loss)]
                    let ratio = helpful as f64 / samples as f64;
                    ratio
                });
                (
                    route,
                    RouteStats {
                        success_rate,
                        samples,
                        last_sequence: newest.max(base.stats(route).last_sequence),
                    },
                )
            })
            .collect()
    }
}

/// Apply a recorded adjustment history on top of `base`.
///
/// `route_stats` describes the ledger as it stands; every route's entries
/// up to its `last_sequence` count as consumed.
#[must_use]
pub fn replay_adjustments(
    base: &RoutingWeights,
    history: &[(u64, ThresholdAdjustment)],
    feedback_count: u64,
    route_stats: BTreeMap<Route, RouteStats>,
) -> RoutingWeights {
    let mut next = base.clone();
    for (revision, adjustment) in history {
        next.thresholds = next
            .thresholds
            .with_acceptance(adjustment.route, adjustment.to);
        next.revision = next.revision.max(*revision);
    }
    next.feedback_cursor = feedback_count;
    next.route_stats = route_stats;
    next
}
