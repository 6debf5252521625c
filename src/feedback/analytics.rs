//! Aggregate view of the feedback ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{FeedbackRecord, Route, MAX_RATING, MIN_RATING};

/// Feedback totals for one route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteFeedbackSummary {
    /// Entries for the route.
    pub count: u64,
    /// Mean rating.
    pub average_rating: f64,
    /// Share of entries marked helpful (0.0-1.0).
    pub helpful_ratio: f64,
}

/// Ledger-wide feedback statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackAnalytics {
    /// Total entries.
    pub total_feedback: u64,
    /// Mean rating, 0 when empty.
    pub average_rating: f64,
    /// Percentage of entries marked helpful (0-100).
    pub helpful_percentage: f64,
    /// Entries per rating, every rating on the scale present.
    pub rating_distribution: BTreeMap<u8, u64>,
    /// Totals per route that received feedback.
    pub by_route: BTreeMap<Route, RouteFeedbackSummary>,
}

impl FeedbackAnalytics {
    /// Summarise ledger entries.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_records(records: &[FeedbackRecord]) -> Self {
        let mut rating_distribution: BTreeMap<u8, u64> =
            (MIN_RATING..=MAX_RATING).map(|r| (r, 0)).collect();
        let mut per_route: BTreeMap<Route, (u64, u64, u64)> = BTreeMap::new();

        let mut rating_sum = 0u64;
        let mut helpful = 0u64;
        for record in records {
            let fb = &record.feedback;
            *rating_distribution.entry(fb.rating).or_insert(0) += 1;
            rating_sum += u64::from(fb.rating);
            helpful += u64::from(fb.is_helpful);

            let entry = per_route.entry(record.route).or_insert((0, 0, 0));
            entry.0 += 1;
            entry.1 += u64::from(fb.rating);
            entry.2 += u64::from(fb.is_helpful);
        }

        let total = records.len() as u64;
        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        Self {
            total_feedback: total,
            average_rating: ratio(rating_sum, total),
            helpful_percentage: ratio(helpful, total) * 100.0,
            rating_distribution,
            by_route: per_route
                .into_iter()
                .map(|(route, (count, ratings, helpful))| {
                    (
                        route,
                        RouteFeedbackSummary {
                            count,
                            average_rating: ratio(ratings, count),
                            helpful_ratio: ratio(helpful, count),
                        },
                    )
                })
                .collect(),
        }
    }
}
