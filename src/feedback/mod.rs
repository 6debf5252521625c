//! Feedback ledger and routing adaptation.
//!
//! - [`FeedbackLedger`]: validates and appends feedback to a [`LedgerStore`]
//! - [`FeedbackAdapter`]: recomputes [`RoutingWeights`] from the ledger
//! - [`FeedbackAnalytics`]: aggregate view of the ledger
//!
//! [`LedgerStore`]: crate::traits::LedgerStore
//! [`RoutingWeights`]: crate::routing::RoutingWeights

mod adapter;
mod analytics;
mod ledger;

pub use adapter::{
    replay_adjustments, AdaptReport, AdaptationConfig, FeedbackAdapter, ThresholdAdjustment,
};
pub use analytics::{FeedbackAnalytics, RouteFeedbackSummary};
pub use ledger::{validate_rating, FeedbackLedger};
