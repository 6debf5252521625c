//! Health reporting.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Every dependency reachable.
    Healthy,
    /// Some dependencies reachable.
    Degraded,
    /// No dependency reachable.
    Unhealthy,
}

impl HealthStatus {
    /// Status for a set of reachability flags.
    #[must_use]
    pub fn from_checks<'a>(checks: impl IntoIterator<Item = &'a bool>) -> Self {
        let (mut up, mut total) = (0usize, 0usize);
        for reachable in checks {
            total += 1;
            up += usize::from(*reachable);
        }
        if total > 0 && up == total {
            Self::Healthy
        } else if up > 0 {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }
}

/// Result of `health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Reachability per dependency.
    pub dependencies: BTreeMap<String, bool>,
    /// Routing weights revision in force.
    pub weights_revision: u64,
    /// Feedback entries in the ledger, when storage answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_entries: Option<u64>,
    /// When the checks ran.
    pub checked_at: DateTime<Utc>,
}
