//! In-memory ledger store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::feedback::ThresholdAdjustment;
use crate::model::{Feedback, FeedbackRecord, ResponseEntry, Route};
use crate::traits::LedgerStore;

#[derive(Debug, Default)]
struct Inner {
    responses: HashMap<String, ResponseEntry>,
    feedback: Vec<FeedbackRecord>,
    adjustments: Vec<(u64, ThresholdAdjustment)>,
}

/// Ledger store kept in process memory.
///
/// Appends take a short lock that is never held across an await point.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        match self.inner.lock() {
            Ok(mut inner) => f(&mut inner),
            Err(poison_error) => {
                tracing::warn!(
                    error = %poison_error,
                    "In-memory ledger lock poisoned, using recovered data"
                );
                f(&mut poison_error.into_inner())
            }
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn record_response(&self, entry: &ResponseEntry) -> Result<(), StorageError> {
        self.with_inner(|inner| {
            inner
                .responses
                .entry(entry.response_id.clone())
                .or_insert_with(|| entry.clone());
        });
        Ok(())
    }

    async fn response_route(&self, response_id: &str) -> Result<Option<Route>, StorageError> {
        Ok(self.with_inner(|inner| inner.responses.get(response_id).map(|e| e.route)))
    }

    async fn append_feedback(
        &self,
        feedback_id: &str,
        route: Route,
        feedback: &Feedback,
    ) -> Result<FeedbackRecord, StorageError> {
        self.with_inner(|inner| {
            if !inner.responses.contains_key(&feedback.response_id) {
                return Err(StorageError::QueryFailed {
                    query: "append feedback".into(),
                    message: format!("unknown response {}", feedback.response_id),
                });
            }
            let record = FeedbackRecord {
                sequence: inner.feedback.len() as u64 + 1,
                feedback_id: feedback_id.to_string(),
                route,
                feedback: feedback.clone(),
                recorded_at: Utc::now(),
            };
            inner.feedback.push(record.clone());
            Ok(record)
        })
    }

    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>, StorageError> {
        Ok(self.with_inner(|inner| inner.feedback.clone()))
    }

    async fn recent_feedback(
        &self,
        route: Route,
        limit: usize,
    ) -> Result<Vec<FeedbackRecord>, StorageError> {
        Ok(self.with_inner(|inner| {
            let mut recent: Vec<FeedbackRecord> = inner
                .feedback
                .iter()
                .rev()
                .filter(|r| r.route == route)
                .take(limit)
                .cloned()
                .collect();
            recent.reverse();
            recent
        }))
    }

    async fn feedback_count(&self) -> Result<u64, StorageError> {
        Ok(self.with_inner(|inner| inner.feedback.len() as u64))
    }

    async fn append_adjustments(
        &self,
        revision: u64,
        adjustments: &[ThresholdAdjustment],
    ) -> Result<(), StorageError> {
        self.with_inner(|inner| {
            inner
                .adjustments
                .extend(adjustments.iter().map(|a| (revision, *a)));
        });
        Ok(())
    }

    async fn list_adjustments(&self) -> Result<Vec<(u64, ThresholdAdjustment)>, StorageError> {
        Ok(self.with_inner(|inner| inner.adjustments.clone()))
    }
}
