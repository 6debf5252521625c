//! `LedgerStore` implementation for `SqliteStorage`.

#![allow(clippy::missing_errors_doc)]

use async_trait::async_trait;

use crate::error::StorageError;
use crate::feedback::ThresholdAdjustment;
use crate::model::{Feedback, FeedbackRecord, ResponseEntry, Route};
use crate::traits::LedgerStore;

use super::core::SqliteStorage;

#[async_trait]
impl LedgerStore for SqliteStorage {
    async fn record_response(&self, entry: &ResponseEntry) -> Result<(), StorageError> {
        self.insert_response(entry).await
    }

    async fn response_route(&self, response_id: &str) -> Result<Option<Route>, StorageError> {
        self.get_response_route(response_id).await
    }

    async fn append_feedback(
        &self,
        feedback_id: &str,
        route: Route,
        feedback: &Feedback,
    ) -> Result<FeedbackRecord, StorageError> {
        self.insert_feedback(feedback_id, route, feedback).await
    }

    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>, StorageError> {
        self.get_feedback().await
    }

    async fn recent_feedback(
        &self,
        route: Route,
        limit: usize,
    ) -> Result<Vec<FeedbackRecord>, StorageError> {
        self.get_recent_feedback(route, limit).await
    }

    async fn feedback_count(&self) -> Result<u64, StorageError> {
        self.count_feedback().await
    }

    async fn append_adjustments(
        &self,
        revision: u64,
        adjustments: &[ThresholdAdjustment],
    ) -> Result<(), StorageError> {
        self.insert_adjustments(revision, adjustments).await
    }

    async fn list_adjustments(&self) -> Result<Vec<(u64, ThresholdAdjustment)>, StorageError> {
        self.get_adjustments().await
    }
}
