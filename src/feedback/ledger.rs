//! Append-only feedback ledger.

use crate::error::{FeedbackError, StorageError};
use crate::model::{Feedback, FeedbackRecord, ResponseEntry, MAX_RATING, MIN_RATING};
use crate::traits::LedgerStore;

/// Validating front of a [`LedgerStore`].
///
/// Entries are only ever appended; nothing here updates or removes one.
pub struct FeedbackLedger<L: LedgerStore> {
    store: L,
}

impl<L: LedgerStore> std::fmt::Debug for FeedbackLedger<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackLedger").finish_non_exhaustive()
    }
}

impl<L: LedgerStore> FeedbackLedger<L> {
    /// Wrap a store.
    #[must_use]
    pub const fn new(store: L) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &L {
        &self.store
    }

    /// Register an emitted response so it can receive feedback.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    pub async fn register_response(&self, entry: &ResponseEntry) -> Result<(), StorageError> {
        self.store.record_response(entry).await
    }

    /// Append one feedback entry.
    ///
    /// # Errors
    ///
    /// - [`FeedbackError::InvalidRating`] if the rating is off the scale
    /// - [`FeedbackError::UnknownResponse`] if the response was never emitted
    /// - [`FeedbackError::Storage`] if the ledger cannot be written
    pub async fn record(&self, feedback: Feedback) -> Result<FeedbackRecord, FeedbackError> {
        validate_rating(i64::from(feedback.rating))?;

        let Some(route) = self.store.response_route(&feedback.response_id).await? else {
            return Err(FeedbackError::UnknownResponse {
                response_id: feedback.response_id,
            });
        };

        let feedback_id = format!("fb-{}", uuid::Uuid::new_v4().simple());
        let record = self
            .store
            .append_feedback(&feedback_id, route, &feedback)
            .await?;

        tracing::info!(
            feedback_id = %record.feedback_id,
            sequence = record.sequence,
            response_id = %record.feedback.response_id,
            %route,
            rating = record.feedback.rating,
            is_helpful = record.feedback.is_helpful,
            "Feedback recorded"
        );
        Ok(record)
    }

    /// All entries in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    pub async fn entries(&self) -> Result<Vec<FeedbackRecord>, StorageError> {
        self.store.list_feedback().await
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the read fails.
    pub async fn len(&self) -> Result<u64, StorageError> {
        self.store.feedback_count().await
    }
}

/// Check a rating against the accepted scale.
///
/// # Errors
///
/// Returns [`FeedbackError::InvalidRating`] outside `MIN_RATING..=MAX_RATING`.
pub fn validate_rating(rating: i64) -> Result<u8, FeedbackError> {
    u8::try_from(rating)
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
        .ok_or(FeedbackError::InvalidRating {
            rating,
            min: MIN_RATING,
            max: MAX_RATING,
        })
}
