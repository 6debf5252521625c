//! Response and feedback ledger operations.

#![allow(clippy::missing_errors_doc)]

use crate::error::StorageError;
use crate::feedback::ThresholdAdjustment;
use crate::model::{Feedback, FeedbackRecord, ResponseEntry, Route};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::core::SqliteStorage;

const FEEDBACK_COLUMNS: &str = "SELECT sequence, feedback_id, response_id, route, rating, \
     is_helpful, comment, suggested_improvement, recorded_at FROM feedback";

impl SqliteStorage {
    /// Insert an emitted response. Re-registering the same id is a no-op.
    pub async fn insert_response(&self, entry: &ResponseEntry) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT OR IGNORE INTO responses (response_id, route, confidence, question, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.response_id)
        .bind(entry.route.as_str())
        .bind(entry.confidence)
        .bind(&entry.question)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::query_error("INSERT responses", format!("{e}")))?;
        Ok(())
    }

    /// Route of a stored response.
    pub async fn get_response_route(&self, response_id: &str) -> Result<Option<Route>, StorageError> {
        let row = sqlx::query("SELECT route FROM responses WHERE response_id = ?")
            .bind(response_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT responses", format!("{e}")))?;

        row.map(|row| {
            let route: String = row.get("route");
            Self::parse_route(&route)
        })
        .transpose()
    }

    /// Append a feedback entry; the database assigns the sequence.
    pub async fn insert_feedback(
        &self,
        feedback_id: &str,
        route: Route,
        feedback: &Feedback,
    ) -> Result<FeedbackRecord, StorageError> {
        let recorded_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO feedback (feedback_id, response_id, route, rating, is_helpful, comment, \
             suggested_improvement, recorded_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(feedback_id)
        .bind(&feedback.response_id)
        .bind(route.as_str())
        .bind(i64::from(feedback.rating))
        .bind(feedback.is_helpful)
        .bind(&feedback.comment)
        .bind(&feedback.suggested_improvement)
        .bind(recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::query_error("INSERT feedback", format!("{e}")))?;

        Ok(FeedbackRecord {
            sequence: Self::to_u64(result.last_insert_rowid(), "sequence")?,
            feedback_id: feedback_id.to_string(),
            route,
            feedback: feedback.clone(),
            recorded_at,
        })
    }

    /// All feedback entries by sequence.
    pub async fn get_feedback(&self) -> Result<Vec<FeedbackRecord>, StorageError> {
        let rows = sqlx::query(&format!("{FEEDBACK_COLUMNS} ORDER BY sequence ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT feedback", format!("{e}")))?;

        rows.iter().map(Self::feedback_from_row).collect()
    }

    /// The newest `limit` entries for one route, oldest first.
    ///
    /// Served by `idx_feedback_route`, so the cost does not grow with the
    /// ledger.
    pub async fn get_recent_feedback(
        &self,
        route: Route,
        limit: usize,
    ) -> Result<Vec<FeedbackRecord>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "{FEEDBACK_COLUMNS} WHERE route = ? ORDER BY sequence DESC LIMIT ?"
        ))
        .bind(route.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT recent feedback", format!("{e}")))?;

        let mut records = rows
            .iter()
            .map(Self::feedback_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        records.reverse();
        Ok(records)
    }

    fn feedback_from_row(row: &SqliteRow) -> Result<FeedbackRecord, StorageError> {
        let sequence: i64 = row.get("sequence");
        let route: String = row.get("route");
        let rating: i64 = row.get("rating");
        let recorded_at: String = row.get("recorded_at");

        Ok(FeedbackRecord {
            sequence: Self::to_u64(sequence, "sequence")?,
            feedback_id: row.get("feedback_id"),
            route: Self::parse_route(&route)?,
            feedback: Feedback {
                response_id: row.get("response_id"),
                rating: u8::try_from(rating).map_err(|_| StorageError::Internal {
                    message: format!("Rating {rating} out of range"),
                })?,
                is_helpful: row.get("is_helpful"),
                comment: row.get("comment"),
                suggested_improvement: row.get("suggested_improvement"),
            },
            recorded_at: Self::parse_timestamp(&recorded_at)?,
        })
    }

    /// Number of feedback entries.
    pub async fn count_feedback(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM feedback")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::query_error("COUNT feedback", format!("{e}")))?;
        let total: i64 = row.get("total");
        Self::to_u64(total, "total")
    }

    /// Append the adjustments of one adaptation run in a single transaction.
    pub async fn insert_adjustments(
        &self,
        revision: u64,
        adjustments: &[ThresholdAdjustment],
    ) -> Result<(), StorageError> {
        let revision = i64::try_from(revision).map_err(|_| StorageError::Internal {
            message: format!("Revision {revision} does not fit the database"),
        })?;
        let applied_at = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN threshold_adjustments", format!("{e}")))?;
        for adj in adjustments {
            sqlx::query(
                "INSERT INTO threshold_adjustments \
                 (revision, route, from_threshold, to_threshold, success_rate, applied_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(revision)
            .bind(adj.route.as_str())
            .bind(adj.from)
            .bind(adj.to)
            .bind(adj.success_rate)
            .bind(&applied_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("INSERT threshold_adjustments", format!("{e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT threshold_adjustments", format!("{e}")))
    }

    /// All adjustments, oldest first.
    pub async fn get_adjustments(&self) -> Result<Vec<(u64, ThresholdAdjustment)>, StorageError> {
        let rows = sqlx::query(
            "SELECT revision, route, from_threshold, to_threshold, success_rate \
             FROM threshold_adjustments ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT threshold_adjustments", format!("{e}")))?;

        rows.into_iter()
            .map(|row| {
                let revision: i64 = row.get("revision");
                let route: String = row.get("route");
                Ok((
                    Self::to_u64(revision, "revision")?,
                    ThresholdAdjustment {
                        route: Self::parse_route(&route)?,
                        from: row.get("from_threshold"),
                        to: row.get("to_threshold"),
                        success_rate: row.get("success_rate"),
                    },
                ))
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::core::tests::test_storage;
    use pretty_assertions::assert_eq;

    fn entry(id: &str, route: Route) -> ResponseEntry {
        ResponseEntry {
            response_id: id.to_string(),
            route,
            confidence: 0.9,
            question: "What is the derivative of x^2?".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_response_round_trip() {
        let storage = test_storage().await;
        storage.insert_response(&entry("resp-1", Route::WebSearch)).await.unwrap();

        assert_eq!(
            storage.get_response_route("resp-1").await.unwrap(),
            Some(Route::WebSearch)
        );
        assert_eq!(storage.get_response_route("resp-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_feedback_sequence_and_order() {
        let storage = test_storage().await;
        storage.insert_response(&entry("resp-1", Route::Hybrid)).await.unwrap();

        let first = storage
            .insert_feedback("fb-1", Route::Hybrid, &Feedback::new("resp-1", 2, false))
            .await
            .unwrap();
        let second = storage
            .insert_feedback(
                "fb-2",
                Route::Hybrid,
                &Feedback::new("resp-1", 5, true)
                    .with_comment("much better")
                    .with_suggestion("show a graph"),
            )
            .await
            .unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);

        let all = storage.get_feedback().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].feedback_id, "fb-1");
        assert_eq!(all[1].feedback.comment.as_deref(), Some("much better"));
        assert_eq!(all[1].feedback.suggested_improvement.as_deref(), Some("show a graph"));
        assert_eq!(storage.count_feedback().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recent_feedback_is_windowed_per_route() {
        let storage = test_storage().await;
        storage.insert_response(&entry("resp-kb", Route::KnowledgeBase)).await.unwrap();
        storage.insert_response(&entry("resp-web", Route::WebSearch)).await.unwrap();
        for i in 0..5 {
            storage
                .insert_feedback(
                    &format!("fb-kb-{i}"),
                    Route::KnowledgeBase,
                    &Feedback::new("resp-kb", 3, i % 2 == 0),
                )
                .await
                .unwrap();
            storage
                .insert_feedback(&format!("fb-web-{i}"), Route::WebSearch, &Feedback::new("resp-web", 4, true))
                .await
                .unwrap();
        }

        let recent = storage.get_recent_feedback(Route::KnowledgeBase, 3).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|r| r.feedback_id.as_str()).collect();
        assert_eq!(ids, vec!["fb-kb-2", "fb-kb-3", "fb-kb-4"]);
        assert!(recent.iter().all(|r| r.route == Route::KnowledgeBase));
        assert!(recent.windows(2).all(|w| w[0].sequence < w[1].sequence));

        assert!(storage.get_recent_feedback(Route::Hybrid, 3).await.unwrap().is_empty());
        assert_eq!(storage.get_recent_feedback(Route::WebSearch, 50).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_feedback_rows_cannot_be_changed() {
        let storage = test_storage().await;
        storage.insert_response(&entry("resp-1", Route::KnowledgeBase)).await.unwrap();
        storage
            .insert_feedback("fb-1", Route::KnowledgeBase, &Feedback::new("resp-1", 4, true))
            .await
            .unwrap();

        let update = sqlx::query("UPDATE feedback SET rating = 1")
            .execute(&storage.pool)
            .await;
        assert!(update.is_err());
        let delete = sqlx::query("DELETE FROM feedback").execute(&storage.pool).await;
        assert!(delete.is_err());
        assert_eq!(storage.count_feedback().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_feedback_requires_known_response() {
        let storage = test_storage().await;
        let result = storage
            .insert_feedback("fb-1", Route::KnowledgeBase, &Feedback::new("nope", 4, true))
            .await;
        assert!(matches!(result, Err(StorageError::QueryFailed { .. })));
    }

    #[tokio::test]
    async fn test_adjustments_round_trip() {
        let storage = test_storage().await;
        let adj = ThresholdAdjustment {
            route: Route::WebSearch,
            from: 0.8,
            to: 0.82,
            success_rate: 0.3,
        };
        storage.insert_adjustments(3, &[adj]).await.unwrap();
        assert_eq!(storage.get_adjustments().await.unwrap(), vec![(3, adj)]);
    }
}
