//! `SQLite` connection handling and row conversions shared by the ledger
//! queries.

#![allow(clippy::missing_errors_doc)]

use crate::error::StorageError;
use crate::model::Route;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Migrations applied at start-up, in order.
const MIGRATIONS: [(&str, &str); 2] = [
    ("001", include_str!("../../migrations/001_feedback_ledger.sql")),
    (
        "002",
        include_str!("../../migrations/002_threshold_adjustments.sql"),
    ),
];

/// `SQLite` storage backend.
///
/// Persists emitted responses, the feedback ledger and the threshold
/// adjustment audit trail.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pub(crate) pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the ledger database at `ledger_path` and
    /// bring its schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionFailed`] if the file cannot be
    /// opened and [`StorageError::MigrationFailed`] if the schema cannot be
    /// applied.
    pub async fn new(ledger_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let ledger_path = ledger_path.as_ref();

        if let Some(dir) = ledger_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StorageError::ConnectionFailed {
                message: format!("cannot create ledger directory {}: {e}", dir.display()),
            })?;
        }

        let url = format!("sqlite://{}?mode=rwc", ledger_path.display());
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("bad ledger path {}: {e}", ledger_path.display()),
            })?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("cannot open ledger {}: {e}", ledger_path.display()),
            })?;

        let storage = Self { pool };
        storage.migrate().await?;
        tracing::info!(path = %ledger_path.display(), "Feedback ledger database ready");

        Ok(storage)
    }

    /// A throwaway ledger that lives as long as the returned value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionFailed`] if `SQLite` refuses the
    /// in-memory database.
    pub async fn new_in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("cannot open in-memory ledger: {e}"),
            })?;

        let storage = Self { pool };
        storage.migrate().await?;

        Ok(storage)
    }

    /// Apply every bundled migration. They only use `IF NOT EXISTS`, so
    /// reopening an existing ledger is a no-op.
    pub(crate) async fn migrate(&self) -> Result<(), StorageError> {
        for (version, sql) in MIGRATIONS {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::MigrationFailed {
                    version: version.to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }

    /// Read back an RFC 3339 timestamp column.
    pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StorageError::Internal {
                message: format!("bad timestamp {raw:?}: {e}"),
            })
    }

    /// Parse a route name from the database.
    pub(crate) fn parse_route(s: &str) -> Result<Route, StorageError> {
        Route::from_str(s).map_err(|message| StorageError::Internal { message })
    }

    /// Convert a database integer into an unsigned count.
    pub(crate) fn to_u64(value: i64, column: &str) -> Result<u64, StorageError> {
        u64::try_from(value).map_err(|_| StorageError::Internal {
            message: format!("Negative value {value} in column {column}"),
        })
    }

    pub(crate) fn query_error(query: &str, message: String) -> StorageError {
        StorageError::QueryFailed {
            query: query.to_string(),
            message,
        }
    }
}
