//! Ledger persistence.
//!
//! This module provides:
//! - [`SqliteStorage`]: `SQLite` store with WAL journaling and migrations
//! - [`InMemoryLedger`]: process-local store for tests and database-less runs
//!
//! Both implement [`LedgerStore`](crate::traits::LedgerStore). Neither
//! offers a way to change or remove a feedback entry once written.

mod core;
mod ledger;
mod memory;
mod trait_impl;

pub use self::core::SqliteStorage;
pub use memory::InMemoryLedger;
