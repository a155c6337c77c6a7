//! Local durable store.
//!
//! The single source of truth for "has this device's intent reached durable
//! storage", independent of remote connectivity. Three tables: cached
//! progress records (with a per-row sync flag), the generic pending-operation
//! queue, and a JSON cache for secondary entities. Schema is versioned via
//! `PRAGMA user_version` with additive migrations (see [`migrations`]).

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

pub mod migrations;
pub mod models;
pub mod repositories;

/// Open (creating if missing) a file-backed store and run migrations.
///
/// WAL journaling plus a busy timeout keeps concurrent readers cheap while
/// SQLite serializes conflicting writers to the same row.
pub async fn open(path: impl AsRef<Path>) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path.as_ref())
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrations::run(&pool).await?;
    Ok(pool)
}

/// Open an in-memory store, for tests and throwaway sessions.
///
/// Pinned to a single connection that is never recycled: an in-memory
/// SQLite database lives and dies with its connection.
pub async fn open_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrations::run(&pool).await?;
    Ok(pool)
}
