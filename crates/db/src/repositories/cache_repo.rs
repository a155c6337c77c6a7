//! Repository for the `cache_entries` table.

use chrono::Utc;
use sqlx::sqlite::Sqlite;
use sqlx::SqlitePool;

use crate::models::cache::CacheEntry;
use crate::models::queue::NewPendingOperation;
use crate::repositories::queue_repo::QueueRepo;

/// Provides the generic JSON cache for secondary entities.
pub struct CacheRepo;

impl CacheRepo {
    /// Write or replace an entry.
    pub async fn put(
        pool: &SqlitePool,
        collection: &str,
        entry_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        Self::put_on(pool, collection, entry_id, payload).await
    }

    /// Put on an arbitrary executor, so callers can participate in a
    /// transaction alongside the queue insert the entry pairs with.
    pub async fn put_on<'e, E>(
        executor: E,
        collection: &str,
        entry_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "INSERT OR REPLACE INTO cache_entries (collection, entry_id, payload, cached_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(collection)
        .bind(entry_id)
        .bind(payload.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Transactionally write an entry and enqueue the pending operation that
    /// represents it, so a crash can never leave the intent half-recorded.
    /// Returns the queued operation's id.
    pub async fn put_with_operation(
        pool: &SqlitePool,
        collection: &str,
        entry_id: &str,
        payload: &serde_json::Value,
        op: &NewPendingOperation,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        Self::put_on(&mut *tx, collection, entry_id, payload).await?;
        let op_id = QueueRepo::enqueue_on(&mut *tx, op).await?;
        tx.commit().await?;
        Ok(op_id)
    }

    /// Fetch one entry.
    pub async fn get(
        pool: &SqlitePool,
        collection: &str,
        entry_id: &str,
    ) -> Result<Option<CacheEntry>, sqlx::Error> {
        sqlx::query_as::<_, CacheEntry>(
            "SELECT collection, entry_id, payload, cached_at FROM cache_entries \
             WHERE collection = $1 AND entry_id = $2",
        )
        .bind(collection)
        .bind(entry_id)
        .fetch_optional(pool)
        .await
    }

    /// All entries in a collection, newest first.
    pub async fn list(pool: &SqlitePool, collection: &str) -> Result<Vec<CacheEntry>, sqlx::Error> {
        sqlx::query_as::<_, CacheEntry>(
            "SELECT collection, entry_id, payload, cached_at FROM cache_entries \
             WHERE collection = $1 \
             ORDER BY cached_at DESC",
        )
        .bind(collection)
        .fetch_all(pool)
        .await
    }

    /// Remove one entry. Returns `true` if it existed.
    pub async fn remove(
        pool: &SqlitePool,
        collection: &str,
        entry_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE collection = $1 AND entry_id = $2")
            .bind(collection)
            .bind(entry_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
