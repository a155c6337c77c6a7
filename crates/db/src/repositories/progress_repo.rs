//! Repository for the `progress_records` table.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;
use stride_core::progress::ProgressRecord;

use crate::models::progress::ProgressRow;

/// Column list for `progress_records` queries.
const COLUMNS: &str = "record_id, owner_id, entity_id, subject_id, status, score, \
     play_count, time_spent_ms, completion_flag, last_updated, synced";

/// Provides cache/queue operations for progress rows.
pub struct ProgressRepo;

impl ProgressRepo {
    /// Write or replace the whole row keyed by `record_id`.
    ///
    /// Replaces, never merges: callers needing partial-update semantics
    /// must read-modify-write first.
    pub async fn upsert(
        pool: &SqlitePool,
        record: &ProgressRecord,
        synced: bool,
    ) -> Result<(), sqlx::Error> {
        upsert_query(record, synced).execute(pool).await?;
        tracing::debug!(record_id = %record.record_id, synced, "cached progress row");
        Ok(())
    }

    /// Fetch one row by id.
    pub async fn get(
        pool: &SqlitePool,
        record_id: &str,
    ) -> Result<Option<ProgressRow>, sqlx::Error> {
        sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {COLUMNS} FROM progress_records WHERE record_id = $1"
        ))
        .bind(record_id)
        .fetch_optional(pool)
        .await
    }

    /// All rows for one tracked entity.
    pub async fn list_for_entity(
        pool: &SqlitePool,
        entity_id: &str,
    ) -> Result<Vec<ProgressRow>, sqlx::Error> {
        sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {COLUMNS} FROM progress_records WHERE entity_id = $1"
        ))
        .bind(entity_id)
        .fetch_all(pool)
        .await
    }

    /// All rows for one owner account.
    pub async fn list_for_owner(
        pool: &SqlitePool,
        owner_id: &str,
    ) -> Result<Vec<ProgressRow>, sqlx::Error> {
        sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {COLUMNS} FROM progress_records WHERE owner_id = $1"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    /// Every row not yet confirmed by the remote store. No guaranteed order.
    pub async fn list_unsynced(pool: &SqlitePool) -> Result<Vec<ProgressRow>, sqlx::Error> {
        sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {COLUMNS} FROM progress_records WHERE synced = 0 ORDER BY record_id ASC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Idempotently flip the sync flag. Returns `true` if a pending row was
    /// retired, `false` if the row was absent or already synced.
    pub async fn mark_synced(pool: &SqlitePool, record_id: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE progress_records SET synced = 1 WHERE record_id = $1 AND synced = 0")
                .bind(record_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of rows waiting to sync.
    pub async fn unsynced_count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM progress_records WHERE synced = 0")
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }
}

fn upsert_query(record: &ProgressRecord, synced: bool) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(
        "INSERT OR REPLACE INTO progress_records \
         (record_id, owner_id, entity_id, subject_id, status, score, \
          play_count, time_spent_ms, completion_flag, last_updated, synced) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(&record.record_id)
    .bind(&record.owner_id)
    .bind(&record.entity_id)
    .bind(&record.subject_id)
    .bind(record.status.as_str())
    .bind(record.score)
    .bind(record.play_count)
    .bind(record.time_spent_ms)
    .bind(record.completion_flag)
    .bind(record.last_updated.timestamp_millis())
    .bind(synced)
}
