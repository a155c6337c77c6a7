//! Repository for the `pending_operations` table.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};

use crate::models::queue::{NewPendingOperation, PendingOperation};

/// Column list for `pending_operations` queries.
const COLUMNS: &str =
    "op_id, target_collection, target_record_id, operation, payload, synced, created_at";

/// Provides queue operations for durable remote-mutation intents.
pub struct QueueRepo;

impl QueueRepo {
    /// Enqueue an operation, returning the generated `op_id`.
    pub async fn enqueue(pool: &SqlitePool, op: &NewPendingOperation) -> Result<i64, sqlx::Error> {
        Self::enqueue_on(pool, op).await
    }

    /// Enqueue on an arbitrary executor, so callers can participate in a
    /// transaction alongside the local write the operation represents.
    pub async fn enqueue_on<'e, E>(executor: E, op: &NewPendingOperation) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let payload = op
            .payload
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap_or_default());

        let op_id: i64 = sqlx::query_scalar(
            "INSERT INTO pending_operations \
             (target_collection, target_record_id, operation, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING op_id",
        )
        .bind(&op.target_collection)
        .bind(&op.target_record_id)
        .bind(op.operation.as_str())
        .bind(payload)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(executor)
        .await?;

        tracing::debug!(
            op_id,
            collection = %op.target_collection,
            record_id = %op.target_record_id,
            operation = op.operation.as_str(),
            "queued pending operation"
        );
        Ok(op_id)
    }

    /// Pending operations, oldest first.
    pub async fn list_pending(pool: &SqlitePool) -> Result<Vec<PendingOperation>, sqlx::Error> {
        sqlx::query_as::<_, PendingOperation>(&format!(
            "SELECT {COLUMNS} FROM pending_operations \
             WHERE synced = 0 \
             ORDER BY created_at ASC, op_id ASC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Idempotently retire an operation. Returns `true` if a pending row
    /// was retired.
    pub async fn mark_synced(pool: &SqlitePool, op_id: i64) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE pending_operations SET synced = 1 WHERE op_id = $1 AND synced = 0")
                .bind(op_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of operations waiting to sync.
    pub async fn pending_count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_operations WHERE synced = 0")
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }
}
