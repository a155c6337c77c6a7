//! Integration tests for schema creation and additive upgrades.

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use stride_db::migrations::{self, SCHEMA_VERSION};
use stride_db::repositories::ProgressRepo;

/// An unmigrated in-memory pool, for staging historical schemas.
async fn raw_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(
            SqliteConnectOptions::new()
                .in_memory(true)
                .busy_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap()
}

async fn user_version(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn fresh_store_lands_on_current_version() {
    let pool = stride_db::open_in_memory().await.unwrap();
    assert_eq!(user_version(&pool).await, SCHEMA_VERSION);
    // All three tables answer queries.
    assert_eq!(ProgressRepo::unsynced_count(&pool).await.unwrap(), 0);
    sqlx::query("SELECT COUNT(*) FROM pending_operations")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("SELECT COUNT(*) FROM cache_entries")
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn run_is_idempotent() {
    let pool = stride_db::open_in_memory().await.unwrap();
    migrations::run(&pool).await.unwrap();
    migrations::run(&pool).await.unwrap();
    assert_eq!(user_version(&pool).await, SCHEMA_VERSION);
}

#[tokio::test]
async fn additive_upgrade_preserves_v1_rows() {
    let pool = raw_pool().await;

    // Stage the v1 schema: no time_spent_ms/synced/completion_flag yet.
    sqlx::query(
        "CREATE TABLE progress_records (\
            record_id TEXT PRIMARY KEY,\
            owner_id TEXT NOT NULL,\
            entity_id TEXT NOT NULL,\
            subject_id TEXT NOT NULL,\
            status TEXT NOT NULL DEFAULT 'not_started',\
            score INTEGER NOT NULL DEFAULT 0,\
            play_count INTEGER NOT NULL DEFAULT 0,\
            last_updated INTEGER NOT NULL DEFAULT 0\
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO progress_records \
         (record_id, owner_id, entity_id, subject_id, status, score, play_count, last_updated) \
         VALUES ('math_addition', 'o1', 'math', 'addition', 'in_progress', 55, 3, 1000)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("PRAGMA user_version = 1").execute(&pool).await.unwrap();

    migrations::run(&pool).await.unwrap();

    assert_eq!(user_version(&pool).await, SCHEMA_VERSION);

    // The old row survived and picked up defaults for the new columns,
    // which means it is still unsynced work waiting to be drained.
    let rows = ProgressRepo::list_unsynced(&pool).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.record_id, "math_addition");
    assert_eq!(row.score, 55);
    assert_eq!(row.play_count, 3);
    assert_eq!(row.time_spent_ms, 0);
    assert!(!row.completion_flag);
    assert!(!row.synced);
}

#[tokio::test]
async fn failed_additive_upgrade_falls_back_to_recreate() {
    let pool = raw_pool().await;

    // A v1-tagged store that somehow already has time_spent_ms, so the
    // first ALTER of the v2 step fails with a duplicate column error.
    sqlx::query(
        "CREATE TABLE progress_records (\
            record_id TEXT PRIMARY KEY,\
            owner_id TEXT NOT NULL,\
            entity_id TEXT NOT NULL,\
            subject_id TEXT NOT NULL,\
            status TEXT NOT NULL DEFAULT 'not_started',\
            score INTEGER NOT NULL DEFAULT 0,\
            play_count INTEGER NOT NULL DEFAULT 0,\
            time_spent_ms INTEGER NOT NULL DEFAULT 0,\
            last_updated INTEGER NOT NULL DEFAULT 0\
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO progress_records \
         (record_id, owner_id, entity_id, subject_id, score) \
         VALUES ('math_addition', 'o1', 'math', 'addition', 55)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("PRAGMA user_version = 1").execute(&pool).await.unwrap();

    migrations::run(&pool).await.unwrap();

    // The fallback dropped the inconsistent store and rebuilt it whole.
    assert_eq!(user_version(&pool).await, SCHEMA_VERSION);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(ProgressRepo::unsynced_count(&pool).await.unwrap(), 0);
    sqlx::query("SELECT COUNT(*) FROM pending_operations")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("SELECT COUNT(*) FROM cache_entries")
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn upgrade_creates_missing_tables() {
    let pool = raw_pool().await;
    sqlx::query(
        "CREATE TABLE progress_records (\
            record_id TEXT PRIMARY KEY,\
            owner_id TEXT NOT NULL,\
            entity_id TEXT NOT NULL,\
            subject_id TEXT NOT NULL,\
            status TEXT NOT NULL DEFAULT 'not_started',\
            score INTEGER NOT NULL DEFAULT 0,\
            play_count INTEGER NOT NULL DEFAULT 0,\
            last_updated INTEGER NOT NULL DEFAULT 0\
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("PRAGMA user_version = 1").execute(&pool).await.unwrap();

    migrations::run(&pool).await.unwrap();

    sqlx::query("SELECT COUNT(*) FROM pending_operations")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("SELECT COUNT(*) FROM cache_entries")
        .execute(&pool)
        .await
        .unwrap();
}
