//! Code-driven schema migrations keyed on `PRAGMA user_version`.
//!
//! Upgrades are additive (`ALTER TABLE ... ADD COLUMN` with defaults, new
//! tables) so unsynced local rows survive every version bump. The
//! drop-and-recreate path exists only as a last resort when an additive
//! step fails; it discards unsynced work and logs accordingly.

use sqlx::SqlitePool;

/// Current schema version.
///
/// History: v1 shipped `progress_records` without time tracking or a sync
/// flag; v2 added `time_spent_ms`/`synced` plus `cache_entries`; v3 added
/// `completion_flag` plus `pending_operations`.
pub const SCHEMA_VERSION: i64 = 3;

const CREATE_PROGRESS: &str = "\
    CREATE TABLE IF NOT EXISTS progress_records (\
        record_id TEXT PRIMARY KEY,\
        owner_id TEXT NOT NULL,\
        entity_id TEXT NOT NULL,\
        subject_id TEXT NOT NULL,\
        status TEXT NOT NULL DEFAULT 'not_started',\
        score INTEGER NOT NULL DEFAULT 0,\
        play_count INTEGER NOT NULL DEFAULT 0,\
        time_spent_ms INTEGER NOT NULL DEFAULT 0,\
        completion_flag INTEGER NOT NULL DEFAULT 0,\
        last_updated INTEGER NOT NULL DEFAULT 0,\
        synced INTEGER NOT NULL DEFAULT 0\
    )";

const CREATE_QUEUE: &str = "\
    CREATE TABLE IF NOT EXISTS pending_operations (\
        op_id INTEGER PRIMARY KEY AUTOINCREMENT,\
        target_collection TEXT NOT NULL,\
        target_record_id TEXT NOT NULL,\
        operation TEXT NOT NULL,\
        payload TEXT,\
        synced INTEGER NOT NULL DEFAULT 0,\
        created_at INTEGER NOT NULL DEFAULT 0\
    )";

const CREATE_CACHE: &str = "\
    CREATE TABLE IF NOT EXISTS cache_entries (\
        collection TEXT NOT NULL,\
        entry_id TEXT NOT NULL,\
        payload TEXT NOT NULL,\
        cached_at INTEGER NOT NULL DEFAULT 0,\
        PRIMARY KEY (collection, entry_id)\
    )";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_progress_synced ON progress_records (synced)",
    "CREATE INDEX IF NOT EXISTS idx_progress_entity ON progress_records (entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_queue_synced ON pending_operations (synced)",
];

/// Bring the store to [`SCHEMA_VERSION`]. Idempotent.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    if current == 0 {
        tracing::info!(version = SCHEMA_VERSION, "creating local store schema");
        create_all(pool).await?;
    } else {
        tracing::info!(from = current, to = SCHEMA_VERSION, "upgrading local store schema");
        if let Err(e) = upgrade_from(pool, current).await {
            tracing::error!(
                from = current,
                error = %e,
                "additive migration failed; dropping and recreating all tables — \
                 unsynced local work is being discarded"
            );
            drop_all(pool).await?;
            create_all(pool).await?;
        }
    }

    set_version(pool, SCHEMA_VERSION).await
}

async fn create_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_PROGRESS).execute(pool).await?;
    sqlx::query(CREATE_QUEUE).execute(pool).await?;
    sqlx::query(CREATE_CACHE).execute(pool).await?;
    for stmt in CREATE_INDEXES {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

async fn upgrade_from(pool: &SqlitePool, from: i64) -> Result<(), sqlx::Error> {
    if from < 2 {
        sqlx::query("ALTER TABLE progress_records ADD COLUMN time_spent_ms INTEGER NOT NULL DEFAULT 0")
            .execute(pool)
            .await?;
        sqlx::query("ALTER TABLE progress_records ADD COLUMN synced INTEGER NOT NULL DEFAULT 0")
            .execute(pool)
            .await?;
        sqlx::query(CREATE_CACHE).execute(pool).await?;
    }
    if from < 3 {
        sqlx::query("ALTER TABLE progress_records ADD COLUMN completion_flag INTEGER NOT NULL DEFAULT 0")
            .execute(pool)
            .await?;
        sqlx::query(CREATE_QUEUE).execute(pool).await?;
    }
    for stmt in CREATE_INDEXES {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

async fn drop_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for table in ["progress_records", "pending_operations", "cache_entries"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn set_version(pool: &SqlitePool, version: i64) -> Result<(), sqlx::Error> {
    // PRAGMA values cannot be bound as parameters.
    sqlx::query(&format!("PRAGMA user_version = {version}"))
        .execute(pool)
        .await?;
    Ok(())
}
