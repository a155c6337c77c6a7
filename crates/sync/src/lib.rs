//! Background synchronization between the local store and the remote
//! document store.
//!
//! [`SyncManager`] drains two backlogs: unsynced progress records and the
//! pending-operation queue. Drains are sequential and stop on the first
//! remote failure; everything already pushed stays retired, everything
//! after the failure stays pending for the next attempt. A drain already
//! in flight makes further triggers no-ops rather than queueing up.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;

use stride_core::CoreError;
use stride_db::models::OperationKind;
use stride_db::repositories::{ProgressRepo, QueueRepo};
use stride_remote::{DocumentStore, RemoteError, SetMode};

/// Remote collection holding progress documents.
pub const PROGRESS_COLLECTION: &str = "progress_records";

/// Outcome of one drain attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items the drain looked at.
    pub attempted: usize,
    /// Items pushed and retired this attempt.
    pub synced: usize,
    /// Items skipped (unparseable or empty-keyed rows left for inspection).
    pub skipped: usize,
    /// True when another drain held the guard and this call did nothing.
    pub in_flight: bool,
}

impl SyncReport {
    fn in_flight() -> Self {
        Self {
            in_flight: true,
            ..Self::default()
        }
    }

    fn merge(self, other: SyncReport) -> Self {
        Self {
            attempted: self.attempted + other.attempted,
            synced: self.synced + other.synced,
            skipped: self.skipped + other.skipped,
            in_flight: false,
        }
    }
}

/// Current backlog sizes, for surfacing "N changes waiting" in a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub pending_progress: i64,
    pub pending_operations: i64,
}

impl SyncStatus {
    pub fn is_clean(&self) -> bool {
        self.pending_progress == 0 && self.pending_operations == 0
    }
}

/// Coordinates pushes from the local store to a [`DocumentStore`].
pub struct SyncManager {
    pool: SqlitePool,
    remote: Arc<dyn DocumentStore>,
    drain: tokio::sync::Mutex<()>,
}

impl SyncManager {
    pub fn new(pool: SqlitePool, remote: Arc<dyn DocumentStore>) -> Self {
        Self {
            pool,
            remote,
            drain: tokio::sync::Mutex::new(()),
        }
    }

    /// Drain both backlogs: progress records first, then queued operations.
    pub async fn sync_all(&self) -> Result<SyncReport, CoreError> {
        let Ok(_guard) = self.drain.try_lock() else {
            tracing::debug!("sync already in flight, skipping trigger");
            return Ok(SyncReport::in_flight());
        };
        let progress = self.drain_progress().await?;
        let queue = self.drain_queue().await?;
        Ok(progress.merge(queue))
    }

    /// Push every unsynced progress record to the remote store.
    pub async fn sync_pending_progress(&self) -> Result<SyncReport, CoreError> {
        let Ok(_guard) = self.drain.try_lock() else {
            tracing::debug!("sync already in flight, skipping trigger");
            return Ok(SyncReport::in_flight());
        };
        self.drain_progress().await
    }

    /// Replay the pending-operation queue against the remote store.
    pub async fn sync_queued_operations(&self) -> Result<SyncReport, CoreError> {
        let Ok(_guard) = self.drain.try_lock() else {
            tracing::debug!("sync already in flight, skipping trigger");
            return Ok(SyncReport::in_flight());
        };
        self.drain_queue().await
    }

    pub async fn get_sync_status(&self) -> Result<SyncStatus, CoreError> {
        let pending_progress = ProgressRepo::unsynced_count(&self.pool)
            .await
            .map_err(store_err)?;
        let pending_operations = QueueRepo::pending_count(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(SyncStatus {
            pending_progress,
            pending_operations,
        })
    }

    // ------------------------------------------------------------------
    // Drains
    // ------------------------------------------------------------------

    async fn drain_progress(&self) -> Result<SyncReport, CoreError> {
        let rows = ProgressRepo::list_unsynced(&self.pool)
            .await
            .map_err(store_err)?;
        let mut report = SyncReport {
            attempted: rows.len(),
            ..SyncReport::default()
        };

        for row in rows {
            let record = row.into_record();
            if record.record_id.is_empty() {
                tracing::warn!("skipping progress row with empty record id");
                report.skipped += 1;
                continue;
            }
            let fields = serde_json::to_value(&record)
                .map_err(|e| CoreError::Store(format!("serialize progress record: {e}")))?;
            self.remote
                .set(PROGRESS_COLLECTION, &record.record_id, fields, SetMode::Replace)
                .await
                .map_err(remote_err)?;
            ProgressRepo::mark_synced(&self.pool, &record.record_id)
                .await
                .map_err(store_err)?;
            report.synced += 1;
            tracing::debug!(record_id = %record.record_id, "progress record synced");
        }

        if report.synced > 0 {
            tracing::info!(synced = report.synced, "progress backlog drained");
        }
        Ok(report)
    }

    async fn drain_queue(&self) -> Result<SyncReport, CoreError> {
        let ops = QueueRepo::list_pending(&self.pool)
            .await
            .map_err(store_err)?;
        let mut report = SyncReport {
            attempted: ops.len(),
            ..SyncReport::default()
        };

        for op in ops {
            let Some(kind) = op.kind() else {
                tracing::warn!(op_id = op.op_id, operation = %op.operation, "unknown operation kind, skipping");
                report.skipped += 1;
                continue;
            };
            if op.target_record_id.is_empty() {
                tracing::warn!(op_id = op.op_id, "skipping operation with empty record id");
                report.skipped += 1;
                continue;
            }
            self.dispatch(kind, &op).await.map_err(remote_err)?;
            QueueRepo::mark_synced(&self.pool, op.op_id)
                .await
                .map_err(store_err)?;
            report.synced += 1;
            tracing::debug!(op_id = op.op_id, kind = kind.as_str(), "queued operation synced");
        }

        if report.synced > 0 {
            tracing::info!(synced = report.synced, "operation queue drained");
        }
        Ok(report)
    }

    async fn dispatch(
        &self,
        kind: OperationKind,
        op: &stride_db::models::PendingOperation,
    ) -> Result<(), RemoteError> {
        let collection = op.target_collection.as_str();
        let id = op.target_record_id.as_str();
        match kind {
            OperationKind::Insert => {
                let fields = op.payload_json().unwrap_or_else(|| serde_json::json!({}));
                self.remote.set(collection, id, fields, SetMode::Replace).await
            }
            OperationKind::Update => {
                // A payload-less update just stamps the document so watchers
                // see the local change was reconciled.
                let fields = op.payload_json().unwrap_or_else(|| {
                    serde_json::json!({ "last_synced": Utc::now().timestamp_millis() })
                });
                match self.remote.update(collection, id, fields.clone()).await {
                    // The document vanished remotely; recreate it when we
                    // still hold a full body, otherwise retire the op.
                    Err(RemoteError::NotFound { .. }) => {
                        if op.payload_json().is_some() {
                            self.remote.set(collection, id, fields, SetMode::Replace).await
                        } else {
                            tracing::warn!(op_id = op.op_id, collection, id, "update target missing remotely, retiring");
                            Ok(())
                        }
                    }
                    other => other,
                }
            }
            OperationKind::Delete => match self.remote.delete(collection, id).await {
                // Already gone is the outcome the delete wanted.
                Err(RemoteError::NotFound { .. }) => Ok(()),
                other => other,
            },
        }
    }
}

// ----------------------------------------------------------------------
// Error mapping
// ----------------------------------------------------------------------

fn store_err(e: sqlx::Error) -> CoreError {
    CoreError::Store(e.to_string())
}

fn remote_err(e: RemoteError) -> CoreError {
    match e {
        RemoteError::Permission(msg) => CoreError::NotAuthenticated(msg),
        other => CoreError::RemoteUnavailable(other.to_string()),
    }
}
