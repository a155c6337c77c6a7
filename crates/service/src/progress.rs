//! Progress reporting and derived stats.
//!
//! All mutations go through a read-modify-write of the single record for an
//! entity/subject pairing, serialized by a per-service mutex. The local
//! store is written first, so a crash or outage after that point can only
//! delay the remote copy, never lose the event.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use stride_core::progress::{COMPLETION_SCORE_THRESHOLD, MAX_SCORE};
use stride_core::stats::compute_stats;
use stride_core::{CoreError, OwnerStats, PlayEvent, ProgressRecord, ProgressStatus};
use stride_db::models::{NewPendingOperation, OperationKind};
use stride_db::repositories::{ProgressRepo, QueueRepo};
use stride_remote::{filters, DocumentStore, RemoteError, SetMode};
use stride_sync::PROGRESS_COLLECTION;

use crate::auth::Authenticator;
use crate::PROFILES_COLLECTION;

/// How a write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The remote store acknowledged the write.
    Confirmed,
    /// The remote was unreachable; the write is durable locally and will
    /// be pushed by the next sync.
    SavedLocally,
}

/// Façade for progress reads and writes.
pub struct ProgressService {
    pool: SqlitePool,
    remote: Arc<dyn DocumentStore>,
    auth: Arc<dyn Authenticator>,
    total_trackable_units: u32,
    // Serializes read-modify-write cycles on progress records.
    write_guard: tokio::sync::Mutex<()>,
}

impl ProgressService {
    pub fn new(
        pool: SqlitePool,
        remote: Arc<dyn DocumentStore>,
        auth: Arc<dyn Authenticator>,
        total_trackable_units: u32,
    ) -> Self {
        Self {
            pool,
            remote,
            auth,
            total_trackable_units,
            write_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Fold an interaction event into the record for `entity_id`/`subject_id`.
    pub async fn report_progress(
        &self,
        entity_id: &str,
        subject_id: &str,
        event: PlayEvent,
    ) -> Result<ReportOutcome, CoreError> {
        validate_ids(entity_id, subject_id)?;
        validate_score(event.score)?;
        let owner_id = self.require_account()?;

        let _guard = self.write_guard.lock().await;
        let mut record = self.load_or_new(&owner_id, entity_id, subject_id).await?;
        record.apply_event(&event);
        self.write_through(&record).await
    }

    /// Report a finished session as right/wrong tallies plus time spent.
    pub async fn report_session_result(
        &self,
        entity_id: &str,
        subject_id: &str,
        correct: i64,
        incorrect: i64,
        time_spent_ms: i64,
    ) -> Result<ReportOutcome, CoreError> {
        if correct < 0 || incorrect < 0 {
            return Err(CoreError::InvalidInput(
                "answer tallies must be non-negative".into(),
            ));
        }
        let event = PlayEvent {
            score: stride_core::progress::score_from_tallies(correct, incorrect),
            plays: 1,
            time_spent_ms,
        };
        self.report_progress(entity_id, subject_id, event).await
    }

    /// Record time spent without a scored outcome. Keeps the existing
    /// score and completion state, bumps the play counter.
    pub async fn record_session(
        &self,
        entity_id: &str,
        subject_id: &str,
        time_spent_ms: i64,
    ) -> Result<ReportOutcome, CoreError> {
        validate_ids(entity_id, subject_id)?;
        let owner_id = self.require_account()?;

        let _guard = self.write_guard.lock().await;
        let mut record = self.load_or_new(&owner_id, entity_id, subject_id).await?;
        let event = PlayEvent {
            score: record.score,
            plays: 1,
            time_spent_ms,
        };
        record.apply_event(&event);
        self.write_through(&record).await
    }

    /// Overwrite the completion percentage for a pairing. Status and the
    /// completion flag are derived from the percentage; play counters are
    /// left alone.
    ///
    /// Updates the remote record in place when one exists; a record absent
    /// remotely (or an unreachable remote) goes through [`Self::report_progress`]
    /// so the write still lands durably.
    pub async fn set_completion_percentage(
        &self,
        entity_id: &str,
        subject_id: &str,
        percent: i64,
    ) -> Result<ReportOutcome, CoreError> {
        validate_ids(entity_id, subject_id)?;
        validate_score(percent)?;
        let owner_id = self.require_account()?;
        let record_id = ProgressRecord::key(entity_id, subject_id);

        let existing = match self.remote.get(PROGRESS_COLLECTION, &record_id).await {
            Ok(found) => found,
            Err(RemoteError::Permission(msg)) => return Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(%record_id, error = %e, "remote lookup failed, taking the report path");
                None
            }
        };
        let Some(remote_fields) = existing else {
            return self
                .report_progress(entity_id, subject_id, PlayEvent::scored(percent))
                .await;
        };

        let _guard = self.write_guard.lock().await;
        let local = ProgressRepo::get(&self.pool, &record_id)
            .await
            .map_err(store_err)?;
        let mut record = match local {
            Some(row) => row.into_record(),
            // No local copy yet: seed from the remote document so its play
            // counters and time survive the partial update.
            None => match serde_json::from_value::<ProgressRecord>(remote_fields) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(%record_id, error = %e, "malformed remote record, starting fresh");
                    ProgressRecord::new(&owner_id, entity_id, subject_id)
                }
            },
        };
        record.score = percent;
        record.status = ProgressStatus::for_percent(percent);
        record.completion_flag = percent >= COMPLETION_SCORE_THRESHOLD;
        record.last_updated = Utc::now();

        ProgressRepo::upsert(&self.pool, &record, false)
            .await
            .map_err(store_err)?;
        let fields = json!({
            "score": record.score,
            "status": record.status,
            "completion_flag": record.completion_flag,
            "last_updated": record.last_updated,
        });
        match self.remote.update(PROGRESS_COLLECTION, &record_id, fields).await {
            Ok(()) => {
                ProgressRepo::mark_synced(&self.pool, &record_id)
                    .await
                    .map_err(store_err)?;
                self.refresh_stats_soft(&record.entity_id).await;
                Ok(ReportOutcome::Confirmed)
            }
            Err(RemoteError::Permission(msg)) => Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(%record_id, error = %e, "remote update failed, keeping record pending");
                Ok(ReportOutcome::SavedLocally)
            }
        }
    }

    /// All records for an entity, freshest copy available.
    ///
    /// Queries the remote first and repairs the local cache from it, then
    /// serves from the local store. When the remote is unreachable the
    /// local copy is served as-is. Locally pending (unsynced) records are
    /// never overwritten by remote data.
    pub async fn get_records_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<ProgressRecord>, CoreError> {
        match self
            .remote
            .query(PROGRESS_COLLECTION, &filters(&[("entity_id", entity_id)]))
            .await
        {
            Ok(rows) => self.repair_local(rows).await?,
            Err(RemoteError::Permission(msg)) => return Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(entity_id, error = %e, "remote query failed, serving local records");
            }
        }

        let rows = ProgressRepo::list_for_entity(&self.pool, entity_id)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(|r| r.into_record()).collect())
    }

    /// All records for the signed-in account, restricted to the given
    /// entities.
    ///
    /// Queries the remote by owner (authoritative on read), repairs the
    /// local cache, then serves from the local store; an unreachable
    /// remote serves the local copy as-is. Requested entities with zero
    /// matching records are logged, not errored.
    pub async fn get_records_for_owner(
        &self,
        entity_ids: &[&str],
    ) -> Result<Vec<ProgressRecord>, CoreError> {
        let owner_id = self.require_account()?;
        if entity_ids.is_empty() {
            tracing::warn!(%owner_id, "record fetch with an empty entity set");
            return Ok(Vec::new());
        }

        match self
            .remote
            .query(PROGRESS_COLLECTION, &filters(&[("owner_id", owner_id.as_str())]))
            .await
        {
            Ok(rows) => self.repair_local(rows).await?,
            Err(RemoteError::Permission(msg)) => return Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(%owner_id, error = %e, "remote query failed, serving local records");
            }
        }

        let rows = ProgressRepo::list_for_owner(&self.pool, &owner_id)
            .await
            .map_err(store_err)?;
        let records: Vec<ProgressRecord> = rows
            .into_iter()
            .map(|r| r.into_record())
            .filter(|r| entity_ids.contains(&r.entity_id.as_str()))
            .collect();

        for entity_id in entity_ids {
            if !records.iter().any(|r| r.entity_id == *entity_id) {
                tracing::info!(%entity_id, "no progress records for requested entity");
            }
        }
        Ok(records)
    }

    /// Recompute derived stats for an entity from its local records and
    /// push them onto the entity's profile document. An unreachable remote
    /// defers the push through the operation queue.
    pub async fn refresh_entity_stats(&self, entity_id: &str) -> Result<OwnerStats, CoreError> {
        let rows = ProgressRepo::list_for_entity(&self.pool, entity_id)
            .await
            .map_err(store_err)?;
        let records: Vec<ProgressRecord> = rows.into_iter().map(|r| r.into_record()).collect();
        let stats = compute_stats(&records, self.total_trackable_units);

        let fields = json!({
            "completed_count": stats.completed_count,
            "progress_percent": stats.progress_percent,
            "stars": stats.stars,
        });
        match self
            .remote
            .update(PROFILES_COLLECTION, entity_id, fields.clone())
            .await
        {
            Ok(()) => {}
            Err(RemoteError::NotFound { .. }) => {
                tracing::warn!(entity_id, "no profile document for stats push");
            }
            Err(RemoteError::Permission(msg)) => return Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(entity_id, error = %e, "stats push failed, queueing");
                QueueRepo::enqueue(
                    &self.pool,
                    &NewPendingOperation::new(PROFILES_COLLECTION, entity_id, OperationKind::Update)
                        .with_payload(fields),
                )
                .await
                .map_err(store_err)?;
            }
        }
        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Stats refresh after a confirmed write. Derived stats are eventually
    /// consistent, so failures here are logged, never propagated.
    async fn refresh_stats_soft(&self, entity_id: &str) {
        if let Err(e) = self.refresh_entity_stats(entity_id).await {
            tracing::warn!(entity_id, error = %e, "stats refresh after write failed");
        }
    }

    fn require_account(&self) -> Result<String, CoreError> {
        self.auth
            .current_account()
            .ok_or_else(|| CoreError::NotAuthenticated("no account signed in".into()))
    }

    async fn load_or_new(
        &self,
        owner_id: &str,
        entity_id: &str,
        subject_id: &str,
    ) -> Result<ProgressRecord, CoreError> {
        let record_id = ProgressRecord::key(entity_id, subject_id);
        let existing = ProgressRepo::get(&self.pool, &record_id)
            .await
            .map_err(store_err)?;
        Ok(match existing {
            Some(row) => row.into_record(),
            None => ProgressRecord::new(owner_id, entity_id, subject_id),
        })
    }

    /// Persist locally (durable, pending), then attempt the remote write
    /// and promote the row to synced on success.
    async fn write_through(&self, record: &ProgressRecord) -> Result<ReportOutcome, CoreError> {
        ProgressRepo::upsert(&self.pool, record, false)
            .await
            .map_err(store_err)?;

        let fields = serde_json::to_value(record)
            .map_err(|e| CoreError::Store(format!("serialize progress record: {e}")))?;
        match self
            .remote
            .set(PROGRESS_COLLECTION, &record.record_id, fields, SetMode::Replace)
            .await
        {
            Ok(()) => {
                ProgressRepo::mark_synced(&self.pool, &record.record_id)
                    .await
                    .map_err(store_err)?;
                self.refresh_stats_soft(&record.entity_id).await;
                Ok(ReportOutcome::Confirmed)
            }
            Err(RemoteError::Permission(msg)) => Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(
                    record_id = %record.record_id,
                    error = %e,
                    "remote write failed, keeping record pending"
                );
                Ok(ReportOutcome::SavedLocally)
            }
        }
    }

    async fn repair_local(&self, rows: Vec<(String, serde_json::Value)>) -> Result<(), CoreError> {
        let pending: std::collections::HashSet<String> = ProgressRepo::list_unsynced(&self.pool)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(|r| r.record_id)
            .collect();

        for (id, fields) in rows {
            if pending.contains(&id) {
                continue;
            }
            match serde_json::from_value::<ProgressRecord>(fields) {
                Ok(record) => {
                    ProgressRepo::upsert(&self.pool, &record, true)
                        .await
                        .map_err(store_err)?;
                }
                Err(e) => {
                    tracing::warn!(record_id = %id, error = %e, "skipping malformed remote record");
                }
            }
        }
        Ok(())
    }
}

fn validate_ids(entity_id: &str, subject_id: &str) -> Result<(), CoreError> {
    if entity_id.trim().is_empty() || subject_id.trim().is_empty() {
        return Err(CoreError::InvalidInput(
            "entity and subject ids must be non-empty".into(),
        ));
    }
    Ok(())
}

fn validate_score(score: i64) -> Result<(), CoreError> {
    if !(0..=MAX_SCORE).contains(&score) {
        return Err(CoreError::InvalidInput(format!(
            "score {score} outside 0..={MAX_SCORE}"
        )));
    }
    Ok(())
}

fn store_err(e: sqlx::Error) -> CoreError {
    CoreError::Store(e.to_string())
}
