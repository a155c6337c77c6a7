//! Row form of a progress record.

use chrono::{TimeZone, Utc};
use sqlx::FromRow;
use stride_core::progress::{ProgressRecord, ProgressStatus};

/// A row from `progress_records`: the domain record plus the local sync
/// flag, with timestamps flattened to epoch milliseconds.
#[derive(Debug, Clone, FromRow)]
pub struct ProgressRow {
    pub record_id: String,
    pub owner_id: String,
    pub entity_id: String,
    pub subject_id: String,
    pub status: String,
    pub score: i64,
    pub play_count: i64,
    pub time_spent_ms: i64,
    pub completion_flag: bool,
    pub last_updated: i64,
    pub synced: bool,
}

impl ProgressRow {
    pub fn from_record(record: &ProgressRecord, synced: bool) -> Self {
        Self {
            record_id: record.record_id.clone(),
            owner_id: record.owner_id.clone(),
            entity_id: record.entity_id.clone(),
            subject_id: record.subject_id.clone(),
            status: record.status.as_str().to_string(),
            score: record.score,
            play_count: record.play_count,
            time_spent_ms: record.time_spent_ms,
            completion_flag: record.completion_flag,
            last_updated: record.last_updated.timestamp_millis(),
            synced,
        }
    }

    pub fn into_record(self) -> ProgressRecord {
        ProgressRecord {
            record_id: self.record_id,
            owner_id: self.owner_id,
            entity_id: self.entity_id,
            subject_id: self.subject_id,
            status: ProgressStatus::parse_lossy(&self.status),
            score: self.score,
            play_count: self.play_count,
            time_spent_ms: self.time_spent_ms,
            completion_flag: self.completion_flag,
            last_updated: Utc
                .timestamp_millis_opt(self.last_updated)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}
