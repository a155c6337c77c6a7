//! Progress record model, completion predicate, and merge semantics.
//!
//! One [`ProgressRecord`] tracks one subject/activity pairing for one
//! tracked entity. Records are never replaced by later interaction events:
//! counters accumulate while score and status overwrite
//! (merge-not-replace), keyed by a deterministic record id so repeated
//! writes to the same pairing update in place instead of duplicating.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Score at or above which a record counts as completed.
pub const COMPLETION_SCORE_THRESHOLD: i64 = 70;

/// Maximum score value.
pub const MAX_SCORE: i64 = 100;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    /// Stable string form, matching the stored/transmitted representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }

    /// Parse the stored form. Unknown values fall back to `NotStarted`
    /// rather than failing a whole row read.
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "in_progress" => ProgressStatus::InProgress,
            "completed" => ProgressStatus::Completed,
            _ => ProgressStatus::NotStarted,
        }
    }

    /// Derive a status from a completion percentage.
    pub fn for_percent(percent: i64) -> Self {
        if percent >= 100 {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One subject's interaction history for one tracked entity.
///
/// This struct is also the remote document schema for the
/// `progress_records` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub record_id: String,
    pub owner_id: String,
    pub entity_id: String,
    pub subject_id: String,
    pub status: ProgressStatus,
    /// Normalized score, 0–100.
    pub score: i64,
    /// Total interaction events; monotonically non-decreasing.
    pub play_count: i64,
    /// Cumulative time spent, milliseconds; non-negative.
    pub time_spent_ms: i64,
    pub completion_flag: bool,
    pub last_updated: Timestamp,
}

impl ProgressRecord {
    /// Deterministic record id for an entity/subject pairing.
    pub fn key(entity_id: &str, subject_id: &str) -> String {
        format!("{entity_id}_{subject_id}")
    }

    /// Create a fresh record for the first interaction event of a pairing.
    pub fn new(owner_id: &str, entity_id: &str, subject_id: &str) -> Self {
        Self {
            record_id: Self::key(entity_id, subject_id),
            owner_id: owner_id.to_string(),
            entity_id: entity_id.to_string(),
            subject_id: subject_id.to_string(),
            status: ProgressStatus::NotStarted,
            score: 0,
            play_count: 0,
            time_spent_ms: 0,
            completion_flag: false,
            last_updated: Utc::now(),
        }
    }

    /// The completion predicate: the most permissive of the three signals
    /// wins. The flag is not trusted on its own; a high score or a
    /// completed status also count.
    pub fn is_completed(&self) -> bool {
        self.completion_flag
            || self.score >= COMPLETION_SCORE_THRESHOLD
            || self.status == ProgressStatus::Completed
    }

    /// Fold an interaction event into this record.
    ///
    /// Counters increment; score, status, and the completion flag
    /// overwrite; `last_updated` is refreshed. Input clamping is the
    /// caller's concern (the façade validates score range).
    pub fn apply_event(&mut self, event: &PlayEvent) {
        self.play_count += event.plays.max(1);
        self.time_spent_ms += event.time_spent_ms.max(0);
        self.score = event.score;
        self.status = ProgressStatus::for_percent(event.score);
        self.completion_flag = event.score >= COMPLETION_SCORE_THRESHOLD;
        self.last_updated = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One interaction event reported by the caller.
#[derive(Debug, Clone)]
pub struct PlayEvent {
    /// Normalized score for this event, 0–100.
    pub score: i64,
    /// How many plays this event represents. Values below 1 count as 1.
    pub plays: i64,
    /// Time spent during this event, milliseconds.
    pub time_spent_ms: i64,
}

impl PlayEvent {
    /// A single play with the given score.
    pub fn scored(score: i64) -> Self {
        Self {
            score,
            plays: 1,
            time_spent_ms: 0,
        }
    }
}

/// Percentage score from right/wrong answer tallies.
///
/// The divisor is floored at 1 so an empty session scores 0 instead of
/// dividing by zero.
pub fn score_from_tallies(correct: i64, incorrect: i64) -> i64 {
    let attempts = (correct + incorrect).max(1);
    (correct.max(0) * 100) / attempts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
