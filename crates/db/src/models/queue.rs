//! Pending-operation queue rows: durable intents to mutate remote state.

use sqlx::FromRow;

/// Kind of remote mutation a queued operation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }

    /// Parse the stored form. Unknown kinds return `None` so the drain can
    /// skip (and log) a corrupted row instead of misdispatching it.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(OperationKind::Insert),
            "update" => Some(OperationKind::Update),
            "delete" => Some(OperationKind::Delete),
            _ => None,
        }
    }
}

/// A row from `pending_operations`.
///
/// Remains pending until the remote call for it succeeds; only an explicit
/// `mark_synced` retires it.
#[derive(Debug, Clone, FromRow)]
pub struct PendingOperation {
    pub op_id: i64,
    pub target_collection: String,
    pub target_record_id: String,
    pub operation: String,
    /// JSON document body for insert/update operations.
    pub payload: Option<String>,
    pub synced: bool,
    pub created_at: i64,
}

impl PendingOperation {
    pub fn kind(&self) -> Option<OperationKind> {
        OperationKind::parse(&self.operation)
    }

    /// Parsed payload; `None` when absent or unparseable.
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        self.payload
            .as_deref()
            .and_then(|p| serde_json::from_str(p).ok())
    }
}

/// DTO for enqueueing a new operation.
#[derive(Debug, Clone)]
pub struct NewPendingOperation {
    pub target_collection: String,
    pub target_record_id: String,
    pub operation: OperationKind,
    pub payload: Option<serde_json::Value>,
}

impl NewPendingOperation {
    pub fn new(
        collection: impl Into<String>,
        record_id: impl Into<String>,
        operation: OperationKind,
    ) -> Self {
        Self {
            target_collection: collection.into(),
            target_record_id: record_id.into(),
            operation,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}
