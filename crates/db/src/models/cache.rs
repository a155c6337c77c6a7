//! Generic JSON cache rows for secondary entities (profiles, content).

use sqlx::FromRow;

/// A row from `cache_entries`.
#[derive(Debug, Clone, FromRow)]
pub struct CacheEntry {
    pub collection: String,
    pub entry_id: String,
    pub payload: String,
    pub cached_at: i64,
}

impl CacheEntry {
    /// Parsed payload; `None` when the stored JSON is corrupt.
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.payload).ok()
    }
}
