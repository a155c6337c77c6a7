//! The document-store trait the core consumes.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;

/// Write mode for [`DocumentStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole document.
    Replace,
    /// Shallow field overlay: supplied top-level fields overwrite, absent
    /// fields are left untouched, the document is created if missing.
    Merge,
}

/// A document-oriented remote store.
///
/// Collections hold JSON documents keyed by opaque string ids. Every call
/// suspends for remote I/O and returns a typed [`RemoteError`] on failure;
/// implementations must enforce a bounded timeout so a dead network cannot
/// hang callers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document. `Ok(None)` when absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, RemoteError>;

    /// Fetch all documents whose fields equal every `(field, value)` filter.
    /// Returns `(id, document)` pairs.
    async fn query(
        &self,
        collection: &str,
        filters: &[(String, Value)],
    ) -> Result<Vec<(String, Value)>, RemoteError>;

    /// Create or overwrite a document.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
        mode: SetMode,
    ) -> Result<(), RemoteError>;

    /// Overlay fields onto an existing document; [`RemoteError::NotFound`]
    /// when it does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), RemoteError>;

    /// Delete a document. Deleting an absent document is
    /// [`RemoteError::NotFound`].
    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

/// Build an equality filter list.
pub fn filters(pairs: &[(&str, &str)]) -> Vec<(String, Value)> {
    pairs
        .iter()
        .map(|(field, value)| (field.to_string(), Value::String(value.to_string())))
        .collect()
}
