//! In-memory [`DocumentStore`] used by integration tests.
//!
//! Behaves like the HTTP backend but keeps everything in a map, and
//! exposes switches to simulate outages and per-document write failures.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;
use crate::store::{DocumentStore, SetMode};

type Collection = BTreeMap<String, Value>;

/// In-memory fake of the remote document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    offline: AtomicBool,
    failing_ids: RwLock<HashSet<String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, every call fails with [`RemoteError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make writes (set/update/delete) for `id` fail with
    /// [`RemoteError::Unknown`] until cleared via [`Self::clear_failures`].
    pub fn fail_writes_for(&self, id: &str) {
        self.failing_ids
            .write()
            .expect("failing_ids lock poisoned")
            .insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_ids
            .write()
            .expect("failing_ids lock poisoned")
            .clear();
    }

    /// Number of documents currently in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .expect("collections lock poisoned")
            .get(collection)
            .map_or(0, Collection::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("remote unreachable".into()));
        }
        Ok(())
    }

    fn check_writable(&self, id: &str) -> Result<(), RemoteError> {
        self.check_online()?;
        if self
            .failing_ids
            .read()
            .expect("failing_ids lock poisoned")
            .contains(id)
        {
            return Err(RemoteError::Unknown(format!("write rejected for {id}")));
        }
        Ok(())
    }
}

/// Shallow merge: top-level keys of `incoming` overwrite `existing`.
fn merge_fields(existing: &mut Value, incoming: Value) {
    match (existing.as_object_mut(), incoming) {
        (Some(target), Value::Object(source)) => {
            for (key, value) in source {
                target.insert(key, value);
            }
        }
        (_, incoming) => *existing = incoming,
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, RemoteError> {
        self.check_online()?;
        let collections = self.collections.read().expect("collections lock poisoned");
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[(String, Value)],
    ) -> Result<Vec<(String, Value)>, RemoteError> {
        self.check_online()?;
        let collections = self.collections.read().expect("collections lock poisoned");
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let matches = docs
            .iter()
            .filter(|(_, fields)| {
                filters
                    .iter()
                    .all(|(field, value)| fields.get(field) == Some(value))
            })
            .map(|(id, fields)| (id.clone(), fields.clone()))
            .collect();
        Ok(matches)
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
        mode: SetMode,
    ) -> Result<(), RemoteError> {
        self.check_writable(id)?;
        let mut collections = self.collections.write().expect("collections lock poisoned");
        let docs = collections.entry(collection.to_string()).or_default();
        match mode {
            SetMode::Replace => {
                docs.insert(id.to_string(), fields);
            }
            SetMode::Merge => match docs.get_mut(id) {
                Some(existing) => merge_fields(existing, fields),
                None => {
                    docs.insert(id.to_string(), fields);
                }
            },
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), RemoteError> {
        self.check_writable(id)?;
        let mut collections = self.collections.write().expect("collections lock poisoned");
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_fields(existing, fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.check_writable(id)?;
        let mut collections = self.collections.write().expect("collections lock poisoned");
        let removed = collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_none() {
            return Err(RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::store::filters;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryDocumentStore::new();
        store
            .set("progress_records", "c1_m1", json!({"score": 80}), SetMode::Replace)
            .await
            .unwrap();

        let doc = store.get("progress_records", "c1_m1").await.unwrap();
        assert_eq!(doc, Some(json!({"score": 80})));
    }

    #[tokio::test]
    async fn merge_overwrites_only_given_keys() {
        let store = MemoryDocumentStore::new();
        store
            .set("p", "id", json!({"score": 40, "plays": 1}), SetMode::Replace)
            .await
            .unwrap();
        store
            .set("p", "id", json!({"score": 90}), SetMode::Merge)
            .await
            .unwrap();

        let doc = store.get("p", "id").await.unwrap().unwrap();
        assert_eq!(doc, json!({"score": 90, "plays": 1}));
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store.update("p", "nope", json!({"a": 1})).await.unwrap_err();
        assert_matches!(err, RemoteError::NotFound { .. });
    }

    #[tokio::test]
    async fn delete_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store.delete("p", "nope").await.unwrap_err();
        assert_matches!(err, RemoteError::NotFound { .. });
    }

    #[tokio::test]
    async fn offline_fails_every_call_with_network() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);

        let err = store.get("p", "id").await.unwrap_err();
        assert_matches!(err, RemoteError::Network(_));
        assert!(err.is_retryable());

        store.set_offline(false);
        assert!(store.get("p", "id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn per_document_write_failure_leaves_reads_working() {
        let store = MemoryDocumentStore::new();
        store
            .set("p", "ok", json!({"a": 1}), SetMode::Replace)
            .await
            .unwrap();
        store.fail_writes_for("bad");

        let err = store
            .set("p", "bad", json!({"a": 1}), SetMode::Replace)
            .await
            .unwrap_err();
        assert_matches!(err, RemoteError::Unknown(_));
        assert!(store.get("p", "ok").await.unwrap().is_some());

        store.clear_failures();
        store
            .set("p", "bad", json!({"a": 1}), SetMode::Replace)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn query_matches_on_all_filters() {
        let store = MemoryDocumentStore::new();
        store
            .set("p", "a", json!({"owner": "p1", "entity": "c1"}), SetMode::Replace)
            .await
            .unwrap();
        store
            .set("p", "b", json!({"owner": "p1", "entity": "c2"}), SetMode::Replace)
            .await
            .unwrap();
        store
            .set("p", "c", json!({"owner": "p2", "entity": "c1"}), SetMode::Replace)
            .await
            .unwrap();

        let rows = store
            .query("p", &filters(&[("owner", "p1"), ("entity", "c1")]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "a");

        let rows = store.query("p", &filters(&[("owner", "p1")])).await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
