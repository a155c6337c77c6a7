//! Integration tests for the pending-operation queue and the JSON cache.

use serde_json::json;
use stride_db::models::queue::{NewPendingOperation, OperationKind};
use stride_db::repositories::{CacheRepo, QueueRepo};

#[tokio::test]
async fn enqueue_and_list_preserves_order() {
    let pool = stride_db::open_in_memory().await.unwrap();

    let first = QueueRepo::enqueue(
        &pool,
        &NewPendingOperation::new("profiles", "a", OperationKind::Insert),
    )
    .await
    .unwrap();
    let second = QueueRepo::enqueue(
        &pool,
        &NewPendingOperation::new("profiles", "b", OperationKind::Delete),
    )
    .await
    .unwrap();

    let pending = QueueRepo::list_pending(&pool).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].op_id, first, "oldest first");
    assert_eq!(pending[1].op_id, second);
    assert_eq!(pending[0].kind(), Some(OperationKind::Insert));
    assert_eq!(pending[1].kind(), Some(OperationKind::Delete));
}

#[tokio::test]
async fn payload_round_trips_as_json() {
    let pool = stride_db::open_in_memory().await.unwrap();
    let payload = json!({"name": "ciphertext==", "age": 5});

    QueueRepo::enqueue(
        &pool,
        &NewPendingOperation::new("profiles", "p1", OperationKind::Insert)
            .with_payload(payload.clone()),
    )
    .await
    .unwrap();

    let pending = QueueRepo::list_pending(&pool).await.unwrap();
    assert_eq!(pending[0].payload_json(), Some(payload));
}

#[tokio::test]
async fn mark_synced_retires_exactly_once() {
    let pool = stride_db::open_in_memory().await.unwrap();
    let op_id = QueueRepo::enqueue(
        &pool,
        &NewPendingOperation::new("profiles", "p1", OperationKind::Update),
    )
    .await
    .unwrap();

    assert_eq!(QueueRepo::pending_count(&pool).await.unwrap(), 1);
    assert!(QueueRepo::mark_synced(&pool, op_id).await.unwrap());
    assert!(!QueueRepo::mark_synced(&pool, op_id).await.unwrap());
    assert_eq!(QueueRepo::pending_count(&pool).await.unwrap(), 0);

    // Retired, not purged: the row stays for audit.
    assert!(QueueRepo::list_pending(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_operation_kind_parses_to_none() {
    assert_eq!(OperationKind::parse("upsert"), None);
    assert_eq!(OperationKind::parse("delete"), Some(OperationKind::Delete));
}

#[tokio::test]
async fn cache_put_get_list_remove() {
    let pool = stride_db::open_in_memory().await.unwrap();

    CacheRepo::put(&pool, "profiles", "p1", &json!({"age": 4}))
        .await
        .unwrap();
    CacheRepo::put(&pool, "profiles", "p2", &json!({"age": 6}))
        .await
        .unwrap();
    // Replace is in-place.
    CacheRepo::put(&pool, "profiles", "p1", &json!({"age": 5}))
        .await
        .unwrap();

    let entry = CacheRepo::get(&pool, "profiles", "p1").await.unwrap().unwrap();
    assert_eq!(entry.payload_json().unwrap()["age"], 5);
    assert_eq!(CacheRepo::list(&pool, "profiles").await.unwrap().len(), 2);
    assert!(CacheRepo::list(&pool, "content").await.unwrap().is_empty());

    assert!(CacheRepo::remove(&pool, "profiles", "p2").await.unwrap());
    assert!(!CacheRepo::remove(&pool, "profiles", "p2").await.unwrap());
    assert_eq!(CacheRepo::list(&pool, "profiles").await.unwrap().len(), 1);
}

#[tokio::test]
async fn put_with_operation_commits_entry_and_op_together() {
    let pool = stride_db::open_in_memory().await.unwrap();
    let payload = json!({"name": "ciphertext=="});
    let op = NewPendingOperation::new("profiles", "p1", OperationKind::Insert)
        .with_payload(payload.clone());

    let op_id = CacheRepo::put_with_operation(&pool, "profiles", "p1", &payload, &op)
        .await
        .unwrap();

    // One transaction: the cached document and its queued intent land as a
    // pair, never one without the other.
    let entry = CacheRepo::get(&pool, "profiles", "p1").await.unwrap().unwrap();
    assert_eq!(entry.payload_json(), Some(payload.clone()));
    let pending = QueueRepo::list_pending(&pool).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].op_id, op_id);
    assert_eq!(pending[0].target_record_id, "p1");
    assert_eq!(pending[0].payload_json(), Some(payload));
}
