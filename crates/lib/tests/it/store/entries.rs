//! Entry persistence, filtering, and ordering across backends.

use datastash::store::DataStore;
use datastash::Id;
use serde_json::json;
use tempfile::tempdir;

use crate::helpers::*;

/// The stepping clock hands out strictly increasing timestamps, so entries
/// come back newest-first in reverse creation order.
#[tokio::test]
async fn file_entries_ordered_newest_first() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;
    let alice = store.create_account("alice", "secret123").await.unwrap();

    store
        .save_entry(&alice.id, "notes", json!({"text": "hi"}))
        .await
        .unwrap();
    store
        .save_entry(&alice.id, "notes", json!({"text": "bye"}))
        .await
        .unwrap();

    let entries = store.list_entries(&alice.id, "notes").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].payload, json!({"text": "bye"}));
    assert_eq!(entries[1].payload, json!({"text": "hi"}));
    assert!(entries[0].created_at > entries[1].created_at);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_entries_ordered_newest_first() {
    let store = sqlite_store().await;
    let alice = store.create_account("alice", "secret123").await.unwrap();

    store
        .save_entry(&alice.id, "notes", json!({"text": "hi"}))
        .await
        .unwrap();
    store
        .save_entry(&alice.id, "notes", json!({"text": "bye"}))
        .await
        .unwrap();

    let entries = store.list_entries(&alice.id, "notes").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].payload, json!({"text": "bye"}));
    assert_eq!(entries[1].payload, json!({"text": "hi"}));
}

#[tokio::test]
async fn file_three_entries_reverse_chronological() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;
    let owner = store.create_account("owner", "hash").await.unwrap();

    let e1 = store
        .save_entry(&owner.id, "tasks", json!({"n": 1}))
        .await
        .unwrap();
    let e2 = store
        .save_entry(&owner.id, "tasks", json!({"n": 2}))
        .await
        .unwrap();
    let e3 = store
        .save_entry(&owner.id, "tasks", json!({"n": 3}))
        .await
        .unwrap();

    let ids: Vec<_> = store
        .list_entries(&owner.id, "tasks")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec![e3.id, e2.id, e1.id]);
}

#[tokio::test]
async fn file_category_filter_is_exact() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;
    let owner = store.create_account("owner", "hash").await.unwrap();

    let note = store
        .save_entry(&owner.id, "notes", json!({"kind": "note"}))
        .await
        .unwrap();
    store
        .save_entry(&owner.id, "tasks", json!({"kind": "task"}))
        .await
        .unwrap();

    let notes = store.list_entries(&owner.id, "notes").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, note.id);

    let all = store.list_all_entries(&owner.id).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_category_filter_is_exact() {
    let store = sqlite_store().await;
    let owner = store.create_account("owner", "hash").await.unwrap();

    let note = store
        .save_entry(&owner.id, "notes", json!({"kind": "note"}))
        .await
        .unwrap();
    store
        .save_entry(&owner.id, "tasks", json!({"kind": "task"}))
        .await
        .unwrap();

    let notes = store.list_entries(&owner.id, "notes").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, note.id);

    let all = store.list_all_entries(&owner.id).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn file_payload_round_trips_structurally() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;
    let owner = store.create_account("owner", "hash").await.unwrap();

    let payload = json!({
        "title": "deep",
        "tags": ["a", "b"],
        "nested": {"level": 2, "flag": true, "inner": {"pi": 3.5, "none": null}},
    });
    let saved = store
        .save_entry(&owner.id, "docs", payload.clone())
        .await
        .unwrap();
    assert_eq!(saved.payload, payload);

    let read_back = store.list_entries(&owner.id, "docs").await.unwrap();
    assert_eq!(read_back[0].payload, payload);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_payload_round_trips_structurally() {
    let store = sqlite_store().await;
    let owner = store.create_account("owner", "hash").await.unwrap();

    let payload = json!({
        "title": "deep",
        "tags": ["a", "b"],
        "nested": {"level": 2, "flag": true, "inner": {"pi": 3.5, "none": null}},
    });
    store
        .save_entry(&owner.id, "docs", payload.clone())
        .await
        .unwrap();

    let read_back = store.list_entries(&owner.id, "docs").await.unwrap();
    assert_eq!(read_back[0].payload, payload);
}

#[tokio::test]
async fn file_save_entry_does_not_check_owner() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;

    // Owner references are weak: saving under an unknown owner succeeds.
    let ghost = Id::from("ghost-owner");
    let entry = store
        .save_entry(&ghost, "notes", json!({"orphan": true}))
        .await
        .unwrap();
    assert_eq!(entry.owner_id, ghost);

    let listed = store.list_all_entries(&ghost).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn file_stats_count_both_kinds() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;
    let a = store.create_account("a", "hash").await.unwrap();
    store.create_account("b", "hash").await.unwrap();
    store
        .save_entry(&a.id, "notes", json!({"x": 1}))
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.account_count, 2);
    assert_eq!(stats.entry_count, 1);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_stats_count_both_kinds() {
    let store = sqlite_store().await;
    let a = store.create_account("a", "hash").await.unwrap();
    store.create_account("b", "hash").await.unwrap();
    store
        .save_entry(&a.id, "notes", json!({"x": 1}))
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.account_count, 2);
    assert_eq!(stats.entry_count, 1);
}
