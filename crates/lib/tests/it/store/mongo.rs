//! MongoDB backend tests.
//!
//! These need a live deployment; they run only when
//! `DATASTASH_TEST_MONGODB_URI` is set (e.g. `mongodb://localhost:27017`)
//! and self-skip otherwise. Each test uses a uniquely named database so
//! runs never interfere with each other.

use datastash::store::{DataStore, MongoStore};
use datastash::Id;
use serde_json::json;
use uuid::Uuid;

use crate::helpers::StepClock;

async fn mongo_store() -> Option<MongoStore> {
    let uri = match std::env::var("DATASTASH_TEST_MONGODB_URI") {
        Ok(uri) => uri,
        Err(_) => {
            eprintln!("DATASTASH_TEST_MONGODB_URI not set, skipping MongoDB test");
            return None;
        }
    };
    let database = format!("datastash_test_{}", Uuid::new_v4().simple());
    Some(
        MongoStore::connect_with_clock(&uri, &database, StepClock::default_steps())
            .await
            .expect("failed to connect to test MongoDB"),
    )
}

#[tokio::test]
async fn mongo_duplicate_username_rejected_by_index() {
    let Some(store) = mongo_store().await else {
        return;
    };

    let first = store.create_account("alice", "hash-1").await.unwrap();
    let err = store.create_account("alice", "hash-2").await.unwrap_err();
    assert!(err.is_duplicate_username());

    let found = store
        .find_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.credential, first.credential);
    store.close().await.unwrap();
}

#[tokio::test]
async fn mongo_entries_ordered_and_round_tripped() {
    let Some(store) = mongo_store().await else {
        return;
    };

    let alice = store.create_account("alice", "secret123").await.unwrap();
    store
        .save_entry(&alice.id, "notes", json!({"text": "hi"}))
        .await
        .unwrap();
    store
        .save_entry(&alice.id, "notes", json!({"text": "bye", "nested": {"deep": [1, 2]}}))
        .await
        .unwrap();

    let entries = store.list_entries(&alice.id, "notes").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0].payload,
        json!({"text": "bye", "nested": {"deep": [1, 2]}})
    );
    assert_eq!(entries[1].payload, json!({"text": "hi"}));
    store.close().await.unwrap();
}

#[tokio::test]
async fn mongo_ids_are_normalized_strings() {
    let Some(store) = mongo_store().await else {
        return;
    };

    let account = store.create_account("norm", "hash").await.unwrap();
    // ObjectId hex form: 24 lowercase hex characters.
    assert_eq!(account.id.as_str().len(), 24);
    assert!(account
        .id
        .as_str()
        .chars()
        .all(|c| c.is_ascii_hexdigit()));

    // A foreign-shaped id is a miss, not an error.
    assert!(store
        .find_account_by_id(&Id::from("not-an-object-id"))
        .await
        .unwrap()
        .is_none());
    store.close().await.unwrap();
}

#[tokio::test]
async fn mongo_summary_groups_by_category() {
    let Some(store) = mongo_store().await else {
        return;
    };

    let owner = store.create_account("owner", "hash").await.unwrap();
    store
        .save_entry(&owner.id, "notes", json!({"n": 1}))
        .await
        .unwrap();
    store
        .save_entry(&owner.id, "tasks", json!({"n": 2}))
        .await
        .unwrap();

    let summary = store.summarize(&owner.id).await.unwrap().unwrap();
    assert_eq!(summary.categories.len(), 2);
    assert_eq!(summary.categories[0].category, "tasks");
    assert_eq!(summary.categories[1].category, "notes");

    assert!(store.summarize(&Id::from("no-such-owner")).await.unwrap().is_none());
    store.close().await.unwrap();
}
