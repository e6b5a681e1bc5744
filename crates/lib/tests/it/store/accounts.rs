//! Account creation and lookup behavior across backends.

use datastash::store::DataStore;
use datastash::Id;
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn file_duplicate_username_rejected() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;

    let first = store.create_account("alice", "hash-1").await.unwrap();
    let err = store.create_account("alice", "hash-2").await.unwrap_err();
    assert!(err.is_duplicate_username());

    // The first account is unchanged by the failed attempt.
    let found = store
        .find_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, first);
    assert_eq!(found.credential, "hash-1");
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_duplicate_username_rejected() {
    let store = sqlite_store().await;

    let first = store.create_account("alice", "hash-1").await.unwrap();
    let err = store.create_account("alice", "hash-2").await.unwrap_err();
    assert!(err.is_duplicate_username());

    let found = store
        .find_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, first);
    assert_eq!(found.credential, "hash-1");
}

#[tokio::test]
async fn file_read_after_write_by_id_and_username() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;

    let account = store.create_account("bob", "hash").await.unwrap();
    let by_id = store.find_account_by_id(&account.id).await.unwrap();
    assert_eq!(by_id.as_ref(), Some(&account));
    let by_name = store.find_account_by_username("bob").await.unwrap();
    assert_eq!(by_name.as_ref(), Some(&account));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_read_after_write_by_id_and_username() {
    let store = sqlite_store().await;

    let account = store.create_account("bob", "hash").await.unwrap();
    let by_id = store.find_account_by_id(&account.id).await.unwrap();
    assert_eq!(by_id.as_ref(), Some(&account));
    let by_name = store.find_account_by_username("bob").await.unwrap();
    assert_eq!(by_name.as_ref(), Some(&account));
}

#[tokio::test]
async fn file_absent_lookups_return_none() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;

    assert!(store
        .find_account_by_username("nobody")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_account_by_id(&Id::from("no-such-id"))
        .await
        .unwrap()
        .is_none());
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_absent_lookups_return_none() {
    let store = sqlite_store().await;

    assert!(store
        .find_account_by_username("nobody")
        .await
        .unwrap()
        .is_none());
    // A rowid that doesn't exist
    assert!(store
        .find_account_by_id(&Id::from("424242"))
        .await
        .unwrap()
        .is_none());
    // An id of a shape this backend never produced is a miss, not an error
    assert!(store
        .find_account_by_id(&Id::from("not-a-rowid"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn usernames_are_case_sensitive() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;

    store.create_account("Alice", "hash-upper").await.unwrap();
    // Different case is a different account, not a duplicate.
    store.create_account("alice", "hash-lower").await.unwrap();

    let upper = store
        .find_account_by_username("Alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upper.credential, "hash-upper");
    let lower = store
        .find_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lower.credential, "hash-lower");
}
