//! MongoDB-backed store implementation.
//!
//! Accounts and entries live in two collections of a remote deployment.
//! A unique index on `username` gives atomic duplicate rejection at the
//! storage layer; there is deliberately no application-level pre-check,
//! since only the index can be trusted under concurrency. Compound indexes
//! on `(owner_id, category)` and `(owner_id, created_at desc)` serve the
//! listing queries and are created idempotently at connect time.
//!
//! Identity is the driver's `ObjectId`, normalized to its hex string form
//! at the API boundary so callers see the same opaque [`Id`] shape as with
//! every other backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::store::errors::StoreError;
use crate::store::DataStore;
use crate::types::{
    Account, AccountProfile, AccountSummary, DataEntry, Id, StoreStats, summarize_sorted,
};
use crate::Result;

/// MongoDB duplicate-key error code (E11000).
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Extension trait for mongodb Result types to simplify error handling.
trait MongoResultExt<T> {
    /// Convert a driver error to `StoreError::Mongo` with a context message.
    fn mongo_context(self, context: &str) -> Result<T>;
}

impl<T> MongoResultExt<T> for std::result::Result<T, mongodb::error::Error> {
    fn mongo_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            StoreError::Mongo {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// Wire form of an account document.
#[derive(Debug, Serialize, Deserialize)]
struct AccountDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    username: String,
    credential: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

/// Wire form of an entry document.
///
/// `owner_id` is stored in its normalized string form: callers only ever
/// hold normalized ids, and the compound indexes must match the queried
/// type exactly.
#[derive(Debug, Serialize, Deserialize)]
struct EntryDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    owner_id: String,
    category: String,
    payload: Value,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

/// A store backed by a remote MongoDB deployment.
///
/// Tie order for equal `created_at` values is higher `_id` first
/// (sort `{created_at: -1, _id: -1}`).
pub struct MongoStore {
    client: Client,
    accounts: Collection<AccountDoc>,
    entries: Collection<EntryDoc>,
    clock: Arc<dyn Clock>,
}

impl MongoStore {
    /// Connect to `uri`, open `database`, and ensure indexes exist.
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        Self::connect_with_clock(uri, database, Arc::new(SystemClock)).await
    }

    /// Connect with an injected clock.
    pub async fn connect_with_clock(
        uri: &str,
        database: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .mongo_context("Failed to connect to MongoDB")?;
        let db = client.database(database);
        let store = Self {
            accounts: db.collection("accounts"),
            entries: db.collection("entries"),
            client,
            clock,
        };

        store.ensure_indexes().await?;

        let account_count = store
            .accounts
            .count_documents(doc! {})
            .await
            .mongo_context("Failed to count accounts")?;
        let entry_count = store
            .entries
            .count_documents(doc! {})
            .await
            .mongo_context("Failed to count entries")?;
        info!(database, account_count, entry_count, "MongoDB store initialized");

        Ok(store)
    }

    /// Create the username uniqueness index and the listing indexes.
    ///
    /// `create_index` is idempotent for identical specs, so reconnecting is
    /// safe.
    async fn ensure_indexes(&self) -> Result<()> {
        let unique_username = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.accounts
            .create_index(unique_username)
            .await
            .mongo_context("Failed to create username index")?;

        let owner_category = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "category": 1 })
            .build();
        self.entries
            .create_index(owner_category)
            .await
            .mongo_context("Failed to create owner/category index")?;

        let owner_created = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "created_at": -1 })
            .build();
        self.entries
            .create_index(owner_created)
            .await
            .mongo_context("Failed to create owner/created_at index")?;

        Ok(())
    }

    async fn find_entries(&self, filter: Document) -> Result<Vec<DataEntry>> {
        let cursor = self
            .entries
            .find(filter)
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await
            .mongo_context("Failed to query entries")?;
        let docs: Vec<EntryDoc> = cursor
            .try_collect()
            .await
            .mongo_context("Failed to read entry cursor")?;
        docs.into_iter().map(entry_from_doc).collect()
    }

    /// Millisecond-truncated now, so the returned timestamp matches what
    /// BSON stores.
    fn now_millis(&self) -> DateTime<Utc> {
        mongodb::bson::DateTime::from_chrono(self.clock.now()).to_chrono()
    }
}

/// True if the error is a duplicate-key write rejection (E11000).
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_err)) => {
            write_err.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}

fn account_from_doc(doc: AccountDoc) -> Result<Account> {
    let id = doc.id.ok_or_else(|| StoreError::Mongo {
        reason: "Account document missing _id".to_string(),
        source: None,
    })?;
    Ok(Account {
        id: Id::new(id.to_hex()),
        username: doc.username,
        credential: doc.credential,
        created_at: doc.created_at,
    })
}

fn entry_from_doc(doc: EntryDoc) -> Result<DataEntry> {
    let id = doc.id.ok_or_else(|| StoreError::Mongo {
        reason: "Entry document missing _id".to_string(),
        source: None,
    })?;
    Ok(DataEntry {
        id: Id::new(id.to_hex()),
        owner_id: Id::new(doc.owner_id),
        category: doc.category,
        payload: doc.payload,
        created_at: doc.created_at,
    })
}

#[async_trait]
impl DataStore for MongoStore {
    async fn create_account(&self, username: &str, credential: &str) -> Result<Account> {
        let created_at = self.now_millis();
        let account_doc = AccountDoc {
            id: None,
            username: username.to_string(),
            credential: credential.to_string(),
            created_at,
        };

        let result = match self.accounts.insert_one(account_doc).await {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => {
                return Err(StoreError::DuplicateUsername {
                    username: username.to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(StoreError::Mongo {
                    reason: format!("Failed to insert account: {e}"),
                    source: Some(e),
                }
                .into());
            }
        };

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Mongo {
                reason: "Insert did not return an ObjectId".to_string(),
                source: None,
            })?;

        info!(username, id = %id.to_hex(), "Created account");
        Ok(Account {
            id: Id::new(id.to_hex()),
            username: username.to_string(),
            credential: credential.to_string(),
            created_at,
        })
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let doc = self
            .accounts
            .find_one(doc! { "username": username })
            .await
            .mongo_context("Failed to find account by username")?;
        doc.map(account_from_doc).transpose()
    }

    async fn find_account_by_id(&self, id: &Id) -> Result<Option<Account>> {
        // Ids from other backends don't parse as ObjectIds; that's a miss.
        let Ok(object_id) = ObjectId::parse_str(id.as_str()) else {
            return Ok(None);
        };

        let doc = self
            .accounts
            .find_one(doc! { "_id": object_id })
            .await
            .mongo_context("Failed to find account by id")?;
        doc.map(account_from_doc).transpose()
    }

    async fn save_entry(&self, owner: &Id, category: &str, payload: Value) -> Result<DataEntry> {
        let created_at = self.now_millis();
        let entry_doc = EntryDoc {
            id: None,
            owner_id: owner.to_string(),
            category: category.to_string(),
            payload: payload.clone(),
            created_at,
        };

        let result = self
            .entries
            .insert_one(entry_doc)
            .await
            .mongo_context("Failed to insert entry")?;
        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Mongo {
                reason: "Insert did not return an ObjectId".to_string(),
                source: None,
            })?;

        debug!(owner = %owner, category, id = %id.to_hex(), "Saved entry");
        Ok(DataEntry {
            id: Id::new(id.to_hex()),
            owner_id: owner.clone(),
            category: category.to_string(),
            payload,
            created_at,
        })
    }

    async fn list_entries(&self, owner: &Id, category: &str) -> Result<Vec<DataEntry>> {
        self.find_entries(doc! { "owner_id": owner.as_str(), "category": category })
            .await
    }

    async fn list_all_entries(&self, owner: &Id) -> Result<Vec<DataEntry>> {
        self.find_entries(doc! { "owner_id": owner.as_str() }).await
    }

    async fn summarize(&self, owner: &Id) -> Result<Option<AccountSummary>> {
        let Some(account) = self.find_account_by_id(owner).await? else {
            return Ok(None);
        };

        // Entries arrive pre-sorted newest-first from find_entries.
        let entries = self.list_all_entries(owner).await?;
        Ok(Some(AccountSummary {
            account: AccountProfile::from(&account),
            categories: summarize_sorted(&entries),
        }))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let account_count = self
            .accounts
            .count_documents(doc! {})
            .await
            .mongo_context("Failed to count accounts")?;
        let entry_count = self
            .entries
            .count_documents(doc! {})
            .await
            .mongo_context("Failed to count entries")?;

        Ok(StoreStats {
            account_count,
            entry_count,
        })
    }

    async fn close(&self) -> Result<()> {
        // Client handles are cheap clones of one inner connection manager;
        // shutdown consumes a handle.
        self.client.clone().shutdown().await;
        info!("MongoDB store closed");
        Ok(())
    }
}
