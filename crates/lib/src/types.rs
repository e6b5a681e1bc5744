//! Domain model shared by all storage backends.
//!
//! Identity is deliberately opaque: every backend normalizes its native key
//! (uuid, rowid, ObjectId) to the string-shaped [`Id`] at the API boundary,
//! so callers never depend on a particular backend's key format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque identifier for an [`Account`] or [`DataEntry`].
///
/// Backends assign these at creation time and never reuse or mutate them.
/// The wrapped string's shape differs per backend and must not be parsed by
/// callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Id(String);

impl Id {
    /// Creates a new Id from any string-like input.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the Id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&Id> for Id {
    fn from(id: &Id) -> Self {
        id.clone()
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl std::ops::Deref for Id {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

// Serialize as a bare string so persisted documents stay flat.
impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Id)
    }
}

/// A registered user identity.
///
/// `credential` is a pre-hashed secret supplied by an external collaborator;
/// the store never hashes or verifies it. `username` is unique across all
/// accounts (case-sensitive exact match) and immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Id,
    pub username: String,
    pub credential: String,
    pub created_at: DateTime<Utc>,
}

/// An immutable, owner-scoped, categorized record holding an arbitrary payload.
///
/// `owner_id` is a weak reference: the store does not check that the account
/// exists at write time and deleting an account would not cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub id: Id,
    pub owner_id: Id,
    pub category: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Public slice of an [`Account`], safe to echo to callers.
///
/// The credential is intentionally absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: Id,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            created_at: account.created_at,
        }
    }
}

/// Per-category rollup inside an [`AccountSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    /// The most recent entry in this category.
    pub latest: DataEntry,
}

/// All of one owner's entries grouped by category.
///
/// Categories appear in order of first encounter while scanning newest-first,
/// i.e. the most recently active category comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account: AccountProfile,
    pub categories: Vec<CategorySummary>,
}

/// Aggregate counts across the whole store.
///
/// The two counts are read independently; under concurrent writes they may
/// reflect slightly different moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub account_count: u64,
    pub entry_count: u64,
}

/// Groups entries by category, preserving first-encounter order.
///
/// The input must already be sorted newest-first; the resulting category
/// order is then "most recently active first" and each group's `latest` is
/// simply the first entry seen for that category. All backends sort before
/// grouping so this order is deterministic everywhere.
pub(crate) fn summarize_sorted(entries: &[DataEntry]) -> Vec<CategorySummary> {
    let mut categories: Vec<CategorySummary> = Vec::new();
    for entry in entries {
        match categories.iter_mut().find(|c| c.category == entry.category) {
            Some(summary) => summary.count += 1,
            None => categories.push(CategorySummary {
                category: entry.category.clone(),
                count: 1,
                latest: entry.clone(),
            }),
        }
    }
    categories
}
