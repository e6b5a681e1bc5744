//! SQLite schema definition and migrations.
//!
//! The schema is created idempotently on connect. Migrations are code-based
//! functions run sequentially against the `schema_version` row.
//!
//! # Adding a New Migration
//!
//! 1. Increment `SCHEMA_VERSION`
//! 2. Add a new `migrate_vN_to_vM` async function
//! 3. Add the migration to the match statement in `run_migration`

use sqlx::SqlitePool;

use super::SqlxResultExt;
use crate::store::errors::StoreError;
use crate::Result;

/// Current schema version.
///
/// Increment this when making schema changes that require migration.
pub const SCHEMA_VERSION: i64 = 1;

/// SQL statements to create the schema tables.
///
/// The `owner_id` foreign key on `entries` is declared but not enforced:
/// SQLite leaves `PRAGMA foreign_keys` off by default and this schema relies
/// on that — the owner reference is weak by design.
pub const CREATE_TABLES: &[&str] = &[
    // Schema version tracking
    "CREATE TABLE IF NOT EXISTS schema_version (
        version BIGINT PRIMARY KEY
    )",
    // Accounts; the UNIQUE constraint on username is the authoritative
    // duplicate-registration guard
    "CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        credential TEXT NOT NULL,
        created_at BIGINT NOT NULL
    )",
    // Data entries; payload is an opaque serialized JSON text blob,
    // created_at is unix milliseconds
    "CREATE TABLE IF NOT EXISTS entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id BIGINT NOT NULL REFERENCES accounts(id),
        category TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at BIGINT NOT NULL
    )",
];

/// SQL statements to create indexes for the listing queries.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_entries_owner_category ON entries(owner_id, category)",
    "CREATE INDEX IF NOT EXISTS idx_entries_owner_created ON entries(owner_id, created_at DESC)",
];

/// Initialize the database schema.
///
/// Creates tables and indexes if they don't exist, and handles migrations
/// if the schema version has changed.
pub async fn initialize(pool: &SqlitePool) -> Result<()> {
    for statement in CREATE_TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Sqlx {
                reason: format!("Schema creation failed: {e} - SQL: {statement}"),
                source: Some(e),
            })?;
    }

    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version")
        .fetch_optional(pool)
        .await
        .sql_context("Failed to check schema version")?;

    match row {
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await
                .sql_context("Failed to initialize schema version")?;
        }
        Some((current_version,)) if current_version < SCHEMA_VERSION => {
            migrate(pool, current_version, SCHEMA_VERSION).await?;
        }
        Some(_) => {}
    }

    for statement in CREATE_INDEXES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Sqlx {
                reason: format!("Index creation failed: {e} - SQL: {statement}"),
                source: Some(e),
            })?;
    }

    Ok(())
}

/// Run migrations sequentially from one schema version to another.
async fn migrate(pool: &SqlitePool, from: i64, to: i64) -> Result<()> {
    tracing::info!(from, to, "Starting schema migration");

    let mut current = from;
    while current < to {
        let next = current + 1;
        tracing::info!(from = current, to = next, "Running migration");

        run_migration(pool, current, next).await?;

        sqlx::query("UPDATE schema_version SET version = $1")
            .bind(next)
            .execute(pool)
            .await
            .sql_context("Failed to update schema version")?;

        tracing::info!(version = next, "Migration completed");
        current = next;
    }

    Ok(())
}

/// Execute a single migration step.
///
/// Each migration is a separate async function that handles the schema
/// change. Add new migrations here as match arms when `SCHEMA_VERSION`
/// grows.
async fn run_migration(pool: &SqlitePool, from: i64, to: i64) -> Result<()> {
    // No migrations exist yet; reaching this means SCHEMA_VERSION was
    // incremented without adding one.
    let _ = pool;

    Err(StoreError::Sqlx {
        reason: format!("Unknown migration path: v{from} to v{to}"),
        source: None,
    }
    .into())
}
