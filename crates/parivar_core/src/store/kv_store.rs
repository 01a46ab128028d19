//! Local key-value store contract and backends.
//!
//! # Responsibility
//! - Persist single JSON blobs by exact key (create-flow draft, permission
//!   summary) with no versioning and no payload migration.
//! - Guard the SQLite backend against unmigrated connections.
//!
//! # Invariants
//! - `get` after `remove` returns `None`.
//! - `set` overwrites any previous value for the key.

use crate::db::migrations::latest_version;
use crate::store::{StoreError, StoreResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Mutex;

const KV_TABLE: &str = "kv_entries";

/// Contract over local single-key persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` when the key is absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes the key entirely; absent keys are not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// SQLite-backed key-value store over an owned, migrated connection.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Wraps a connection after verifying migrations have been applied.
    ///
    /// # Errors
    /// - `UninitializedDatabase` when `PRAGMA user_version` is behind the
    ///   latest known migration.
    /// - `MissingTable` when the key-value table is absent.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let expected_version = latest_version();
        if actual_version < expected_version {
            return Err(StoreError::UninitializedDatabase {
                expected_version,
                actual_version,
            });
        }

        let table_present: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1;",
                [KV_TABLE],
                |row| row.get(0),
            )
            .optional()?;
        if table_present.is_none() {
            return Err(StoreError::MissingTable(KV_TABLE));
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, apply: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Poisoned("sqlite key-value connection"))?;
        apply(&conn)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1;",
                    [key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;",
                params![key, value],
            )?;
            Ok(())
        })
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
            Ok(())
        })
    }
}

/// In-memory key-value store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> StoreResult<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Poisoned("memory key-value store"))?;
        Ok(apply(&mut entries))
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}
