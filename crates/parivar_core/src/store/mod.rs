//! Storage contracts for the create-flow's two shared mutable resources.
//!
//! # Responsibility
//! - Define the remote document-store and local key-value contracts the
//!   reconciler is written against.
//! - Isolate backend details (SQLite, in-memory doubles) behind traits.
//!
//! # Invariants
//! - Contracts carry no optimistic-concurrency token; read-then-write callers
//!   can clobber each other, which the reconciler documents as accepted.
//! - Backends return semantic errors (`NotFound`, `Unavailable`) in addition
//!   to transport errors.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod document_store;
pub mod kv_store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer error shared by remote-document and local-KV backends.
#[derive(Debug)]
pub enum StoreError {
    /// Backend unreachable or deliberately offline.
    Unavailable(String),
    /// Targeted document does not exist.
    NotFound { collection: String, id: String },
    /// Persisted or supplied payload could not be interpreted.
    InvalidData(String),
    /// Local database opened without its migrations applied.
    UninitializedDatabase {
        expected_version: u32,
        actual_version: u32,
    },
    /// Local database is missing a required table.
    MissingTable(&'static str),
    /// Local database transport failure.
    Db(DbError),
    /// Shared backend state was poisoned by a panicking writer.
    Poisoned(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(detail) => write!(f, "store unavailable: {detail}"),
            Self::NotFound { collection, id } => {
                write!(f, "document not found: {collection}/{id}")
            }
            Self::InvalidData(detail) => write!(f, "invalid stored data: {detail}"),
            Self::UninitializedDatabase {
                expected_version,
                actual_version,
            } => write!(
                f,
                "local database not migrated: expected schema version {expected_version}, found {actual_version}"
            ),
            Self::MissingTable(table) => write!(f, "local database missing table `{table}`"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Poisoned(what) => write!(f, "storage state poisoned: {what}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
