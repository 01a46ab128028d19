//! Remote document-store contract and in-process implementation.
//!
//! # Responsibility
//! - Express the effective contract the create-flow needs from its remote
//!   document database: get/create/set/update plus one equality query.
//! - Model the write sentinels the flow relies on: set-union append, field
//!   delete, and server-assigned timestamps.
//!
//! # Invariants
//! - `update_document` fails with `NotFound` for absent documents;
//!   `set_document` never does.
//! - `ArrayUnion` appends a value only when no equal value is present.

use crate::model::draft::epoch_millis_now;
use crate::store::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Remote document payload: field name to JSON value.
pub type Document = serde_json::Map<String, Value>;

/// One field write, including the sentinel forms.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteValue {
    /// Plain field assignment.
    Set(Value),
    /// Set-union append: each value is added only if not already present.
    ArrayUnion(Vec<Value>),
    /// Removes the field entirely.
    Delete,
    /// Server-assigned epoch-millis timestamp.
    ServerTimestamp,
}

/// Ordered field writes applied to one document.
pub type WritePatch = Vec<(&'static str, WriteValue)>;

/// Contract over the remote document database.
///
/// Two collections matter to this crate: `users/{id}` and `families/{id}`.
/// The contract carries no transaction or version-check surface; the
/// reconciler documents the resulting last-writer-wins behavior.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the document's fields, or `None` when it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Creates a document with a store-assigned id and returns that id.
    async fn create_document(&self, collection: &str, patch: WritePatch) -> StoreResult<String>;

    /// Writes fields at a known id. `merge` performs field-level upsert;
    /// without it the document is replaced.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        patch: WritePatch,
        merge: bool,
    ) -> StoreResult<()>;

    /// Updates fields of an existing document; fails when it is absent.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: WritePatch,
    ) -> StoreResult<()>;

    /// Equality query on one field, capped at `limit` results.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: u32,
    ) -> StoreResult<Vec<Document>>;
}

/// In-process document store.
///
/// Backs tests and local development; the hosting app supplies the real
/// remote-database adapter in production. The `offline` toggle makes every
/// call fail with `Unavailable` so degraded-path behavior can be exercised.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Document>>>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles simulated connectivity loss.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of documents currently held in one collection.
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .map(|collections| {
                collections
                    .get(collection)
                    .map(BTreeMap::len)
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory document store is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn with_collections<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, BTreeMap<String, Document>>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::Poisoned("memory document store"))?;
        apply(&mut collections)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.check_online()?;
        self.with_collections(|collections| {
            Ok(collections
                .get(collection)
                .and_then(|documents| documents.get(id))
                .cloned())
        })
    }

    async fn create_document(&self, collection: &str, patch: WritePatch) -> StoreResult<String> {
        self.check_online()?;
        let id = Uuid::new_v4().simple().to_string();
        self.with_collections(|collections| {
            let mut document = Document::new();
            apply_patch(&mut document, patch);
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), document);
            Ok(())
        })?;
        Ok(id)
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        patch: WritePatch,
        merge: bool,
    ) -> StoreResult<()> {
        self.check_online()?;
        self.with_collections(|collections| {
            let documents = collections.entry(collection.to_string()).or_default();
            let document = documents.entry(id.to_string()).or_default();
            if !merge {
                document.clear();
            }
            apply_patch(document, patch);
            Ok(())
        })
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: WritePatch,
    ) -> StoreResult<()> {
        self.check_online()?;
        self.with_collections(|collections| {
            let document = collections
                .get_mut(collection)
                .and_then(|documents| documents.get_mut(id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            apply_patch(document, patch);
            Ok(())
        })
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: u32,
    ) -> StoreResult<Vec<Document>> {
        self.check_online()?;
        self.with_collections(|collections| {
            let matches = collections
                .get(collection)
                .map(|documents| {
                    documents
                        .values()
                        .filter(|document| document.get(field) == Some(value))
                        .take(limit as usize)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            Ok(matches)
        })
    }
}

fn apply_patch(document: &mut Document, patch: WritePatch) {
    for (field, write) in patch {
        match write {
            WriteValue::Set(value) => {
                document.insert(field.to_string(), value);
            }
            WriteValue::ArrayUnion(values) => {
                let entry = document
                    .entry(field.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !entry.is_array() {
                    *entry = Value::Array(Vec::new());
                }
                if let Value::Array(existing) = entry {
                    for value in values {
                        if !existing.contains(&value) {
                            existing.push(value);
                        }
                    }
                }
            }
            WriteValue::Delete => {
                document.remove(field);
            }
            WriteValue::ServerTimestamp => {
                document.insert(field.to_string(), Value::from(epoch_millis_now()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentStore, MemoryDocumentStore, WriteValue};
    use crate::store::StoreError;
    use serde_json::json;

    #[tokio::test]
    async fn set_with_merge_upserts_and_without_merge_replaces() {
        let store = MemoryDocumentStore::new();

        store
            .set_document(
                "users",
                "uid-1",
                vec![("name", WriteValue::Set(json!("Asha")))],
                true,
            )
            .await
            .unwrap();
        store
            .set_document(
                "users",
                "uid-1",
                vec![("email", WriteValue::Set(json!("asha@example.com")))],
                true,
            )
            .await
            .unwrap();

        let merged = store.get_document("users", "uid-1").await.unwrap().unwrap();
        assert_eq!(merged.get("name"), Some(&json!("Asha")));
        assert_eq!(merged.get("email"), Some(&json!("asha@example.com")));

        store
            .set_document(
                "users",
                "uid-1",
                vec![("name", WriteValue::Set(json!("Asha")))],
                false,
            )
            .await
            .unwrap();
        let replaced = store.get_document("users", "uid-1").await.unwrap().unwrap();
        assert!(!replaced.contains_key("email"));
    }

    #[tokio::test]
    async fn array_union_appends_only_missing_values() {
        let store = MemoryDocumentStore::new();
        store
            .set_document(
                "users",
                "uid-1",
                vec![(
                    "parivarIds",
                    WriteValue::ArrayUnion(vec![json!("fam-1"), json!("fam-2")]),
                )],
                true,
            )
            .await
            .unwrap();
        store
            .set_document(
                "users",
                "uid-1",
                vec![(
                    "parivarIds",
                    WriteValue::ArrayUnion(vec![json!("fam-2"), json!("fam-3")]),
                )],
                true,
            )
            .await
            .unwrap();

        let document = store.get_document("users", "uid-1").await.unwrap().unwrap();
        assert_eq!(
            document.get("parivarIds"),
            Some(&json!(["fam-1", "fam-2", "fam-3"]))
        );
    }

    #[tokio::test]
    async fn delete_sentinel_removes_the_field() {
        let store = MemoryDocumentStore::new();
        store
            .set_document(
                "users",
                "uid-1",
                vec![("latestFamilyDraft", WriteValue::Set(json!({"id": "fam-1"})))],
                true,
            )
            .await
            .unwrap();
        store
            .set_document(
                "users",
                "uid-1",
                vec![("latestFamilyDraft", WriteValue::Delete)],
                true,
            )
            .await
            .unwrap();

        let document = store.get_document("users", "uid-1").await.unwrap().unwrap();
        assert!(!document.contains_key("latestFamilyDraft"));
    }

    #[tokio::test]
    async fn server_timestamp_assigns_epoch_millis() {
        let store = MemoryDocumentStore::new();
        let id = store
            .create_document("families", vec![("createdAt", WriteValue::ServerTimestamp)])
            .await
            .unwrap();

        let document = store.get_document("families", &id).await.unwrap().unwrap();
        let created_at = document.get("createdAt").and_then(|value| value.as_i64());
        assert!(created_at.is_some_and(|millis| millis > 0));
    }

    #[tokio::test]
    async fn update_of_absent_document_reports_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update_document("families", "missing", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn query_by_field_matches_equality_up_to_limit() {
        let store = MemoryDocumentStore::new();
        for _ in 0..3 {
            store
                .create_document(
                    "families",
                    vec![("normalizedName", WriteValue::Set(json!("the-sharma-family")))],
                )
                .await
                .unwrap();
        }

        let matches = store
            .query_by_field("families", "normalizedName", &json!("the-sharma-family"), 1)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);

        let none = store
            .query_by_field("families", "normalizedName", &json!("other"), 1)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn offline_toggle_fails_every_call() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);

        let err = store.get_document("users", "uid-1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_offline(false);
        assert!(store.get_document("users", "uid-1").await.unwrap().is_none());
    }
}
