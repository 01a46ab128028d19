//! Core domain logic for ParivarOS.
//! This crate is the single source of truth for the family create-flow and
//! permission-bootstrap invariants; screens and platform adapters live in the
//! hosting app.

pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod permission;
pub mod service;
pub mod store;

pub use identity::{Identity, IdentityProvider, StaticIdentityProvider};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::draft::{CreateParivarProgress, FlowStep, DRAFT_STORAGE_KEY};
pub use model::family::{normalize_family_name, Family, FamilyStatus, FAMILY_COLLECTION, USER_COLLECTION};
pub use model::member::{
    parse_medical_conditions, parse_relationship, Member, MemberSummary, Relationship,
};
pub use permission::bootstrap::{
    BootstrapOutcome, PermissionBootstrap, PermissionHost, PERMISSION_STORAGE_KEY,
};
pub use permission::capability::{DeviceCapability, PermissionStatus, PermissionSummary};
pub use service::draft_reconciler::{
    ensure_owner_member, owner_member, resolve_owner_name, DraftReconciler, HydratedFlow,
    MemberForm, ReconcileError, UserProfile,
};
pub use store::document_store::{Document, DocumentStore, MemoryDocumentStore, WriteValue};
pub use store::kv_store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use store::{StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
