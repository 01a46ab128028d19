//! Family (Parivar) domain model and document field mapping.
//!
//! # Responsibility
//! - Define the family record view read from the remote document store.
//! - Normalize display names into the uniqueness key form.
//! - Parse remote family documents tolerantly for hydrate fallbacks.
//!
//! # Invariants
//! - `normalized_name` is always the lowercase hyphen-collapsed form of `name`.
//! - Status is draft-implicit: the field is absent until finalization writes
//!   `active`.

use crate::model::member::Member;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Remote collection holding family documents.
pub const FAMILY_COLLECTION: &str = "families";
/// Remote collection holding user profile documents.
pub const USER_COLLECTION: &str = "users";

/// Family document field names.
pub mod fields {
    pub const NAME: &str = "name";
    pub const NORMALIZED_NAME: &str = "normalizedName";
    pub const MEMBERS: &str = "members";
    pub const STATUS: &str = "status";
    pub const MEMBER_COUNT: &str = "memberCount";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const COMPLETED_AT: &str = "completedAt";

    pub const PROFILE_NAME: &str = "name";
    pub const LATEST_FAMILY_DRAFT: &str = "latestFamilyDraft";
    pub const CREATED_PARIVAR_IDS: &str = "createdParivarIds";
    pub const PARIVAR_IDS: &str = "parivarIds";
    pub const FAMILIES: &str = "families";
}

static WHITESPACE_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Lifecycle status of a family document.
///
/// Documents created by the flow carry no status field until finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyStatus {
    Active,
}

impl FamilyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
        }
    }
}

/// Read view of a remote family document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    pub id: String,
    pub name: Option<String>,
    pub members: Option<Vec<Member>>,
    pub status: Option<FamilyStatus>,
    pub member_count: Option<u32>,
}

impl Family {
    /// Builds the read view from a fetched document.
    ///
    /// Absent or malformed fields resolve to `None` instead of failing, so
    /// hydrate can fall back to locally cached copies field by field.
    pub fn from_document(id: impl Into<String>, document: &serde_json::Map<String, serde_json::Value>) -> Self {
        let name = document
            .get(fields::NAME)
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .filter(|value| !value.is_empty());

        let members = document
            .get(fields::MEMBERS)
            .cloned()
            .and_then(|value| serde_json::from_value::<Vec<Member>>(value).ok());

        let status = document
            .get(fields::STATUS)
            .and_then(|value| value.as_str())
            .and_then(|value| match value {
                "active" => Some(FamilyStatus::Active),
                _ => None,
            });

        let member_count = document
            .get(fields::MEMBER_COUNT)
            .and_then(|value| value.as_u64())
            .map(|value| value as u32);

        Self {
            id: id.into(),
            name,
            members,
            status,
            member_count,
        }
    }
}

/// Normalizes a family display name into its uniqueness key.
///
/// Lowercase, leading/trailing whitespace removed, inner whitespace runs
/// collapsed to single hyphens: `"  The Sharma   Family "` ->
/// `"the-sharma-family"`.
pub fn normalize_family_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    WHITESPACE_RUN_RE.replace_all(&lowered, "-").into_owned()
}
