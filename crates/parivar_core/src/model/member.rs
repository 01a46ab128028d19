//! Member domain model.
//!
//! # Responsibility
//! - Define the member record stored inside a family document.
//! - Generate collision-resistant client-side member ids.
//! - Normalize free-text medical-condition input.
//!
//! # Invariants
//! - `id` is unique within a family and never reused.
//! - The owner member carries `relationship == Self` and `user_id` equal to
//!   the creator's account id; every other member has no `user_id`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Relationship of a member to the family creator.
///
/// `Owner` serializes as `"Self"` to match the remote document schema; the
/// remaining variants are the fixed set selectable in the add-member form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    #[serde(rename = "Self")]
    Owner,
    Spouse,
    Child,
    Parent,
    Sibling,
    Grandparent,
    Grandchild,
    Relative,
    Friend,
    Caregiver,
    Other,
}

impl Relationship {
    /// Stable string form used in documents and form payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "Self",
            Self::Spouse => "Spouse",
            Self::Child => "Child",
            Self::Parent => "Parent",
            Self::Sibling => "Sibling",
            Self::Grandparent => "Grandparent",
            Self::Grandchild => "Grandchild",
            Self::Relative => "Relative",
            Self::Friend => "Friend",
            Self::Caregiver => "Caregiver",
            Self::Other => "Other",
        }
    }
}

impl Display for Relationship {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship strings accepted by the add-member form.
pub const SUPPORTED_RELATIONSHIP_STRINGS: &[&str] = &[
    "Self",
    "Spouse",
    "Child",
    "Parent",
    "Sibling",
    "Grandparent",
    "Grandchild",
    "Relative",
    "Friend",
    "Caregiver",
    "Other",
];

/// Parses one relationship from its stable string form.
pub fn parse_relationship(value: &str) -> Result<Relationship, RelationshipError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(RelationshipError::Empty);
    }

    match normalized {
        "Self" => Ok(Relationship::Owner),
        "Spouse" => Ok(Relationship::Spouse),
        "Child" => Ok(Relationship::Child),
        "Parent" => Ok(Relationship::Parent),
        "Sibling" => Ok(Relationship::Sibling),
        "Grandparent" => Ok(Relationship::Grandparent),
        "Grandchild" => Ok(Relationship::Grandchild),
        "Relative" => Ok(Relationship::Relative),
        "Friend" => Ok(Relationship::Friend),
        "Caregiver" => Ok(Relationship::Caregiver),
        "Other" => Ok(Relationship::Other),
        other => Err(RelationshipError::Unsupported(other.to_string())),
    }
}

/// Relationship parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipError {
    Empty,
    Unsupported(String),
}

impl Display for RelationshipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "relationship must not be empty"),
            Self::Unsupported(value) => write!(f, "relationship is unsupported: {value}"),
        }
    }
}

impl Error for RelationshipError {}

/// One member entry inside a family document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Client-generated opaque id, unique within the family.
    pub id: String,
    pub name: String,
    pub relationship: Relationship,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// ISO date string (`YYYY-MM-DD`), user supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    /// Free-text conditions, deduplicated at input time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub medical_conditions: Vec<String>,
    /// Present only for the member backed by an identity-provider account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Member {
    /// Creates a plain member with a fresh generated id.
    pub fn new(name: impl Into<String>, relationship: Relationship) -> Self {
        Self {
            id: generate_member_id(),
            name: name.into(),
            relationship,
            gender: None,
            dob: None,
            medical_conditions: Vec::new(),
            user_id: None,
        }
    }

    /// Returns whether this entry represents the identity `user_id`.
    ///
    /// The owner is matched by either its member id or its account id; both
    /// equal the creator's identity id for owner entries written by this flow.
    pub fn belongs_to(&self, user_id: &str) -> bool {
        self.id == user_id || self.user_id.as_deref() == Some(user_id)
    }

    /// Name/relationship-only projection stored in the user's draft pointer.
    pub fn summary(&self) -> MemberSummary {
        MemberSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            relationship: self.relationship,
        }
    }
}

/// Reduced member shape mirrored into the user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub id: String,
    pub name: String,
    pub relationship: Relationship,
}

/// Generates a client-side member id.
///
/// Epoch-millis prefix keeps ids roughly insertion-ordered; the random suffix
/// makes same-millisecond collisions implausible.
pub fn generate_member_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("mbr-{millis}-{}", &suffix[..8])
}

/// Parses comma-separated medical-condition input into a deduplicated list.
///
/// Entries are trimmed, empties dropped, and duplicates removed while
/// preserving first-seen order.
pub fn parse_medical_conditions(input: &str) -> Vec<String> {
    let mut conditions: Vec<String> = Vec::new();
    for raw in input.split(',') {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if conditions.iter().any(|existing| existing == trimmed) {
            continue;
        }
        conditions.push(trimmed.to_string());
    }
    conditions
}
