//! Locally persisted create-flow draft.
//!
//! # Responsibility
//! - Define the resumable snapshot written to local storage after every
//!   successful create-flow mutation.
//! - Provide the JSON codec used against the local key-value store.
//!
//! # Invariants
//! - The draft lives under one fixed key and has no schema migration; unknown
//!   or malformed payloads are treated as "no draft".
//! - The draft exists from the first successful name commit until
//!   finalization clears it.

use crate::model::member::Member;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fixed local-storage key for the create-flow draft.
pub const DRAFT_STORAGE_KEY: &str = "create_parivar_progress";

/// Step the create flow is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowStep {
    /// Naming the family.
    #[default]
    Naming,
    /// Adding members to the named family.
    Membership,
}

impl FlowStep {
    /// Stable numeric form stored in the draft payload.
    pub fn as_number(self) -> u8 {
        match self {
            Self::Naming => 1,
            Self::Membership => 2,
        }
    }

    /// Maps a stored step number back; unknown values resume at naming.
    pub fn from_number(value: u8) -> Self {
        match value {
            2 => Self::Membership,
            _ => Self::Naming,
        }
    }
}

/// Resumable snapshot of an in-progress family creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParivarProgress {
    pub step: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
    /// Local write timestamp, epoch millis.
    pub last_updated: i64,
}

impl CreateParivarProgress {
    /// Builds a fresh snapshot stamped with the current local time.
    pub fn now(
        step: FlowStep,
        family_id: Option<String>,
        family_name: Option<String>,
        members: Vec<Member>,
    ) -> Self {
        Self {
            step: step.as_number(),
            family_id,
            family_name,
            members,
            last_updated: epoch_millis_now(),
        }
    }

    /// Serializes the draft for local storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a stored draft payload; `None` when the payload is unreadable.
    pub fn from_json(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn epoch_millis_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{CreateParivarProgress, FlowStep};
    use crate::model::member::{Member, Relationship};

    #[test]
    fn step_numbers_round_trip_and_unknown_defaults_to_naming() {
        assert_eq!(FlowStep::from_number(1), FlowStep::Naming);
        assert_eq!(FlowStep::from_number(2), FlowStep::Membership);
        assert_eq!(FlowStep::from_number(7), FlowStep::Naming);
        assert_eq!(FlowStep::Membership.as_number(), 2);
    }

    #[test]
    fn draft_json_round_trip_preserves_members() {
        let mut owner = Member::new("You", Relationship::Owner);
        owner.user_id = Some("uid-1".to_string());
        let draft = CreateParivarProgress::now(
            FlowStep::Membership,
            Some("fam-1".to_string()),
            Some("Mehta Parivar".to_string()),
            vec![owner.clone()],
        );

        let payload = draft.to_json().expect("draft should serialize");
        let parsed = CreateParivarProgress::from_json(&payload).expect("draft should parse");
        assert_eq!(parsed.step, 2);
        assert_eq!(parsed.family_id.as_deref(), Some("fam-1"));
        assert_eq!(parsed.members, vec![owner]);
    }

    #[test]
    fn malformed_draft_payload_parses_to_none() {
        assert!(CreateParivarProgress::from_json("not json").is_none());
        assert!(CreateParivarProgress::from_json("{\"step\":\"two\"}").is_none());
    }
}
