//! Parivar draft reconciler.
//!
//! # Responsibility
//! - Drive the two-step create flow (name -> members -> finalize) across
//!   in-memory state, the local draft, and the remote family/user documents.
//! - Keep local draft and remote state mutually recoverable so an interrupted
//!   session resumes at the correct step with the correct data.
//!
//! # Invariants
//! - The creator is always present in the member sequence as the `Self`
//!   entry and is never removed by this flow.
//! - Every failed operation leaves prior persisted state intact and
//!   resumable; no operation retries automatically.
//! - The duplicate-name check is best-effort (query-then-write); concurrent
//!   creators racing on one name are an accepted limitation.
//! - Remote `members` writes replace the whole array; the last writer wins
//!   across concurrent flow instances. No version check is performed.

use crate::identity::{Identity, IdentityProvider};
use crate::model::draft::{CreateParivarProgress, FlowStep, DRAFT_STORAGE_KEY};
use crate::model::family::{
    fields, normalize_family_name, Family, FamilyStatus, FAMILY_COLLECTION, USER_COLLECTION,
};
use crate::model::member::{
    generate_member_id, parse_medical_conditions, parse_relationship, Member, MemberSummary,
    Relationship,
};
use crate::store::document_store::{DocumentStore, WriteValue};
use crate::store::kv_store::KeyValueStore;
use crate::store::StoreError;
use futures::join;
use log::{error, info, warn};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Reconciler error taxonomy.
///
/// `Validation` and `DuplicateName` surface inline near the offending field;
/// the rest render as a modal alert. Nothing here is retried automatically.
#[derive(Debug)]
pub enum ReconcileError {
    /// User input fails a local precondition.
    Validation(String),
    /// Uniqueness check found a family with the same normalized name.
    DuplicateName(String),
    /// Operation invoked out of sequence; defensive, not expected in UI flow.
    Precondition(&'static str),
    /// Identity or remote store unreachable.
    Unavailable(String),
    /// Unclassified storage failure, already logged at the boundary.
    Store(StoreError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(detail) => write!(f, "invalid input: {detail}"),
            Self::DuplicateName(normalized) => {
                write!(f, "a family with this name already exists: {normalized}")
            }
            Self::Precondition(detail) => write!(f, "operation out of sequence: {detail}"),
            Self::Unavailable(detail) => write!(f, "service unavailable: {detail}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Add-member form payload as submitted by the membership screen.
#[derive(Debug, Clone, Default)]
pub struct MemberForm {
    pub name: String,
    /// Stable relationship string (`"Sibling"`, `"Child"`, ...).
    pub relationship: String,
    pub gender: Option<String>,
    /// ISO date string (`YYYY-MM-DD`).
    pub dob: Option<String>,
    /// Comma-separated free text, deduplicated on parse.
    pub medical_conditions: String,
}

/// Profile fields read from the user's own document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub name: Option<String>,
}

/// Resolved create-flow position returned by hydrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydratedFlow {
    pub step: FlowStep,
    pub family_id: Option<String>,
    pub family_name: Option<String>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Default)]
struct FlowState {
    step: FlowStep,
    family_id: Option<String>,
    family_name: Option<String>,
    members: Vec<Member>,
    profile: Option<UserProfile>,
}

/// Coordinates family creation across the three data surfaces.
///
/// State is process-local and re-derived from storage via [`hydrate`]; the
/// reconciler never reaches into ambient state — identity and stores are
/// injected by the hosting application.
///
/// [`hydrate`]: DraftReconciler::hydrate
pub struct DraftReconciler<S, K, I>
where
    S: DocumentStore,
    K: KeyValueStore,
    I: IdentityProvider,
{
    remote: Arc<S>,
    local: Arc<K>,
    identity: Arc<I>,
    state: FlowState,
}

impl<S, K, I> DraftReconciler<S, K, I>
where
    S: DocumentStore,
    K: KeyValueStore,
    I: IdentityProvider,
{
    pub fn new(remote: Arc<S>, local: Arc<K>, identity: Arc<I>) -> Self {
        Self {
            remote,
            local,
            identity,
            state: FlowState::default(),
        }
    }

    /// Current flow position without touching storage.
    pub fn flow(&self) -> HydratedFlow {
        HydratedFlow {
            step: self.state.step,
            family_id: self.state.family_id.clone(),
            family_name: self.state.family_name.clone(),
            members: self.state.members.clone(),
        }
    }

    /// Re-derives the flow position from storage.
    ///
    /// Fetches the user's profile document and the local draft concurrently
    /// (the two are independent). When the draft references a remote family,
    /// the remote record's name/members are preferred field by field, falling
    /// back to the draft's cached copies when the remote fields are absent or
    /// the fetch fails. Never errors: every failure degrades to "use whatever
    /// is available" and is logged only.
    pub async fn hydrate(&mut self) -> HydratedFlow {
        let identity = self.identity.current_identity();

        let profile_future = self.fetch_profile(identity.as_ref());
        let draft_future = self.read_draft();
        let (profile, draft) = join!(profile_future, draft_future);

        self.state = FlowState {
            profile,
            ..FlowState::default()
        };

        if let Some(draft) = draft {
            let mut step = FlowStep::from_number(draft.step);
            let mut family_name = draft.family_name;
            let mut members = draft.members;

            if let Some(family_id) = draft.family_id {
                // A draft carrying a family id means the naming step finished,
                // whatever step number was persisted.
                step = FlowStep::Membership;
                match self.remote.get_document(FAMILY_COLLECTION, &family_id).await {
                    Ok(Some(document)) => {
                        let family = Family::from_document(family_id.as_str(), &document);
                        if let Some(name) = family.name {
                            family_name = Some(name);
                        }
                        if let Some(remote_members) = family.members {
                            members = remote_members;
                        }
                    }
                    Ok(None) => {
                        warn!(
                            "event=hydrate module=reconciler status=fallback reason=family_missing family_id={family_id}"
                        );
                    }
                    Err(err) => {
                        warn!(
                            "event=hydrate module=reconciler status=fallback reason=family_fetch_failed family_id={family_id} error={err}"
                        );
                    }
                }
                self.state.family_id = Some(family_id);
            }

            self.state.step = step;
            self.state.family_name = family_name;
            self.state.members = members;
        }

        info!(
            "event=hydrate module=reconciler status=ok step={} has_family={} member_count={}",
            self.state.step.as_number(),
            self.state.family_id.is_some(),
            self.state.members.len()
        );
        self.flow()
    }

    /// Commits the family name: uniqueness check, family create, draft
    /// persist, user draft-pointer write. Returns the new family id.
    ///
    /// The family create and the user-pointer merge are two separate remote
    /// writes, not a transaction. The local draft is persisted between them,
    /// so a crash after the create still resumes from the family id on the
    /// next hydrate.
    pub async fn commit_family_name(&mut self, name: &str) -> Result<String, ReconcileError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ReconcileError::Validation("name required".to_string()));
        }
        let identity = self
            .identity
            .current_identity()
            .ok_or_else(|| ReconcileError::Unavailable("not signed in".to_string()))?;

        let normalized = normalize_family_name(trimmed);
        let existing = self
            .remote
            .query_by_field(
                FAMILY_COLLECTION,
                fields::NORMALIZED_NAME,
                &json!(normalized),
                1,
            )
            .await
            .map_err(|err| classify_store_error("family_name_commit", err))?;
        if !existing.is_empty() {
            info!(
                "event=family_name_commit module=reconciler status=rejected reason=duplicate_name normalized={normalized}"
            );
            return Err(ReconcileError::DuplicateName(normalized));
        }

        let owner = owner_member(&identity, self.state.profile.as_ref());
        let members = vec![owner];
        let members_value = members_to_value(&members)?;

        let family_id = self
            .remote
            .create_document(
                FAMILY_COLLECTION,
                vec![
                    (fields::NAME, WriteValue::Set(json!(trimmed))),
                    (fields::NORMALIZED_NAME, WriteValue::Set(json!(normalized))),
                    (fields::MEMBERS, WriteValue::Set(members_value)),
                    (fields::CREATED_AT, WriteValue::ServerTimestamp),
                    (fields::UPDATED_AT, WriteValue::ServerTimestamp),
                ],
            )
            .await
            .map_err(|err| classify_store_error("family_name_commit", err))?;

        self.state.step = FlowStep::Membership;
        self.state.family_id = Some(family_id.clone());
        self.state.family_name = Some(trimmed.to_string());
        self.state.members = members;

        self.persist_draft().await;
        self.write_draft_pointer(&identity, &family_id, trimmed)
            .await?;

        info!("event=family_created module=reconciler status=ok family_id={family_id}");
        Ok(family_id)
    }

    /// Appends one member from the submitted form and returns the updated
    /// sequence.
    ///
    /// The remote `members` field is replaced wholesale; the owner entry is
    /// re-ensured defensively before the write.
    pub async fn add_member(&mut self, form: &MemberForm) -> Result<Vec<Member>, ReconcileError> {
        let identity = self
            .identity
            .current_identity()
            .ok_or(ReconcileError::Precondition("sign in before adding members"))?;
        let family_id = self
            .state
            .family_id
            .clone()
            .ok_or(ReconcileError::Precondition(
                "name the family before adding members",
            ))?;

        let name = form.name.trim();
        if name.is_empty() {
            return Err(ReconcileError::Validation("member name required".to_string()));
        }
        if form.relationship.trim().is_empty() {
            return Err(ReconcileError::Validation("relationship required".to_string()));
        }
        let relationship = parse_relationship(&form.relationship)
            .map_err(|err| ReconcileError::Validation(err.to_string()))?;

        let member = Member {
            id: generate_member_id(),
            name: name.to_string(),
            relationship,
            gender: normalize_optional(form.gender.as_deref()),
            dob: normalize_optional(form.dob.as_deref()),
            medical_conditions: parse_medical_conditions(&form.medical_conditions),
            user_id: None,
        };

        let owner = owner_member(&identity, self.state.profile.as_ref());
        let mut members = self.state.members.clone();
        members.push(member);
        let members = ensure_owner_member(&owner, members);
        let members_value = members_to_value(&members)?;

        self.remote
            .update_document(
                FAMILY_COLLECTION,
                &family_id,
                vec![
                    (fields::MEMBERS, WriteValue::Set(members_value)),
                    (fields::UPDATED_AT, WriteValue::ServerTimestamp),
                ],
            )
            .await
            .map_err(|err| classify_store_error("member_add", err))?;

        self.state.members = members.clone();
        self.state.step = FlowStep::Membership;

        let family_name = self.state.family_name.clone().unwrap_or_default();
        self.write_draft_pointer(&identity, &family_id, &family_name)
            .await?;
        self.persist_draft().await;

        info!(
            "event=member_added module=reconciler status=ok family_id={family_id} member_count={}",
            members.len()
        );
        Ok(members)
    }

    /// Terminal transition: marks the family active, unions it into the
    /// user's family sets, removes the draft pointer, and clears the local
    /// draft. Once it succeeds the flow cannot be resumed.
    pub async fn finalize(&mut self) -> Result<(), ReconcileError> {
        let family_id = self
            .state
            .family_id
            .clone()
            .ok_or(ReconcileError::Precondition("no family in progress"))?;

        let identity = self.identity.current_identity();
        let members = match identity.as_ref() {
            Some(identity) => ensure_owner_member(
                &owner_member(identity, self.state.profile.as_ref()),
                self.state.members.clone(),
            ),
            None => self.state.members.clone(),
        };
        if members.is_empty() {
            return Err(ReconcileError::Precondition("add at least one member"));
        }
        let identity =
            identity.ok_or_else(|| ReconcileError::Unavailable("not signed in".to_string()))?;

        let member_count = members.len();
        self.remote
            .update_document(
                FAMILY_COLLECTION,
                &family_id,
                vec![
                    (fields::MEMBER_COUNT, WriteValue::Set(json!(member_count))),
                    (
                        fields::STATUS,
                        WriteValue::Set(json!(FamilyStatus::Active.as_str())),
                    ),
                    (fields::COMPLETED_AT, WriteValue::ServerTimestamp),
                    (fields::UPDATED_AT, WriteValue::ServerTimestamp),
                ],
            )
            .await
            .map_err(|err| classify_store_error("family_finalize", err))?;

        let family_name = self.state.family_name.clone().unwrap_or_default();
        let owner_summary = json!({
            "id": family_id,
            "name": family_name,
            "relationship": Relationship::Owner.as_str(),
        });
        self.remote
            .set_document(
                USER_COLLECTION,
                &identity.user_id,
                vec![
                    (
                        fields::CREATED_PARIVAR_IDS,
                        WriteValue::ArrayUnion(vec![json!(family_id)]),
                    ),
                    (
                        fields::PARIVAR_IDS,
                        WriteValue::ArrayUnion(vec![json!(family_id)]),
                    ),
                    (fields::FAMILIES, WriteValue::ArrayUnion(vec![owner_summary])),
                    (fields::LATEST_FAMILY_DRAFT, WriteValue::Delete),
                ],
                true,
            )
            .await
            .map_err(|err| classify_store_error("family_finalize", err))?;

        if let Err(err) = self.local.remove(DRAFT_STORAGE_KEY).await {
            warn!("event=draft_clear module=reconciler status=error error={err}");
        }
        self.state = FlowState {
            profile: self.state.profile.take(),
            ..FlowState::default()
        };

        info!(
            "event=family_finalized module=reconciler status=ok family_id={family_id} member_count={member_count}"
        );
        Ok(())
    }

    async fn fetch_profile(&self, identity: Option<&Identity>) -> Option<UserProfile> {
        let identity = identity?;
        match self
            .remote
            .get_document(USER_COLLECTION, &identity.user_id)
            .await
        {
            Ok(Some(document)) => Some(UserProfile {
                name: document
                    .get(fields::PROFILE_NAME)
                    .and_then(|value| value.as_str())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string),
            }),
            Ok(None) => Some(UserProfile::default()),
            Err(err) => {
                warn!(
                    "event=hydrate module=reconciler status=fallback reason=profile_fetch_failed error={err}"
                );
                None
            }
        }
    }

    async fn read_draft(&self) -> Option<CreateParivarProgress> {
        match self.local.get(DRAFT_STORAGE_KEY).await {
            Ok(Some(payload)) => {
                let parsed = CreateParivarProgress::from_json(&payload);
                if parsed.is_none() {
                    warn!("event=hydrate module=reconciler status=fallback reason=draft_unreadable");
                }
                parsed
            }
            Ok(None) => None,
            Err(err) => {
                warn!(
                    "event=hydrate module=reconciler status=fallback reason=draft_read_failed error={err}"
                );
                None
            }
        }
    }

    /// Overwrites the local draft with the current state. Failures are
    /// log-only: the draft is a resume cache, not the source of truth.
    async fn persist_draft(&self) {
        let draft = CreateParivarProgress::now(
            self.state.step,
            self.state.family_id.clone(),
            self.state.family_name.clone(),
            self.state.members.clone(),
        );
        match draft.to_json() {
            Ok(payload) => {
                if let Err(err) = self.local.set(DRAFT_STORAGE_KEY, &payload).await {
                    warn!("event=draft_persist module=reconciler status=error error={err}");
                }
            }
            Err(err) => {
                warn!("event=draft_persist module=reconciler status=error error={err}");
            }
        }
    }

    async fn write_draft_pointer(
        &self,
        identity: &Identity,
        family_id: &str,
        family_name: &str,
    ) -> Result<(), ReconcileError> {
        let summaries: Vec<MemberSummary> =
            self.state.members.iter().map(Member::summary).collect();
        let pointer = json!({
            "id": family_id,
            "name": family_name,
            "members": summaries,
        });
        self.remote
            .set_document(
                USER_COLLECTION,
                &identity.user_id,
                vec![(fields::LATEST_FAMILY_DRAFT, WriteValue::Set(pointer))],
                true,
            )
            .await
            .map_err(|err| classify_store_error("draft_pointer_write", err))
    }
}

/// Resolves the owner's display name through the ordered fallback chain:
/// profile name -> account display name -> email local part -> `"You"`.
pub fn resolve_owner_name(
    profile_name: Option<&str>,
    display_name: Option<&str>,
    email: Option<&str>,
) -> String {
    let candidates = [
        profile_name,
        display_name,
        email.and_then(|email| email.split('@').next()),
    ];
    for candidate in candidates.into_iter().flatten() {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    "You".to_string()
}

/// Builds the owner member entry for the given identity.
pub fn owner_member(identity: &Identity, profile: Option<&UserProfile>) -> Member {
    Member {
        id: identity.user_id.clone(),
        name: resolve_owner_name(
            profile.and_then(|profile| profile.name.as_deref()),
            identity.display_name.as_deref(),
            identity.email.as_deref(),
        ),
        relationship: Relationship::Owner,
        gender: None,
        dob: None,
        medical_conditions: Vec::new(),
        user_id: Some(identity.user_id.clone()),
    }
}

/// Guarantees the owner is present in the returned sequence.
///
/// Matched by member id or account id equal to the owner's account id; when
/// absent the owner is prepended. Idempotent.
pub fn ensure_owner_member(owner: &Member, members: Vec<Member>) -> Vec<Member> {
    let owner_account_id = owner.user_id.as_deref().unwrap_or(owner.id.as_str());
    if members
        .iter()
        .any(|member| member.belongs_to(owner_account_id))
    {
        return members;
    }

    let mut with_owner = Vec::with_capacity(members.len() + 1);
    with_owner.push(owner.clone());
    with_owner.extend(members);
    with_owner
}

fn members_to_value(members: &[Member]) -> Result<serde_json::Value, ReconcileError> {
    serde_json::to_value(members)
        .map_err(|err| ReconcileError::Store(StoreError::InvalidData(err.to_string())))
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn classify_store_error(operation: &'static str, err: StoreError) -> ReconcileError {
    error!("event={operation} module=reconciler status=error error={err}");
    match err {
        StoreError::Unavailable(detail) => ReconcileError::Unavailable(detail),
        other => ReconcileError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_owner_member, owner_member, resolve_owner_name, UserProfile};
    use crate::identity::Identity;
    use crate::model::member::{Member, Relationship};

    fn owner_fixture() -> Member {
        owner_member(&Identity::new("uid-1"), None)
    }

    #[test]
    fn ensure_owner_prepends_on_empty_input() {
        let owner = owner_fixture();
        let members = ensure_owner_member(&owner, Vec::new());
        assert_eq!(members, vec![owner]);
    }

    #[test]
    fn ensure_owner_is_idempotent() {
        let owner = owner_fixture();
        let sibling = Member::new("Asha", Relationship::Sibling);

        let once = ensure_owner_member(&owner, vec![sibling]);
        let twice = ensure_owner_member(&owner, once.clone());
        assert_eq!(once, twice);
        assert_eq!(once[0].id, "uid-1");
    }

    #[test]
    fn ensure_owner_matches_existing_entry_by_account_id() {
        let owner = owner_fixture();
        let mut existing = Member::new("Me Elsewhere", Relationship::Owner);
        existing.user_id = Some("uid-1".to_string());

        let members = ensure_owner_member(&owner, vec![existing.clone()]);
        assert_eq!(members, vec![existing]);
    }

    #[test]
    fn owner_name_fallback_chain_is_ordered() {
        let profile = UserProfile {
            name: Some("Profile Name".to_string()),
        };
        assert_eq!(
            resolve_owner_name(profile.name.as_deref(), Some("Display"), Some("x@y.z")),
            "Profile Name"
        );
        assert_eq!(
            resolve_owner_name(None, Some("Display"), Some("x@y.z")),
            "Display"
        );
        assert_eq!(
            resolve_owner_name(None, None, Some("asha.m@example.com")),
            "asha.m"
        );
        assert_eq!(resolve_owner_name(None, None, None), "You");
        assert_eq!(resolve_owner_name(Some("   "), None, None), "You");
    }

    #[test]
    fn owner_member_carries_identity_id_in_both_id_fields() {
        let mut identity = Identity::new("uid-1");
        identity.display_name = Some("Ravi".to_string());

        let owner = owner_member(&identity, None);
        assert_eq!(owner.id, "uid-1");
        assert_eq!(owner.user_id.as_deref(), Some("uid-1"));
        assert_eq!(owner.relationship, Relationship::Owner);
        assert_eq!(owner.name, "Ravi");
    }
}
