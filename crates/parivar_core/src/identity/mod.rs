//! Identity-provider seam.
//!
//! # Responsibility
//! - Expose the current authenticated account to the create-flow without
//!   reaching into ambient/global auth state.
//!
//! # Invariants
//! - The reconciler only ever sees identity through this trait; the hosting
//!   app assembles and injects the real provider.

use std::sync::Mutex;

/// Current authenticated account as seen by core logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable account id; also the owner member's id within a family.
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email: None,
        }
    }
}

/// Supplies the currently signed-in account, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;
}

/// Switchable provider for hosts and tests.
#[derive(Default)]
pub struct StaticIdentityProvider {
    identity: Mutex<Option<Identity>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Mutex::new(Some(identity)),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        if let Ok(mut slot) = self.identity.lock() {
            *slot = Some(identity);
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut slot) = self.identity.lock() {
            *slot = None;
        }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.lock().ok().and_then(|slot| slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{Identity, IdentityProvider, StaticIdentityProvider};

    #[test]
    fn static_provider_tracks_sign_in_and_out() {
        let provider = StaticIdentityProvider::new();
        assert!(provider.current_identity().is_none());

        provider.sign_in(Identity::new("uid-1"));
        assert_eq!(
            provider.current_identity().map(|identity| identity.user_id),
            Some("uid-1".to_string())
        );

        provider.sign_out();
        assert!(provider.current_identity().is_none());
    }
}
