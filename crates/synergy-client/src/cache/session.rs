//! Signed-in identity and profile.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use synergy_shared::{Identity, UserProfile};

use crate::remote::Patch;

#[derive(Debug, Clone)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub profile: Option<UserProfile>,
    /// True until the first identity report after startup.
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            profile: None,
            loading: true,
        }
    }
}

/// At most one identity is active at a time. Clones share the same state.
#[derive(Clone)]
pub struct SessionCache {
    state: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCache {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn uid(&self) -> Option<String> {
        self.state.borrow().identity.as_ref().map(|i| i.uid.clone())
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.borrow().profile.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().identity.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Replace the active identity. A different identity (or none) drops
    /// the cached profile.
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.state.send_modify(|state| {
            let same_user = match (&state.identity, &identity) {
                (Some(a), Some(b)) => a.uid == b.uid,
                _ => false,
            };
            if !same_user {
                state.profile = None;
            }
            state.identity = identity;
            state.loading = false;
        });
    }

    /// Store the profile of the active identity. A profile belonging to
    /// someone else is ignored.
    pub fn set_profile(&self, profile: UserProfile) {
        self.state.send_if_modified(|state| match &state.identity {
            Some(identity) if identity.uid == profile.id => {
                state.profile = Some(profile);
                true
            }
            _ => {
                warn!(profile_id = %profile.id, "Ignoring profile of inactive identity");
                false
            }
        });
    }

    pub fn update_profile(&self, patch: &Patch) -> bool {
        self.state.send_if_modified(|state| {
            let Some(profile) = state.profile.as_mut() else {
                return false;
            };
            match patch.apply_to(&*profile) {
                Ok(patched) => {
                    *profile = patched;
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Patch does not fit profile");
                    false
                }
            }
        })
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    /// Signed out and no longer loading.
    pub fn clear(&self) {
        self.state.send_replace(SessionState {
            loading: false,
            ..SessionState::default()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(uid: &str) -> Identity {
        Identity {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
            display_name: None,
            created_at: Utc::now(),
        }
    }

    fn profile(uid: &str) -> UserProfile {
        UserProfile {
            id: uid.into(),
            email: format!("{uid}@example.com"),
            name: uid.to_uppercase(),
            avatar: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn starts_loading_and_signed_out() {
        let session = SessionCache::new();
        assert!(session.is_loading());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn switching_identity_drops_profile() {
        let session = SessionCache::new();
        session.set_identity(Some(identity("u1")));
        session.set_profile(profile("u1"));
        assert!(session.profile().is_some());

        session.set_identity(Some(identity("u1")));
        assert!(session.profile().is_some());

        session.set_identity(Some(identity("u2")));
        assert!(session.profile().is_none());
        assert_eq!(session.uid().as_deref(), Some("u2"));
    }

    #[test]
    fn foreign_profile_is_ignored() {
        let session = SessionCache::new();
        session.set_identity(Some(identity("u1")));
        session.set_profile(profile("u2"));
        assert!(session.profile().is_none());
    }

    #[test]
    fn profile_patch_and_clear() {
        let session = SessionCache::new();
        session.set_identity(Some(identity("u1")));
        session.set_profile(profile("u1"));
        assert!(session.update_profile(&Patch::new().set("name", "Renamed")));
        assert_eq!(session.profile().unwrap().name, "Renamed");

        session.clear();
        assert!(!session.is_authenticated());
        assert!(!session.is_loading());
        assert!(session.profile().is_none());
    }
}
