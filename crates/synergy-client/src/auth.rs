//! Session service: sign-up, sign-in, sign-out and profile upkeep.
//!
//! The identity provider is the source of truth for who is signed in; this
//! service mirrors it into the session cache, keeps the `users/{uid}`
//! profile document and re-schedules the daily reminder on every sign-in.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use synergy_shared::{Identity, Result, SynergyError, UserProfile};

use crate::backend::IdentityProvider;
use crate::cache::ClientCache;
use crate::notifications::NotificationService;
use crate::remote::{Patch, RemoteAccess};
use crate::validation::{self, SignUpForm};

#[derive(Clone)]
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    remote: RemoteAccess,
    cache: ClientCache,
    notifications: NotificationService,
    min_password_len: usize,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        remote: RemoteAccess,
        cache: ClientCache,
        notifications: NotificationService,
        min_password_len: usize,
    ) -> Self {
        Self {
            identity,
            remote,
            cache,
            notifications,
            min_password_len,
        }
    }

    pub async fn sign_up(&self, form: &SignUpForm) -> Result<Identity> {
        let valid = form.validate(self.min_password_len)?;
        let identity = self
            .identity
            .sign_up(&valid.email, &valid.password, &valid.name)
            .await?;

        self.cache.session.set_identity(Some(identity.clone()));
        let profile = self.remote.create_user_profile(&identity, &valid.name).await?;
        self.cache.session.set_profile(profile);
        self.after_sign_in(&identity).await;

        info!(uid = %identity.uid, "Signed up");
        Ok(identity)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let email = validation::required("email", email)?;
        validation::required("password", password)?;

        let identity = self.identity.sign_in(&email, password).await?;
        self.adopt(&identity).await;
        self.after_sign_in(&identity).await;
        info!(uid = %identity.uid, "Signed in");
        Ok(identity)
    }

    /// End the session and drop every cached entity.
    pub async fn sign_out(&self) -> Result<()> {
        self.identity.sign_out().await?;
        self.cache.clear_all();
        info!("Signed out");
        Ok(())
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        let email = validation::email(email)?;
        self.identity.send_password_reset(&email).await
    }

    /// Pick up an identity the provider already holds, e.g. at startup.
    /// Counts as a re-authentication.
    pub async fn restore_session(&self) -> Option<Identity> {
        let current = self.identity.current();
        match &current {
            Some(identity) => {
                self.adopt(identity).await;
                self.after_sign_in(identity).await;
            }
            None => self.apply_identity(None).await,
        }
        current
    }

    /// Follow provider identity changes until the returned token is
    /// cancelled.
    pub fn spawn_identity_listener(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut changes = self.identity.on_identity_changed();
        let service = self.clone();
        let stop = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let identity = changes.borrow_and_update().clone();
                        service.apply_identity(identity).await;
                    }
                }
            }
            debug!("Identity listener stopped");
        });
        token
    }

    pub async fn update_profile(&self, patch: &Patch) -> Result<UserProfile> {
        let uid = self
            .cache
            .session
            .uid()
            .ok_or_else(|| SynergyError::PermissionDenied("sign-in required".into()))?;
        let profile = self.remote.update_user_profile(&uid, patch).await?;
        self.cache.session.set_profile(profile.clone());
        Ok(profile)
    }

    /// Mirror a provider-side identity change. Only a switch to a
    /// different user counts as a sign-in here; explicit sign-ins run their
    /// own follow-up.
    async fn apply_identity(&self, identity: Option<Identity>) {
        let previous = self.cache.session.uid();
        let Some(identity) = identity else {
            if previous.is_some() {
                self.cache.clear_all();
            } else {
                self.cache.session.set_identity(None);
            }
            return;
        };
        if previous.as_deref() == Some(identity.uid.as_str()) {
            return;
        }
        self.adopt(&identity).await;
        self.after_sign_in(&identity).await;
    }

    /// Put `identity` in the session cache and load its profile unless it
    /// is already cached.
    async fn adopt(&self, identity: &Identity) {
        let same = self.cache.session.uid().as_deref() == Some(identity.uid.as_str());
        self.cache.session.set_identity(Some(identity.clone()));
        if same && self.cache.session.profile().is_some() {
            return;
        }
        match self.remote.get_user_profile(&identity.uid).await {
            Ok(Some(profile)) => self.cache.session.set_profile(profile),
            Ok(None) => debug!(uid = %identity.uid, "No profile document"),
            Err(e) => warn!(uid = %identity.uid, error = %e, "Failed to load profile"),
        }
    }

    async fn after_sign_in(&self, identity: &Identity) {
        if let Err(e) = self.notifications.schedule_daily_reminder(&identity.uid).await {
            warn!(uid = %identity.uid, error = %e, "Failed to schedule daily reminder");
        }
    }
}
