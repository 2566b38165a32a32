//! Application state shared by all commands.
//!
//! [`AppState`] wires one client together: a backend connection, the
//! Remote Access Layer on top of it, the client cache and the services.
//! Everything inside is cheap to clone and internally synchronized, so the
//! state itself is shared by reference.

use std::sync::Arc;

use tracing::info;

use synergy_shared::{Identity, Result, SynergyError, UserProfile};
use synergy_store::Database;

use crate::auth::AuthService;
use crate::backend::{EmbeddedBackend, EmbeddedServer};
use crate::cache::ClientCache;
use crate::config::ClientConfig;
use crate::lifecycle::ScreenScope;
use crate::notifications::NotificationService;
use crate::remote::RemoteAccess;

pub struct AppState {
    pub config: ClientConfig,
    /// This client's connection; also exposes the reachability switch.
    pub backend: EmbeddedBackend,
    pub remote: RemoteAccess,
    pub cache: ClientCache,
    pub auth: AuthService,
    pub notifications: NotificationService,
}

impl AppState {
    /// Open the embedded server named by the configuration and connect to
    /// it.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        info!(path = ?db.path(), "Database opened");
        let server = EmbeddedServer::from_database(db, config.min_password_len);
        Ok(Self::connect(&server, config))
    }

    /// A new client of an existing server.
    pub fn connect(server: &EmbeddedServer, config: ClientConfig) -> Self {
        let backend = server.connect();
        let remote = RemoteAccess::new(Arc::new(backend.clone()));
        let cache = ClientCache::new(config.merge_policy);
        let notifications =
            NotificationService::new(Arc::new(backend.clone()), remote.clone(), &config);
        let auth = AuthService::new(
            Arc::new(backend.clone()),
            remote.clone(),
            cache.clone(),
            notifications.clone(),
            config.min_password_len,
        );
        Self {
            config,
            backend,
            remote,
            cache,
            auth,
            notifications,
        }
    }

    /// Lifecycle scope for a newly mounted screen.
    pub fn screen(&self, name: impl Into<String>) -> ScreenScope {
        ScreenScope::new(name, self.remote.clone(), self.cache.session.clone())
    }

    pub fn require_identity(&self) -> Result<Identity> {
        self.cache
            .session
            .identity()
            .ok_or_else(|| SynergyError::PermissionDenied("sign-in required".into()))
    }

    /// The signed-in user's profile, or one derived from the identity when
    /// the profile document has not been loaded.
    pub fn require_profile(&self) -> Result<UserProfile> {
        if let Some(profile) = self.cache.session.profile() {
            return Ok(profile);
        }
        let identity = self.require_identity()?;
        Ok(UserProfile {
            id: identity.uid.clone(),
            name: identity
                .display_name
                .clone()
                .unwrap_or_else(|| identity.email.clone()),
            email: identity.email,
            avatar: None,
            created_at: identity.created_at,
            updated_at: identity.created_at,
        })
    }
}
