//! In-process backend built on `synergy-store`.
//!
//! An [`EmbeddedServer`] owns the database and its change feed. Each
//! running client gets its own [`EmbeddedBackend`] from
//! [`EmbeddedServer::connect`], with a private session and reachability
//! flag, so several clients can share one server the way several devices
//! share one hosted backend.
//!
//! Access rule: every document operation requires a signed-in session.
//! Live queries end with `PermissionDenied` when their session ends.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use synergy_shared::{Identity, Result, SynergyError};
use synergy_store::{
    ChangeFeed, Database, FieldUpdate, Query, ScheduledNotification, StoreError, StoredDocument,
};

use super::{DocumentStore, IdentityProvider, NotificationScheduler, SnapshotReceiver};

struct Shared {
    db: Mutex<Database>,
    feed: ChangeFeed,
    min_password_len: usize,
    listeners: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| SynergyError::Internal(format!("Lock poisoned: {e}")))
    }

    fn with_db<R>(&self, f: impl FnOnce(&Database) -> synergy_store::Result<R>) -> Result<R> {
        let db = self.lock()?;
        f(&db).map_err(SynergyError::from)
    }
}

/// Shared database plus change feed. Cheap to clone.
#[derive(Clone)]
pub struct EmbeddedServer {
    shared: Arc<Shared>,
}

impl EmbeddedServer {
    pub fn from_database(db: Database, min_password_len: usize) -> Self {
        let feed = db.feed().clone();
        Self {
            shared: Arc::new(Shared {
                db: Mutex::new(db),
                feed,
                min_password_len,
                listeners: AtomicUsize::new(0),
            }),
        }
    }

    pub fn open(path: &Path, min_password_len: usize) -> Result<Self> {
        let db = Database::open_at(path)?;
        info!(path = %path.display(), "Embedded server opened");
        Ok(Self::from_database(db, min_password_len))
    }

    pub fn in_memory(min_password_len: usize) -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?, min_password_len))
    }

    /// A new client connection: signed out and online.
    pub fn connect(&self) -> EmbeddedBackend {
        let (session, _) = watch::channel(None);
        let (online, _) = watch::channel(true);
        EmbeddedBackend {
            shared: self.shared.clone(),
            session: Arc::new(session),
            online: Arc::new(online),
        }
    }

    /// Number of live-query listener tasks still running.
    pub fn active_listeners(&self) -> usize {
        self.shared.listeners.load(Ordering::Acquire)
    }

    /// How many password resets were requested for `email`.
    pub fn password_resets(&self, email: &str) -> Result<u32> {
        self.shared.with_db(|db| db.count_password_resets(email))
    }
}

/// One client's connection to an [`EmbeddedServer`].
#[derive(Clone)]
pub struct EmbeddedBackend {
    shared: Arc<Shared>,
    session: Arc<watch::Sender<Option<Identity>>>,
    online: Arc<watch::Sender<bool>>,
}

impl EmbeddedBackend {
    /// Simulate losing or regaining connectivity. Live queries that missed
    /// changes while offline refresh when the connection comes back.
    pub fn set_online(&self, online: bool) {
        if self.online.send_replace(online) != online {
            info!(online, "Backend reachability changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn active_listeners(&self) -> usize {
        self.shared.listeners.load(Ordering::Acquire)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(SynergyError::Network("backend unreachable".into()))
        }
    }

    /// Reachability first, then the access rule.
    fn authorize(&self) -> Result<Identity> {
        self.ensure_online()?;
        self.session
            .borrow()
            .clone()
            .ok_or_else(|| SynergyError::PermissionDenied("sign-in required".into()))
    }

    fn start_session(&self, identity: Identity) {
        info!(uid = %identity.uid, "Session started");
        self.session.send_replace(Some(identity));
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[async_trait]
impl DocumentStore for EmbeddedBackend {
    async fn create(&self, collection: &str, data: Map<String, Value>) -> Result<StoredDocument> {
        self.authorize()?;
        self.shared
            .with_db(|db| db.insert_document(collection, data))
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(StoredDocument, bool)> {
        self.authorize()?;
        self.shared
            .with_db(|db| db.create_document_if_absent(collection, id, data))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
        self.authorize()?;
        self.shared.with_db(|db| db.find_document(collection, id))
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>> {
        self.authorize()?;
        self.shared.with_db(|db| db.query_documents(query))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: Vec<(String, FieldUpdate)>,
    ) -> Result<StoredDocument> {
        self.authorize()?;
        self.shared
            .with_db(|db| db.update_document(collection, id, &updates))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.authorize()?;
        if self.shared.with_db(|db| db.delete_document(collection, id))? {
            Ok(())
        } else {
            Err(SynergyError::NotFound(format!("{collection}/{id}")))
        }
    }

    fn listen(&self, query: Query, token: CancellationToken) -> Result<SnapshotReceiver> {
        let identity = self.authorize()?;

        // Subscribe before the initial read so no write slips in between.
        let mut changes = self.shared.feed.subscribe();
        let mut session = self.session.subscribe();
        let mut online = self.online.subscribe();
        let initial = self.shared.with_db(|db| db.query_documents(&query))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut last = fingerprint(&initial);
        let _ = tx.send(Ok(initial));

        let guard = ListenerGuard::new(self.shared.clone());
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let _guard = guard;
            // A relevant change arrived while offline.
            let mut missed = false;
            debug!(collection = %query.collection, "Listener started");
            loop {
                let refresh = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tx.closed() => break,
                    changed = session.changed() => {
                        let same = changed.is_ok()
                            && session
                                .borrow_and_update()
                                .as_ref()
                                .is_some_and(|current| current.uid == identity.uid);
                        if !same {
                            let _ = tx.send(Err(SynergyError::PermissionDenied(
                                "session ended".into(),
                            )));
                            break;
                        }
                        false
                    }
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let up = *online.borrow_and_update();
                        if up && missed {
                            debug!(collection = %query.collection, "Back online; refreshing");
                        }
                        up && std::mem::take(&mut missed)
                    }
                    change = changes.recv() => {
                        let relevant = match change {
                            Ok(change) => change.collection == query.collection,
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, "Listener lagged behind the change feed");
                                true
                            }
                            Err(RecvError::Closed) => break,
                        };
                        if relevant && !*online.borrow() {
                            missed = true;
                            false
                        } else {
                            relevant
                        }
                    }
                };
                if !refresh {
                    continue;
                }

                match shared.with_db(|db| db.query_documents(&query)) {
                    Ok(docs) => {
                        let next = fingerprint(&docs);
                        if next != last {
                            last = next;
                            if tx.send(Ok(docs)).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
            debug!(collection = %query.collection, "Listener stopped");
        });

        Ok(rx)
    }
}

/// Ids and versions in result order. Equal fingerprints mean an identical
/// result set.
fn fingerprint(docs: &[StoredDocument]) -> Vec<(String, u64)> {
    docs.iter().map(|d| (d.id.clone(), d.version)).collect()
}

struct ListenerGuard(Arc<Shared>);

impl ListenerGuard {
    fn new(shared: Arc<Shared>) -> Self {
        shared.listeners.fetch_add(1, Ordering::AcqRel);
        Self(shared)
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.listeners.fetch_sub(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[async_trait]
impl IdentityProvider for EmbeddedBackend {
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Identity> {
        self.ensure_online()?;
        let min = self.shared.min_password_len;
        if password.chars().count() < min {
            return Err(SynergyError::WeakPassword(format!(
                "password must be at least {min} characters"
            )));
        }

        let account = {
            let db = self.shared.lock()?;
            match db.create_account(email, password, Some(display_name)) {
                Ok(account) => account,
                Err(StoreError::AlreadyExists(_)) => {
                    return Err(SynergyError::EmailAlreadyInUse(email.to_string()))
                }
                Err(e) => return Err(e.into()),
            }
        };

        let identity = Identity {
            uid: account.uid,
            email: account.email,
            display_name: account.display_name,
            created_at: account.created_at,
        };
        self.start_session(identity.clone());
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        self.ensure_online()?;
        let account = self
            .shared
            .with_db(|db| db.find_account_by_email(email))?
            .filter(|account| account.verify_password(password))
            .ok_or(SynergyError::InvalidCredentials)?;

        let identity = Identity {
            uid: account.uid,
            email: account.email,
            display_name: account.display_name,
            created_at: account.created_at,
        };
        self.start_session(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.session.send_replace(None).is_some() {
            info!("Session ended");
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.ensure_online()?;
        self.shared.with_db(|db| db.record_password_reset(email))?;
        info!(email, "Password reset requested");
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.session.borrow().clone()
    }

    fn on_identity_changed(&self) -> watch::Receiver<Option<Identity>> {
        self.session.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Local notifications
// ---------------------------------------------------------------------------

#[async_trait]
impl NotificationScheduler for EmbeddedBackend {
    async fn schedule_at(
        &self,
        title: &str,
        body: &str,
        at: DateTime<Utc>,
        payload: Value,
    ) -> Result<String> {
        let notification = ScheduledNotification {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            body: body.to_string(),
            fire_at: at,
            payload,
            created_at: Utc::now(),
        };
        self.shared.with_db(|db| db.insert_scheduled(&notification))?;
        debug!(id = %notification.id, fire_at = %at, "Notification scheduled");
        Ok(notification.id)
    }

    async fn cancel(&self, id: &str) -> Result<()> {
        if !self.shared.with_db(|db| db.delete_scheduled(id))? {
            debug!(id, "Cancel of unknown notification ignored");
        }
        Ok(())
    }

    async fn get_all_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        self.shared.with_db(|db| db.list_scheduled())
    }
}
