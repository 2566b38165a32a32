//! Interfaces of the external collaborators the client talks to.
//!
//! The client never reaches a backend directly: the Remote Access Layer,
//! the auth service and the notification service hold these traits as
//! `Arc<dyn ...>`. [`embedded`] provides the in-process implementation.

pub mod embedded;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use synergy_shared::{Identity, Result};
use synergy_store::{FieldUpdate, Query, ScheduledNotification, StoredDocument};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub use embedded::{EmbeddedBackend, EmbeddedServer};

/// Full result sets pushed by a live query, or the error that ended it.
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Result<Vec<StoredDocument>>>;

/// Collection-based document database with live queries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert under a store-assigned id.
    async fn create(&self, collection: &str, data: Map<String, Value>) -> Result<StoredDocument>;

    /// Insert under `id` unless it exists; reports whether this call created it.
    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(StoredDocument, bool)>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>>;

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>>;

    /// Fails with `NotFound` if the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: Vec<(String, FieldUpdate)>,
    ) -> Result<StoredDocument>;

    /// Fails with `NotFound` if the document does not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Register a live query.
    ///
    /// The current result set is delivered immediately, then a new full
    /// result set after every change that affects it. The listener stops
    /// when `token` is cancelled, the receiver is dropped, or an error has
    /// been delivered.
    fn listen(&self, query: Query, token: CancellationToken) -> Result<SnapshotReceiver>;
}

/// Email/password identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Identity>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;

    async fn sign_out(&self) -> Result<()>;

    async fn send_password_reset(&self, email: &str) -> Result<()>;

    fn current(&self) -> Option<Identity>;

    /// Observe identity changes. Dropping the receiver unsubscribes.
    fn on_identity_changed(&self) -> watch::Receiver<Option<Identity>>;
}

/// Local notification scheduler.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    async fn schedule_at(
        &self,
        title: &str,
        body: &str,
        at: DateTime<Utc>,
        payload: Value,
    ) -> Result<String>;

    async fn cancel(&self, id: &str) -> Result<()>;

    async fn get_all_scheduled(&self) -> Result<Vec<ScheduledNotification>>;
}
