//! Record types persisted in the embedded store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use synergy_shared::constants::{FIELD_CREATED_AT, FIELD_UPDATED_AT};
use synergy_shared::timestamp::StoreTimestamp;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A raw document as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub collection: String,
    /// Store-assigned (or caller-chosen) document id, unique per collection.
    pub id: String,
    /// Document body. Timestamps are in the native representation.
    pub data: Map<String, Value>,
    /// Incremented on every write.
    pub version: u64,
}

impl StoredDocument {
    pub fn created_at(&self) -> Option<StoreTimestamp> {
        self.data.get(FIELD_CREATED_AT).and_then(StoreTimestamp::from_value)
    }

    pub fn updated_at(&self) -> Option<StoreTimestamp> {
        self.data.get(FIELD_UPDATED_AT).and_then(StoreTimestamp::from_value)
    }
}

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Announcement of a single document write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A sign-in account of the embedded identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Hex-encoded random salt.
    pub password_salt: String,
    /// Hex-encoded BLAKE3 hash of salt and password.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Scheduled notification
// ---------------------------------------------------------------------------

/// A local notification waiting for its fire time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    /// Free-form data delivered with the notification; `payload.type`
    /// identifies the category.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl ScheduledNotification {
    /// The `type` entry of the payload, if any.
    pub fn category(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }
}
