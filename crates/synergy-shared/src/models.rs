//! Domain models mirrored from the remote document store.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names, which is the document shape the store holds. Timestamps are local
//! `DateTime<Utc>` values here; the conversion to and from the store's
//! native representation lives in [`crate::timestamp`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::{
    COLLECTION_CHATS, COLLECTION_DISCUSSIONS, COLLECTION_MESSAGES, COLLECTION_PROJECTS,
    COLLECTION_TASKS, COLLECTION_USERS, PROGRESS_MAX,
};
use crate::error::ValidationError;
use crate::types::{
    InboxKind, MemberRole, MessageType, Priority, ProjectStatus, TaskStatus,
};

/// A typed view over one document collection.
///
/// Timestamp paths use `.` to descend into objects and a `[]` suffix to fan
/// out over arrays, e.g. `members[].joinedAt`.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    /// Timestamp fields that fall back to "now" when the stored value is
    /// missing.
    const REQUIRED_TIMESTAMPS: &'static [&'static str] = &["createdAt", "updatedAt"];

    /// Timestamp fields that stay null when missing.
    const OPTIONAL_TIMESTAMPS: &'static [&'static str] = &[];

    fn id(&self) -> &str;

    fn updated_at(&self) -> DateTime<Utc>;

    /// Entity invariants checked before any write reaches the store.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The signed-in identity as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Opaque, provider-assigned user id.
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

/// Profile document stored at `users/{uid}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for UserProfile {
    const COLLECTION: &'static str = COLLECTION_USERS;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// A team project.
///
/// Exactly one member carries [`MemberRole::Owner`] and that member's id
/// equals `owner_id`. `member_ids` mirrors `members` so the store can answer
/// "projects I belong to" with an array-contains query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    #[serde(default)]
    pub members: Vec<ProjectMember>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Completion percentage, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Soft-delete flag.
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn owner_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.role == MemberRole::Owner)
            .count()
    }

    pub fn member(&self, user_id: &str) -> Option<&ProjectMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

impl Document for Project {
    const COLLECTION: &'static str = COLLECTION_PROJECTS;
    const REQUIRED_TIMESTAMPS: &'static [&'static str] =
        &["createdAt", "updatedAt", "members[].joinedAt"];
    const OPTIONAL_TIMESTAMPS: &'static [&'static str] = &["deadline"];

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
    fn validate(&self) -> Result<(), ValidationError> {
        if self.progress > PROGRESS_MAX {
            return Err(ValidationError::Rejected("progress must be between 0 and 100"));
        }
        let owners: Vec<&ProjectMember> = self
            .members
            .iter()
            .filter(|m| m.role == MemberRole::Owner)
            .collect();
        match owners.as_slice() {
            [owner] if owner.user_id == self.owner_id => Ok(()),
            _ => Err(ValidationError::Rejected("a project has exactly one owner")),
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of work inside a project.
///
/// `completed_at` is set if and only if `status` is [`TaskStatus::Done`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub project_id: String,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    pub creator_id: String,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Task {
    const COLLECTION: &'static str = COLLECTION_TASKS;
    const OPTIONAL_TIMESTAMPS: &'static [&'static str] = &["dueDate", "completedAt"];

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
    fn validate(&self) -> Result<(), ValidationError> {
        if self.status.is_done() == self.completed_at.is_some() {
            Ok(())
        } else {
            Err(ValidationError::Rejected(
                "completedAt must be set exactly when the task is done",
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Discussion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub content: String,
    pub author_id: String,
    #[serde(default)]
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: u32,
}

/// A project discussion thread. Replies are embedded and append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    #[serde(default)]
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub author_id: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub replies: Vec<Reply>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Discussion {
    const COLLECTION: &'static str = COLLECTION_DISCUSSIONS;
    const REQUIRED_TIMESTAMPS: &'static [&'static str] =
        &["createdAt", "updatedAt", "replies[].createdAt"];

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipant {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub joined_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A conversation between two or more participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(default)]
    pub id: String,
    pub participants: Vec<ChatParticipant>,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub is_group: bool,
    /// Display name of a group chat.
    #[serde(default)]
    pub name: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Chat {
    const COLLECTION: &'static str = COLLECTION_CHATS;
    const REQUIRED_TIMESTAMPS: &'static [&'static str] = &[
        "createdAt",
        "updatedAt",
        "lastMessageAt",
        "participants[].joinedAt",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_email: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub read_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for ChatMessage {
    const COLLECTION: &'static str = COLLECTION_MESSAGES;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ---------------------------------------------------------------------------
// Inbox notification (client-side only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboxNotification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: InboxKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

fn default_true() -> bool {
    true
}
