//! In-app notification inbox, newest first.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use synergy_shared::{InboxKind, InboxNotification};

#[derive(Debug, Clone, Default)]
pub struct InboxState {
    pub items: Vec<InboxNotification>,
    pub unread: usize,
}

impl InboxState {
    fn recount(&mut self) {
        self.unread = self.items.iter().filter(|n| !n.is_read).count();
    }
}

#[derive(Clone)]
pub struct Inbox {
    state: Arc<watch::Sender<InboxState>>,
}

/// Fields of a new inbox entry; id, read flag and time are filled in.
#[derive(Debug, Clone)]
pub struct NewInboxNotification {
    pub user_id: String,
    pub kind: InboxKind,
    pub title: String,
    pub message: String,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    pub fn new() -> Self {
        let (state, _) = watch::channel(InboxState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn watch(&self) -> watch::Receiver<InboxState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Vec<InboxNotification> {
        self.state.borrow().items.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread
    }

    /// Replace the inbox, newest first.
    pub fn set_all(&self, mut items: Vec<InboxNotification>) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.state.send_modify(|state| {
            state.items = items;
            state.recount();
        });
    }

    pub fn push(&self, new: NewInboxNotification) -> InboxNotification {
        let notification = InboxNotification {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            is_read: false,
            created_at: Utc::now(),
            project_id: new.project_id,
            task_id: new.task_id,
        };
        self.state.send_modify(|state| {
            state.items.insert(0, notification.clone());
            state.recount();
        });
        notification
    }

    pub fn mark_read(&self, id: &str) -> bool {
        self.state.send_if_modified(|state| {
            match state.items.iter_mut().find(|n| n.id == id && !n.is_read) {
                Some(n) => {
                    n.is_read = true;
                    state.recount();
                    true
                }
                None => false,
            }
        })
    }

    pub fn mark_all_read(&self) {
        self.state.send_if_modified(|state| {
            if state.unread == 0 {
                return false;
            }
            state.items.iter_mut().for_each(|n| n.is_read = true);
            state.recount();
            true
        });
    }

    pub fn remove(&self, id: &str) -> bool {
        self.state.send_if_modified(|state| {
            let before = state.items.len();
            state.items.retain(|n| n.id != id);
            state.recount();
            state.items.len() != before
        })
    }

    pub fn clear(&self) {
        self.state.send_replace(InboxState::default());
    }
}
