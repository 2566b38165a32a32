//! Client State Cache.
//!
//! Per-entity observable collections mirroring what the current screens
//! show, plus the session and the in-app inbox. Every mutation notifies
//! watchers. The cache never talks to the backend itself: subscriptions
//! feed it through [`crate::lifecycle::ScreenScope`], and commands merge
//! confirmed writes into it.

mod collection;
mod inbox;
mod session;

use std::sync::Arc;

use tokio::sync::watch;

use synergy_shared::{Chat, ChatMessage, Discussion, Project, Task, TaskStatus};

pub use collection::{Collection, CollectionState, MergePolicy};
pub use inbox::{Inbox, InboxState, NewInboxNotification};
pub use session::{SessionCache, SessionState};

#[derive(Clone)]
pub struct ClientCache {
    pub session: SessionCache,
    pub projects: Collection<Project>,
    pub tasks: Collection<Task>,
    pub discussions: Collection<Discussion>,
    pub chats: Collection<Chat>,
    pub messages: Collection<ChatMessage>,
    pub inbox: Inbox,
    selected_project: Arc<watch::Sender<Option<String>>>,
}

impl ClientCache {
    pub fn new(policy: MergePolicy) -> Self {
        let (selected_project, _) = watch::channel(None);
        Self {
            session: SessionCache::new(),
            projects: Collection::with_policy("projects", policy),
            tasks: Collection::with_policy("tasks", policy),
            discussions: Collection::with_policy("discussions", policy),
            chats: Collection::with_policy("chats", policy),
            messages: Collection::with_policy("messages", policy),
            inbox: Inbox::new(),
            selected_project: Arc::new(selected_project),
        }
    }

    pub fn select_project(&self, id: Option<String>) {
        self.selected_project.send_if_modified(|current| {
            let changed = *current != id;
            *current = id;
            changed
        });
    }

    pub fn selected_project_id(&self) -> Option<String> {
        self.selected_project.borrow().clone()
    }

    pub fn watch_selected_project(&self) -> watch::Receiver<Option<String>> {
        self.selected_project.subscribe()
    }

    /// The selected project as currently cached. Edits merged into the
    /// project list are visible here too.
    pub fn current_project(&self) -> Option<Project> {
        let id = self.selected_project_id()?;
        self.projects.get(&id)
    }

    pub fn tasks_by_project(&self, project_id: &str) -> Vec<Task> {
        self.tasks.filter(|t| t.project_id == project_id)
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.tasks.filter(|t| t.status == status)
    }

    /// Drop everything belonging to the signed-in user.
    pub fn clear_all(&self) {
        self.session.clear();
        self.projects.clear();
        self.tasks.clear();
        self.discussions.clear();
        self.chats.clear();
        self.messages.clear();
        self.inbox.clear();
        self.select_project(None);
    }
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::new(MergePolicy::default())
    }
}
