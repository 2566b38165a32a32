//! Observable in-memory collection of one entity type.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use synergy_shared::{Document, SynergyError};

use crate::remote::Patch;

/// How an incoming copy of an entity is reconciled with the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The most recently applied write wins.
    #[default]
    ArrivalOrder,
    /// An incoming copy older (by `updatedAt`) than the cached one is
    /// ignored.
    RejectStale,
}

#[derive(Debug, Clone)]
pub struct CollectionState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    /// Last failure; the items stay as last known good.
    pub error: Option<SynergyError>,
    /// Bumped on every change observers are notified about.
    pub revision: u64,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            revision: 0,
        }
    }
}

/// Ordered list of entities with unique ids, plus loading and error flags.
/// Clones share the same state.
#[derive(Clone)]
pub struct Collection<T> {
    name: &'static str,
    policy: MergePolicy,
    state: Arc<watch::Sender<CollectionState<T>>>,
}

impl<T: Document> Collection<T> {
    pub fn new(name: &'static str) -> Self {
        Self::with_policy(name, MergePolicy::default())
    }

    pub fn with_policy(name: &'static str, policy: MergePolicy) -> Self {
        let (state, _) = watch::channel(CollectionState::default());
        Self {
            name,
            policy,
            state: Arc::new(state),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Observe every change.
    pub fn watch(&self) -> watch::Receiver<CollectionState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.state.borrow().items.iter().find(|i| i.id() == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.borrow().items.iter().any(|i| i.id() == id)
    }

    pub fn filter(&self, mut keep: impl FnMut(&T) -> bool) -> Vec<T> {
        self.state
            .borrow()
            .items
            .iter()
            .filter(|i| keep(i))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn last_error(&self) -> Option<SynergyError> {
        self.state.borrow().error.clone()
    }

    pub fn revision(&self) -> u64 {
        self.state.borrow().revision
    }

    /// Replace the whole list. Duplicate ids keep their first occurrence.
    /// Under [`MergePolicy::RejectStale`] a cached entity newer than its
    /// incoming copy is kept.
    pub fn set_all(&self, items: Vec<T>) {
        let policy = self.policy;
        self.modify(|state| {
            let mut next: Vec<T> = Vec::with_capacity(items.len());
            for item in items {
                if next.iter().any(|n| n.id() == item.id()) {
                    continue;
                }
                let kept = match state.items.iter().find(|c| c.id() == item.id()) {
                    Some(cached) if is_stale(policy, cached, &item) => cached.clone(),
                    _ => item,
                };
                next.push(kept);
            }
            state.items = next;
            state.error = None;
            true
        });
    }

    /// Insert, or replace in place when the id is already cached.
    pub fn add(&self, item: T) {
        let policy = self.policy;
        let name = self.name;
        self.modify(|state| match state.items.iter().position(|c| c.id() == item.id()) {
            Some(pos) if is_stale(policy, &state.items[pos], &item) => {
                debug!(collection = name, id = item.id(), "Ignoring stale copy");
                false
            }
            Some(pos) => {
                state.items[pos] = item;
                true
            }
            None => {
                state.items.push(item);
                true
            }
        });
    }

    /// Replace a cached entity with a newer copy. Unknown ids are ignored.
    pub fn replace(&self, item: T) -> bool {
        let policy = self.policy;
        self.modify(|state| match state.items.iter().position(|c| c.id() == item.id()) {
            Some(pos) if !is_stale(policy, &state.items[pos], &item) => {
                state.items[pos] = item;
                true
            }
            _ => false,
        })
    }

    /// Shallow-merge `patch` into the entity with `id`. Unknown ids are
    /// ignored.
    pub fn update_by_id(&self, id: &str, patch: &Patch) -> bool {
        let name = self.name;
        self.modify(|state| {
            let Some(item) = state.items.iter_mut().find(|c| c.id() == id) else {
                return false;
            };
            match patch.apply_to(&*item) {
                Ok(patched) => {
                    *item = patched;
                    true
                }
                Err(e) => {
                    warn!(collection = name, id, error = %e, "Patch does not fit cached entity");
                    false
                }
            }
        })
    }

    /// Edit the entity with `id` in place. Unknown ids are ignored.
    pub fn modify_by_id(&self, id: &str, f: impl FnOnce(&mut T)) -> bool {
        self.modify(|state| match state.items.iter_mut().find(|c| c.id() == id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        })
    }

    pub fn remove_by_id(&self, id: &str) -> bool {
        self.modify(|state| {
            let before = state.items.len();
            state.items.retain(|c| c.id() != id);
            state.items.len() != before
        })
    }

    pub fn set_loading(&self, loading: bool) {
        self.modify(|state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    /// Record a failure without touching the items.
    pub fn set_error(&self, error: SynergyError) {
        self.modify(|state| {
            state.error = Some(error);
            true
        });
    }

    pub fn clear_error(&self) {
        self.modify(|state| state.error.take().is_some());
    }

    /// Back to the initial empty state.
    pub fn clear(&self) {
        self.modify(|state| {
            let revision = state.revision;
            *state = CollectionState::default();
            state.revision = revision;
            true
        });
    }

    fn modify(&self, f: impl FnOnce(&mut CollectionState<T>) -> bool) -> bool {
        self.state.send_if_modified(|state| {
            let changed = f(state);
            if changed {
                state.revision += 1;
            }
            changed
        })
    }
}

fn is_stale<T: Document>(policy: MergePolicy, cached: &T, incoming: &T) -> bool {
    policy == MergePolicy::RejectStale && incoming.updated_at() < cached.updated_at()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use synergy_shared::{Task, TaskStatus};

    fn task(id: &str, title: &str, age_secs: i64) -> Task {
        let at = Utc::now() - Duration::seconds(age_secs);
        Task {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            project_id: "p1".into(),
            assignee_id: None,
            assignee_name: None,
            creator_id: "u1".into(),
            creator_name: None,
            status: TaskStatus::Todo,
            priority: Default::default(),
            due_date: None,
            completed_at: None,
            tags: vec![],
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn add_replaces_by_id() {
        let tasks = Collection::new("tasks");
        tasks.add(task("t1", "first", 10));
        tasks.add(task("t2", "second", 10));
        tasks.add(task("t1", "renamed", 5));

        let titles: Vec<_> = tasks.snapshot().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, ["renamed", "second"]);
    }

    #[test]
    fn set_all_drops_duplicate_ids() {
        let tasks = Collection::new("tasks");
        tasks.set_all(vec![task("a", "1", 0), task("a", "2", 0), task("b", "3", 0)]);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks.get("a").unwrap().title, "1");
    }

    #[test]
    fn updates_to_unknown_ids_are_noops() {
        let tasks = Collection::new("tasks");
        tasks.add(task("a", "1", 0));
        let before = tasks.revision();

        assert!(!tasks.update_by_id("zzz", &Patch::new().set("title", "x")));
        assert!(!tasks.modify_by_id("zzz", |t| t.title.clear()));
        assert!(!tasks.remove_by_id("zzz"));
        assert!(!tasks.replace(task("zzz", "x", 0)));
        assert_eq!(tasks.revision(), before);
    }

    #[test]
    fn update_by_id_merges_shallowly() {
        let tasks = Collection::new("tasks");
        tasks.add(task("a", "keep me", 0));
        assert!(tasks.update_by_id("a", &Patch::new().set("status", json!("in_progress"))));
        let a = tasks.get("a").unwrap();
        assert_eq!(a.status, TaskStatus::InProgress);
        assert_eq!(a.title, "keep me");
    }

    #[test]
    fn error_keeps_last_known_good_items() {
        let tasks = Collection::new("tasks");
        tasks.set_all(vec![task("a", "1", 0)]);
        tasks.set_error(SynergyError::Network("down".into()));
        assert_eq!(tasks.len(), 1);
        assert!(tasks.last_error().is_some());

        tasks.set_all(vec![task("a", "1", 0), task("b", "2", 0)]);
        assert!(tasks.last_error().is_none());
    }

    #[test]
    fn reject_stale_keeps_newer_cached_copy() {
        let tasks = Collection::with_policy("tasks", MergePolicy::RejectStale);
        tasks.add(task("a", "newer", 1));
        tasks.add(task("a", "older", 60));
        assert_eq!(tasks.get("a").unwrap().title, "newer");

        tasks.set_all(vec![task("a", "older", 60)]);
        assert_eq!(tasks.get("a").unwrap().title, "newer");

        let arrival = Collection::new("tasks");
        arrival.add(task("a", "newer", 1));
        arrival.add(task("a", "older", 60));
        assert_eq!(arrival.get("a").unwrap().title, "older");
    }

    #[tokio::test]
    async fn observers_see_changes() {
        let tasks = Collection::new("tasks");
        let mut rx = tasks.watch();
        tasks.set_loading(true);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().loading);

        tasks.add(task("a", "1", 0));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().items.len(), 1);

        tasks.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow().items.is_empty());
    }
}
