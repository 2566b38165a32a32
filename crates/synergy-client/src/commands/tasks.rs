use chrono::{DateTime, Utc};
use tracing::warn;

use synergy_shared::{Priority, Project, Result, Task, TaskStatus, ValidationError};

use crate::remote::Patch;
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Clone)]
pub struct Assignee {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee: Option<Assignee>,
    pub tags: Vec<String>,
}

pub async fn create_task(state: &AppState, input: NewTask) -> Result<Task> {
    let title = validation::required("title", &input.title)?;
    let project_id = validation::required("project", &input.project_id)?;
    let me = state.require_profile()?;
    let now = Utc::now();

    let task = Task {
        id: String::new(),
        title,
        description: input.description.trim().to_string(),
        project_id,
        assignee_id: input.assignee.as_ref().map(|a| a.id.clone()),
        assignee_name: input.assignee.as_ref().map(|a| a.name.clone()),
        creator_id: me.id.clone(),
        creator_name: Some(me.name.clone()),
        status: TaskStatus::Todo,
        priority: input.priority,
        due_date: input.due_date,
        completed_at: None,
        tags: input.tags,
        created_at: now,
        updated_at: now,
    };

    let created = state.remote.create_task(&task).await?;
    state.cache.tasks.add(created.clone());
    if created.assignee_id.as_deref().is_some_and(|id| id != me.id) {
        announce_assignment(state, &created).await;
    }
    Ok(created)
}

/// Apply a partial update. A status change always carries the matching
/// completion timestamp.
pub async fn update_task(state: &AppState, task_id: &str, patch: Patch) -> Result<Task> {
    let patch = with_completion(patch, Utc::now())?;
    let updated = state.remote.update_task(task_id, &patch).await?;
    state.cache.tasks.replace(updated.clone());
    Ok(updated)
}

pub async fn set_task_status(state: &AppState, task_id: &str, status: TaskStatus) -> Result<Task> {
    let updated = state
        .remote
        .set_task_status(task_id, status, Utc::now())
        .await?;
    state.cache.tasks.replace(updated.clone());
    Ok(updated)
}

pub async fn assign_task(state: &AppState, task_id: &str, assignee: Assignee) -> Result<Task> {
    let me = state.require_identity()?;
    let updated = state
        .remote
        .assign_task(task_id, &assignee.id, &assignee.name)
        .await?;
    state.cache.tasks.replace(updated.clone());
    if assignee.id != me.uid {
        announce_assignment(state, &updated).await;
    }
    Ok(updated)
}

pub async fn delete_task(state: &AppState, task_id: &str) -> Result<()> {
    state.remote.delete_task(task_id).await?;
    state.cache.tasks.remove_by_id(task_id);
    Ok(())
}

/// One-shot refresh of a project's tasks into the cache.
pub async fn load_project_tasks(state: &AppState, project_id: &str) -> Result<Vec<Task>> {
    let tasks = &state.cache.tasks;
    tasks.set_loading(true);
    let result = state.remote.project_tasks(project_id).await;
    tasks.set_loading(false);
    match result {
        Ok(list) => {
            tasks.set_all(list.clone());
            Ok(list)
        }
        Err(e) => {
            tasks.set_error(e.clone());
            Err(e)
        }
    }
}

/// The completion timestamp is derived from the status: a status change
/// always carries it, and it is never written on its own.
fn with_completion(patch: Patch, now: DateTime<Utc>) -> Result<Patch> {
    let Some(value) = patch.value_of("status") else {
        if patch.touches("completedAt") {
            return Err(ValidationError::Rejected("completedAt follows the task status").into());
        }
        return Ok(patch);
    };
    let status: TaskStatus = serde_json::from_value(value.clone())?;
    Ok(patch
        .without("completedAt")
        .set_time("completedAt", status.is_done().then_some(now)))
}

async fn announce_assignment(state: &AppState, task: &Task) {
    let project_name = match state.cache.projects.get(&task.project_id) {
        Some(project) => project.name,
        None => match state.remote.get_by_id::<Project>(&task.project_id).await {
            Ok(Some(project)) => project.name,
            _ => String::from("a project"),
        },
    };
    if let Err(e) = state
        .notifications
        .notify_task_assignment(task, &project_name)
        .await
    {
        warn!(task_id = %task.id, error = %e, "Failed to schedule assignment alert");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn status_change_carries_completion() {
        let now = Utc::now();
        let patch = with_completion(Patch::new().set("status", "done"), now).unwrap();
        assert!(patch.value_of("completedAt").is_some_and(|v| !v.is_null()));

        let patch = with_completion(Patch::new().set("status", "todo"), now).unwrap();
        assert_eq!(patch.value_of("completedAt"), Some(&Value::Null));

        let patch = with_completion(Patch::new().set("title", "x"), now).unwrap();
        assert!(!patch.touches("completedAt"));
    }

    #[test]
    fn status_overrides_caller_completion() {
        let now = Utc::now();
        let patch = with_completion(
            Patch::new().set("status", "done").set_time("completedAt", None),
            now,
        )
        .unwrap();
        assert!(patch.value_of("completedAt").is_some_and(|v| !v.is_null()));
        assert_eq!(patch.fields().iter().filter(|(f, _)| f == "completedAt").count(), 1);

        let patch = with_completion(
            Patch::new().set("status", "todo").set_time("completedAt", Some(now)),
            now,
        )
        .unwrap();
        assert_eq!(patch.value_of("completedAt"), Some(&Value::Null));
    }

    #[test]
    fn completion_alone_is_rejected() {
        let err = with_completion(Patch::new().set_time("completedAt", Some(Utc::now())), Utc::now())
            .unwrap_err();
        assert!(matches!(err, synergy_shared::SynergyError::Validation(_)));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(with_completion(Patch::new().set("status", "blocked"), Utc::now()).is_err());
    }
}
