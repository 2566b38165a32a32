use chrono::{DateTime, Utc};
use tracing::info;

use synergy_shared::constants::COLLECTION_TASKS;
use synergy_shared::{Result, Task, TaskStatus};
use synergy_store::{Direction, Query};

use super::{Patch, RemoteAccess};
use crate::subscription::LiveQuery;

/// Status change that keeps the completion timestamp consistent:
/// `completedAt` is `now` when moving to done and cleared otherwise.
pub fn status_patch(status: TaskStatus, now: DateTime<Utc>) -> Result<Patch> {
    let completed_at = status.is_done().then_some(now);
    Ok(Patch::new()
        .set_value("status", &status)?
        .set_time("completedAt", completed_at))
}

impl RemoteAccess {
    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.get_by_id(id).await
    }

    pub async fn create_task(&self, task: &Task) -> Result<Task> {
        let created = self.insert(task).await?;
        info!(task_id = %created.id, project_id = %created.project_id, "Task created");
        Ok(created)
    }

    pub async fn update_task(&self, id: &str, patch: &Patch) -> Result<Task> {
        self.update(id, patch).await
    }

    pub async fn set_task_status(
        &self,
        id: &str,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        self.update(id, &status_patch(status, now)?).await
    }

    pub async fn assign_task(&self, id: &str, assignee_id: &str, assignee_name: &str) -> Result<Task> {
        let patch = Patch::new()
            .set("assigneeId", assignee_id)
            .set("assigneeName", assignee_name);
        self.update(id, &patch).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        self.delete::<Task>(id).await
    }

    /// Tasks of a project, newest first.
    pub fn project_tasks_query(project_id: &str) -> LiveQuery<Task> {
        LiveQuery::new(
            Query::collection(COLLECTION_TASKS)
                .where_eq("projectId", project_id)
                .order_by("createdAt", Direction::Descending),
        )
    }

    pub async fn project_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        self.query(Self::project_tasks_query(project_id).query()).await
    }

    /// Every task in every project `uid` belongs to.
    pub async fn user_tasks(&self, uid: &str) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();
        for project in self.user_projects(uid).await? {
            tasks.extend(self.project_tasks(&project.id).await?);
        }
        Ok(tasks)
    }
}
