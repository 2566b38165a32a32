use serde_json::Value;
use tracing::info;

use synergy_shared::constants::COLLECTION_PROJECTS;
use synergy_shared::{MemberRole, Project, ProjectMember, Result, SynergyError, ValidationError};
use synergy_store::{Direction, Query};

use super::{Patch, RemoteAccess};
use crate::subscription::LiveQuery;

impl RemoteAccess {
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.get_by_id(id).await
    }

    pub async fn create_project(&self, project: &Project) -> Result<Project> {
        let created = self.insert(project).await?;
        info!(project_id = %created.id, name = %created.name, "Project created");
        Ok(created)
    }

    pub async fn update_project(&self, id: &str, patch: &Patch) -> Result<Project> {
        self.update(id, patch).await
    }

    /// Projects `uid` belongs to, most recently updated first.
    pub fn user_projects_query(uid: &str) -> LiveQuery<Project> {
        LiveQuery::new(
            Query::collection(COLLECTION_PROJECTS)
                .where_array_contains("memberIds", uid)
                .order_by("updatedAt", Direction::Descending),
        )
    }

    pub async fn user_projects(&self, uid: &str) -> Result<Vec<Project>> {
        self.query(Self::user_projects_query(uid).query()).await
    }

    /// Add a member. The owner role cannot be granted this way and a user
    /// can only be a member once.
    pub async fn add_project_member(&self, project_id: &str, member: ProjectMember) -> Result<Project> {
        if member.role == MemberRole::Owner {
            return Err(ValidationError::Rejected("a project has exactly one owner").into());
        }
        let project: Project = self.require(project_id).await?;
        if project.member(&member.user_id).is_some() {
            return Err(ValidationError::Rejected("user is already a member").into());
        }

        let user_id = member.user_id.clone();
        let patch = Patch::new()
            .array_union("members", vec![serde_json::to_value(&member)?])
            .array_union("memberIds", vec![Value::String(user_id.clone())]);
        let updated = self.update(project_id, &patch).await?;
        info!(project_id, user_id = %user_id, "Project member added");
        Ok(updated)
    }

    /// Remove a member. The owner cannot be removed.
    pub async fn remove_project_member(&self, project_id: &str, user_id: &str) -> Result<Project> {
        let project: Project = self.require(project_id).await?;
        let member = project
            .member(user_id)
            .ok_or_else(|| SynergyError::NotFound(format!("member {user_id} of {project_id}")))?;
        if member.role == MemberRole::Owner {
            return Err(ValidationError::Rejected("the owner cannot be removed").into());
        }

        // Remove exactly this member from both lists; other entries stay.
        let patch = Patch::new()
            .array_remove("members", vec![serde_json::to_value(member)?])
            .array_remove("memberIds", vec![Value::String(user_id.to_string())]);
        let updated = self.update(project_id, &patch).await?;
        info!(project_id, user_id, "Project member removed");
        Ok(updated)
    }

    /// Soft delete.
    pub async fn archive_project(&self, project_id: &str) -> Result<Project> {
        self.update(project_id, &Patch::new().set("isArchived", true))
            .await
    }
}
