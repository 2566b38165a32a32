use chrono::{DateTime, Utc};
use tracing::{info, warn};

use synergy_shared::constants::PROGRESS_MAX;
use synergy_shared::{
    MemberRole, Priority, Project, ProjectMember, ProjectStatus, Result, SynergyError,
};

use crate::notifications::ProjectUpdateKind;
use crate::remote::Patch;
use crate::state::AppState;
use crate::stats::ProjectStats;
use crate::validation;

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub deadline: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub color: Option<String>,
}

/// Create a project owned by the signed-in user.
pub async fn create_project(state: &AppState, input: NewProject) -> Result<Project> {
    let name = validation::required("name", &input.name)?;
    let me = state.require_profile()?;
    let now = Utc::now();

    let project = Project {
        id: String::new(),
        name,
        description: input.description.trim().to_string(),
        owner_id: me.id.clone(),
        members: vec![ProjectMember {
            user_id: me.id.clone(),
            email: me.email.clone(),
            name: me.name.clone(),
            role: MemberRole::Owner,
            joined_at: now,
        }],
        member_ids: vec![me.id.clone()],
        status: ProjectStatus::Active,
        priority: input.priority,
        progress: 0,
        deadline: input.deadline,
        tags: input.tags,
        color: input.color,
        is_archived: false,
        created_at: now,
        updated_at: now,
    };

    let created = state.remote.create_project(&project).await?;
    state.cache.projects.add(created.clone());
    Ok(created)
}

/// Fetch a project, cache it and make it the selected one.
pub async fn open_project(state: &AppState, project_id: &str) -> Result<Project> {
    let project: Project = state.remote.require(project_id).await?;
    state.cache.projects.add(project.clone());
    state.cache.select_project(Some(project.id.clone()));
    Ok(project)
}

/// Add the user registered under `email` to a project.
pub async fn add_member(
    state: &AppState,
    project_id: &str,
    email: &str,
    role: MemberRole,
) -> Result<Project> {
    let email = validation::email(email)?;
    let user = state
        .remote
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| SynergyError::NotFound(format!("user with email {email}")))?;

    let member = ProjectMember {
        user_id: user.id,
        email: user.email,
        name: user.name,
        role,
        joined_at: Utc::now(),
    };
    let updated = state.remote.add_project_member(project_id, member).await?;
    state.cache.projects.add(updated.clone());
    Ok(updated)
}

pub async fn remove_member(state: &AppState, project_id: &str, user_id: &str) -> Result<Project> {
    let updated = state
        .remote
        .remove_project_member(project_id, user_id)
        .await?;
    state.cache.projects.add(updated.clone());
    Ok(updated)
}

pub async fn update_project(state: &AppState, project_id: &str, patch: &Patch) -> Result<Project> {
    let updated = state.remote.update_project(project_id, patch).await?;
    state.cache.projects.replace(updated.clone());
    Ok(updated)
}

pub async fn set_project_status(
    state: &AppState,
    project_id: &str,
    status: ProjectStatus,
) -> Result<Project> {
    let patch = Patch::new().set_value("status", &status)?;
    let updated = update_project(state, project_id, &patch).await?;
    let kind = if status == ProjectStatus::Completed {
        ProjectUpdateKind::Completed
    } else {
        ProjectUpdateKind::StatusChanged
    };
    announce(state, &updated, kind).await;
    Ok(updated)
}

pub async fn set_project_deadline(
    state: &AppState,
    project_id: &str,
    deadline: Option<DateTime<Utc>>,
) -> Result<Project> {
    let patch = Patch::new().set_time("deadline", deadline);
    let updated = update_project(state, project_id, &patch).await?;
    announce(state, &updated, ProjectUpdateKind::DeadlineChanged).await;
    Ok(updated)
}

/// Set progress, clamped to 0-100.
pub async fn set_project_progress(state: &AppState, project_id: &str, progress: i64) -> Result<Project> {
    let clamped = progress.clamp(0, i64::from(PROGRESS_MAX));
    update_project(state, project_id, &Patch::new().set("progress", clamped)).await
}

/// Soft delete.
pub async fn archive_project(state: &AppState, project_id: &str) -> Result<Project> {
    let archived = state.remote.archive_project(project_id).await?;
    state.cache.projects.replace(archived.clone());
    if state.cache.selected_project_id().as_deref() == Some(project_id) {
        state.cache.select_project(None);
    }
    info!(project_id, "Project archived");
    Ok(archived)
}

/// Statistics of the tasks currently cached for a project.
pub fn project_stats(state: &AppState, project_id: &str) -> ProjectStats {
    ProjectStats::from_tasks(&state.cache.tasks_by_project(project_id), Utc::now())
}

async fn announce(state: &AppState, project: &Project, kind: ProjectUpdateKind) {
    if let Err(e) = state
        .notifications
        .notify_project_update(&project.name, kind)
        .await
    {
        warn!(project_id = %project.id, error = %e, "Failed to schedule project update alert");
    }
}
