use chrono::Utc;

use synergy_shared::{Discussion, Result};

use crate::state::AppState;
use crate::validation;

#[derive(Debug, Clone, Default)]
pub struct NewDiscussion {
    pub project_id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

pub async fn create_discussion(state: &AppState, input: NewDiscussion) -> Result<Discussion> {
    let title = validation::required("title", &input.title)?;
    let project_id = validation::required("project", &input.project_id)?;
    let me = state.require_profile()?;
    let now = Utc::now();

    let discussion = Discussion {
        id: String::new(),
        project_id,
        title,
        content: input.content.trim().to_string(),
        author_id: me.id,
        author_name: Some(me.name),
        replies: Vec::new(),
        tags: input.tags,
        is_pinned: false,
        created_at: now,
        updated_at: now,
    };
    let created = state.remote.create_discussion(&discussion).await?;
    state.cache.discussions.add(created.clone());
    Ok(created)
}

pub async fn add_reply(state: &AppState, discussion_id: &str, content: &str) -> Result<Discussion> {
    let content = validation::required("reply", content)?;
    let me = state.require_profile()?;
    let updated = state
        .remote
        .add_discussion_reply(discussion_id, &content, &me.id, Some(&me.name))
        .await?;
    state.cache.discussions.replace(updated.clone());
    Ok(updated)
}

pub async fn set_pinned(state: &AppState, discussion_id: &str, pinned: bool) -> Result<Discussion> {
    let updated = state
        .remote
        .set_discussion_pinned(discussion_id, pinned)
        .await?;
    state.cache.discussions.replace(updated.clone());
    Ok(updated)
}
