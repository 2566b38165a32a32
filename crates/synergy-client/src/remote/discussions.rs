use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use synergy_shared::constants::COLLECTION_DISCUSSIONS;
use synergy_shared::{Discussion, Reply, Result};
use synergy_store::{Direction, Query};

use super::{Patch, RemoteAccess};
use crate::subscription::LiveQuery;

impl RemoteAccess {
    pub async fn create_discussion(&self, discussion: &Discussion) -> Result<Discussion> {
        let created = self.insert(discussion).await?;
        info!(discussion_id = %created.id, project_id = %created.project_id, "Discussion created");
        Ok(created)
    }

    /// Discussions of a project, newest first.
    pub fn project_discussions_query(project_id: &str) -> LiveQuery<Discussion> {
        LiveQuery::new(
            Query::collection(COLLECTION_DISCUSSIONS)
                .where_eq("projectId", project_id)
                .order_by("createdAt", Direction::Descending),
        )
    }

    pub async fn project_discussions(&self, project_id: &str) -> Result<Vec<Discussion>> {
        self.query(Self::project_discussions_query(project_id).query())
            .await
    }

    /// Append a reply. Appends are atomic on the store side, so concurrent
    /// replies are all kept.
    pub async fn add_discussion_reply(
        &self,
        discussion_id: &str,
        content: &str,
        author_id: &str,
        author_name: Option<&str>,
    ) -> Result<Discussion> {
        let reply = Reply {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            author_id: author_id.to_string(),
            author_name: author_name.map(str::to_string),
            created_at: Utc::now(),
            likes: 0,
        };
        let patch = Patch::new().array_union("replies", vec![serde_json::to_value(&reply)?]);
        let updated = self.update(discussion_id, &patch).await?;
        info!(discussion_id, reply_id = %reply.id, "Reply added");
        Ok(updated)
    }

    pub async fn set_discussion_pinned(&self, discussion_id: &str, pinned: bool) -> Result<Discussion> {
        self.update(discussion_id, &Patch::new().set("isPinned", pinned))
            .await
    }
}
