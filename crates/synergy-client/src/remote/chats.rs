use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use synergy_shared::constants::{COLLECTION_CHATS, COLLECTION_MESSAGES};
use synergy_shared::{
    direct_chat_id, Chat, ChatMessage, ChatParticipant, MessageType, Result, SynergyError,
    UserProfile, ValidationError,
};
use synergy_store::{Direction, Query};

use super::{Patch, RemoteAccess};
use crate::subscription::LiveQuery;

fn participant(profile: &UserProfile, joined_at: DateTime<Utc>) -> ChatParticipant {
    ChatParticipant {
        user_id: profile.id.clone(),
        email: profile.email.clone(),
        name: profile.name.clone(),
        joined_at,
        is_active: true,
    }
}

impl RemoteAccess {
    /// The direct chat between `me` and the user registered under
    /// `target_email`, created on first use.
    ///
    /// The chat id is derived from the two user ids and creation is
    /// create-if-absent, so both sides racing to open the chat end up with
    /// the same single document.
    pub async fn create_or_get_direct_chat(&self, me: &UserProfile, target_email: &str) -> Result<Chat> {
        let target = self
            .find_user_by_email(target_email)
            .await?
            .ok_or_else(|| SynergyError::NotFound(format!("user with email {target_email}")))?;
        if target.id == me.id {
            return Err(ValidationError::Rejected("cannot start a chat with yourself").into());
        }

        let id = direct_chat_id(&me.id, &target.id);
        let now = Utc::now();
        let chat = Chat {
            id: id.clone(),
            participants: vec![participant(me, now), participant(&target, now)],
            participant_ids: vec![me.id.clone(), target.id.clone()],
            is_group: false,
            name: None,
            last_message_at: now,
            created_at: now,
            updated_at: now,
        };
        let (chat, created) = self.create_with_id(&id, &chat).await?;
        if created {
            info!(chat_id = %id, "Direct chat created");
        } else {
            debug!(chat_id = %id, "Direct chat already exists");
        }
        Ok(chat)
    }

    pub async fn create_group_chat(
        &self,
        name: &str,
        creator: &UserProfile,
        members: &[UserProfile],
    ) -> Result<Chat> {
        let now = Utc::now();
        let mut participants = vec![participant(creator, now)];
        for member in members {
            if participants.iter().all(|p| p.user_id != member.id) {
                participants.push(participant(member, now));
            }
        }
        let chat = Chat {
            id: String::new(),
            participant_ids: participants.iter().map(|p| p.user_id.clone()).collect(),
            participants,
            is_group: true,
            name: Some(name.to_string()),
            last_message_at: now,
            created_at: now,
            updated_at: now,
        };
        let created = self.insert(&chat).await?;
        info!(chat_id = %created.id, members = created.participants.len(), "Group chat created");
        Ok(created)
    }

    /// Chats `uid` takes part in, most recent activity first.
    pub fn user_chats_query(uid: &str) -> LiveQuery<Chat> {
        LiveQuery::new(
            Query::collection(COLLECTION_CHATS)
                .where_array_contains("participantIds", uid)
                .order_by("lastMessageAt", Direction::Descending),
        )
    }

    pub async fn user_chats(&self, uid: &str) -> Result<Vec<Chat>> {
        self.query(Self::user_chats_query(uid).query()).await
    }

    /// Messages of a chat, oldest first.
    pub fn chat_messages_query(chat_id: &str) -> LiveQuery<ChatMessage> {
        LiveQuery::new(
            Query::collection(COLLECTION_MESSAGES)
                .where_eq("chatId", chat_id)
                .order_by("createdAt", Direction::Ascending),
        )
    }

    /// Messages of a chat, newest first.
    pub async fn chat_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        let query = Query::collection(COLLECTION_MESSAGES)
            .where_eq("chatId", chat_id)
            .order_by("createdAt", Direction::Descending);
        self.query(&query).await
    }

    /// Post a message and bump the chat's `lastMessageAt`.
    pub async fn send_message(
        &self,
        chat_id: &str,
        sender: &UserProfile,
        content: &str,
        message_type: MessageType,
    ) -> Result<ChatMessage> {
        let chat: Chat = self.require(chat_id).await?;
        if !chat.participant_ids.contains(&sender.id) {
            return Err(SynergyError::PermissionDenied(format!(
                "{} is not part of chat {chat_id}",
                sender.id
            )));
        }

        let now = Utc::now();
        let message = ChatMessage {
            id: String::new(),
            chat_id: chat_id.to_string(),
            sender_id: sender.id.clone(),
            sender_name: sender.name.clone(),
            sender_email: sender.email.clone(),
            content: content.to_string(),
            message_type,
            read_by: vec![sender.id.clone()],
            created_at: now,
            updated_at: now,
        };
        let sent = self.insert(&message).await?;
        self.update::<Chat>(chat_id, &Patch::new().set_time("lastMessageAt", Some(sent.created_at)))
            .await?;
        debug!(chat_id, message_id = %sent.id, "Message sent");
        Ok(sent)
    }

    pub async fn mark_message_read(&self, message_id: &str, uid: &str) -> Result<ChatMessage> {
        let patch = Patch::new().array_union("readBy", vec![Value::String(uid.to_string())]);
        self.update(message_id, &patch).await
    }
}
