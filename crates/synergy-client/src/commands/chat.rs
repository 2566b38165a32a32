use synergy_shared::{Chat, ChatMessage, MessageType, Result, SynergyError};

use crate::state::AppState;
use crate::validation;

/// Open the direct chat with the user registered under `email`, creating
/// it on first use.
pub async fn open_direct_chat(state: &AppState, email: &str) -> Result<Chat> {
    let email = validation::email(email)?;
    let me = state.require_profile()?;
    let chat = state.remote.create_or_get_direct_chat(&me, &email).await?;
    state.cache.chats.add(chat.clone());
    Ok(chat)
}

pub async fn create_group_chat(state: &AppState, name: &str, member_emails: &[&str]) -> Result<Chat> {
    let name = validation::required("name", name)?;
    let me = state.require_profile()?;

    let mut members = Vec::with_capacity(member_emails.len());
    for email in member_emails {
        let email = validation::email(email)?;
        let user = state
            .remote
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| SynergyError::NotFound(format!("user with email {email}")))?;
        members.push(user);
    }

    let chat = state.remote.create_group_chat(&name, &me, &members).await?;
    state.cache.chats.add(chat.clone());
    Ok(chat)
}

pub async fn send_message(state: &AppState, chat_id: &str, content: &str) -> Result<ChatMessage> {
    let content = validation::required("message", content)?;
    let me = state.require_profile()?;
    let sent = state
        .remote
        .send_message(chat_id, &me, &content, MessageType::Text)
        .await?;
    state.cache.messages.add(sent.clone());
    Ok(sent)
}

pub async fn mark_read(state: &AppState, message_id: &str) -> Result<ChatMessage> {
    let me = state.require_identity()?;
    let updated = state.remote.mark_message_read(message_id, &me.uid).await?;
    state.cache.messages.replace(updated.clone());
    Ok(updated)
}
