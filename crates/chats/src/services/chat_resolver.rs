//! Find-or-create resolution of private chats.
//!
//! A private chat is identified by its unordered member pair plus the
//! workspace scope. The store holds a unique index over that key, so two
//! concurrent resolvers can both miss the lookup but only one insert wins;
//! the loser re-reads and returns the winner's chat.

use std::sync::Arc;

use sqlx::SqlitePool;
use teamhub_database::{
    Chat, ChatRepository, ChatWithMembers, MessageRepository, MessageTarget, NewMessage,
    UserRepository, WorkspaceRepository,
};
use tracing::{debug, info, warn};

use crate::types::{ChatError, ChatEvent, ChatResult, EventSink, Resolution};
use crate::utils::Validator;

#[derive(Clone)]
pub struct ChatResolver {
    chats: ChatRepository,
    messages: MessageRepository,
    users: UserRepository,
    workspaces: WorkspaceRepository,
    events: Arc<dyn EventSink>,
}

impl ChatResolver {
    pub fn new(pool: SqlitePool, events: Arc<dyn EventSink>) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            workspaces: WorkspaceRepository::new(pool),
            events,
        }
    }

    /// Return the private chat between `member_a` and `member_b` in the given
    /// workspace scope, creating it (with a welcome message) if needed.
    ///
    /// A missing `member_b` resolves the self-chat of `member_a`.
    pub async fn resolve_private_chat(
        &self,
        member_a: &str,
        member_b: Option<&str>,
        workspace_id: Option<&str>,
        chatname: Option<&str>,
    ) -> ChatResult<Resolution> {
        Validator::reference("member", member_a)?;
        let member_b = member_b.unwrap_or(member_a);
        Validator::reference("member", member_b)?;
        if let Some(workspace_id) = workspace_id {
            Validator::reference("workspace", workspace_id)?;
        }

        if let Some(chat) = self.chats.find_private(member_a, member_b, workspace_id).await? {
            debug!(chat_id = %chat.id, "resolved existing private chat");
            return Ok(Resolution {
                chat: self.with_members(chat).await?,
                created: false,
            });
        }

        for member in [member_a, member_b] {
            if !self.users.exists(member).await? {
                return Err(ChatError::not_found(format!("User {member}")));
            }
        }

        let workspace_name = match workspace_id {
            Some(workspace_id) => Some(
                self.workspaces
                    .find_by_id(workspace_id)
                    .await?
                    .ok_or_else(|| ChatError::not_found("Workspace"))?
                    .name,
            ),
            None => None,
        };

        let chatname = chatname.map(str::trim).unwrap_or_default();
        let chat = match self
            .chats
            .create_private(member_a, member_b, workspace_id, chatname)
            .await
        {
            Ok(chat) => chat,
            Err(error) if error.is_duplicate() => {
                debug!(member_a = %member_a, member_b = %member_b, "lost private chat creation race");
                let chat = self
                    .chats
                    .find_private(member_a, member_b, workspace_id)
                    .await?
                    .ok_or_else(|| ChatError::store_unavailable("private chat vanished after conflict"))?;
                return Ok(Resolution {
                    chat: self.with_members(chat).await?,
                    created: false,
                });
            }
            Err(error) => return Err(error.into()),
        };

        info!(chat_id = %chat.id, workspace_id = ?workspace_id, "resolved new private chat");

        self.write_welcome(&chat, member_a, workspace_name.as_deref()).await;

        Ok(Resolution {
            chat: self.with_members(chat).await?,
            created: true,
        })
    }

    /// Every chat the user belongs to, most recently active first.
    pub async fn list_user_chats(&self, user_id: &str) -> ChatResult<Vec<ChatWithMembers>> {
        let chats = self.chats.list_for_user(user_id).await?;
        let mut resolved = Vec::with_capacity(chats.len());
        for chat in chats {
            resolved.push(self.with_members(chat).await?);
        }
        Ok(resolved)
    }

    pub async fn with_members(&self, chat: Chat) -> ChatResult<ChatWithMembers> {
        let participants = self.users.find_summaries(&chat.members).await?;
        Ok(ChatWithMembers { chat, participants })
    }

    async fn write_welcome(&self, chat: &Chat, author: &str, workspace_name: Option<&str>) {
        match self.messages.count_for_chat(&chat.id).await {
            Ok(0) => {}
            Ok(_) => return,
            Err(error) => {
                warn!(chat_id = %chat.id, error = %error, "could not count chat messages for welcome");
                return;
            }
        }

        let text = welcome_text(workspace_name, &chat.chatname);
        let message = NewMessage::text(MessageTarget::Chat(chat.id.clone()), author, text);
        match self.messages.insert(message).await {
            Ok(message) => self.events.publish(ChatEvent::MessageCreated { message }),
            Err(error) => warn!(chat_id = %chat.id, error = %error, "failed to write welcome message"),
        }
    }
}

/// Greeting written into a newly created private chat.
pub fn welcome_text(workspace_name: Option<&str>, chatname: &str) -> String {
    match workspace_name {
        Some(name) => format!("Welcome to the {name} workspace chat!"),
        None if !chatname.trim().is_empty() => format!("Welcome to {}!", chatname.trim()),
        None => "Chat started.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_text_variants() {
        assert_eq!(
            welcome_text(Some("Acme"), "ignored"),
            "Welcome to the Acme workspace chat!"
        );
        assert_eq!(welcome_text(None, " Lunch "), "Welcome to Lunch!");
        assert_eq!(welcome_text(None, ""), "Chat started.");
    }
}
