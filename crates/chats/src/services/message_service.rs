//! Message service for sending, editing and deleting messages.
//!
//! REST handlers and socket handlers both go through this service, so the
//! validation and authorization rules live here only. Each mutation is
//! published on the event sink after it is stored.

use std::sync::Arc;

use sqlx::SqlitePool;
use teamhub_database::{
    ChatRepository, GroupRepository, Message, MessageRepository, MessageTarget, MessageType,
    NewMessage,
};
use tracing::{debug, info};

use crate::types::{
    validate_content, ChatError, ChatEvent, ChatResult, DeletedMessage, EventSink, GroupMessagesPage,
    MessageDraft, PageRequest, Pagination,
};
use crate::utils::{GroupAction, PermissionChecker, Validator};

#[derive(Clone)]
pub struct MessageService {
    chats: ChatRepository,
    groups: GroupRepository,
    messages: MessageRepository,
    events: Arc<dyn EventSink>,
}

impl MessageService {
    pub fn new(pool: SqlitePool, events: Arc<dyn EventSink>) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            groups: GroupRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            events,
        }
    }

    /// Store a message from `author` in `target` and publish it.
    pub async fn send(&self, author: &str, target: MessageTarget, draft: MessageDraft) -> ChatResult<Message> {
        self.authorize_send(author, &target).await?;
        draft.validate().map_err(ChatError::validation)?;

        if let Some(reply_to) = &draft.reply_to {
            Validator::reference("replyTo", reply_to)?;
            let original = self
                .messages
                .find_by_id(reply_to)
                .await?
                .ok_or_else(|| ChatError::not_found("Replied message"))?;
            if original.target != target {
                return Err(ChatError::validation(
                    "Replies must reference a message in the same conversation",
                ));
            }
        }

        let message = self
            .messages
            .insert(NewMessage {
                target,
                sender_id: author.to_string(),
                content: draft.content,
                attachment: draft.attachment,
                reply_to: draft.reply_to,
                is_system_message: false,
            })
            .await?;

        info!(message_id = %message.id, target = %message.target.id(), "message sent");
        self.events.publish(ChatEvent::MessageCreated {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Replace the content of a message; only its sender may do so.
    pub async fn edit(&self, message_id: &str, editor: &str, content: &str) -> ChatResult<Message> {
        let message = self.load_live(message_id).await?;
        self.apply_edit(message, editor, content).await
    }

    /// [`edit`](Self::edit), failing with `InvalidTarget` when the message is
    /// not of `kind`.
    pub async fn edit_of_kind(
        &self,
        message_id: &str,
        editor: &str,
        content: &str,
        kind: MessageType,
    ) -> ChatResult<Message> {
        let message = self.load_live_of_kind(message_id, kind).await?;
        self.apply_edit(message, editor, content).await
    }

    async fn apply_edit(&self, message: Message, editor: &str, content: &str) -> ChatResult<Message> {
        if !message.is_sent_by(editor) {
            return Err(ChatError::forbidden("You can only edit your own messages"));
        }
        validate_content(content).map_err(ChatError::validation)?;

        let updated = self.messages.update_content(&message.id, content).await?;

        info!(message_id = %updated.id, "message edited");
        self.events.publish(ChatEvent::MessageUpdated {
            message: updated.clone(),
        });
        Ok(updated)
    }

    /// Delete a message; direct messages are removed, group messages are tombstoned.
    pub async fn delete(&self, message_id: &str, requester: &str) -> ChatResult<DeletedMessage> {
        let message = self.load_live(message_id).await?;
        self.apply_delete(message, requester).await
    }

    /// [`delete`](Self::delete), failing with `InvalidTarget` when the
    /// message is not of `kind`.
    pub async fn delete_of_kind(
        &self,
        message_id: &str,
        requester: &str,
        kind: MessageType,
    ) -> ChatResult<DeletedMessage> {
        let message = self.load_live_of_kind(message_id, kind).await?;
        self.apply_delete(message, requester).await
    }

    async fn apply_delete(&self, message: Message, requester: &str) -> ChatResult<DeletedMessage> {
        if !message.is_sent_by(requester) {
            return Err(ChatError::forbidden("You can only delete your own messages"));
        }

        let removed = match &message.target {
            MessageTarget::Chat(_) => self.messages.hard_delete(&message.id).await?,
            MessageTarget::Group(_) => self.messages.soft_delete(&message.id, requester).await?,
        };
        if !removed {
            return Err(ChatError::not_found("Message"));
        }

        info!(message_id = %message.id, target = %message.target.id(), "message deleted");
        let deleted = DeletedMessage {
            message_id: message.id,
            target: message.target,
        };
        self.events.publish(ChatEvent::MessageDeleted {
            message_id: deleted.message_id.clone(),
            target: deleted.target.clone(),
        });
        Ok(deleted)
    }

    /// Full history of a chat, oldest first.
    pub async fn list_chat_messages(&self, chat_id: &str, user_id: &str) -> ChatResult<Vec<Message>> {
        self.authorize_read(user_id, &MessageTarget::Chat(chat_id.to_string()))
            .await?;
        Ok(self.messages.list_for_chat(chat_id).await?)
    }

    /// A page of group history counted from the newest message.
    ///
    /// Messages from other senders are marked read for the caller.
    pub async fn list_group_messages(
        &self,
        group_id: &str,
        user_id: &str,
        page: PageRequest,
    ) -> ChatResult<GroupMessagesPage> {
        self.authorize_read(user_id, &MessageTarget::Group(group_id.to_string()))
            .await?;

        let total = self.messages.count_for_group(group_id).await?;
        let messages = self
            .messages
            .list_for_group(group_id, i64::from(page.limit()), page.offset())
            .await?;

        let marked = self.messages.mark_group_read(group_id, user_id).await?;
        debug!(group_id = %group_id, user_id = %user_id, marked, "marked group messages read");

        Ok(GroupMessagesPage {
            messages,
            pagination: Pagination::new(total, page.page(), page.limit()),
        })
    }

    pub async fn mark_read(&self, message_id: &str, user_id: &str) -> ChatResult<Message> {
        let message = self.load_live(message_id).await?;
        self.authorize_read(user_id, &message.target).await?;

        self.messages.mark_read(&message.id, user_id).await?;
        self.reload(&message.id).await
    }

    /// Add the reaction, or remove it if the user already reacted with it.
    pub async fn toggle_reaction(&self, message_id: &str, user_id: &str, emoji: &str) -> ChatResult<Message> {
        Validator::emoji(emoji)?;
        let message = self.load_live(message_id).await?;
        self.authorize_read(user_id, &message.target).await?;

        let added = self
            .messages
            .toggle_reaction(&message.id, user_id, emoji.trim())
            .await?;
        debug!(message_id = %message.id, added, "toggled reaction");

        let updated = self.reload(&message.id).await?;
        self.events.publish(ChatEvent::MessageUpdated {
            message: updated.clone(),
        });
        Ok(updated)
    }

    /// Whether `user_id` may read `target`.
    pub async fn can_access(&self, user_id: &str, target: &MessageTarget) -> ChatResult<bool> {
        match self.authorize_read(user_id, target).await {
            Ok(()) => Ok(true),
            Err(ChatError::Forbidden { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn authorize_read(&self, user_id: &str, target: &MessageTarget) -> ChatResult<()> {
        match target {
            MessageTarget::Chat(chat_id) => {
                Validator::reference("chatId", chat_id)?;
                let chat = self
                    .chats
                    .find_by_id(chat_id)
                    .await?
                    .ok_or_else(|| ChatError::not_found("Chat"))?;
                PermissionChecker::chat_member(&chat, user_id)
            }
            MessageTarget::Group(group_id) => {
                Validator::reference("groupId", group_id)?;
                let group = self
                    .groups
                    .find_by_id(group_id)
                    .await?
                    .ok_or_else(|| ChatError::not_found("Group"))?;
                PermissionChecker::group_member(&group, user_id).map(|_| ())
            }
        }
    }

    async fn authorize_send(&self, author: &str, target: &MessageTarget) -> ChatResult<()> {
        match target {
            MessageTarget::Chat(_) => self.authorize_read(author, target).await,
            MessageTarget::Group(group_id) => {
                Validator::reference("groupId", group_id)?;
                let group = self
                    .groups
                    .find_by_id(group_id)
                    .await?
                    .ok_or_else(|| ChatError::not_found("Group"))?;
                PermissionChecker::not_archived(&group)?;
                PermissionChecker::group_action(&group, author, GroupAction::SendMessages)
            }
        }
    }

    async fn load_live(&self, message_id: &str) -> ChatResult<Message> {
        Validator::reference("messageId", message_id)?;
        self.messages
            .find_by_id(message_id)
            .await?
            .filter(|message| !message.is_deleted)
            .ok_or_else(|| ChatError::not_found("Message"))
    }

    async fn load_live_of_kind(&self, message_id: &str, kind: MessageType) -> ChatResult<Message> {
        let message = self.load_live(message_id).await?;
        if message.target.message_type() != kind {
            return Err(ChatError::InvalidTarget);
        }
        Ok(message)
    }

    async fn reload(&self, message_id: &str) -> ChatResult<Message> {
        self.messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| ChatError::not_found("Message"))
    }
}
