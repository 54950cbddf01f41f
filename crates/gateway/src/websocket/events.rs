//! Socket frame types.
//!
//! Every frame is `{"event": "<kebab-name>", "data": <payload>}` in both
//! directions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use teamhub_database::{Group, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

/// A room reference sent either as a bare id or as an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoomRef {
    Id(String),
    Chat {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    Group {
        #[serde(rename = "groupId")]
        group_id: String,
    },
}

impl RoomRef {
    pub fn id(&self) -> &str {
        match self {
            RoomRef::Id(id) | RoomRef::Chat { chat_id: id } | RoomRef::Group { group_id: id } => id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConnected {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub chat_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTypingPayload {
    pub group_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub content: String,
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGroupMessagePayload {
    pub content: String,
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessagePayload {
    pub message_id: String,
    pub content: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    pub message_id: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMessagesPayload {
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangePayload {
    pub user_id: Option<String>,
    pub status: PresenceStatus,
}

/// Events received from socket clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    UserConnected(UserConnected),
    JoinChat(RoomRef),
    LeaveChat(RoomRef),
    JoinGroup(RoomRef),
    LeaveGroup(RoomRef),
    TypingStart(TypingPayload),
    TypingStop(TypingPayload),
    TypingStartGroup(GroupTypingPayload),
    TypingStopGroup(GroupTypingPayload),
    SendMessage(SendMessagePayload),
    SendGroupMessage(SendGroupMessagePayload),
    EditMessage(EditMessagePayload),
    EditGroupMessage(EditMessagePayload),
    DeleteMessage(DeleteMessagePayload),
    DeleteGroupMessage(DeleteMessagePayload),
    FetchMessages(FetchMessagesPayload),
    StatusChange(StatusChangePayload),
    GetUserStatuses,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotice {
    pub user_id: String,
    pub status: PresenceStatus,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomNotice {
    pub chat_id: String,
    pub socket_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRoomNotice {
    pub group_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Set when the user left the group itself rather than the room.
    pub is_leaving: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub chat_id: String,
    pub user_id: String,
    pub user_name: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTypingNotice {
    pub group_id: String,
    pub user_id: String,
    pub user_name: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedNotice {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDeletedNotice {
    pub message_id: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFailure {
    pub error: String,
    pub original_message: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageIdFailure {
    pub error: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFailure {
    pub error: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFailure {
    pub error: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAck {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessages {
    pub chat_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersAddedNotice {
    pub group_id: String,
    pub added_by: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRemovedNotice {
    pub group_id: String,
    pub removed_user_id: String,
    pub removed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUpdatedNotice {
    pub group_id: String,
    pub updated_by: String,
    pub updates: Group,
}

/// Events pushed to socket clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    UserStatusChange(StatusNotice),
    UserJoinedChat(ChatRoomNotice),
    UserLeftChat(ChatRoomNotice),
    UserJoinedGroup(GroupRoomNotice),
    UserLeftGroup(GroupRoomNotice),
    UserTyping(TypingNotice),
    UserTypingGroup(GroupTypingNotice),
    NewMessage(Message),
    GroupNewMessage(Message),
    UpdatedMessage(Message),
    GroupUpdatedMessage(Message),
    DeletedMessage(DeletedNotice),
    GroupDeletedMessage(GroupDeletedNotice),
    MessageError(MessageFailure),
    GroupMessageError(MessageFailure),
    EditMessageError(MessageIdFailure),
    EditGroupMessageError(MessageIdFailure),
    DeleteMessageError(MessageIdFailure),
    DeleteGroupMessageError(MessageIdFailure),
    FetchMessagesError(ChatFailure),
    JoinChatError(ChatFailure),
    JoinGroupError(GroupFailure),
    UserConnectedError(Failure),
    Error(Failure),
    EditMessageSuccess(MessageAck),
    DeleteMessageSuccess(MessageAck),
    ChatMessages(ChatMessages),
    UserStatuses(BTreeMap<String, PresenceStatus>),
    GroupMembersAdded(MembersAddedNotice),
    GroupMemberRemoved(MemberRemovedNotice),
    GroupUpdated(GroupUpdatedNotice),
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(Failure {
            error: message.into(),
        })
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::UserStatusChange(_) => "user-status-change",
            ServerEvent::UserJoinedChat(_) => "user-joined-chat",
            ServerEvent::UserLeftChat(_) => "user-left-chat",
            ServerEvent::UserJoinedGroup(_) => "user-joined-group",
            ServerEvent::UserLeftGroup(_) => "user-left-group",
            ServerEvent::UserTyping(_) => "user-typing",
            ServerEvent::UserTypingGroup(_) => "user-typing-group",
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::GroupNewMessage(_) => "group-new-message",
            ServerEvent::UpdatedMessage(_) => "updated-message",
            ServerEvent::GroupUpdatedMessage(_) => "group-updated-message",
            ServerEvent::DeletedMessage(_) => "deleted-message",
            ServerEvent::GroupDeletedMessage(_) => "group-deleted-message",
            ServerEvent::MessageError(_) => "message-error",
            ServerEvent::GroupMessageError(_) => "group-message-error",
            ServerEvent::EditMessageError(_) => "edit-message-error",
            ServerEvent::EditGroupMessageError(_) => "edit-group-message-error",
            ServerEvent::DeleteMessageError(_) => "delete-message-error",
            ServerEvent::DeleteGroupMessageError(_) => "delete-group-message-error",
            ServerEvent::FetchMessagesError(_) => "fetch-messages-error",
            ServerEvent::JoinChatError(_) => "join-chat-error",
            ServerEvent::JoinGroupError(_) => "join-group-error",
            ServerEvent::UserConnectedError(_) => "user-connected-error",
            ServerEvent::Error(_) => "error",
            ServerEvent::EditMessageSuccess(_) => "edit-message-success",
            ServerEvent::DeleteMessageSuccess(_) => "delete-message-success",
            ServerEvent::ChatMessages(_) => "chat-messages",
            ServerEvent::UserStatuses(_) => "user-statuses",
            ServerEvent::GroupMembersAdded(_) => "group-members-added",
            ServerEvent::GroupMemberRemoved(_) => "group-member-removed",
            ServerEvent::GroupUpdated(_) => "group-updated",
        }
    }
}
