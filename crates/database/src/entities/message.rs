//! Message entity definitions

use serde::{Deserialize, Serialize};

use super::user::UserSummary;

/// The conversation a message belongs to: exactly one chat or one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageTarget {
    #[serde(rename = "chat")]
    Chat(String),
    #[serde(rename = "group")]
    Group(String),
}

impl MessageTarget {
    /// Build a target from optional references; `None` unless exactly one is set.
    pub fn from_parts(chat_id: Option<String>, group_id: Option<String>) -> Option<Self> {
        match (chat_id, group_id) {
            (Some(chat_id), None) => Some(Self::Chat(chat_id)),
            (None, Some(group_id)) => Some(Self::Group(group_id)),
            _ => None,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Chat(_) => MessageType::Direct,
            Self::Group(_) => MessageType::Group,
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::Chat(id) => Some(id),
            Self::Group(_) => None,
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Chat(_) => None,
            Self::Group(id) => Some(id),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Chat(id) | Self::Group(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Direct,
    Group,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Direct => "direct",
            MessageType::Group => "group",
        }
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s {
            "group" => MessageType::Group,
            _ => MessageType::Direct,
        }
    }
}

/// Uploaded file metadata stored alongside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub path: String,
    pub mimetype: String,
    pub size: i64,
    pub download_url: String,
    pub upload_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    #[serde(rename = "user")]
    pub user_id: String,
    pub read_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    #[serde(rename = "user")]
    pub user_id: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(flatten)]
    pub target: MessageTarget,
    pub message_type: MessageType,
    pub sender_id: String,
    pub sender: Option<UserSummary>,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub is_edited: bool,
    pub read_by: Vec<ReadReceipt>,
    pub reply_to: Option<String>,
    pub reactions: Vec<Reaction>,
    pub is_system_message: bool,
    pub is_deleted: bool,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Message {
    pub fn is_sent_by(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// Insert payload for a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub target: MessageTarget,
    pub sender_id: String,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub reply_to: Option<String>,
    pub is_system_message: bool,
}

impl NewMessage {
    pub fn text(target: MessageTarget, sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            target,
            sender_id: sender_id.into(),
            content: content.into(),
            attachment: None,
            reply_to: None,
            is_system_message: false,
        }
    }

    pub fn system(target: MessageTarget, sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            is_system_message: true,
            ..Self::text(target, sender_id, content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_requires_exactly_one_reference() {
        assert_eq!(
            MessageTarget::from_parts(Some("c".into()), None),
            Some(MessageTarget::Chat("c".into()))
        );
        assert_eq!(
            MessageTarget::from_parts(None, Some("g".into())),
            Some(MessageTarget::Group("g".into()))
        );
        assert_eq!(MessageTarget::from_parts(Some("c".into()), Some("g".into())), None);
        assert_eq!(MessageTarget::from_parts(None, None), None);
    }

    #[test]
    fn test_message_type_follows_target() {
        assert_eq!(MessageTarget::Chat("c".into()).message_type(), MessageType::Direct);
        assert_eq!(MessageTarget::Group("g".into()).message_type(), MessageType::Group);
    }

    #[test]
    fn test_target_serializes_as_single_reference_field() {
        let message = Message {
            id: "m".into(),
            target: MessageTarget::Group("g".into()),
            message_type: MessageType::Group,
            sender_id: "u".into(),
            sender: None,
            content: "hello".into(),
            attachment: None,
            is_edited: false,
            read_by: Vec::new(),
            reply_to: None,
            reactions: Vec::new(),
            is_system_message: false,
            is_deleted: false,
            deleted_by: None,
            deleted_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["group"], "g");
        assert!(json.get("chat").is_none());
        assert_eq!(json["messageType"], "group");
    }
}
