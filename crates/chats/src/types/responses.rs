//! Response types for the chat system.

use serde::{Deserialize, Serialize};
use teamhub_database::{ChatWithMembers, Message, MessageTarget, Workspace};

/// Outcome of private chat resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub chat: ChatWithMembers,
    /// True when this call created the chat.
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub pages: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(total: i64, page: u32, limit: u32) -> Self {
        let limit_i64 = i64::from(limit.max(1));
        let pages = (total + limit_i64 - 1) / limit_i64;
        Self {
            total,
            page,
            pages: u32::try_from(pages).unwrap_or(u32::MAX),
            limit,
        }
    }
}

/// One page of group history, oldest message first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessagesPage {
    pub messages: Vec<Message>,
    pub pagination: Pagination,
}

/// Identifies a message that was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMessage {
    pub message_id: String,
    #[serde(flatten)]
    pub target: MessageTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatusReport {
    Invited,
    AlreadyInvited,
}

/// Per-email result of sending invitations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationOutcome {
    pub email: String,
    pub status: InvitationStatusReport,
}

/// Result of accepting an invitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedInvitation {
    pub workspace: Workspace,
    /// Private chats with the other workspace members.
    pub chats: Vec<ChatWithMembers>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWorkspaces {
    pub my_workspaces: Vec<Workspace>,
    pub guest_workspaces: Vec<Workspace>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_rounds_pages_up() {
        assert_eq!(Pagination::new(0, 1, 50).pages, 0);
        assert_eq!(Pagination::new(50, 1, 50).pages, 1);
        assert_eq!(Pagination::new(51, 1, 50).pages, 2);
    }

    #[test]
    fn test_invitation_status_wire_names() {
        let json = serde_json::to_value(InvitationOutcome {
            email: "a@example.com".into(),
            status: InvitationStatusReport::AlreadyInvited,
        })
        .unwrap();
        assert_eq!(json["status"], "already_invited");
    }
}
