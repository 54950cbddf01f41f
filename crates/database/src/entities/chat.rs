//! Chat entity definitions

use serde::{Deserialize, Serialize};

use super::user::UserSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub chatname: String,
    pub is_group: bool,
    #[serde(rename = "workspace")]
    pub workspace_id: Option<String>,
    pub group_id: Option<String>,
    /// Ordered member ids; a self-chat lists the same user twice.
    pub members: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Chat {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|member| member == user_id)
    }

    pub fn is_self_chat(&self) -> bool {
        !self.is_group && self.members.len() == 2 && self.members[0] == self.members[1]
    }
}

/// A chat with its members resolved to display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatWithMembers {
    #[serde(flatten)]
    pub chat: Chat,
    pub participants: Vec<UserSummary>,
}

/// Canonical key for an unordered member pair.
pub fn pair_key(member_a: &str, member_b: &str) -> String {
    if member_a <= member_b {
        format!("{member_a}:{member_b}")
    } else {
        format!("{member_b}:{member_a}")
    }
}

/// Canonical key for a workspace scope; "no workspace" is the empty scope.
pub fn scope_key(workspace_id: Option<&str>) -> String {
    workspace_id.unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("a", "b"), pair_key("b", "a"));
        assert_eq!(pair_key("a", "a"), "a:a");
        assert_ne!(pair_key("a", "b"), pair_key("a", "c"));
    }

    #[test]
    fn test_scope_key_treats_missing_workspace_as_own_scope() {
        assert_eq!(scope_key(None), "");
        assert_eq!(scope_key(Some("w1")), "w1");
    }

    #[test]
    fn test_self_chat_detection() {
        let chat = Chat {
            id: "c".to_string(),
            chatname: String::new(),
            is_group: false,
            workspace_id: None,
            group_id: None,
            members: vec!["u".to_string(), "u".to_string()],
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!(chat.is_self_chat());
        assert!(chat.has_member("u"));
        assert!(!chat.has_member("v"));
    }
}
