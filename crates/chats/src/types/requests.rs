//! Request types for the chat system.

use serde::{Deserialize, Serialize};
use teamhub_database::{Attachment, GroupSettingsPatch};

/// Longest accepted message body, in bytes.
pub const MAX_MESSAGE_LENGTH: usize = 100_000;

/// Longest accepted group name, in characters.
pub const MAX_GROUP_NAME_LENGTH: usize = 100;

/// Content and optional extras of a message about to be sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub content: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

impl MessageDraft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_content(&self.content)
    }
}

/// Reject blank or oversized message bodies.
pub fn validate_content(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("Message content cannot be empty".to_string());
    }

    if content.len() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message content too long (max {MAX_MESSAGE_LENGTH} bytes)"
        ));
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "workspaceId")]
    pub workspace: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl CreateGroupRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_group_name(&self.name)
    }
}

fn validate_group_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Group name cannot be empty".to_string());
    }

    if name.chars().count() > MAX_GROUP_NAME_LENGTH {
        return Err(format!(
            "Group name too long (max {MAX_GROUP_NAME_LENGTH} characters)"
        ));
    }

    Ok(())
}

/// Partial update of a group's descriptive fields and settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Option<GroupSettingsPatch>,
}

impl UpdateGroupRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.settings.as_ref().map_or(true, GroupSettingsPatch::is_empty)
    }

    pub fn validate(&self) -> Result<(), String> {
        match &self.name {
            Some(name) => validate_group_name(name),
            None => Ok(()),
        }
    }
}

/// Page selection for group history.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 100;

    /// Page number starting at 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to `1..=MAX_LIMIT`.
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.limit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_validation() {
        assert!(validate_content("hi").is_ok());
        assert!(validate_content("   \n").is_err());
        assert!(validate_content(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_page_defaults_and_caps() {
        let page = PageRequest::default();
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 50);
        assert_eq!(page.offset(), 0);

        let page = PageRequest {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!(page.limit(), 100);
        assert_eq!(page.offset(), 200);

        let page = PageRequest {
            page: Some(0),
            limit: Some(0),
        };
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 1);
    }

    #[test]
    fn test_update_request_emptiness() {
        assert!(UpdateGroupRequest::default().is_empty());
        let request = UpdateGroupRequest {
            settings: Some(GroupSettingsPatch::default()),
            ..Default::default()
        };
        assert!(request.is_empty());

        let request = UpdateGroupRequest {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert!(!request.is_empty());
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_group_accepts_workspace_id_alias() {
        let request: CreateGroupRequest =
            serde_json::from_str(r#"{"name":"Design","workspaceId":"w"}"#).unwrap();
        assert_eq!(request.workspace, "w");
        assert!(request.members.is_empty());
    }
}
