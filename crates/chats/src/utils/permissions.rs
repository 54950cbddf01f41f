//! Permission checking utilities.

use teamhub_database::{Chat, Group, GroupMember, Permission};

use crate::types::{ChatError, ChatResult};

/// Group actions gated by a group setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    SendMessages,
    AddMembers,
    ChangeGroupInfo,
    PinMessages,
}

impl GroupAction {
    fn gate(&self, group: &Group) -> Permission {
        match self {
            GroupAction::SendMessages => group.settings.send_messages,
            GroupAction::AddMembers => group.settings.add_members,
            GroupAction::ChangeGroupInfo => group.settings.change_group_info,
            GroupAction::PinMessages => group.settings.pin_messages,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            GroupAction::SendMessages => "send messages",
            GroupAction::AddMembers => "add members",
            GroupAction::ChangeGroupInfo => "change group info",
            GroupAction::PinMessages => "pin messages",
        }
    }
}

/// Permission checking utilities
pub struct PermissionChecker;

impl PermissionChecker {
    pub fn chat_member(chat: &Chat, user_id: &str) -> ChatResult<()> {
        if !chat.has_member(user_id) {
            return Err(ChatError::forbidden("You are not a member of this chat"));
        }
        Ok(())
    }

    pub fn group_member<'a>(group: &'a Group, user_id: &str) -> ChatResult<&'a GroupMember> {
        group
            .active_member(user_id)
            .ok_or_else(|| ChatError::forbidden("You are not a member of this group"))
    }

    pub fn group_admin(group: &Group, user_id: &str) -> ChatResult<()> {
        if !group.is_admin(user_id) {
            return Err(ChatError::forbidden("Only group admins can do this"));
        }
        Ok(())
    }

    /// Active member who passes the setting gating `action`.
    pub fn group_action(group: &Group, user_id: &str, action: GroupAction) -> ChatResult<()> {
        Self::group_member(group, user_id)?;
        if !action.gate(group).allows(group.is_admin(user_id)) {
            return Err(ChatError::forbidden(format!(
                "Only group admins can {}",
                action.describe()
            )));
        }
        Ok(())
    }

    pub fn not_archived(group: &Group) -> ChatResult<()> {
        if group.is_archived {
            return Err(ChatError::forbidden("This group is archived"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamhub_database::{GroupRole, GroupSettings};

    fn group(send_messages: Permission) -> Group {
        let member = |user_id: &str, role| GroupMember {
            user_id: user_id.to_string(),
            role,
            joined_at: String::new(),
            added_by: "a".to_string(),
            is_active: true,
        };
        Group {
            id: "g".into(),
            name: "Design".into(),
            description: String::new(),
            avatar: String::new(),
            workspace_id: "w".into(),
            created_by: "a".into(),
            members: vec![member("a", GroupRole::Admin), member("b", GroupRole::Member)],
            settings: GroupSettings {
                send_messages,
                ..GroupSettings::default()
            },
            pinned_messages: Vec::new(),
            is_archived: false,
            archived_at: None,
            chat_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_group_action_follows_settings() {
        let open = group(Permission::All);
        assert!(PermissionChecker::group_action(&open, "b", GroupAction::SendMessages).is_ok());
        assert!(PermissionChecker::group_action(&open, "b", GroupAction::PinMessages).is_err());
        assert!(PermissionChecker::group_action(&open, "z", GroupAction::SendMessages).is_err());

        let locked = group(Permission::Admins);
        assert!(PermissionChecker::group_action(&locked, "a", GroupAction::SendMessages).is_ok());
        assert!(matches!(
            PermissionChecker::group_action(&locked, "b", GroupAction::SendMessages),
            Err(ChatError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_admin_and_archive_checks() {
        let mut group = group(Permission::All);
        assert!(PermissionChecker::group_admin(&group, "a").is_ok());
        assert!(PermissionChecker::group_admin(&group, "b").is_err());

        assert!(PermissionChecker::not_archived(&group).is_ok());
        group.is_archived = true;
        assert!(PermissionChecker::not_archived(&group).is_err());
    }
}
