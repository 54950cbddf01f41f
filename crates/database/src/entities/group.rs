//! Group entity definitions

use serde::{Deserialize, Serialize};

/// Upper bound on pinned messages kept per group.
pub const MAX_PINNED_MESSAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    pub avatar: String,
    #[serde(rename = "workspace")]
    pub workspace_id: String,
    pub created_by: String,
    /// Full roster in join order, including inactive entries.
    pub members: Vec<GroupMember>,
    pub settings: GroupSettings,
    pub pinned_messages: Vec<PinnedMessage>,
    pub is_archived: bool,
    pub archived_at: Option<String>,
    /// Associated chat mirroring the active roster.
    pub chat_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Group {
    pub fn active_members(&self) -> impl Iterator<Item = &GroupMember> {
        self.members.iter().filter(|member| member.is_active)
    }

    pub fn active_member(&self, user_id: &str) -> Option<&GroupMember> {
        self.active_members().find(|member| member.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.active_member(user_id).is_some()
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.active_member(user_id)
            .is_some_and(|member| member.role == GroupRole::Admin)
    }

    pub fn active_member_count(&self) -> usize {
        self.active_members().count()
    }

    pub fn admin_count(&self) -> usize {
        self.active_members()
            .filter(|member| member.role == GroupRole::Admin)
            .count()
    }

    /// True when the user is the only active admin.
    pub fn is_sole_admin(&self, user_id: &str) -> bool {
        self.is_admin(user_id) && self.admin_count() == 1
    }

    /// A non-empty active roster must contain an admin.
    pub fn satisfies_admin_invariant(&self) -> bool {
        self.active_member_count() == 0 || self.admin_count() >= 1
    }

    /// First active member other than `user_id`, in join order.
    pub fn successor_for(&self, user_id: &str) -> Option<&GroupMember> {
        self.active_members().find(|member| member.user_id != user_id)
    }

    pub fn is_pinned(&self, message_id: &str) -> bool {
        self.pinned_messages
            .iter()
            .any(|pin| pin.message_id == message_id)
    }

    pub fn active_member_ids(&self) -> Vec<String> {
        self.active_members()
            .map(|member| member.user_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    #[serde(rename = "user")]
    pub user_id: String,
    pub role: GroupRole,
    pub joined_at: String,
    pub added_by: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Admin => "admin",
            GroupRole::Member => "member",
        }
    }
}

impl From<&str> for GroupRole {
    fn from(s: &str) -> Self {
        match s {
            "admin" => GroupRole::Admin,
            _ => GroupRole::Member,
        }
    }
}

/// Who may perform a gated group action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    All,
    Admins,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::All => "all",
            Permission::Admins => "admins",
        }
    }

    /// Whether an active member with the given admin flag passes this gate.
    pub fn allows(&self, is_admin: bool) -> bool {
        match self {
            Permission::All => true,
            Permission::Admins => is_admin,
        }
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        match s {
            "admins" => Permission::Admins,
            _ => Permission::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettings {
    pub is_private: bool,
    pub send_messages: Permission,
    pub add_members: Permission,
    pub change_group_info: Permission,
    pub pin_messages: Permission,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            is_private: false,
            send_messages: Permission::All,
            add_members: Permission::All,
            change_group_info: Permission::Admins,
            pin_messages: Permission::Admins,
        }
    }
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettingsPatch {
    pub is_private: Option<bool>,
    pub send_messages: Option<Permission>,
    pub add_members: Option<Permission>,
    pub change_group_info: Option<Permission>,
    pub pin_messages: Option<Permission>,
}

impl GroupSettingsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, settings: &GroupSettings) -> GroupSettings {
        GroupSettings {
            is_private: self.is_private.unwrap_or(settings.is_private),
            send_messages: self.send_messages.unwrap_or(settings.send_messages),
            add_members: self.add_members.unwrap_or(settings.add_members),
            change_group_info: self.change_group_info.unwrap_or(settings.change_group_info),
            pin_messages: self.pin_messages.unwrap_or(settings.pin_messages),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedMessage {
    #[serde(rename = "message")]
    pub message_id: String,
    pub pinned_by: String,
    pub pinned_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: &str, role: GroupRole, is_active: bool) -> GroupMember {
        GroupMember {
            user_id: user_id.to_string(),
            role,
            joined_at: String::new(),
            added_by: "creator".to_string(),
            is_active,
        }
    }

    fn group(members: Vec<GroupMember>) -> Group {
        Group {
            id: "g".to_string(),
            name: "Design".to_string(),
            description: String::new(),
            avatar: String::new(),
            workspace_id: "w".to_string(),
            created_by: "creator".to_string(),
            members,
            settings: GroupSettings::default(),
            pinned_messages: Vec::new(),
            is_archived: false,
            archived_at: None,
            chat_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_predicates_ignore_inactive_entries() {
        let group = group(vec![
            member("a", GroupRole::Admin, true),
            member("b", GroupRole::Admin, false),
            member("c", GroupRole::Member, true),
        ]);

        assert!(group.is_member("a"));
        assert!(!group.is_member("b"));
        assert!(!group.is_admin("b"));
        assert_eq!(group.admin_count(), 1);
        assert!(group.is_sole_admin("a"));
        assert!(!group.is_sole_admin("c"));
    }

    #[test]
    fn test_successor_uses_join_order() {
        let group = group(vec![
            member("a", GroupRole::Admin, true),
            member("b", GroupRole::Member, false),
            member("c", GroupRole::Member, true),
            member("d", GroupRole::Member, true),
        ]);

        assert_eq!(group.successor_for("a").map(|m| m.user_id.as_str()), Some("c"));
    }

    #[test]
    fn test_admin_invariant() {
        assert!(group(vec![]).satisfies_admin_invariant());
        assert!(group(vec![member("a", GroupRole::Admin, true)]).satisfies_admin_invariant());
        assert!(!group(vec![member("a", GroupRole::Member, true)]).satisfies_admin_invariant());
    }

    #[test]
    fn test_permission_gate() {
        assert!(Permission::All.allows(false));
        assert!(Permission::Admins.allows(true));
        assert!(!Permission::Admins.allows(false));
        assert_eq!(Permission::from("admins"), Permission::Admins);
        assert_eq!(Permission::from("unknown"), Permission::All);
    }

    #[test]
    fn test_settings_patch_keeps_unset_fields() {
        let patch = GroupSettingsPatch {
            send_messages: Some(Permission::Admins),
            ..Default::default()
        };
        let updated = patch.apply(&GroupSettings::default());

        assert_eq!(updated.send_messages, Permission::Admins);
        assert_eq!(updated.add_members, Permission::All);
        assert_eq!(updated.pin_messages, Permission::Admins);
        assert!(!patch.is_empty());
        assert!(GroupSettingsPatch::default().is_empty());
    }
}
