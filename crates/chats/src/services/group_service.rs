//! Group membership management.
//!
//! Every roster mutation is mirrored into the group's associated chat, leaves
//! a system message in the group history, and is published on the event
//! sink. Roster rows are deactivated rather than deleted, so join order and
//! successor selection stay stable.

use std::sync::Arc;

use sqlx::SqlitePool;
use teamhub_database::{
    ChatRepository, Group, GroupRepository, GroupRole, MessageRepository, MessageTarget,
    NewMessage, UserRepository, WorkspaceRepository,
};
use tracing::{error, info, warn};

use crate::types::{ChatError, ChatEvent, ChatResult, CreateGroupRequest, EventSink, UpdateGroupRequest};
use crate::utils::{GroupAction, PermissionChecker, Validator};

#[derive(Clone)]
pub struct GroupService {
    groups: GroupRepository,
    chats: ChatRepository,
    messages: MessageRepository,
    users: UserRepository,
    workspaces: WorkspaceRepository,
    events: Arc<dyn EventSink>,
}

impl GroupService {
    pub fn new(pool: SqlitePool, events: Arc<dyn EventSink>) -> Self {
        Self {
            groups: GroupRepository::new(pool.clone()),
            chats: ChatRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            workspaces: WorkspaceRepository::new(pool),
            events,
        }
    }

    /// Create a group owned by `creator`, along with its chat.
    pub async fn create_group(&self, creator: &str, request: CreateGroupRequest) -> ChatResult<Group> {
        request.validate().map_err(ChatError::validation)?;
        Validator::reference("workspace", &request.workspace)?;

        let workspace = self
            .workspaces
            .find_by_id(&request.workspace)
            .await?
            .ok_or_else(|| ChatError::not_found("Workspace"))?;
        if !workspace.has_member(creator) {
            return Err(ChatError::forbidden("You are not a member of this workspace"));
        }

        let mut members: Vec<String> = Vec::with_capacity(request.members.len());
        for member in &request.members {
            Validator::reference("member", member)?;
            if member != creator && !members.contains(member) {
                members.push(member.clone());
            }
        }
        self.ensure_users_exist(&members).await?;

        let name = request.name.trim();
        let group = self
            .groups
            .create(name, request.description.trim(), &workspace.id, creator, &members)
            .await?;

        self.chats
            .create_group_chat(&group.id, name, &workspace.id, &group.active_member_ids())
            .await?;

        self.write_system_message(&group.id, creator, format!("Group \"{name}\" has been created"))
            .await?;

        info!(group_id = %group.id, creator = %creator, members = members.len() + 1, "created group");
        self.reload(&group.id).await
    }

    /// Group details; only active members may read them.
    pub async fn get_group(&self, group_id: &str, user_id: &str) -> ChatResult<Group> {
        let group = self.load_active(group_id).await?;
        PermissionChecker::group_member(&group, user_id)?;
        Ok(group)
    }

    /// Non-archived groups where the user is an active member.
    pub async fn list_user_groups(&self, user_id: &str) -> ChatResult<Vec<Group>> {
        Ok(self.groups.list_for_user(user_id).await?)
    }

    pub async fn is_member(&self, group_id: &str, user_id: &str) -> ChatResult<bool> {
        Ok(self.load(group_id).await?.is_member(user_id))
    }

    pub async fn is_admin(&self, group_id: &str, user_id: &str) -> ChatResult<bool> {
        Ok(self.load(group_id).await?.is_admin(user_id))
    }

    pub async fn add_members(&self, group_id: &str, requester: &str, user_ids: &[String]) -> ChatResult<Group> {
        let group = self.load_active(group_id).await?;
        PermissionChecker::group_action(&group, requester, GroupAction::AddMembers)?;

        let mut additions: Vec<String> = Vec::new();
        for user_id in user_ids {
            Validator::reference("userId", user_id)?;
            if !group.is_member(user_id) && !additions.contains(user_id) {
                additions.push(user_id.clone());
            }
        }
        if additions.is_empty() {
            return Err(ChatError::no_op("All users are already members of this group"));
        }
        self.ensure_users_exist(&additions).await?;

        self.groups.add_members(&group.id, &additions, requester).await?;
        if let Some(chat_id) = &group.chat_id {
            self.chats.add_members(chat_id, &additions).await?;
        }

        let noun = if additions.len() == 1 { "member" } else { "members" };
        self.write_system_message(
            &group.id,
            requester,
            format!("{} new {noun} added to the group", additions.len()),
        )
        .await?;

        info!(group_id = %group.id, added = additions.len(), "added group members");
        self.events.publish(ChatEvent::GroupMembersAdded {
            group_id: group.id.clone(),
            added_by: requester.to_string(),
            members: additions,
        });

        self.reload(&group.id).await
    }

    pub async fn remove_member(&self, group_id: &str, requester: &str, target: &str) -> ChatResult<Group> {
        let group = self.load_active(group_id).await?;
        PermissionChecker::group_admin(&group, requester)?;
        Validator::reference("userId", target)?;

        if !group.is_member(target) {
            return Err(ChatError::not_found("Group member"));
        }
        if group.is_sole_admin(target) {
            return Err(ChatError::LastAdminViolation);
        }

        if !self.groups.deactivate_member(&group.id, target).await? {
            return Err(ChatError::LastAdminViolation);
        }
        if let Some(chat_id) = &group.chat_id {
            self.chats.remove_member(chat_id, target).await?;
        }

        self.write_system_message(&group.id, requester, "User was removed from the group".to_string())
            .await?;

        info!(group_id = %group.id, removed = %target, removed_by = %requester, "removed group member");
        self.events.publish(ChatEvent::GroupMemberRemoved {
            group_id: group.id.clone(),
            removed_user_id: target.to_string(),
            removed_by: requester.to_string(),
        });

        self.reload(&group.id).await
    }

    /// Leave a group; a departing sole admin hands the role to the next member.
    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> ChatResult<()> {
        let group = self.load_active(group_id).await?;
        if !group.is_member(user_id) {
            return Err(ChatError::not_found("Group member"));
        }

        let left = if group.is_sole_admin(user_id) {
            let successor = group
                .successor_for(user_id)
                .map(|member| member.user_id.clone())
                .ok_or(ChatError::LastMemberMustDelete)?;
            info!(group_id = %group.id, successor = %successor, "promoting successor before admin leaves");
            self.groups
                .deactivate_with_successor(&group.id, user_id, &successor)
                .await?
        } else {
            self.groups.deactivate_member(&group.id, user_id).await?
        };
        if !left {
            return Err(ChatError::LastAdminViolation);
        }

        if let Some(chat_id) = &group.chat_id {
            self.chats.remove_member(chat_id, user_id).await?;
        }

        let user_name = self
            .users
            .find_by_id(user_id)
            .await?
            .map(|user| user.name)
            .unwrap_or_else(|| "A user".to_string());

        self.write_system_message(&group.id, user_id, format!("{user_name} has left the group"))
            .await?;

        info!(group_id = %group.id, user_id = %user_id, "member left group");
        self.events.publish(ChatEvent::GroupMemberLeft {
            group_id: group.id.clone(),
            user_id: user_id.to_string(),
            user_name,
        });

        self.reload(&group.id).await.map(|_| ())
    }

    pub async fn update_member_role(
        &self,
        group_id: &str,
        requester: &str,
        target: &str,
        role: GroupRole,
    ) -> ChatResult<Group> {
        let group = self.load_active(group_id).await?;
        PermissionChecker::group_admin(&group, requester)?;
        Validator::reference("userId", target)?;

        if !group.is_member(target) {
            return Err(ChatError::not_found("Group member"));
        }
        if role == GroupRole::Member && group.is_sole_admin(target) {
            return Err(ChatError::LastAdminViolation);
        }

        if !self.groups.set_role(&group.id, target, role).await? {
            return Err(ChatError::LastAdminViolation);
        }

        info!(group_id = %group.id, target = %target, role = role.as_str(), "changed group member role");
        self.publish_updated(&group.id, requester).await
    }

    pub async fn update_group_info(
        &self,
        group_id: &str,
        requester: &str,
        request: UpdateGroupRequest,
    ) -> ChatResult<Group> {
        request.validate().map_err(ChatError::validation)?;
        if request.is_empty() {
            return Err(ChatError::no_op("No group changes supplied"));
        }

        let group = self.load(group_id).await?;
        PermissionChecker::group_action(&group, requester, GroupAction::ChangeGroupInfo)?;

        let settings = match &request.settings {
            Some(patch) if !patch.is_empty() => {
                PermissionChecker::group_admin(&group, requester)?;
                patch.apply(&group.settings)
            }
            _ => group.settings.clone(),
        };
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&group.name);
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or(&group.description);

        self.groups
            .update_info(&group.id, name, description, &settings)
            .await?;

        info!(group_id = %group.id, updated_by = %requester, "updated group info");
        self.publish_updated(&group.id, requester).await
    }

    pub async fn pin_message(&self, group_id: &str, requester: &str, message_id: &str) -> ChatResult<Group> {
        let group = self.load(group_id).await?;
        PermissionChecker::group_action(&group, requester, GroupAction::PinMessages)?;
        self.ensure_group_message(&group, message_id).await?;

        if group.is_pinned(message_id) {
            return Err(ChatError::already_exists("Message is already pinned"));
        }

        self.groups.pin_message(&group.id, message_id, requester).await?;
        self.publish_updated(&group.id, requester).await
    }

    pub async fn unpin_message(&self, group_id: &str, requester: &str, message_id: &str) -> ChatResult<Group> {
        let group = self.load(group_id).await?;
        PermissionChecker::group_action(&group, requester, GroupAction::PinMessages)?;
        Validator::reference("messageId", message_id)?;

        if !self.groups.unpin_message(&group.id, message_id).await? {
            return Err(ChatError::not_found("Pinned message"));
        }

        self.publish_updated(&group.id, requester).await
    }

    pub async fn archive_group(&self, group_id: &str, requester: &str) -> ChatResult<Group> {
        self.set_archived(group_id, requester, true).await
    }

    pub async fn unarchive_group(&self, group_id: &str, requester: &str) -> ChatResult<Group> {
        self.set_archived(group_id, requester, false).await
    }

    async fn set_archived(&self, group_id: &str, requester: &str, archived: bool) -> ChatResult<Group> {
        let group = self.load(group_id).await?;
        PermissionChecker::group_admin(&group, requester)?;

        if !self.groups.set_archived(&group.id, archived, requester).await? {
            let state = if archived { "archived" } else { "active" };
            return Err(ChatError::no_op(format!("Group is already {state}")));
        }

        info!(group_id = %group.id, archived, "changed group archive state");
        self.publish_updated(&group.id, requester).await
    }

    async fn ensure_group_message(&self, group: &Group, message_id: &str) -> ChatResult<()> {
        Validator::reference("messageId", message_id)?;
        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .filter(|message| !message.is_deleted)
            .ok_or_else(|| ChatError::not_found("Message"))?;

        if message.target.group_id() != Some(group.id.as_str()) {
            return Err(ChatError::not_found("Message in this group"));
        }
        Ok(())
    }

    async fn ensure_users_exist(&self, user_ids: &[String]) -> ChatResult<()> {
        let found = self.users.find_summaries(user_ids).await?;
        if let Some(missing) = user_ids
            .iter()
            .find(|id| !found.iter().any(|summary| &summary.id == *id))
        {
            return Err(ChatError::not_found(format!("User {missing}")));
        }
        Ok(())
    }

    async fn write_system_message(&self, group_id: &str, sender: &str, text: String) -> ChatResult<()> {
        let message = self
            .messages
            .insert(NewMessage::system(MessageTarget::Group(group_id.to_string()), sender, text))
            .await?;
        self.events.publish(ChatEvent::MessageCreated { message });
        Ok(())
    }

    async fn load(&self, group_id: &str) -> ChatResult<Group> {
        Validator::reference("groupId", group_id)?;
        self.groups
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| ChatError::not_found("Group"))
    }

    /// Like [`load`](Self::load), but archived groups are reported missing.
    async fn load_active(&self, group_id: &str) -> ChatResult<Group> {
        let group = self.load(group_id).await?;
        if group.is_archived {
            return Err(ChatError::not_found("Group"));
        }
        Ok(group)
    }

    /// Re-read a group after a mutation and confirm it still has an admin.
    async fn reload(&self, group_id: &str) -> ChatResult<Group> {
        let group = self.load(group_id).await?;
        if !group.satisfies_admin_invariant() {
            error!(group_id = %group.id, "group lost its last admin");
            return Err(ChatError::LastAdminViolation);
        }
        Ok(group)
    }

    /// Reload a group after a settings-style change and announce it.
    async fn publish_updated(&self, group_id: &str, updated_by: &str) -> ChatResult<Group> {
        let group = self.reload(group_id).await?;
        if group.chat_id.is_none() {
            warn!(group_id = %group.id, "group has no associated chat");
        }
        self.events.publish(ChatEvent::GroupUpdated {
            group_id: group.id.clone(),
            updated_by: updated_by.to_string(),
            group: group.clone(),
        });
        Ok(group)
    }
}
