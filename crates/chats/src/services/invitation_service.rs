//! Workspace invitation workflow.

use std::sync::Arc;

use sqlx::SqlitePool;
use teamhub_database::{
    Invitation, InvitationRepository, InvitationStatus, MessageRepository, MessageTarget,
    NewMessage, UserRepository, WorkspaceRepository, WorkspaceRole,
};
use tracing::{info, warn};

use crate::services::ChatResolver;
use crate::types::{
    AcceptedInvitation, ChatError, ChatEvent, ChatResult, EventSink, InvitationOutcome,
    InvitationStatusReport,
};
use crate::utils::Validator;

#[derive(Clone)]
pub struct InvitationService {
    invitations: InvitationRepository,
    workspaces: WorkspaceRepository,
    users: UserRepository,
    messages: MessageRepository,
    resolver: ChatResolver,
    events: Arc<dyn EventSink>,
}

impl InvitationService {
    pub fn new(pool: SqlitePool, resolver: ChatResolver, events: Arc<dyn EventSink>) -> Self {
        Self {
            invitations: InvitationRepository::new(pool.clone()),
            workspaces: WorkspaceRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            resolver,
            events,
        }
    }

    /// Invite each email to the workspace, reporting per address.
    pub async fn send_invitations(
        &self,
        inviter: &str,
        workspace_id: &str,
        emails: &[String],
    ) -> ChatResult<Vec<InvitationOutcome>> {
        if emails.is_empty() {
            return Err(ChatError::validation("No emails provided"));
        }
        Validator::reference("workspace", workspace_id)?;

        let workspace = self
            .workspaces
            .find_by_id(workspace_id)
            .await?
            .ok_or_else(|| ChatError::not_found("Workspace"))?;
        if !workspace.has_member(inviter) {
            return Err(ChatError::forbidden("Only workspace members can send invitations"));
        }

        let emails = emails
            .iter()
            .map(|email| Validator::email(email))
            .collect::<ChatResult<Vec<_>>>()?;

        let mut outcomes: Vec<InvitationOutcome> = Vec::with_capacity(emails.len());
        for email in emails {
            if outcomes.iter().any(|outcome| outcome.email == email) {
                continue;
            }

            let status = match self.invitations.create(&email, &workspace.id, inviter).await {
                Ok(invitation) => {
                    info!(invitation_id = %invitation.id, workspace_id = %workspace.id, "invited user");
                    InvitationStatusReport::Invited
                }
                Err(error) if error.is_duplicate() => InvitationStatusReport::AlreadyInvited,
                Err(error) => return Err(error.into()),
            };
            outcomes.push(InvitationOutcome { email, status });
        }

        Ok(outcomes)
    }

    /// Pending invitations addressed to the user's email.
    pub async fn list_pending(&self, user_id: &str) -> ChatResult<Vec<Invitation>> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ChatError::not_found("User"))?;
        Ok(self.invitations.list_pending_for_email(&user.email).await?)
    }

    /// Join the invited workspace and open private chats with its members.
    ///
    /// The invitation is only marked accepted once the membership and chats
    /// exist, so a failed attempt leaves it pending and can be retried.
    pub async fn accept(&self, invitation_id: &str, user_id: &str) -> ChatResult<AcceptedInvitation> {
        let invitation = self.load_for(invitation_id, user_id).await?;
        if invitation.status != InvitationStatus::Pending {
            return Err(ChatError::already_exists("Invitation was already answered"));
        }

        self.workspaces
            .add_member(&invitation.workspace_id, user_id, WorkspaceRole::Member)
            .await?;
        let workspace = self
            .workspaces
            .find_by_id(&invitation.workspace_id)
            .await?
            .ok_or_else(|| ChatError::not_found("Workspace"))?;

        let mut chats = Vec::new();
        for member in workspace.members.iter().filter(|member| member.user_id != user_id) {
            // The existing member opens the chat so the welcome comes from them.
            let resolution = self
                .resolver
                .resolve_private_chat(&member.user_id, Some(user_id), Some(&workspace.id), None)
                .await?;

            if resolution.created {
                self.greet(&resolution.chat.chat.id, user_id, &workspace.name).await;
            }
            chats.push(resolution.chat);
        }

        if !self
            .invitations
            .resolve(&invitation.id, InvitationStatus::Accepted)
            .await?
        {
            return Err(ChatError::already_exists("Invitation was already answered"));
        }

        info!(workspace_id = %workspace.id, user_id = %user_id, chats = chats.len(), "invitation accepted");
        Ok(AcceptedInvitation { workspace, chats })
    }

    async fn greet(&self, chat_id: &str, user_id: &str, workspace_name: &str) {
        let greeting = NewMessage::text(
            MessageTarget::Chat(chat_id.to_string()),
            user_id,
            format!("Hi! I just joined {workspace_name}."),
        );
        match self.messages.insert(greeting).await {
            Ok(message) => self.events.publish(ChatEvent::MessageCreated { message }),
            Err(error) => warn!(chat_id = %chat_id, error = %error, "failed to send join greeting"),
        }
    }

    pub async fn reject(&self, invitation_id: &str, user_id: &str) -> ChatResult<Invitation> {
        let invitation = self.load_for(invitation_id, user_id).await?;

        if !self
            .invitations
            .resolve(&invitation.id, InvitationStatus::Rejected)
            .await?
        {
            return Err(ChatError::already_exists("Invitation was already answered"));
        }

        info!(invitation_id = %invitation.id, "invitation rejected");
        self.invitations
            .find_by_id(&invitation.id)
            .await?
            .ok_or_else(|| ChatError::not_found("Invitation"))
    }

    /// Load an invitation addressed to the user's email.
    async fn load_for(&self, invitation_id: &str, user_id: &str) -> ChatResult<Invitation> {
        Validator::reference("invitationId", invitation_id)?;
        let invitation = self
            .invitations
            .find_by_id(invitation_id)
            .await?
            .ok_or_else(|| ChatError::not_found("Invitation"))?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ChatError::not_found("User"))?;

        if invitation.email != user.email.to_lowercase() {
            return Err(ChatError::forbidden("This invitation is addressed to someone else"));
        }
        Ok(invitation)
    }
}
