//! Workspace creation and listing.

use sqlx::SqlitePool;
use teamhub_database::{Workspace, WorkspaceRepository};
use tracing::info;

use crate::services::ChatResolver;
use crate::types::{ChatError, ChatResult, UserWorkspaces};

#[derive(Clone)]
pub struct WorkspaceService {
    workspaces: WorkspaceRepository,
    resolver: ChatResolver,
}

impl WorkspaceService {
    pub fn new(pool: SqlitePool, resolver: ChatResolver) -> Self {
        Self {
            workspaces: WorkspaceRepository::new(pool),
            resolver,
        }
    }

    /// Create a workspace and the owner's self-chat inside it.
    pub async fn create_workspace(
        &self,
        owner: &str,
        name: &str,
        description: Option<&str>,
    ) -> ChatResult<Workspace> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::validation("Workspace name cannot be empty"));
        }

        let description = description.map(str::trim).filter(|d| !d.is_empty());
        let workspace = self.workspaces.create(owner, name, description).await?;

        let resolution = self
            .resolver
            .resolve_private_chat(owner, None, Some(&workspace.id), None)
            .await?;

        info!(workspace_id = %workspace.id, chat_id = %resolution.chat.chat.id, "workspace ready");
        Ok(workspace)
    }

    pub async fn list_user_workspaces(&self, user_id: &str) -> ChatResult<UserWorkspaces> {
        Ok(UserWorkspaces {
            my_workspaces: self.workspaces.list_owned(user_id).await?,
            guest_workspaces: self.workspaces.list_joined(user_id).await?,
        })
    }
}
