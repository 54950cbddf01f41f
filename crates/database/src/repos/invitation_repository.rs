//! Repository for workspace invitations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{Invitation, InvitationStatus};
use crate::types::DatabaseResult;
use crate::{new_id, now_timestamp};

const INVITATION_COLUMNS: &str =
    "id, email, workspace_id, invited_by, status, created_at, updated_at";

#[derive(Clone)]
pub struct InvitationRepository {
    pool: SqlitePool,
}

impl InvitationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending invitation.
    ///
    /// Fails with `DatabaseError::Duplicate` when the email was already
    /// invited to the workspace.
    pub async fn create(&self, email: &str, workspace_id: &str, invited_by: &str) -> DatabaseResult<Invitation> {
        let now = now_timestamp();
        let invitation = Invitation {
            id: new_id(),
            email: email.trim().to_lowercase(),
            workspace_id: workspace_id.to_string(),
            invited_by: invited_by.to_string(),
            status: InvitationStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO workspace_invitations (id, email, workspace_id, invited_by, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&invitation.id)
        .bind(&invitation.email)
        .bind(&invitation.workspace_id)
        .bind(&invitation.invited_by)
        .bind(invitation.status.as_str())
        .bind(&invitation.created_at)
        .bind(&invitation.updated_at)
        .execute(&self.pool)
        .await?;

        info!(invitation_id = %invitation.id, workspace_id = %workspace_id, "created invitation");
        Ok(invitation)
    }

    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Invitation>> {
        let row = sqlx::query(&format!("SELECT {INVITATION_COLUMNS} FROM workspace_invitations WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_invitation).transpose()
    }

    pub async fn find_by_email_and_workspace(
        &self,
        email: &str,
        workspace_id: &str,
    ) -> DatabaseResult<Option<Invitation>> {
        let row = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM workspace_invitations WHERE email = ? AND workspace_id = ?"
        ))
        .bind(email.trim().to_lowercase())
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_invitation).transpose()
    }

    /// Pending invitations addressed to the email, oldest first.
    pub async fn list_pending_for_email(&self, email: &str) -> DatabaseResult<Vec<Invitation>> {
        sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM workspace_invitations
             WHERE email = ? AND status = 'pending'
             ORDER BY created_at, rowid"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(map_invitation)
        .collect()
    }

    /// Move a pending invitation to `status`; returns false if it was not pending.
    pub async fn resolve(&self, id: &str, status: InvitationStatus) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE workspace_invitations SET status = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn map_invitation(row: &SqliteRow) -> DatabaseResult<Invitation> {
    let status: String = row.try_get("status")?;
    Ok(Invitation {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        workspace_id: row.try_get("workspace_id")?,
        invited_by: row.try_get("invited_by")?,
        status: InvitationStatus::from(status.as_str()),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::WorkspaceRepository;
    use crate::test_support::{create_test_database, create_user};

    #[tokio::test]
    async fn test_invitation_is_unique_per_workspace_and_resolves_once() {
        let (pool, _dir) = create_test_database().await;
        let owner = create_user(&pool, "Owner").await;
        let workspace = WorkspaceRepository::new(pool.clone())
            .create(&owner.id, "Acme", None)
            .await
            .unwrap();
        let repo = InvitationRepository::new(pool);

        let invitation = repo.create("Guest@Example.com", &workspace.id, &owner.id).await.unwrap();
        assert_eq!(invitation.email, "guest@example.com");

        let duplicate = repo.create("guest@example.com", &workspace.id, &owner.id).await.unwrap_err();
        assert!(duplicate.is_duplicate());

        let found = repo
            .find_by_email_and_workspace("GUEST@example.com", &workspace.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, invitation.id);
        assert_eq!(repo.list_pending_for_email("guest@example.com").await.unwrap().len(), 1);

        assert!(repo.resolve(&invitation.id, InvitationStatus::Accepted).await.unwrap());
        assert!(!repo.resolve(&invitation.id, InvitationStatus::Rejected).await.unwrap());

        let stored = repo.find_by_id(&invitation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Accepted);
        assert!(repo.list_pending_for_email("guest@example.com").await.unwrap().is_empty());
    }
}
