//! Repository for workspaces and their member lists.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{Workspace, WorkspaceMember, WorkspaceRole};
use crate::types::DatabaseResult;
use crate::{new_id, now_timestamp};

#[derive(Clone)]
pub struct WorkspaceRepository {
    pool: SqlitePool,
}

impl WorkspaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a workspace with its owner as the first member.
    pub async fn create(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> DatabaseResult<Workspace> {
        let id = new_id();
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO workspaces (id, name, description, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(owner_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(WorkspaceRole::Owner.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(workspace_id = %id, owner_id = %owner_id, "created workspace");

        Ok(Workspace {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id: owner_id.to_string(),
            members: vec![WorkspaceMember {
                user_id: owner_id.to_string(),
                role: WorkspaceRole::Owner,
                joined_at: now.clone(),
            }],
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Workspace>> {
        let row = sqlx::query(
            "SELECT id, name, description, owner_id, created_at, updated_at FROM workspaces WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Add a member; returns false when the user already belongs to the workspace.
    pub async fn add_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO workspace_members (workspace_id, user_id, role, joined_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn is_member(&self, workspace_id: &str, user_id: &str) -> DatabaseResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Workspaces owned by the user.
    pub async fn list_owned(&self, user_id: &str) -> DatabaseResult<Vec<Workspace>> {
        let rows = sqlx::query(
            "SELECT id, name, description, owner_id, created_at, updated_at
             FROM workspaces WHERE owner_id = ? ORDER BY created_at, rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(&rows).await
    }

    /// Workspaces the user joined without owning them.
    pub async fn list_joined(&self, user_id: &str) -> DatabaseResult<Vec<Workspace>> {
        let rows = sqlx::query(
            "SELECT w.id, w.name, w.description, w.owner_id, w.created_at, w.updated_at
             FROM workspaces w
             JOIN workspace_members m ON m.workspace_id = w.id
             WHERE m.user_id = ? AND w.owner_id <> ?
             ORDER BY m.joined_at, w.rowid",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(&rows).await
    }

    async fn hydrate_all(&self, rows: &[SqliteRow]) -> DatabaseResult<Vec<Workspace>> {
        let mut workspaces = Vec::with_capacity(rows.len());
        for row in rows {
            workspaces.push(self.hydrate(row).await?);
        }
        Ok(workspaces)
    }

    async fn hydrate(&self, row: &SqliteRow) -> DatabaseResult<Workspace> {
        let id: String = row.try_get("id")?;
        let members = sqlx::query(
            "SELECT user_id, role, joined_at FROM workspace_members
             WHERE workspace_id = ? ORDER BY joined_at, rowid",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|member| -> DatabaseResult<WorkspaceMember> {
            let role: String = member.try_get("role")?;
            Ok(WorkspaceMember {
                user_id: member.try_get("user_id")?,
                role: WorkspaceRole::from(role.as_str()),
                joined_at: member.try_get("joined_at")?,
            })
        })
        .collect::<DatabaseResult<Vec<_>>>()?;

        Ok(Workspace {
            id,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            owner_id: row.try_get("owner_id")?,
            members,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_database, create_user};

    #[tokio::test]
    async fn test_owner_and_guest_listings() {
        let (pool, _dir) = create_test_database().await;
        let owner = create_user(&pool, "Owner").await;
        let guest = create_user(&pool, "Guest").await;
        let repo = WorkspaceRepository::new(pool);

        let workspace = repo.create(&owner.id, "Acme", Some("HQ")).await.unwrap();
        assert!(repo.is_member(&workspace.id, &owner.id).await.unwrap());
        assert!(!repo.is_member(&workspace.id, &guest.id).await.unwrap());

        assert!(repo
            .add_member(&workspace.id, &guest.id, WorkspaceRole::Member)
            .await
            .unwrap());
        assert!(!repo
            .add_member(&workspace.id, &guest.id, WorkspaceRole::Member)
            .await
            .unwrap());

        let stored = repo.find_by_id(&workspace.id).await.unwrap().unwrap();
        assert_eq!(stored.members.len(), 2);
        assert_eq!(stored.members[0].role, WorkspaceRole::Owner);

        assert_eq!(repo.list_owned(&owner.id).await.unwrap().len(), 1);
        assert!(repo.list_joined(&owner.id).await.unwrap().is_empty());
        assert_eq!(repo.list_joined(&guest.id).await.unwrap()[0].id, workspace.id);
    }
}
