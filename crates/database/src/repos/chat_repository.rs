//! Repository for chats and their ordered member lists.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::entities::{pair_key, scope_key, Chat};
use crate::types::DatabaseResult;
use crate::{new_id, now_timestamp};

const CHAT_COLUMNS: &str =
    "c.id, c.chatname, c.is_group, c.workspace_id, c.group_id, c.created_at, c.updated_at";

/// Repository for chat database operations
#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    /// Create a new chat repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Chat>> {
        let row = sqlx::query(&format!("SELECT {CHAT_COLUMNS} FROM chats c WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Find the private chat holding exactly this pair within the given scope.
    ///
    /// Candidates must contain both members and nobody else, with exactly two
    /// member slots. When several rows qualify the oldest one wins.
    pub async fn find_private(
        &self,
        member_a: &str,
        member_b: &str,
        workspace_id: Option<&str>,
    ) -> DatabaseResult<Option<Chat>> {
        let row = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats c
             WHERE c.is_group = 0
               AND c.scope_key = ?
               AND (SELECT COUNT(*) FROM chat_members m WHERE m.chat_id = c.id) = 2
               AND EXISTS (SELECT 1 FROM chat_members m WHERE m.chat_id = c.id AND m.user_id = ?)
               AND EXISTS (SELECT 1 FROM chat_members m WHERE m.chat_id = c.id AND m.user_id = ?)
               AND NOT EXISTS (
                   SELECT 1 FROM chat_members m
                   WHERE m.chat_id = c.id AND m.user_id NOT IN (?, ?)
               )
             ORDER BY c.created_at, c.rowid
             LIMIT 1"
        ))
        .bind(scope_key(workspace_id))
        .bind(member_a)
        .bind(member_b)
        .bind(member_a)
        .bind(member_b)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Insert a private chat and its two member slots atomically.
    ///
    /// Fails with `DatabaseError::Duplicate` when a chat for the same pair and
    /// scope already exists.
    pub async fn create_private(
        &self,
        member_a: &str,
        member_b: &str,
        workspace_id: Option<&str>,
        chatname: &str,
    ) -> DatabaseResult<Chat> {
        let id = new_id();
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO chats (id, chatname, is_group, workspace_id, group_id, pair_key, scope_key, created_at, updated_at)
             VALUES (?, ?, 0, ?, NULL, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(chatname)
        .bind(workspace_id)
        .bind(pair_key(member_a, member_b))
        .bind(scope_key(workspace_id))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for (position, member) in [member_a, member_b].iter().enumerate() {
            sqlx::query("INSERT INTO chat_members (chat_id, position, user_id) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(position as i64)
                .bind(*member)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(chat_id = %id, workspace_id = ?workspace_id, "created private chat");

        Ok(Chat {
            id,
            chatname: chatname.to_string(),
            is_group: false,
            workspace_id: workspace_id.map(str::to_string),
            group_id: None,
            members: vec![member_a.to_string(), member_b.to_string()],
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Create the chat that mirrors a group's active roster.
    pub async fn create_group_chat(
        &self,
        group_id: &str,
        name: &str,
        workspace_id: &str,
        members: &[String],
    ) -> DatabaseResult<Chat> {
        let id = new_id();
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO chats (id, chatname, is_group, workspace_id, group_id, pair_key, scope_key, created_at, updated_at)
             VALUES (?, ?, 1, ?, ?, NULL, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(workspace_id)
        .bind(group_id)
        .bind(scope_key(Some(workspace_id)))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for (position, member) in members.iter().enumerate() {
            sqlx::query("INSERT INTO chat_members (chat_id, position, user_id) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(position as i64)
                .bind(member)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(chat_id = %id, group_id = %group_id, "created group chat");

        Ok(Chat {
            id,
            chatname: name.to_string(),
            is_group: true,
            workspace_id: Some(workspace_id.to_string()),
            group_id: Some(group_id.to_string()),
            members: members.to_vec(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_group(&self, group_id: &str) -> DatabaseResult<Option<Chat>> {
        let row = sqlx::query(&format!("SELECT {CHAT_COLUMNS} FROM chats c WHERE c.group_id = ?"))
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Append users not already present to a group chat.
    pub async fn add_members(&self, chat_id: &str, user_ids: &[String]) -> DatabaseResult<()> {
        let mut tx = self.pool.begin().await?;

        for user_id in user_ids {
            sqlx::query(
                "INSERT INTO chat_members (chat_id, position, user_id)
                 SELECT ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM chat_members WHERE chat_id = ?), ?
                 WHERE NOT EXISTS (SELECT 1 FROM chat_members WHERE chat_id = ? AND user_id = ?)",
            )
            .bind(chat_id)
            .bind(chat_id)
            .bind(user_id)
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(chat_id = %chat_id, count = user_ids.len(), "mirrored members into chat");
        Ok(())
    }

    pub async fn remove_member(&self, chat_id: &str, user_id: &str) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM chat_members WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        debug!(chat_id = %chat_id, user_id = %user_id, "removed member from chat");
        Ok(())
    }

    pub async fn is_member(&self, chat_id: &str, user_id: &str) -> DatabaseResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM chat_members WHERE chat_id = ? AND user_id = ? LIMIT 1")
                .bind(chat_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Every chat the user belongs to, most recently updated first.
    pub async fn list_for_user(&self, user_id: &str) -> DatabaseResult<Vec<Chat>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats c
             WHERE EXISTS (SELECT 1 FROM chat_members m WHERE m.chat_id = c.id AND m.user_id = ?)
             ORDER BY c.updated_at DESC, c.rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            chats.push(self.hydrate(row).await?);
        }
        Ok(chats)
    }

    async fn hydrate(&self, row: &SqliteRow) -> DatabaseResult<Chat> {
        let id: String = row.try_get("id")?;
        let members: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM chat_members WHERE chat_id = ? ORDER BY position",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Chat {
            id,
            chatname: row.try_get("chatname")?,
            is_group: row.try_get("is_group")?,
            workspace_id: row.try_get("workspace_id")?,
            group_id: row.try_get("group_id")?,
            members,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::WorkspaceRepository;
    use crate::test_support::{create_test_database, create_user};

    #[tokio::test]
    async fn test_find_private_matches_pair_in_either_order() {
        let (pool, _dir) = create_test_database().await;
        let a = create_user(&pool, "A").await;
        let b = create_user(&pool, "B").await;
        let repo = ChatRepository::new(pool);

        let chat = repo.create_private(&a.id, &b.id, None, "").await.unwrap();

        let found = repo.find_private(&b.id, &a.id, None).await.unwrap().unwrap();
        assert_eq!(found.id, chat.id);
        assert_eq!(found.members, vec![a.id.clone(), b.id.clone()]);
    }

    #[tokio::test]
    async fn test_self_chat_does_not_match_pair_chat() {
        let (pool, _dir) = create_test_database().await;
        let a = create_user(&pool, "A").await;
        let b = create_user(&pool, "B").await;
        let repo = ChatRepository::new(pool);

        repo.create_private(&a.id, &b.id, None, "").await.unwrap();
        assert!(repo.find_private(&a.id, &a.id, None).await.unwrap().is_none());

        let own = repo.create_private(&a.id, &a.id, None, "").await.unwrap();
        let found = repo.find_private(&a.id, &a.id, None).await.unwrap().unwrap();
        assert_eq!(found.id, own.id);
        assert!(found.is_self_chat());
    }

    #[tokio::test]
    async fn test_scope_separates_chats_and_duplicates_are_rejected() {
        let (pool, _dir) = create_test_database().await;
        let a = create_user(&pool, "A").await;
        let b = create_user(&pool, "B").await;
        let workspace = WorkspaceRepository::new(pool.clone())
            .create(&a.id, "Acme", None)
            .await
            .unwrap();
        let repo = ChatRepository::new(pool);

        let unscoped = repo.create_private(&a.id, &b.id, None, "").await.unwrap();
        let scoped = repo
            .create_private(&a.id, &b.id, Some(&workspace.id), "")
            .await
            .unwrap();
        assert_ne!(unscoped.id, scoped.id);

        let error = repo
            .create_private(&b.id, &a.id, Some(&workspace.id), "")
            .await
            .unwrap_err();
        assert!(error.is_duplicate());
    }

    #[tokio::test]
    async fn test_group_chat_membership_mirroring() {
        let (pool, _dir) = create_test_database().await;
        let a = create_user(&pool, "A").await;
        let b = create_user(&pool, "B").await;
        let workspace = WorkspaceRepository::new(pool.clone())
            .create(&a.id, "Acme", None)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO chat_groups (id, name, workspace_id, created_by, created_at, updated_at)
             VALUES ('g1', 'Design', ?, ?, 'now', 'now')",
        )
        .bind(&workspace.id)
        .bind(&a.id)
        .execute(&pool)
        .await
        .unwrap();
        let repo = ChatRepository::new(pool);

        let chat = repo
            .create_group_chat("g1", "Design", &workspace.id, &[a.id.clone()])
            .await
            .unwrap();
        repo.add_members(&chat.id, &[b.id.clone(), a.id.clone()]).await.unwrap();

        let stored = repo.find_by_group("g1").await.unwrap().unwrap();
        assert_eq!(stored.members, vec![a.id.clone(), b.id.clone()]);

        repo.remove_member(&chat.id, &a.id).await.unwrap();
        assert!(!repo.is_member(&chat.id, &a.id).await.unwrap());
        assert!(repo.is_member(&chat.id, &b.id).await.unwrap());
        assert_eq!(repo.list_for_user(&b.id).await.unwrap().len(), 1);
    }
}
