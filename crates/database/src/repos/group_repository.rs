//! Repository for groups, their rosters and pinned messages.
//!
//! Roster mutations that could strip a group of its last active admin are
//! guarded inside the UPDATE statement itself, so concurrent demotions or
//! removals cannot both succeed.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::entities::{
    Group, GroupMember, GroupRole, GroupSettings, Permission, PinnedMessage, MAX_PINNED_MESSAGES,
};
use crate::types::DatabaseResult;
use crate::{new_id, now_timestamp};

const GROUP_COLUMNS: &str = "g.id, g.name, g.description, g.avatar, g.workspace_id, g.created_by,
    g.is_private, g.send_messages, g.add_members, g.change_group_info, g.pin_messages,
    g.is_archived, g.archived_at, g.created_at, g.updated_at,
    (SELECT c.id FROM chats c WHERE c.group_id = g.id) AS chat_id";

const ACTIVE_ADMIN_COUNT: &str =
    "(SELECT COUNT(*) FROM group_members a WHERE a.group_id = group_members.group_id AND a.role = 'admin' AND a.is_active = 1)";

#[derive(Clone)]
pub struct GroupRepository {
    pool: SqlitePool,
}

impl GroupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a group with `created_by` as admin and `member_ids` as members.
    ///
    /// The creator is skipped if listed among `member_ids`.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        workspace_id: &str,
        created_by: &str,
        member_ids: &[String],
    ) -> DatabaseResult<Group> {
        let id = new_id();
        let now = now_timestamp();
        let settings = GroupSettings::default();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO chat_groups (id, name, description, workspace_id, created_by, is_private,
                send_messages, add_members, change_group_info, pin_messages, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(workspace_id)
        .bind(created_by)
        .bind(settings.is_private)
        .bind(settings.send_messages.as_str())
        .bind(settings.add_members.as_str())
        .bind(settings.change_group_info.as_str())
        .bind(settings.pin_messages.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let roster = std::iter::once((created_by, GroupRole::Admin)).chain(
            member_ids
                .iter()
                .filter(|member| member.as_str() != created_by)
                .map(|member| (member.as_str(), GroupRole::Member)),
        );

        for (user_id, role) in roster {
            sqlx::query(
                "INSERT OR IGNORE INTO group_members (group_id, user_id, role, added_by, joined_at, is_active)
                 VALUES (?, ?, ?, ?, ?, 1)",
            )
            .bind(&id)
            .bind(user_id)
            .bind(role.as_str())
            .bind(created_by)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(group_id = %id, created_by = %created_by, "created group");

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| crate::DatabaseError::not_found(format!("group {id}")))
    }

    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Group>> {
        let row = sqlx::query(&format!("SELECT {GROUP_COLUMNS} FROM chat_groups g WHERE g.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Non-archived groups where the user is an active member.
    pub async fn list_for_user(&self, user_id: &str) -> DatabaseResult<Vec<Group>> {
        let rows = sqlx::query(&format!(
            "SELECT {GROUP_COLUMNS} FROM chat_groups g
             WHERE g.is_archived = 0
               AND EXISTS (
                   SELECT 1 FROM group_members m
                   WHERE m.group_id = g.id AND m.user_id = ? AND m.is_active = 1
               )
             ORDER BY g.updated_at DESC, g.rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            groups.push(self.hydrate(row).await?);
        }
        Ok(groups)
    }

    /// Add users as members, reactivating any previous roster entries.
    pub async fn add_members(
        &self,
        group_id: &str,
        user_ids: &[String],
        added_by: &str,
    ) -> DatabaseResult<()> {
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        for user_id in user_ids {
            sqlx::query(
                "INSERT INTO group_members (group_id, user_id, role, added_by, joined_at, is_active)
                 VALUES (?, ?, 'member', ?, ?, 1)
                 ON CONFLICT (group_id, user_id) DO UPDATE SET
                     is_active = 1,
                     role = 'member',
                     added_by = excluded.added_by,
                     joined_at = excluded.joined_at
                 WHERE group_members.is_active = 0",
            )
            .bind(group_id)
            .bind(user_id)
            .bind(added_by)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        touch(&mut tx, group_id, &now).await?;
        tx.commit().await?;

        debug!(group_id = %group_id, count = user_ids.len(), "added group members");
        Ok(())
    }

    /// Deactivate a member unless they are the last active admin.
    ///
    /// Returns false when nothing changed.
    pub async fn deactivate_member(&self, group_id: &str, user_id: &str) -> DatabaseResult<bool> {
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;
        let changed = deactivate(&mut tx, group_id, user_id).await?;
        if changed {
            touch(&mut tx, group_id, &now).await?;
        }
        tx.commit().await?;
        Ok(changed)
    }

    /// Promote `successor` to admin and deactivate `user_id` in one transaction.
    pub async fn deactivate_with_successor(
        &self,
        group_id: &str,
        user_id: &str,
        successor: &str,
    ) -> DatabaseResult<bool> {
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE group_members SET role = 'admin'
             WHERE group_id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(group_id)
        .bind(successor)
        .execute(&mut *tx)
        .await?;

        let changed = deactivate(&mut tx, group_id, user_id).await?;
        if !changed {
            // Leaves the promotion uncommitted.
            return Ok(false);
        }

        touch(&mut tx, group_id, &now).await?;
        tx.commit().await?;

        info!(group_id = %group_id, successor = %successor, "promoted successor admin");
        Ok(true)
    }

    /// Change an active member's role; demoting the last admin is refused.
    ///
    /// Returns false when nothing changed.
    pub async fn set_role(&self, group_id: &str, user_id: &str, role: GroupRole) -> DatabaseResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE group_members SET role = ?
             WHERE group_id = ? AND user_id = ? AND is_active = 1
               AND (? = 'admin' OR role <> 'admin' OR {ACTIVE_ADMIN_COUNT} > 1)"
        ))
        .bind(role.as_str())
        .bind(group_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn update_info(
        &self,
        group_id: &str,
        name: &str,
        description: &str,
        settings: &GroupSettings,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE chat_groups SET name = ?, description = ?, is_private = ?, send_messages = ?,
                add_members = ?, change_group_info = ?, pin_messages = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(settings.is_private)
        .bind(settings.send_messages.as_str())
        .bind(settings.add_members.as_str())
        .bind(settings.change_group_info.as_str())
        .bind(settings.pin_messages.as_str())
        .bind(now_timestamp())
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Pin a message, evicting the oldest pins beyond the cap.
    pub async fn pin_message(&self, group_id: &str, message_id: &str, pinned_by: &str) -> DatabaseResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO group_pinned_messages (group_id, message_id, pinned_by, pinned_at) VALUES (?, ?, ?, ?)",
        )
        .bind(group_id)
        .bind(message_id)
        .bind(pinned_by)
        .bind(now_timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM group_pinned_messages
             WHERE group_id = ? AND id NOT IN (
                 SELECT id FROM group_pinned_messages WHERE group_id = ? ORDER BY id DESC LIMIT ?
             )",
        )
        .bind(group_id)
        .bind(group_id)
        .bind(MAX_PINNED_MESSAGES as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Returns false when the message was not pinned.
    pub async fn unpin_message(&self, group_id: &str, message_id: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM group_pinned_messages WHERE group_id = ? AND message_id = ?")
            .bind(group_id)
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip the archived flag; returns false if it already had that value.
    pub async fn set_archived(&self, group_id: &str, archived: bool, actor: &str) -> DatabaseResult<bool> {
        let now = now_timestamp();
        let result = sqlx::query(
            "UPDATE chat_groups
             SET is_archived = ?,
                 archived_at = CASE WHEN ? THEN ? ELSE NULL END,
                 archived_by = CASE WHEN ? THEN ? ELSE NULL END,
                 updated_at = ?
             WHERE id = ? AND is_archived <> ?",
        )
        .bind(archived)
        .bind(archived)
        .bind(&now)
        .bind(archived)
        .bind(actor)
        .bind(&now)
        .bind(group_id)
        .bind(archived)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn hydrate(&self, row: &SqliteRow) -> DatabaseResult<Group> {
        let id: String = row.try_get("id")?;

        let members = sqlx::query(
            "SELECT user_id, role, added_by, joined_at, is_active
             FROM group_members WHERE group_id = ? ORDER BY id",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|member| -> DatabaseResult<GroupMember> {
            let role: String = member.try_get("role")?;
            Ok(GroupMember {
                user_id: member.try_get("user_id")?,
                role: GroupRole::from(role.as_str()),
                joined_at: member.try_get("joined_at")?,
                added_by: member.try_get("added_by")?,
                is_active: member.try_get("is_active")?,
            })
        })
        .collect::<DatabaseResult<Vec<_>>>()?;

        let pinned_messages = sqlx::query(
            "SELECT message_id, pinned_by, pinned_at
             FROM group_pinned_messages WHERE group_id = ? ORDER BY id",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|pin| -> DatabaseResult<PinnedMessage> {
            Ok(PinnedMessage {
                message_id: pin.try_get("message_id")?,
                pinned_by: pin.try_get("pinned_by")?,
                pinned_at: pin.try_get("pinned_at")?,
            })
        })
        .collect::<DatabaseResult<Vec<_>>>()?;

        let permission = |column: &str| -> DatabaseResult<Permission> {
            let value: String = row.try_get(column)?;
            Ok(Permission::from(value.as_str()))
        };

        Ok(Group {
            id,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            avatar: row.try_get("avatar")?,
            workspace_id: row.try_get("workspace_id")?,
            created_by: row.try_get("created_by")?,
            members,
            settings: GroupSettings {
                is_private: row.try_get("is_private")?,
                send_messages: permission("send_messages")?,
                add_members: permission("add_members")?,
                change_group_info: permission("change_group_info")?,
                pin_messages: permission("pin_messages")?,
            },
            pinned_messages,
            is_archived: row.try_get("is_archived")?,
            archived_at: row.try_get("archived_at")?,
            chat_id: row.try_get("chat_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

async fn deactivate(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    group_id: &str,
    user_id: &str,
) -> DatabaseResult<bool> {
    let result = sqlx::query(&format!(
        "UPDATE group_members SET is_active = 0
         WHERE group_id = ? AND user_id = ? AND is_active = 1
           AND (role <> 'admin' OR {ACTIVE_ADMIN_COUNT} > 1)"
    ))
    .bind(group_id)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn touch(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    group_id: &str,
    now: &str,
) -> DatabaseResult<()> {
    sqlx::query("UPDATE chat_groups SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(group_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
