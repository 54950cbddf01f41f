//! Repository for chat and group messages.

use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::entities::{
    Attachment, Message, MessageTarget, MessageType, NewMessage, Reaction, ReadReceipt, UserSummary,
};
use crate::types::{DatabaseError, DatabaseResult};
use crate::{new_id, now_timestamp};

const MESSAGE_COLUMNS: &str = "m.id, m.chat_id, m.group_id, m.message_type, m.sender_id, m.content,
    m.attachment_filename, m.attachment_path, m.attachment_mimetype, m.attachment_size,
    m.attachment_download_url, m.attachment_uploaded_at, m.is_edited, m.reply_to,
    m.is_system_message, m.is_deleted, m.deleted_by, m.deleted_at, m.created_at, m.updated_at,
    u.name AS sender_name, u.email AS sender_email, u.avatar AS sender_avatar";

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a message and bump the conversation's `updated_at`.
    pub async fn insert(&self, message: NewMessage) -> DatabaseResult<Message> {
        let id = new_id();
        let now = now_timestamp();
        let attachment = message.attachment.as_ref();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO messages (id, chat_id, group_id, message_type, sender_id, content,
                attachment_filename, attachment_path, attachment_mimetype, attachment_size,
                attachment_download_url, attachment_uploaded_at, reply_to, is_system_message,
                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(message.target.chat_id())
        .bind(message.target.group_id())
        .bind(message.target.message_type().as_str())
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(attachment.map(|a| a.filename.as_str()))
        .bind(attachment.map(|a| a.path.as_str()))
        .bind(attachment.map(|a| a.mimetype.as_str()))
        .bind(attachment.map(|a| a.size))
        .bind(attachment.map(|a| a.download_url.as_str()))
        .bind(attachment.map(|a| a.upload_date.as_str()))
        .bind(&message.reply_to)
        .bind(message.is_system_message)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let touch = match &message.target {
            MessageTarget::Chat(_) => "UPDATE chats SET updated_at = ? WHERE id = ?",
            MessageTarget::Group(_) => "UPDATE chat_groups SET updated_at = ? WHERE id = ?",
        };
        sqlx::query(touch)
            .bind(&now)
            .bind(message.target.id())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(message_id = %id, target = %message.target.id(), "inserted message");

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(format!("message {id}")))
    }

    /// Find a message by id, including soft-deleted ones.
    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m
             LEFT JOIN users u ON u.id = m.sender_id
             WHERE m.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Every message of a private chat, oldest first.
    pub async fn list_for_chat(&self, chat_id: &str) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m
             LEFT JOIN users u ON u.id = m.sender_id
             WHERE m.chat_id = ?
             ORDER BY m.created_at, m.rowid"
        ))
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    /// One page of live group messages counted from the newest, returned oldest first.
    pub async fn list_for_group(&self, group_id: &str, limit: i64, offset: i64) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m
             LEFT JOIN users u ON u.id = m.sender_id
             WHERE m.group_id = ? AND m.is_deleted = 0
             ORDER BY m.created_at DESC, m.rowid DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = self.hydrate(rows).await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn count_for_group(&self, group_id: &str) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE group_id = ? AND is_deleted = 0")
            .bind(group_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_for_chat(&self, chat_id: &str) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Replace the content of a live message and flag it as edited.
    pub async fn update_content(&self, id: &str, content: &str) -> DatabaseResult<Message> {
        let result = sqlx::query(
            "UPDATE messages SET content = ?, is_edited = 1, updated_at = ?
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(content)
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found(format!("message {id}")));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(format!("message {id}")))
    }

    /// Remove a message row entirely; returns false if it did not exist.
    pub async fn hard_delete(&self, id: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(message_id = %id, "deleted message");
        Ok(result.rows_affected() > 0)
    }

    /// Tombstone a message and drop it from any pin list.
    pub async fn soft_delete(&self, id: &str, deleted_by: &str) -> DatabaseResult<bool> {
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE messages SET is_deleted = 1, deleted_by = ?, deleted_at = ?, updated_at = ?
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(deleted_by)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM group_pinned_messages WHERE message_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(message_id = %id, deleted_by = %deleted_by, "soft-deleted message");
        Ok(result.rows_affected() > 0)
    }

    /// Record a read receipt; returns false if the user had already read it.
    pub async fn mark_read(&self, message_id: &str, user_id: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) VALUES (?, ?, ?)")
            .bind(message_id)
            .bind(user_id)
            .bind(now_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Mark every live group message from other senders as read by `user_id`.
    pub async fn mark_group_read(&self, group_id: &str, user_id: &str) -> DatabaseResult<u64> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at)
             SELECT id, ?, ? FROM messages
             WHERE group_id = ? AND is_deleted = 0 AND sender_id <> ?",
        )
        .bind(user_id)
        .bind(now_timestamp())
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Add the reaction, or remove it when already present. Returns true when added.
    pub async fn toggle_reaction(&self, message_id: &str, user_id: &str, emoji: &str) -> DatabaseResult<bool> {
        let removed = sqlx::query("DELETE FROM message_reactions WHERE message_id = ? AND user_id = ? AND emoji = ?")
            .bind(message_id)
            .bind(user_id)
            .bind(emoji)
            .execute(&self.pool)
            .await?;

        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT OR IGNORE INTO message_reactions (message_id, user_id, emoji, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> DatabaseResult<Vec<Message>> {
        let mut messages = rows.iter().map(map_message).collect::<DatabaseResult<Vec<_>>>()?;
        if messages.is_empty() {
            return Ok(messages);
        }

        let ids: Vec<String> = messages.iter().map(|message| message.id.clone()).collect();

        let mut reads: HashMap<String, Vec<ReadReceipt>> = HashMap::new();
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT message_id, user_id, read_at FROM message_reads WHERE message_id IN (");
        push_ids(&mut builder, &ids);
        builder.push(" ORDER BY read_at, rowid");
        for row in builder.build().fetch_all(&self.pool).await? {
            reads.entry(row.try_get("message_id")?).or_default().push(ReadReceipt {
                user_id: row.try_get("user_id")?,
                read_at: row.try_get("read_at")?,
            });
        }

        let mut reactions: HashMap<String, Vec<Reaction>> = HashMap::new();
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT message_id, user_id, emoji FROM message_reactions WHERE message_id IN (");
        push_ids(&mut builder, &ids);
        builder.push(" ORDER BY id");
        for row in builder.build().fetch_all(&self.pool).await? {
            reactions.entry(row.try_get("message_id")?).or_default().push(Reaction {
                user_id: row.try_get("user_id")?,
                emoji: row.try_get("emoji")?,
            });
        }

        for message in &mut messages {
            message.read_by = reads.remove(&message.id).unwrap_or_default();
            message.reactions = reactions.remove(&message.id).unwrap_or_default();
        }

        Ok(messages)
    }
}

fn push_ids(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[String]) {
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");
}

fn map_message(row: &SqliteRow) -> DatabaseResult<Message> {
    let chat_id: Option<String> = row.try_get("chat_id")?;
    let group_id: Option<String> = row.try_get("group_id")?;
    let target = MessageTarget::from_parts(chat_id, group_id)
        .ok_or_else(|| DatabaseError::CorruptRow("message must reference one chat or one group".to_string()))?;

    let message_type: String = row.try_get("message_type")?;
    let sender_id: String = row.try_get("sender_id")?;

    let sender = match row.try_get::<Option<String>, _>("sender_name")? {
        Some(name) => Some(UserSummary {
            id: sender_id.clone(),
            name,
            email: row.try_get("sender_email")?,
            avatar: row.try_get("sender_avatar")?,
        }),
        None => None,
    };

    let attachment = match row.try_get::<Option<String>, _>("attachment_filename")? {
        Some(filename) => Some(Attachment {
            filename,
            path: row.try_get::<Option<String>, _>("attachment_path")?.unwrap_or_default(),
            mimetype: row.try_get::<Option<String>, _>("attachment_mimetype")?.unwrap_or_default(),
            size: row.try_get::<Option<i64>, _>("attachment_size")?.unwrap_or_default(),
            download_url: row
                .try_get::<Option<String>, _>("attachment_download_url")?
                .unwrap_or_default(),
            upload_date: row
                .try_get::<Option<String>, _>("attachment_uploaded_at")?
                .unwrap_or_default(),
        }),
        None => None,
    };

    Ok(Message {
        id: row.try_get("id")?,
        target,
        message_type: MessageType::from(message_type.as_str()),
        sender_id,
        sender,
        content: row.try_get("content")?,
        attachment,
        is_edited: row.try_get("is_edited")?,
        read_by: Vec::new(),
        reply_to: row.try_get("reply_to")?,
        reactions: Vec::new(),
        is_system_message: row.try_get("is_system_message")?,
        is_deleted: row.try_get("is_deleted")?,
        deleted_by: row.try_get("deleted_by")?,
        deleted_at: row.try_get("deleted_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::{ChatRepository, GroupRepository, WorkspaceRepository};
    use crate::test_support::{create_test_database, create_user};

    #[tokio::test]
    async fn test_direct_message_lifecycle() {
        let (pool, _dir) = create_test_database().await;
        let ada = create_user(&pool, "Ada").await;
        let bob = create_user(&pool, "Bob").await;
        let chat = ChatRepository::new(pool.clone())
            .create_private(&ada.id, &bob.id, None, "")
            .await
            .unwrap();
        let repo = MessageRepository::new(pool);

        let sent = repo
            .insert(NewMessage::text(MessageTarget::Chat(chat.id.clone()), &ada.id, "hello"))
            .await
            .unwrap();
        assert_eq!(sent.message_type, MessageType::Direct);
        assert_eq!(sent.sender.as_ref().map(|s| s.name.as_str()), Some("Ada"));
        assert_eq!(repo.count_for_chat(&chat.id).await.unwrap(), 1);

        let edited = repo.update_content(&sent.id, "hello there").await.unwrap();
        assert!(edited.is_edited);
        assert_eq!(edited.content, "hello there");

        assert!(repo.mark_read(&sent.id, &bob.id).await.unwrap());
        assert!(!repo.mark_read(&sent.id, &bob.id).await.unwrap());
        assert!(repo.toggle_reaction(&sent.id, &bob.id, "👍").await.unwrap());

        let stored = repo.find_by_id(&sent.id).await.unwrap().unwrap();
        assert_eq!(stored.read_by.len(), 1);
        assert_eq!(stored.reactions.len(), 1);

        assert!(!repo.toggle_reaction(&sent.id, &bob.id, "👍").await.unwrap());
        assert!(repo.hard_delete(&sent.id).await.unwrap());
        assert!(repo.find_by_id(&sent.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_rejects_blank_content() {
        let (pool, _dir) = create_test_database().await;
        let ada = create_user(&pool, "Ada").await;
        let chat = ChatRepository::new(pool.clone())
            .create_private(&ada.id, &ada.id, None, "")
            .await
            .unwrap();

        let result = MessageRepository::new(pool)
            .insert(NewMessage::text(MessageTarget::Chat(chat.id), &ada.id, "   "))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_group_paging_skips_deleted_and_reads_oldest_first() {
        let (pool, _dir) = create_test_database().await;
        let ada = create_user(&pool, "Ada").await;
        let bob = create_user(&pool, "Bob").await;
        let workspace = WorkspaceRepository::new(pool.clone())
            .create(&ada.id, "Acme", None)
            .await
            .unwrap();
        let group = GroupRepository::new(pool.clone())
            .create("Design", "", &workspace.id, &ada.id, &[bob.id.clone()])
            .await
            .unwrap();
        let repo = MessageRepository::new(pool);
        let target = MessageTarget::Group(group.id.clone());

        let mut ids = Vec::new();
        for n in 0..5 {
            let message = repo
                .insert(NewMessage::text(target.clone(), &ada.id, format!("m{n}")))
                .await
                .unwrap();
            ids.push(message.id);
        }

        assert!(repo.soft_delete(&ids[4], &ada.id).await.unwrap());
        assert!(!repo.soft_delete(&ids[4], &ada.id).await.unwrap());
        assert_eq!(repo.count_for_group(&group.id).await.unwrap(), 4);

        let newest = repo.list_for_group(&group.id, 2, 0).await.unwrap();
        let contents: Vec<_> = newest.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);

        let older = repo.list_for_group(&group.id, 2, 2).await.unwrap();
        let contents: Vec<_> = older.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1"]);

        assert_eq!(repo.mark_group_read(&group.id, &bob.id).await.unwrap(), 4);
        assert_eq!(repo.mark_group_read(&group.id, &ada.id).await.unwrap(), 0);

        let deleted = repo.find_by_id(&ids[4]).await.unwrap().unwrap();
        assert!(deleted.is_deleted);
        assert_eq!(deleted.deleted_by.as_deref(), Some(ada.id.as_str()));
    }
}
