//! User repository for database operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;

use crate::entities::{User, UserSummary};
use crate::types::DatabaseResult;
use crate::{new_id, now_timestamp};

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user record; emails are stored lower-cased.
    pub async fn create(&self, name: &str, email: &str, avatar: Option<&str>) -> DatabaseResult<User> {
        let user = User {
            id: new_id(),
            name: name.to_string(),
            email: email.trim().to_lowercase(),
            avatar: avatar.map(str::to_string),
            created_at: now_timestamp(),
        };

        sqlx::query("INSERT INTO users (id, name, email, avatar, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.avatar)
            .bind(&user.created_at)
            .execute(&self.pool)
            .await?;

        info!(user_id = %user.id, "created user");
        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, avatar, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_user).transpose()
    }

    /// Find user by email, case-insensitively
    pub async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, avatar, created_at FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_user).transpose()
    }

    pub async fn exists(&self, id: &str) -> DatabaseResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Display fields for the given ids, in the order requested.
    ///
    /// Duplicate ids yield duplicate entries and unknown ids are skipped.
    pub async fn find_summaries(&self, ids: &[String]) -> DatabaseResult<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, email, avatar FROM users WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        let found = rows
            .iter()
            .map(map_summary)
            .collect::<DatabaseResult<Vec<_>>>()?;

        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|summary| &summary.id == id).cloned())
            .collect())
    }
}

fn map_user(row: &SqliteRow) -> DatabaseResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        avatar: row.try_get("avatar")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn map_summary(row: &SqliteRow) -> DatabaseResult<UserSummary> {
    Ok(UserSummary {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        avatar: row.try_get("avatar")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_database;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let (pool, _dir) = create_test_database().await;
        let repo = UserRepository::new(pool);

        let user = repo.create("Ada", "Ada@Example.com", None).await.unwrap();
        assert_eq!(user.email, "ada@example.com");

        let by_id = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id, user);

        let by_email = repo.find_by_email("ADA@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(repo.exists(&user.id).await.unwrap());
        assert!(!repo.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_reported_as_duplicate() {
        let (pool, _dir) = create_test_database().await;
        let repo = UserRepository::new(pool);

        repo.create("Ada", "ada@example.com", None).await.unwrap();
        let error = repo.create("Other", "ada@example.com", None).await.unwrap_err();
        assert!(error.is_duplicate());
    }

    #[tokio::test]
    async fn test_summaries_preserve_requested_order() {
        let (pool, _dir) = create_test_database().await;
        let repo = UserRepository::new(pool);

        let a = repo.create("A", "a@example.com", None).await.unwrap();
        let b = repo.create("B", "b@example.com", None).await.unwrap();

        let ids = vec![b.id.clone(), a.id.clone(), a.id.clone(), "missing".to_string()];
        let summaries = repo.find_summaries(&ids).await.unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "A"]);
    }
}
