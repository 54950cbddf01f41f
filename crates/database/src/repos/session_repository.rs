//! Session lookups for externally issued bearer tokens.

use chrono::{Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::entities::Session;
use crate::now_timestamp;
use crate::types::DatabaseResult;

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a session for `user_id` valid for `ttl`.
    ///
    /// Used by provisioning tooling; regular tokens arrive from the identity
    /// service through the same table.
    pub async fn create(&self, user_id: &str, ttl: Duration) -> DatabaseResult<Session> {
        let session = Session {
            token: uuid::Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            created_at: now_timestamp(),
            expires_at: (Utc::now() + ttl)
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        };

        sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&session.token)
            .bind(&session.user_id)
            .bind(&session.created_at)
            .bind(&session.expires_at)
            .execute(&self.pool)
            .await?;

        info!(user_id = %session.user_id, "issued session");
        Ok(session)
    }

    /// Find an unexpired session by token
    pub async fn find_valid(&self, token: &str) -> DatabaseResult<Option<Session>> {
        let row = sqlx::query("SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(session) = row.as_ref().map(map_session).transpose()? else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            debug!(user_id = %session.user_id, "rejected expired session");
            return Ok(None);
        }

        Ok(Some(session))
    }
}

fn map_session(row: &SqliteRow) -> DatabaseResult<Session> {
    Ok(Session {
        token: row.try_get("token")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}
