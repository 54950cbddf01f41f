//! TeamHub Database Crate
//!
//! Connection management, migrations, entities and repositories for the
//! messaging store. Every public id is a UUID string and every timestamp is
//! an RFC 3339 string in UTC.

use sqlx::SqlitePool;
use teamhub_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

pub use repos::{
    ChatRepository, GroupRepository, InvitationRepository, MessageRepository, SessionRepository,
    UserRepository, WorkspaceRepository,
};

pub use entities::{
    pair_key, scope_key, Attachment, Chat, ChatWithMembers, Group, GroupMember, GroupRole,
    GroupSettings, GroupSettingsPatch, Invitation, InvitationStatus, Message, MessageTarget,
    MessageType, NewMessage, Permission, PinnedMessage, Reaction, ReadReceipt, Session, User,
    UserSummary, Workspace, WorkspaceMember, WorkspaceRole, MAX_PINNED_MESSAGES,
};

pub use types::{errors::DatabaseError, DatabaseResult};

pub use sqlx::Pool;

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

/// Current time in the store's timestamp format.
///
/// Microsecond precision with a `Z` suffix keeps lexical and chronological
/// order identical.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Fresh opaque entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_initialization() {
        let (pool, _temp_dir) = test_support::create_test_database().await;
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let first = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = now_timestamp();
        assert!(first < second);
        assert!(first.ends_with('Z'));
    }
}
