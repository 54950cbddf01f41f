//! Shared application state for the gateway

use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use teamhub_chats::ChatServices;
use teamhub_config::{RealtimeConfig, UploadConfig};
use teamhub_database::{SessionRepository, UserRepository};

use crate::error::{GatewayError, GatewayResult};
use crate::websocket::Hub;

/// The user a request or socket acts as.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    pub sessions: SessionRepository,
    pub users: UserRepository,
    /// Chat services publishing into `hub`
    pub chats: ChatServices,
    /// Realtime connection registry
    pub hub: Hub,
    pub uploads: UploadConfig,
}

impl GatewayState {
    /// Create a new gateway state with all services initialized
    pub fn new(pool: SqlitePool, uploads: UploadConfig, realtime: &RealtimeConfig) -> Self {
        let hub = Hub::new(realtime.connection_buffer);
        let chats = ChatServices::new(pool.clone(), Arc::new(hub.clone()));

        Self {
            sessions: SessionRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            chats,
            hub,
            uploads,
            pool,
        }
    }

    /// Resolve a session token to its user.
    pub async fn authenticate(&self, token: &str) -> GatewayResult<AuthUser> {
        let session = self
            .sessions
            .find_valid(token)
            .await?
            .ok_or_else(|| GatewayError::Unauthorized("Invalid or expired token".to_string()))?;

        let user = self
            .users
            .find_by_id(&session.user_id)
            .await?
            .ok_or_else(|| GatewayError::Unauthorized("Session user no longer exists".to_string()))?;

        Ok(AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, test_state};

    #[tokio::test]
    async fn test_authenticate_resolves_session_user() {
        let (state, _temp_dir) = test_state().await;
        let user = seed_user(&state, "Ada").await;
        let session = state
            .sessions
            .create(&user.id, chrono::Duration::hours(1))
            .await
            .unwrap();

        let auth = state.authenticate(&session.token).await.unwrap();
        assert_eq!(auth, user);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_unknown_token() {
        let (state, _temp_dir) = test_state().await;
        let error = state.authenticate("nope").await.unwrap_err();
        assert!(matches!(error, GatewayError::Unauthorized(_)));
    }
}
