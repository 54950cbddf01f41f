//! # TeamHub Gateway Crate
//!
//! HTTP REST and WebSocket front door for TeamHub. Requests are
//! authenticated against stored sessions and routed to the chat services;
//! every state change those services publish is fanned out to socket rooms
//! by the realtime [`Hub`].
//!
//! ## Architecture
//!
//! - **REST**: `/api` endpoints with OpenAPI documentation
//! - **WebSocket**: `/ws` event protocol, rooms and presence
//! - **State**: shared services, session lookup and the hub
//! - **Middleware**: authentication, CORS, tracing and request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use teamhub_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::new(pool, config.uploads, &config.realtime);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use middleware::auth_middleware;
pub use state::{AuthUser, GatewayState};
pub use websocket::Hub;

use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let state = Arc::new(state);

    let authenticated = Router::new()
        .nest("/api", rest::create_rest_routes(&state))
        .merge(websocket::create_websocket_routes())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    #[allow(unused_mut)]
    let mut router = Router::new()
        .route("/health", get(rest::health::health_check))
        .merge(authenticated)
        .layer(middleware::create_cors_layer())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(middleware::create_trace_layer())
        .with_state(state);

    // Add Swagger UI if in debug mode
    #[cfg(debug_assertions)]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}

#[cfg(debug_assertions)]
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        rest::health::health_check,
        rest::chat::resolve_private_chat,
        rest::chat::list_chats,
        rest::chat::list_user_chats,
        rest::chat::list_chat_messages,
        rest::chat::send_chat_message,
        rest::attachment::download_attachment,
        rest::message::post_message,
        rest::message::edit_message,
        rest::message::delete_message,
        rest::message::mark_read,
        rest::message::toggle_reaction,
        rest::group::create_group,
        rest::group::list_groups,
        rest::group::get_group,
        rest::group::update_group,
        rest::group::add_members,
        rest::group::remove_member,
        rest::group::update_member_role,
        rest::group::leave_group,
        rest::group::list_group_messages,
        rest::group::send_group_message,
        rest::group::pin_message,
        rest::group::unpin_message,
        rest::group::archive_group,
        rest::group::unarchive_group,
        rest::workspace::create_workspace,
        rest::workspace::list_workspaces,
        rest::invite::send_invitations,
        rest::invite::list_pending,
        rest::invite::accept_invitation,
        rest::invite::reject_invitation,
    ),
    components(
        schemas(
            error::ErrorResponse,
            rest::health::HealthResponse,
            rest::chat::ResolveChatRequest,
            rest::chat::SendMessageRequest,
            rest::message::PostMessageRequest,
            rest::message::EditMessageRequest,
            rest::message::ReactionRequest,
            rest::group::CreateGroupBody,
            rest::group::UpdateGroupBody,
            rest::group::AddMembersRequest,
            rest::group::RoleRequest,
            rest::group::PinRequest,
            rest::workspace::CreateWorkspaceRequest,
            rest::invite::SendInvitationsRequest,
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Chats", description = "Private chats and direct messages"),
        (name = "Attachments", description = "Uploaded files"),
        (name = "Messages", description = "Message edits, deletes, receipts and reactions"),
        (name = "Groups", description = "Group membership, settings and history"),
        (name = "Workspaces", description = "Workspace bootstrap"),
        (name = "Invitations", description = "Workspace invitations"),
    )
)]
struct ApiDoc;

#[cfg(test)]
pub(crate) mod test_support {
    use teamhub_config::{DatabaseConfig, RealtimeConfig, UploadConfig};
    use tempfile::TempDir;

    use crate::state::{AuthUser, GatewayState};

    pub async fn test_state() -> (GatewayState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("gateway.db").display()),
            max_connections: 4,
        };
        let pool = teamhub_database::initialize_database(&config).await.unwrap();
        let uploads = UploadConfig {
            dir: temp_dir.path().join("uploads").display().to_string(),
            ..UploadConfig::default()
        };
        let state = GatewayState::new(pool, uploads, &RealtimeConfig::default());
        (state, temp_dir)
    }

    pub async fn seed_user(state: &GatewayState, name: &str) -> AuthUser {
        let user = state
            .users
            .create(name, &format!("{}@example.com", name.to_lowercase()), None)
            .await
            .unwrap();
        AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}
