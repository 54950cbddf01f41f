//! REST API endpoints for the gateway

pub mod attachment;
pub mod chat;
pub mod group;
pub mod health;
pub mod invite;
pub mod message;
pub mod workspace;

use axum::Router;
use crate::state::GatewayState;
use std::sync::Arc;

/// Create all REST API routes, relative to `/api`
pub fn create_rest_routes(state: &GatewayState) -> Router<Arc<GatewayState>> {
    Router::new()
        // Chat routes
        .merge(chat::create_chat_routes(state))
        // Message routes
        .merge(message::create_message_routes())
        // Group routes
        .merge(group::create_group_routes())
        // Workspace routes
        .merge(workspace::create_workspace_routes())
        // Invitation routes
        .merge(invite::create_invite_routes())
}
