//! Realtime socket endpoint for the gateway

pub mod events;
pub mod handlers;
pub mod hub;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

pub use events::{ClientEvent, PresenceStatus, ServerEvent};
pub use handlers::dispatch;
pub use hub::{chat_room, group_room, Hub, PresenceEntry};

/// Socket routes; authentication is layered on by the caller.
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(handlers::websocket_handler))
}
