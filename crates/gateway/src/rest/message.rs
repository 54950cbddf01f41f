//! Message REST endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use teamhub_chats::{DeletedMessage, MessageDraft, Validator};
use teamhub_database::Message;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, GatewayResult};
use crate::state::{AuthUser, GatewayState};

/// A message addressed to exactly one of `chatId` or `groupId`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReactionRequest {
    pub emoji: String,
}

/// Create message routes
pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/messages", post(post_message))
        .route("/messages/:message_id", put(edit_message).delete(delete_message))
        .route("/messages/:message_id/read", post(mark_read))
        .route("/messages/:message_id/reactions", post(toggle_reaction))
}

#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "Messages",
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message sent"),
        (status = 400, description = "Missing, ambiguous or malformed target", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Chat or group not found", body = ErrorResponse)
    )
)]
pub async fn post_message(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PostMessageRequest>,
) -> GatewayResult<impl IntoResponse> {
    let target = Validator::target(payload.chat_id, payload.group_id)?;
    let draft = MessageDraft {
        content: payload.content,
        attachment: None,
        reply_to: payload.reply_to,
    };
    let message = state.chats.messages.send(&user.id, target, draft).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    put,
    path = "/api/messages/{message_id}",
    tag = "Messages",
    params(
        ("message_id" = String, Path, description = "Message id")
    ),
    request_body = EditMessageRequest,
    responses(
        (status = 200, description = "Edited message"),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 403, description = "Not the sender", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    )
)]
pub async fn edit_message(
    Path(message_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<EditMessageRequest>,
) -> GatewayResult<Json<Message>> {
    let message = state
        .chats
        .messages
        .edit(&message_id, &user.id, &payload.content)
        .await?;
    Ok(Json(message))
}

#[utoipa::path(
    delete,
    path = "/api/messages/{message_id}",
    tag = "Messages",
    params(
        ("message_id" = String, Path, description = "Message id")
    ),
    responses(
        (status = 200, description = "Deleted message reference"),
        (status = 403, description = "Not the sender", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    )
)]
pub async fn delete_message(
    Path(message_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<DeletedMessage>> {
    let deleted = state.chats.messages.delete(&message_id, &user.id).await?;
    Ok(Json(deleted))
}

#[utoipa::path(
    post,
    path = "/api/messages/{message_id}/read",
    tag = "Messages",
    params(
        ("message_id" = String, Path, description = "Message id")
    ),
    responses(
        (status = 200, description = "Message with the caller's read receipt"),
        (status = 403, description = "No access to the conversation", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    )
)]
pub async fn mark_read(
    Path(message_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Message>> {
    Ok(Json(state.chats.messages.mark_read(&message_id, &user.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/messages/{message_id}/reactions",
    tag = "Messages",
    params(
        ("message_id" = String, Path, description = "Message id")
    ),
    request_body = ReactionRequest,
    responses(
        (status = 200, description = "Message after toggling the reaction"),
        (status = 400, description = "Invalid emoji", body = ErrorResponse),
        (status = 403, description = "No access to the conversation", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    )
)]
pub async fn toggle_reaction(
    Path(message_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ReactionRequest>,
) -> GatewayResult<Json<Message>> {
    let message = state
        .chats
        .messages
        .toggle_reaction(&message_id, &user.id, &payload.emoji)
        .await?;
    Ok(Json(message))
}
