//! Chat REST endpoints

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use teamhub_chats::MessageDraft;
use teamhub_database::{ChatWithMembers, Message, MessageTarget};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::attachment::{body_limit, download_attachment, store_upload};
use crate::error::{ErrorResponse, GatewayError, GatewayResult};
use crate::state::{AuthUser, GatewayState};

/// Members of a private chat, as `members` or as `userId1`/`userId2`.
///
/// A single member resolves that member's self-chat.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveChatRequest {
    #[serde(default)]
    pub members: Option<Vec<String>>,
    #[serde(default)]
    pub user_id1: Option<String>,
    #[serde(default)]
    pub user_id2: Option<String>,
    #[serde(default, alias = "workspaceId")]
    pub workspace: Option<String>,
    #[serde(default)]
    pub chatname: Option<String>,
}

impl ResolveChatRequest {
    fn pair(&self) -> Option<(String, Option<String>)> {
        match &self.members {
            Some(members) if !members.is_empty() => {
                Some((members[0].clone(), members.get(1).cloned()))
            }
            _ => self
                .user_id1
                .clone()
                .map(|first| (first, self.user_id2.clone())),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// Create chat routes
pub fn create_chat_routes(state: &GatewayState) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/chats", get(list_chats))
        .route("/chats/private", post(resolve_private_chat))
        .route("/chats/user/:user_id", get(list_user_chats))
        .route(
            "/chats/:chat_id/messages",
            get(list_chat_messages)
                .post(send_chat_message)
                .layer(DefaultBodyLimit::max(body_limit(&state.uploads))),
        )
        .route("/chats/download/:filename", get(download_attachment))
}

#[utoipa::path(
    post,
    path = "/api/chats/private",
    tag = "Chats",
    request_body = ResolveChatRequest,
    responses(
        (status = 200, description = "Existing private chat"),
        (status = 201, description = "Private chat created"),
        (status = 400, description = "Invalid members", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Caller is not one of the members", body = ErrorResponse)
    )
)]
pub async fn resolve_private_chat(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ResolveChatRequest>,
) -> GatewayResult<impl IntoResponse> {
    let (first, second) = payload
        .pair()
        .ok_or_else(|| GatewayError::BadRequest("At least one member is required".to_string()))?;

    let is_participant = first == user.id || second.as_deref() == Some(user.id.as_str());
    if !is_participant {
        return Err(GatewayError::Forbidden(
            "You can only open chats you take part in".to_string(),
        ));
    }

    let resolution = state
        .chats
        .resolver
        .resolve_private_chat(
            &first,
            second.as_deref(),
            payload.workspace.as_deref(),
            payload.chatname.as_deref(),
        )
        .await?;

    let status = if resolution.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resolution.chat)))
}

#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "Chats",
    responses(
        (status = 200, description = "Chats of the caller"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_chats(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Vec<ChatWithMembers>>> {
    Ok(Json(state.chats.resolver.list_user_chats(&user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/chats/user/{user_id}",
    tag = "Chats",
    params(
        ("user_id" = String, Path, description = "User id; must be the caller")
    ),
    responses(
        (status = 200, description = "Chats of the user"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not the caller", body = ErrorResponse)
    )
)]
pub async fn list_user_chats(
    Path(user_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Vec<ChatWithMembers>>> {
    if user_id != user.id {
        return Err(GatewayError::Forbidden(
            "You can only list your own chats".to_string(),
        ));
    }
    Ok(Json(state.chats.resolver.list_user_chats(&user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/chats/{chat_id}/messages",
    tag = "Chats",
    params(
        ("chat_id" = String, Path, description = "Chat id")
    ),
    responses(
        (status = 200, description = "Chat history, oldest first"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Chat not found", body = ErrorResponse)
    )
)]
pub async fn list_chat_messages(
    Path(chat_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Vec<Message>>> {
    let messages = state
        .chats
        .messages
        .list_chat_messages(&chat_id, &user.id)
        .await?;
    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/api/chats/{chat_id}/messages",
    tag = "Chats",
    params(
        ("chat_id" = String, Path, description = "Chat id")
    ),
    request_body(
        content = SendMessageRequest,
        description = "JSON body, or multipart with a `content` field and a `document` file"
    ),
    responses(
        (status = 201, description = "Message sent"),
        (status = 400, description = "Invalid message or file type", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 413, description = "Attachment too large", body = ErrorResponse)
    )
)]
pub async fn send_chat_message(
    Path(chat_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    request: Request,
) -> GatewayResult<impl IntoResponse> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let target = MessageTarget::Chat(chat_id);

    let draft = if is_multipart {
        // Nothing touches the upload dir for a sender who could not post here.
        if !state.chats.messages.can_access(&user.id, &target).await? {
            return Err(GatewayError::Forbidden("Not a member of this chat".to_string()));
        }
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))?;
        read_multipart_draft(&state, multipart).await?
    } else {
        let Json(body) = Json::<SendMessageRequest>::from_request(request, &state)
            .await
            .map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))?;
        MessageDraft {
            content: body.content,
            attachment: None,
            reply_to: body.reply_to,
        }
    };

    let stored = draft.attachment.as_ref().map(|attachment| attachment.path.clone());
    match state.chats.messages.send(&user.id, target, draft).await {
        Ok(message) => Ok((StatusCode::CREATED, Json(message))),
        Err(error) => {
            if let Some(path) = stored {
                discard_upload(&path).await;
            }
            Err(error.into())
        }
    }
}

async fn discard_upload(path: &str) {
    if let Err(error) = tokio::fs::remove_file(path).await {
        warn!(path = %path, error = %error, "failed to remove rejected upload");
    }
}

/// Collect `content`, `replyTo` and an optional `document` file.
///
/// A file without text uses its original name as the message content.
async fn read_multipart_draft(state: &GatewayState, mut multipart: Multipart) -> GatewayResult<MessageDraft> {
    let mut draft = MessageDraft::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("content") => draft.content = field.text().await?,
            Some("replyTo") => {
                let reply_to = field.text().await?;
                if !reply_to.trim().is_empty() {
                    draft.reply_to = Some(reply_to);
                }
            }
            Some("document") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let mimetype = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                let attachment = store_upload(&state.uploads, &filename, &mimetype, &bytes).await?;
                draft.attachment = Some(attachment);
            }
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }

    if draft.content.trim().is_empty() {
        if let Some(attachment) = &draft.attachment {
            draft.content = attachment.filename.clone();
        }
    }

    Ok(draft)
}
