//! Group REST endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use teamhub_chats::{CreateGroupRequest, GroupMessagesPage, MessageDraft, PageRequest, UpdateGroupRequest};
use teamhub_database::{Group, GroupRole, GroupSettingsPatch, Message, MessageTarget};
use utoipa::ToSchema;

use super::chat::SendMessageRequest;
use crate::error::{ErrorResponse, GatewayError, GatewayResult};
use crate::state::{AuthUser, GatewayState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "workspaceId")]
    pub workspace: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl From<CreateGroupBody> for CreateGroupRequest {
    fn from(body: CreateGroupBody) -> Self {
        Self {
            name: body.name,
            description: body.description,
            workspace: body.workspace,
            members: body.members,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub settings: Option<GroupSettingsPatch>,
}

impl From<UpdateGroupBody> for UpdateGroupRequest {
    fn from(body: UpdateGroupBody) -> Self {
        Self {
            name: body.name,
            description: body.description,
            settings: body.settings,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRequest {
    /// `admin` or `member`
    pub role: String,
}

impl RoleRequest {
    fn parse(&self) -> GatewayResult<GroupRole> {
        match self.role.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(GroupRole::Admin),
            "member" => Ok(GroupRole::Member),
            other => Err(GatewayError::BadRequest(format!("Unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PinRequest {
    pub message_id: String,
}

/// Create group routes
pub fn create_group_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/:group_id", get(get_group).put(update_group))
        .route("/groups/:group_id/members", post(add_members))
        .route("/groups/:group_id/members/:user_id", delete(remove_member))
        .route("/groups/:group_id/members/:user_id/role", put(update_member_role))
        .route("/groups/:group_id/leave", post(leave_group))
        .route(
            "/groups/:group_id/messages",
            get(list_group_messages).post(send_group_message),
        )
        .route("/groups/:group_id/pins", post(pin_message))
        .route("/groups/:group_id/pins/:message_id", delete(unpin_message))
        .route("/groups/:group_id/archive", post(archive_group))
        .route("/groups/:group_id/unarchive", post(unarchive_group))
}

#[utoipa::path(
    post,
    path = "/api/groups",
    tag = "Groups",
    request_body = CreateGroupBody,
    responses(
        (status = 201, description = "Group created"),
        (status = 400, description = "Invalid group", body = ErrorResponse),
        (status = 403, description = "Not a workspace member", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    )
)]
pub async fn create_group(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateGroupBody>,
) -> GatewayResult<impl IntoResponse> {
    let group = state
        .chats
        .groups
        .create_group(&user.id, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/api/groups",
    tag = "Groups",
    responses(
        (status = 200, description = "Active groups of the caller"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_groups(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Vec<Group>>> {
    Ok(Json(state.chats.groups.list_user_groups(&user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}",
    tag = "Groups",
    params(("group_id" = String, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group details"),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    )
)]
pub async fn get_group(
    Path(group_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Group>> {
    Ok(Json(state.chats.groups.get_group(&group_id, &user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/groups/{group_id}",
    tag = "Groups",
    params(("group_id" = String, Path, description = "Group id")),
    request_body = UpdateGroupBody,
    responses(
        (status = 200, description = "Updated group"),
        (status = 400, description = "Nothing to change or invalid name", body = ErrorResponse),
        (status = 403, description = "Not allowed by group settings", body = ErrorResponse)
    )
)]
pub async fn update_group(
    Path(group_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateGroupBody>,
) -> GatewayResult<Json<Group>> {
    let group = state
        .chats
        .groups
        .update_group_info(&group_id, &user.id, payload.into())
        .await?;
    Ok(Json(group))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/members",
    tag = "Groups",
    params(("group_id" = String, Path, description = "Group id")),
    request_body = AddMembersRequest,
    responses(
        (status = 200, description = "Group with the new members"),
        (status = 400, description = "Everyone is already a member", body = ErrorResponse),
        (status = 403, description = "Not allowed by group settings", body = ErrorResponse)
    )
)]
pub async fn add_members(
    Path(group_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AddMembersRequest>,
) -> GatewayResult<Json<Group>> {
    let group = state
        .chats
        .groups
        .add_members(&group_id, &user.id, &payload.user_ids)
        .await?;
    Ok(Json(group))
}

#[utoipa::path(
    delete,
    path = "/api/groups/{group_id}/members/{user_id}",
    tag = "Groups",
    params(
        ("group_id" = String, Path, description = "Group id"),
        ("user_id" = String, Path, description = "Member to remove")
    ),
    responses(
        (status = 200, description = "Group without the member"),
        (status = 400, description = "Would remove the last admin", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn remove_member(
    Path((group_id, user_id)): Path<(String, String)>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Group>> {
    let group = state
        .chats
        .groups
        .remove_member(&group_id, &user.id, &user_id)
        .await?;
    Ok(Json(group))
}

#[utoipa::path(
    put,
    path = "/api/groups/{group_id}/members/{user_id}/role",
    tag = "Groups",
    params(
        ("group_id" = String, Path, description = "Group id"),
        ("user_id" = String, Path, description = "Member whose role changes")
    ),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Group with the new role"),
        (status = 400, description = "Unknown role or last admin", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn update_member_role(
    Path((group_id, user_id)): Path<(String, String)>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<RoleRequest>,
) -> GatewayResult<Json<Group>> {
    let role = payload.parse()?;
    let group = state
        .chats
        .groups
        .update_member_role(&group_id, &user.id, &user_id, role)
        .await?;
    Ok(Json(group))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/leave",
    tag = "Groups",
    params(("group_id" = String, Path, description = "Group id")),
    responses(
        (status = 204, description = "Left the group"),
        (status = 400, description = "Last member must delete the group", body = ErrorResponse),
        (status = 404, description = "Not a member", body = ErrorResponse)
    )
)]
pub async fn leave_group(
    Path(group_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<StatusCode> {
    state.chats.groups.leave_group(&group_id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/messages",
    tag = "Groups",
    params(
        ("group_id" = String, Path, description = "Group id"),
        ("page" = Option<u32>, Query, description = "Page number, starting at 1"),
        ("limit" = Option<u32>, Query, description = "Page size, at most 100")
    ),
    responses(
        (status = 200, description = "One page of history with pagination"),
        (status = 403, description = "Not a member", body = ErrorResponse)
    )
)]
pub async fn list_group_messages(
    Path(group_id): Path<String>,
    Query(page): Query<PageRequest>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<GroupMessagesPage>> {
    let page = state
        .chats
        .messages
        .list_group_messages(&group_id, &user.id, page)
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/messages",
    tag = "Groups",
    params(("group_id" = String, Path, description = "Group id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent"),
        (status = 400, description = "Invalid content or archived group", body = ErrorResponse),
        (status = 403, description = "Not allowed to send", body = ErrorResponse)
    )
)]
pub async fn send_group_message(
    Path(group_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SendMessageRequest>,
) -> GatewayResult<(StatusCode, Json<Message>)> {
    let draft = MessageDraft {
        content: payload.content,
        attachment: None,
        reply_to: payload.reply_to,
    };
    let message = state
        .chats
        .messages
        .send(&user.id, MessageTarget::Group(group_id), draft)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/pins",
    tag = "Groups",
    params(("group_id" = String, Path, description = "Group id")),
    request_body = PinRequest,
    responses(
        (status = 200, description = "Group with the pin"),
        (status = 400, description = "Pin limit reached", body = ErrorResponse),
        (status = 409, description = "Already pinned", body = ErrorResponse)
    )
)]
pub async fn pin_message(
    Path(group_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PinRequest>,
) -> GatewayResult<Json<Group>> {
    let group = state
        .chats
        .groups
        .pin_message(&group_id, &user.id, &payload.message_id)
        .await?;
    Ok(Json(group))
}

#[utoipa::path(
    delete,
    path = "/api/groups/{group_id}/pins/{message_id}",
    tag = "Groups",
    params(
        ("group_id" = String, Path, description = "Group id"),
        ("message_id" = String, Path, description = "Pinned message id")
    ),
    responses(
        (status = 200, description = "Group without the pin"),
        (status = 404, description = "Message is not pinned", body = ErrorResponse)
    )
)]
pub async fn unpin_message(
    Path((group_id, message_id)): Path<(String, String)>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Group>> {
    let group = state
        .chats
        .groups
        .unpin_message(&group_id, &user.id, &message_id)
        .await?;
    Ok(Json(group))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/archive",
    tag = "Groups",
    params(("group_id" = String, Path, description = "Group id")),
    responses(
        (status = 200, description = "Archived group"),
        (status = 400, description = "Already archived", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn archive_group(
    Path(group_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Group>> {
    Ok(Json(state.chats.groups.archive_group(&group_id, &user.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/unarchive",
    tag = "Groups",
    params(("group_id" = String, Path, description = "Group id")),
    responses(
        (status = 200, description = "Active group"),
        (status = 400, description = "Not archived", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn unarchive_group(
    Path(group_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Group>> {
    Ok(Json(state.chats.groups.unarchive_group(&group_id, &user.id).await?))
}
