//! Workspace REST endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use teamhub_chats::UserWorkspaces;
use teamhub_database::Workspace;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, GatewayResult};
use crate::state::{AuthUser, GatewayState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Create workspace routes
pub fn create_workspace_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/workspaces", get(list_workspaces).post(create_workspace))
}

#[utoipa::path(
    post,
    path = "/api/workspaces",
    tag = "Workspaces",
    request_body = CreateWorkspaceRequest,
    responses(
        (status = 201, description = "Workspace created with the owner's self-chat"),
        (status = 400, description = "Blank name", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn create_workspace(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateWorkspaceRequest>,
) -> GatewayResult<(StatusCode, Json<Workspace>)> {
    let workspace = state
        .chats
        .workspaces
        .create_workspace(&user.id, &payload.name, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

#[utoipa::path(
    get,
    path = "/api/workspaces",
    tag = "Workspaces",
    responses(
        (status = 200, description = "Owned and joined workspaces"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_workspaces(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<UserWorkspaces>> {
    Ok(Json(state.chats.workspaces.list_user_workspaces(&user.id).await?))
}
