//! Workspace invitation REST endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teamhub_chats::{AcceptedInvitation, InvitationOutcome};
use teamhub_database::Invitation;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, GatewayResult};
use crate::state::{AuthUser, GatewayState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendInvitationsRequest {
    #[serde(alias = "workspace")]
    pub workspace_id: String,
    pub emails: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SendInvitationsResponse {
    pub results: Vec<InvitationOutcome>,
}

/// Create invitation routes
pub fn create_invite_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/invitations", post(send_invitations))
        .route("/invitations/pending", get(list_pending))
        .route("/invitations/:invitation_id/accept", put(accept_invitation))
        .route("/invitations/:invitation_id/reject", put(reject_invitation))
}

#[utoipa::path(
    post,
    path = "/api/invitations",
    tag = "Invitations",
    request_body = SendInvitationsRequest,
    responses(
        (status = 201, description = "Per-email invitation results"),
        (status = 400, description = "No or invalid emails", body = ErrorResponse),
        (status = 403, description = "Not a workspace member", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    )
)]
pub async fn send_invitations(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SendInvitationsRequest>,
) -> GatewayResult<(StatusCode, Json<SendInvitationsResponse>)> {
    let results = state
        .chats
        .invitations
        .send_invitations(&user.id, &payload.workspace_id, &payload.emails)
        .await?;
    Ok((StatusCode::CREATED, Json(SendInvitationsResponse { results })))
}

#[utoipa::path(
    get,
    path = "/api/invitations/pending",
    tag = "Invitations",
    responses(
        (status = 200, description = "Pending invitations for the caller's email"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_pending(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Vec<Invitation>>> {
    Ok(Json(state.chats.invitations.list_pending(&user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/invitations/{invitation_id}/accept",
    tag = "Invitations",
    params(("invitation_id" = String, Path, description = "Invitation id")),
    responses(
        (status = 200, description = "Joined workspace and its private chats"),
        (status = 403, description = "Invitation is for another email", body = ErrorResponse),
        (status = 409, description = "Already answered", body = ErrorResponse)
    )
)]
pub async fn accept_invitation(
    Path(invitation_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<AcceptedInvitation>> {
    Ok(Json(state.chats.invitations.accept(&invitation_id, &user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/invitations/{invitation_id}/reject",
    tag = "Invitations",
    params(("invitation_id" = String, Path, description = "Invitation id")),
    responses(
        (status = 200, description = "Rejected invitation"),
        (status = 403, description = "Invitation is for another email", body = ErrorResponse),
        (status = 409, description = "Already answered", body = ErrorResponse)
    )
)]
pub async fn reject_invitation(
    Path(invitation_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<AuthUser>,
) -> GatewayResult<Json<Invitation>> {
    Ok(Json(state.chats.invitations.reject(&invitation_id, &user.id).await?))
}
