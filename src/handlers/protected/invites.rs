// handlers/protected/invites.rs - Project invite endpoints
//
// GET    /api/projects/:id/invites
// POST   /api/projects/:id/invites
// DELETE /api/projects/:id/invites/:invite_id
// POST   /api/invites/accept

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{ProjectInvite, ToolAccess};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::projects::{CreatedInvite, ProjectService, ProjectView};

#[derive(Debug, Deserialize)]
pub struct CreateInvite {
    pub email: String,
    #[serde(default, with = "crate::database::models::project::tool_access_serde")]
    pub tool_access: ToolAccess,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvite {
    pub token: String,
}

pub async fn invites_list(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Vec<ProjectInvite>> {
    let invites = ProjectService::new(&state).invites(&user, project_id).await?;
    Ok(ApiResponse::success(invites))
}

/// The raw token is in this response only
pub async fn invite_create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
    body: Result<Json<CreateInvite>, JsonRejection>,
) -> ApiResult<CreatedInvite> {
    let Json(body) = body?;
    let created = ProjectService::new(&state)
        .create_invite(&user, project_id, &body.email, Some(body.tool_access))
        .await?;
    Ok(ApiResponse::created(created))
}

pub async fn invite_revoke(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project_id, invite_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    ProjectService::new(&state)
        .revoke_invite(&user, project_id, invite_id)
        .await?;
    Ok(ApiResponse::no_content())
}

pub async fn invite_accept(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<AcceptInvite>, JsonRejection>,
) -> ApiResult<ProjectView> {
    let Json(body) = body?;
    let view = ProjectService::new(&state)
        .accept_invite(&user, body.token.trim())
        .await?;
    Ok(ApiResponse::success(view))
}
