// handlers/protected/members.rs - Project membership endpoints
//
// GET    /api/projects/:id/members
// PUT    /api/projects/:id/members/:user_id
// DELETE /api/projects/:id/members/:user_id

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{ProjectMember, ToolAccess};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::projects::{MemberView, ProjectService};

#[derive(Debug, Deserialize)]
pub struct UpdateAccess {
    #[serde(with = "crate::database::models::project::tool_access_serde")]
    pub tool_access: ToolAccess,
}

pub async fn members_list(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Vec<MemberView>> {
    let members = ProjectService::new(&state).members(&user, project_id).await?;
    Ok(ApiResponse::success(members))
}

pub async fn member_update(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project_id, member_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<UpdateAccess>, JsonRejection>,
) -> ApiResult<ProjectMember> {
    let Json(body) = body?;
    let member = ProjectService::new(&state)
        .update_member_access(&user, project_id, member_id, body.tool_access)
        .await?;
    Ok(ApiResponse::success(member))
}

/// Removing yourself is leaving the project
pub async fn member_remove(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project_id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    ProjectService::new(&state)
        .remove_member(&user, project_id, member_id)
        .await?;
    Ok(ApiResponse::no_content())
}
