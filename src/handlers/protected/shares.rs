// handlers/protected/shares.rs - Share link management
//
// GET    /api/tools/:tool/shares
// POST   /api/tools/:tool/shares
// DELETE /api/shares/:id

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::ShareSettings;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::shares::{self, CreatedShare, ShareListing};

use super::{parse_tool, ProjectQuery};

#[derive(Debug, Deserialize)]
pub struct CreateShare {
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub settings: ShareSettings,
    pub expires_in_days: Option<i64>,
}

pub async fn shares_list(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(tool): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Vec<ShareListing>> {
    let tool = parse_tool(&tool)?;
    let listing = shares::list_shares(&state, &user, tool, query.project_id).await?;
    Ok(ApiResponse::success(listing))
}

pub async fn share_create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(tool): Path<String>,
    body: Result<Json<CreateShare>, JsonRejection>,
) -> ApiResult<CreatedShare> {
    let tool = parse_tool(&tool)?;
    let Json(body) = body?;
    let created = shares::create_share(&state, &user, tool, body.project_id, body.settings, body.expires_in_days).await?;
    Ok(ApiResponse::created(created))
}

pub async fn share_revoke(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    shares::revoke_share(&state, &user, id).await?;
    Ok(ApiResponse::no_content())
}
