// handlers/protected/tools.rs - Tool state endpoints
//
// GET  /api/tools/:tool
// PUT  /api/tools/:tool
// POST /api/idea-packs/:slug/import

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::tools::{self, ImportResult, ToolView};

use super::{parse_tool, ProjectQuery};

#[derive(Debug, Deserialize)]
pub struct PutTool {
    pub project_id: Option<Uuid>,
    pub payload: Value,
    pub base_revision: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportPack {
    pub project_id: Option<Uuid>,
    pub board_id: Option<String>,
}

pub async fn tool_get(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(tool): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<ToolView> {
    let tool = parse_tool(&tool)?;
    let view = tools::get_tool(&state, &user, tool, query.project_id).await?;
    Ok(ApiResponse::success(view))
}

/// 409 REVISION_CONFLICT carries the server's current state in `data`
pub async fn tool_put(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(tool): Path<String>,
    body: Result<Json<PutTool>, JsonRejection>,
) -> ApiResult<ToolView> {
    let tool = parse_tool(&tool)?;
    let Json(body) = body?;
    let view = tools::put_tool(&state, &user, tool, body.project_id, &body.payload, body.base_revision).await?;
    Ok(ApiResponse::success(view))
}

pub async fn idea_pack_import(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
    body: Option<Json<ImportPack>>,
) -> ApiResult<ImportResult> {
    let ImportPack { project_id, board_id } = body.map(|Json(b)| b).unwrap_or_default();
    let result = tools::import_idea_pack(&state, &user, &slug, project_id, board_id.as_deref()).await?;
    Ok(ApiResponse::success(result))
}
