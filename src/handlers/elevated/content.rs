// handlers/elevated/content.rs - Content management
//
// GET    /api/admin/content
// POST   /api/admin/content
// GET    /api/admin/content/:id
// PUT    /api/admin/content/:id
// DELETE /api/admin/content/:id

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Content;
use crate::error::ApiError;
use crate::handlers::public::content::ContentQuery;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::content::{self, ContentInput};
use crate::types::ContentStatus;

#[derive(Debug, Default, Deserialize)]
pub struct AdminContentQuery {
    pub kind: Option<String>,
    pub tag: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Drafts included
pub async fn content_list(
    State(state): State<AppState>,
    Query(query): Query<AdminContentQuery>,
) -> ApiResult<Vec<Content>> {
    let status = query
        .status
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<ContentStatus>())
        .transpose()
        .map_err(|e| ApiError::field("status", e.to_string()))?;
    let mut list = ContentQuery {
        kind: query.kind,
        tag: query.tag,
        limit: query.limit,
        offset: query.offset,
    }
    .into_list_query()?;
    list.status = status;
    Ok(ApiResponse::success(content::list_all(state.store.as_ref(), list).await?))
}

pub async fn content_create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<ContentInput>, JsonRejection>,
) -> ApiResult<Content> {
    let Json(input) = body?;
    let created = content::create_content(state.store.as_ref(), user.id, input).await?;
    Ok(ApiResponse::created(created))
}

pub async fn content_get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Content> {
    Ok(ApiResponse::success(content::get_by_id(state.store.as_ref(), id).await?))
}

pub async fn content_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<ContentInput>, JsonRejection>,
) -> ApiResult<Content> {
    let Json(input) = body?;
    Ok(ApiResponse::success(
        content::update_content(state.store.as_ref(), id, input).await?,
    ))
}

pub async fn content_delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    content::delete_content(state.store.as_ref(), id).await?;
    Ok(ApiResponse::no_content())
}
