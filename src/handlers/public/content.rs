// handlers/public/content.rs - Published content, tags, collections and idea packs
//
// GET  /api/content
// GET  /api/content/:slug
// POST /api/content/:slug/feedback
// GET  /api/tags
// GET  /api/collections
// GET  /api/collections/:slug
// GET  /api/idea-packs

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{bearer_token, verify_token};
use crate::database::models::{Collection, Content, Feedback, IdeaPack, Tag};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::content::{self, CollectionView, FeedbackInput, ListQuery};
use crate::types::ContentKind;

#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    pub kind: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ContentQuery {
    pub fn into_list_query(self) -> Result<ListQuery, ApiError> {
        let kind = self
            .kind
            .filter(|k| !k.trim().is_empty())
            .map(|k| k.parse::<ContentKind>())
            .transpose()
            .map_err(|e| ApiError::field("kind", e.to_string()))?;
        Ok(ListQuery {
            kind,
            tag: self.tag,
            status: None,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

pub async fn content_list(
    State(state): State<AppState>,
    Query(query): Query<ContentQuery>,
) -> ApiResult<Vec<Content>> {
    let items = content::list_published(state.store.as_ref(), query.into_list_query()?).await?;
    Ok(ApiResponse::success(items))
}

pub async fn content_get(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Content> {
    let item = content::get_published(state.store.as_ref(), &slug).await?;
    Ok(ApiResponse::success(item))
}

/// Anonymous feedback is accepted; a valid session token attributes it
pub async fn feedback_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    body: Result<Json<FeedbackInput>, JsonRejection>,
) -> ApiResult<Feedback> {
    let Json(input) = body?;
    let user_id = optional_user(&state, &headers);
    let feedback = content::submit_feedback(state.store.as_ref(), &slug, user_id, input).await?;
    Ok(ApiResponse::created(feedback))
}

pub async fn tags_list(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    Ok(ApiResponse::success(state.store.list_tags().await?))
}

pub async fn collections_list(State(state): State<AppState>) -> ApiResult<Vec<Collection>> {
    let collections = content::published_collections(state.store.as_ref()).await?;
    Ok(ApiResponse::success(collections))
}

pub async fn collection_get(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<CollectionView> {
    let view = content::published_collection(state.store.as_ref(), &slug).await?;
    Ok(ApiResponse::success(view))
}

pub async fn idea_packs_list(State(state): State<AppState>) -> ApiResult<Vec<IdeaPack>> {
    let packs = content::published_idea_packs(state.store.as_ref()).await?;
    Ok(ApiResponse::success(packs))
}

fn optional_user(state: &AppState, headers: &HeaderMap) -> Option<Uuid> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok();
    let token = bearer_token(header).ok()?;
    verify_token(token, &state.config.security).ok().map(|claims| claims.sub)
}
