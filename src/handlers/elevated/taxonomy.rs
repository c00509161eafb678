// handlers/elevated/taxonomy.rs - Tags, collections and idea packs
//
// GET/POST       /api/admin/tags,        DELETE     /api/admin/tags/:slug
// GET/POST       /api/admin/collections, PUT/DELETE /api/admin/collections/:id
// GET/POST       /api/admin/idea-packs,  PUT/DELETE /api/admin/idea-packs/:id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Collection, IdeaPack, Tag};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::content::{self, CollectionInput, IdeaPackInput};

#[derive(Debug, Deserialize)]
pub struct CreateTag {
    pub name: String,
}

pub async fn tags_list(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    Ok(ApiResponse::success(state.store.list_tags().await?))
}

pub async fn tag_create(
    State(state): State<AppState>,
    body: Result<Json<CreateTag>, JsonRejection>,
) -> ApiResult<Tag> {
    let Json(body) = body?;
    Ok(ApiResponse::created(
        content::create_tag(state.store.as_ref(), &body.name).await?,
    ))
}

pub async fn tag_delete(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<()> {
    content::delete_tag(state.store.as_ref(), &slug).await?;
    Ok(ApiResponse::no_content())
}

/// All collections, unpublished included
pub async fn collections_list(State(state): State<AppState>) -> ApiResult<Vec<Collection>> {
    Ok(ApiResponse::success(state.store.list_collections().await?))
}

pub async fn collection_create(
    State(state): State<AppState>,
    body: Result<Json<CollectionInput>, JsonRejection>,
) -> ApiResult<Collection> {
    let Json(input) = body?;
    Ok(ApiResponse::created(
        content::create_collection(state.store.as_ref(), input).await?,
    ))
}

pub async fn collection_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<CollectionInput>, JsonRejection>,
) -> ApiResult<Collection> {
    let Json(input) = body?;
    Ok(ApiResponse::success(
        content::update_collection(state.store.as_ref(), id, input).await?,
    ))
}

pub async fn collection_delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    content::delete_collection(state.store.as_ref(), id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn idea_packs_list(State(state): State<AppState>) -> ApiResult<Vec<IdeaPack>> {
    Ok(ApiResponse::success(state.store.list_idea_packs().await?))
}

pub async fn idea_pack_create(
    State(state): State<AppState>,
    body: Result<Json<IdeaPackInput>, JsonRejection>,
) -> ApiResult<IdeaPack> {
    let Json(input) = body?;
    Ok(ApiResponse::created(
        content::create_idea_pack(state.store.as_ref(), input).await?,
    ))
}

pub async fn idea_pack_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<IdeaPackInput>, JsonRejection>,
) -> ApiResult<IdeaPack> {
    let Json(input) = body?;
    Ok(ApiResponse::success(
        content::update_idea_pack(state.store.as_ref(), id, input).await?,
    ))
}

pub async fn idea_pack_delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    content::delete_idea_pack(state.store.as_ref(), id).await?;
    Ok(ApiResponse::no_content())
}
