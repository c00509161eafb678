// handlers/elevated/settings.rs - Site settings and allowlist (admin only)
//
// GET/PUT /api/admin/settings
// GET     /api/admin/allowlist
// POST    /api/admin/allowlist
// DELETE  /api/admin/allowlist/:email

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{AllowListEntry, SiteSettings};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::admin::{self, SettingsUpdate};

#[derive(Debug, Deserialize)]
pub struct AddAllowList {
    pub email: String,
    pub note: Option<String>,
}

pub async fn settings_get(State(state): State<AppState>) -> ApiResult<SiteSettings> {
    Ok(ApiResponse::success(state.store.get_settings().await?))
}

pub async fn settings_put(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<SettingsUpdate>, JsonRejection>,
) -> ApiResult<SiteSettings> {
    let Json(update) = body?;
    Ok(ApiResponse::success(
        admin::update_settings(state.store.as_ref(), &user, update).await?,
    ))
}

pub async fn allowlist_list(State(state): State<AppState>) -> ApiResult<Vec<AllowListEntry>> {
    Ok(ApiResponse::success(state.store.list_allowlist().await?))
}

pub async fn allowlist_add(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<AddAllowList>, JsonRejection>,
) -> ApiResult<AllowListEntry> {
    let Json(body) = body?;
    let entry = admin::add_to_allowlist(state.store.as_ref(), &user, &body.email, body.note).await?;
    Ok(ApiResponse::created(entry))
}

pub async fn allowlist_remove(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(email): Path<String>,
) -> ApiResult<()> {
    admin::remove_from_allowlist(state.store.as_ref(), &user, &email).await?;
    Ok(ApiResponse::no_content())
}
