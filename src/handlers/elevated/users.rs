// handlers/elevated/users.rs - User administration (admin only)
//
// GET /api/admin/users
// PUT /api/admin/users/:id/role

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::admin;
use crate::types::UserRole;

#[derive(Debug, Deserialize)]
pub struct SetRole {
    pub role: UserRole,
}

pub async fn users_list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(state.store.list_users().await?))
}

pub async fn user_role_put(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Result<Json<SetRole>, JsonRejection>,
) -> ApiResult<User> {
    let Json(body) = body?;
    Ok(ApiResponse::success(
        admin::set_role(state.store.as_ref(), &user, id, body.role).await?,
    ))
}
