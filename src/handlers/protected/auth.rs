// handlers/protected/auth.rs - Session endpoints
//
// GET  /api/auth/whoami
// POST /api/auth/refresh

use axum::extract::{Extension, State};
use serde::Serialize;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::sign_in::{self, Session};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    #[serde(flatten)]
    pub user: User,
    pub is_admin: bool,
    pub is_staff: bool,
}

pub async fn whoami(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<WhoAmI> {
    let is_admin = current.is_admin(&state);
    let CurrentUser(user) = current;
    Ok(ApiResponse::success(WhoAmI {
        is_staff: is_admin || user.role.is_staff(),
        is_admin,
        user,
    }))
}

/// Fresh token; role and email come from the store, not the old token
pub async fn refresh(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Session> {
    Ok(ApiResponse::success(sign_in::refresh(&state, user)?))
}
