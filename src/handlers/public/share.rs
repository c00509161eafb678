// handlers/public/share.rs - GET /api/share/:token handler

use axum::extract::{Path, State};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::shares::{self, PublicShare};

/// Redacted tool payload behind a share link
pub async fn share_get(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult<PublicShare> {
    let share = shares::view_share(&state, &token).await?;
    Ok(ApiResponse::success(share))
}
