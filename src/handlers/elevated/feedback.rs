// handlers/elevated/feedback.rs - GET /api/admin/feedback handler

use axum::extract::State;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::admin::{self, FeedbackSummary};

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Vec<FeedbackSummary>> {
    Ok(ApiResponse::success(admin::feedback_dashboard(state.store.as_ref()).await?))
}
