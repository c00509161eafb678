// handlers/public/auth.rs - POST /api/auth/google handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::sign_in::{self, Session};

#[derive(Debug, Deserialize)]
pub struct GoogleSignIn {
    pub id_token: String,
}

/// Exchange a Google ID token for a session token
pub async fn google_sign_in(
    State(state): State<AppState>,
    body: Result<Json<GoogleSignIn>, JsonRejection>,
) -> ApiResult<Session> {
    let Json(body) = body?;
    if body.id_token.trim().is_empty() {
        return Err(ApiError::field("id_token", "is required"));
    }
    let session = sign_in::sign_in(&state, body.id_token.trim()).await?;
    Ok(ApiResponse::success(session))
}
