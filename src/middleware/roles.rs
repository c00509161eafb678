use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;

use super::validate_user::CurrentUser;

fn current(request: &Request) -> Result<&CurrentUser, ApiError> {
    request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// EDITOR or ADMIN
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = current(&request)?;
    if !user.0.role.is_staff() {
        tracing::warn!("Staff route refused for {}", user.0.email);
        return Err(ApiError::forbidden("Editor access required"));
    }
    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = current(&request)?;
    if !user.0.role.is_admin() {
        tracing::warn!("Admin route refused for {}", user.0.email);
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(next.run(request).await)
}
