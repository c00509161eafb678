use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::database::models::User;
use crate::error::ApiError;

use super::auth::AuthUser;

/// The stored user behind the session token
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Stored role, or ADMIN for configured admin emails
    pub fn is_admin(&self, state: &AppState) -> bool {
        self.0.role.is_admin() || state.config.is_admin_email(&self.0.email)
    }
}

/// Loads the user named by the token. Users deleted since sign-in are rejected, and
/// maintenance mode locks out everyone but admins.
pub async fn load_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let user = state
        .store
        .find_user(auth_user.user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Session for unknown user {}", auth_user.user_id);
            ApiError::unauthorized("User no longer exists")
        })?;

    let current = CurrentUser(user);
    if !current.is_admin(&state) {
        let settings = state.store.get_settings().await?;
        if settings.maintenance_mode {
            return Err(ApiError::maintenance());
        }
    }

    tracing::debug!("Request by {} ({})", current.0.email, current.0.role);
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}
