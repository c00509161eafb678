use serde::Serialize;
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::gate::{self, GateDecision, GateInput};
use crate::auth::{issue_token, IssuedToken};
use crate::database::models::{NewUser, User};
use crate::error::ApiError;
use crate::types::UserRole;

#[derive(Debug, Serialize)]
pub struct Session {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: User,
}

/// Verify a Google ID token, run the sign-in gate and open a session
pub async fn sign_in(state: &AppState, id_token: &str) -> Result<Session, ApiError> {
    let identity = state.identity.verify(id_token).await?;
    let email = identity.email.clone();

    let is_admin_email = state.config.is_admin_email(&email);
    let existing = state.store.find_user_by_email(&email).await?;
    let settings = state.store.get_settings().await?;
    let allowlisted = if settings.allowlist_enabled {
        state.store.is_allowlisted(&email).await?
    } else {
        false
    };

    let decision = gate::evaluate(GateInput {
        is_admin_email,
        existing_role: existing.as_ref().map(|u| u.role),
        settings: &settings,
        allowlisted,
    });
    match decision {
        GateDecision::Allow => {}
        GateDecision::Maintenance => {
            warn!("Sign-in refused for {}: maintenance mode", email);
            return Err(ApiError::maintenance());
        }
        GateDecision::NotAllowlisted => {
            warn!("Sign-in refused for {}: not on allowlist", email);
            return Err(ApiError::not_allowlisted());
        }
    }

    let mut user = state
        .store
        .upsert_user_on_sign_in(NewUser {
            email: email.clone(),
            name: identity.name,
            image: identity.picture,
            role: if is_admin_email { UserRole::Admin } else { UserRole::User },
        })
        .await?;

    // Emails added to the admin list after the account existed
    if is_admin_email && !user.role.is_admin() {
        user = state.store.set_user_role(user.id, UserRole::Admin).await?;
        info!("Promoted configured admin {}", email);
    }

    let token = issue_token(&user, &state.config.security)?;
    info!("Signed in {} as {}", user.email, user.role);
    Ok(Session { token, user })
}

/// New token for an already loaded user; the role comes from storage
pub fn refresh(state: &AppState, user: User) -> Result<Session, ApiError> {
    let token = issue_token(&user, &state.config.security)?;
    Ok(Session { token, user })
}
