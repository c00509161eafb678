use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::tokens;
use crate::database::models::{ShareSettings, ShareToken, User};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::services::access::{self, Capability};
use crate::services::projects::ProjectService;
use crate::share;
use crate::tools;
use crate::types::{MemberRole, ToolKey};

/// Returned once on creation
#[derive(Debug, Serialize)]
pub struct CreatedShare {
    pub id: Uuid,
    pub token: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub settings: ShareSettings,
}

#[derive(Debug, Serialize)]
pub struct ShareListing {
    #[serde(flatten)]
    pub share: ShareToken,
    pub active: bool,
}

/// What an anonymous visitor of a share link receives
#[derive(Debug, Serialize)]
pub struct PublicShare {
    pub tool: ToolKey,
    pub project_name: String,
    pub payload: Value,
    pub expires_at: DateTime<Utc>,
    pub settings: ShareSettings,
}

pub async fn create_share(
    state: &AppState,
    user: &User,
    tool: ToolKey,
    project_id: Option<Uuid>,
    settings: ShareSettings,
    expires_in_days: Option<i64>,
) -> Result<CreatedShare, ApiError> {
    let config = &state.config.share;
    let days = expires_in_days.unwrap_or(config.default_expiry_days);
    if days < 1 || days > config.max_expiry_days {
        return Err(ApiError::field(
            "expires_in_days",
            format!("must be between 1 and {}", config.max_expiry_days),
        ));
    }

    let project_id = ProjectService::new(state).resolve_project_id(user, project_id).await?;
    access::authorize(state.store.as_ref(), user.id, project_id, Some(tool), Capability::Edit).await?;

    let now = Utc::now();
    let settings = ShareSettings {
        scope_ids: settings.scope_ids.map(|ids| {
            let mut seen = HashSet::new();
            ids.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && seen.insert(s.clone()))
                .collect()
        }),
        ..settings
    };

    let token = tokens::generate_token();
    let share = state
        .store
        .insert_share(
            ShareToken {
                id: Uuid::new_v4(),
                token_hash: tokens::hash_token(&token),
                token_hint: tokens::token_hint(&token),
                project_id,
                tool_key: tool,
                settings,
                created_by: user.id,
                created_at: now,
                expires_at: now + Duration::days(days),
                revoked_at: None,
                view_count: 0,
                last_viewed_at: None,
            },
            config.max_active_per_tool,
        )
        .await
        .map_err(|e| match e {
            DatabaseError::LimitReached(max) => ApiError::rule(
                StatusCode::CONFLICT,
                "SHARE_LIMIT",
                format!("At most {} active share links per tool; revoke one first", max),
            ),
            other => other.into(),
        })?;

    info!(
        "Share link {} for {} in project {} created by {}, expires {}",
        share.id,
        tool.as_str(),
        project_id,
        user.email,
        share.expires_at
    );
    let url = format!("{}/share/{}", state.config.api.public_base_url, token);
    Ok(CreatedShare {
        id: share.id,
        token,
        url,
        expires_at: share.expires_at,
        settings: share.settings,
    })
}

pub async fn list_shares(
    state: &AppState,
    user: &User,
    tool: ToolKey,
    project_id: Option<Uuid>,
) -> Result<Vec<ShareListing>, ApiError> {
    let project_id = ProjectService::new(state).resolve_project_id(user, project_id).await?;
    access::authorize(state.store.as_ref(), user.id, project_id, Some(tool), Capability::View).await?;
    let now = Utc::now();
    Ok(state
        .store
        .list_shares(project_id, tool)
        .await?
        .into_iter()
        .map(|share| ShareListing {
            active: share.is_active(now),
            share,
        })
        .collect())
}

/// The project owner or the link's creator, while still a member
pub async fn revoke_share(state: &AppState, user: &User, share_id: Uuid) -> Result<(), ApiError> {
    let not_found = || ApiError::not_found("Share link not found");
    let share = state.store.find_share(share_id).await?.ok_or_else(not_found)?;
    let member = state
        .store
        .find_member(share.project_id, user.id)
        .await?
        .ok_or_else(not_found)?;

    if member.role != MemberRole::Owner && share.created_by != user.id {
        warn!("{} tried to revoke share link {} they do not own", user.email, share_id);
        return Err(ApiError::forbidden("Only the project owner or the link's creator can revoke it"));
    }
    if share.revoked_at.is_none() {
        state.store.revoke_share(share.id, Utc::now()).await?;
        info!("Share link {} revoked by {}", share.id, user.email);
    }
    Ok(())
}

/// Anonymous read. Every failure looks the same to the caller.
pub async fn view_share(state: &AppState, token: &str) -> Result<PublicShare, ApiError> {
    let not_found = || ApiError::not_found("Share link not found");
    if !tokens::is_well_formed(token) {
        return Err(not_found());
    }

    let now = Utc::now();
    let share = state
        .store
        .find_share_by_hash(&tokens::hash_token(token))
        .await?
        .filter(|s| s.is_active(now))
        .ok_or_else(not_found)?;
    let project = state
        .store
        .find_project(share.project_id)
        .await?
        .filter(|p| p.is_active())
        .ok_or_else(not_found)?;

    let stored = match state.store.find_tool(project.id, share.tool_key).await? {
        Some(instance) => instance.payload,
        None => tools::empty_payload(share.tool_key),
    };
    let payload = share::redact(share.tool_key, &stored, &share.settings);

    state.store.record_share_view(share.id, now).await?;

    Ok(PublicShare {
        tool: share.tool_key,
        project_name: project.name,
        payload,
        expires_at: share.expires_at,
        settings: share.settings,
    })
}
