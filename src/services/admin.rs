use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{AllowListEntry, SiteSettings, User};
use crate::database::Store;
use crate::error::ApiError;
use crate::types::{is_valid_email, normalize_email, UserRole};

const RECENT_COMMENTS: usize = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub maintenance_mode: Option<bool>,
    pub allowlist_enabled: Option<bool>,
}

pub async fn update_settings(
    store: &dyn Store,
    admin: &User,
    update: SettingsUpdate,
) -> Result<SiteSettings, ApiError> {
    let current = store.get_settings().await?;
    let next = SiteSettings {
        maintenance_mode: update.maintenance_mode.unwrap_or(current.maintenance_mode),
        allowlist_enabled: update.allowlist_enabled.unwrap_or(current.allowlist_enabled),
        updated_at: Some(Utc::now()),
    };
    let saved = store.save_settings(next).await?;
    info!(
        "Site settings changed by {}: maintenance={} allowlist={}",
        admin.email, saved.maintenance_mode, saved.allowlist_enabled
    );
    Ok(saved)
}

pub async fn add_to_allowlist(
    store: &dyn Store,
    admin: &User,
    email: &str,
    note: Option<String>,
) -> Result<AllowListEntry, ApiError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(ApiError::field("email", "must be a valid email address"));
    }
    let entry = store
        .add_allowlist(AllowListEntry {
            email,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            added_by: Some(admin.id),
            created_at: Utc::now(),
        })
        .await?;
    info!("{} added {} to the allowlist", admin.email, entry.email);
    Ok(entry)
}

pub async fn remove_from_allowlist(store: &dyn Store, admin: &User, email: &str) -> Result<(), ApiError> {
    let email = normalize_email(email);
    store.remove_allowlist(&email).await?;
    info!("{} removed {} from the allowlist", admin.email, email);
    Ok(())
}

/// Admins cannot change their own role, so the last admin cannot lock everyone out
pub async fn set_role(store: &dyn Store, admin: &User, user_id: Uuid, role: UserRole) -> Result<User, ApiError> {
    if user_id == admin.id && role != admin.role {
        return Err(ApiError::bad_request("You cannot change your own role"));
    }
    let target = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if target.role == role {
        return Ok(target);
    }
    let updated = store.set_user_role(user_id, role).await?;
    info!("{} changed role of {} from {} to {}", admin.email, updated.email, target.role, role);
    Ok(updated)
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentComment {
    pub comment: String,
    pub helpful: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackSummary {
    pub content_id: Uuid,
    pub slug: String,
    pub title: String,
    pub helpful: usize,
    pub not_helpful: usize,
    /// Share of helpful votes, 0.0 to 1.0
    pub score: f64,
    pub recent_comments: Vec<RecentComment>,
}

/// Feedback per content item, most voted first
pub async fn feedback_dashboard(store: &dyn Store) -> Result<Vec<FeedbackSummary>, ApiError> {
    let feedback = store.list_feedback(None).await?;
    let mut by_content: HashMap<Uuid, FeedbackSummary> = HashMap::new();

    // list_feedback is newest first, so the first comments seen are the recent ones
    for fb in feedback {
        if !by_content.contains_key(&fb.content_id) {
            let Some(content) = store.find_content(fb.content_id).await? else {
                continue;
            };
            by_content.insert(
                fb.content_id,
                FeedbackSummary {
                    content_id: content.id,
                    slug: content.slug,
                    title: content.title,
                    helpful: 0,
                    not_helpful: 0,
                    score: 0.0,
                    recent_comments: Vec::new(),
                },
            );
        }
        let Some(summary) = by_content.get_mut(&fb.content_id) else {
            continue;
        };
        if fb.helpful {
            summary.helpful += 1;
        } else {
            summary.not_helpful += 1;
        }
        if let Some(comment) = fb.comment {
            if summary.recent_comments.len() < RECENT_COMMENTS {
                summary.recent_comments.push(RecentComment {
                    comment,
                    helpful: fb.helpful,
                    created_at: fb.created_at,
                });
            }
        }
    }

    let mut out: Vec<FeedbackSummary> = by_content
        .into_values()
        .map(|mut s| {
            let total = s.helpful + s.not_helpful;
            s.score = if total == 0 { 0.0 } else { s.helpful as f64 / total as f64 };
            s
        })
        .collect();
    out.sort_by(|a, b| {
        (b.helpful + b.not_helpful)
            .cmp(&(a.helpful + a.not_helpful))
            .then_with(|| a.slug.cmp(&b.slug))
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewUser;
    use crate::database::store::{SettingsStore, UserStore};
    use crate::database::MemoryStore;
    use crate::services::content::{create_content, submit_feedback, ContentInput, FeedbackInput};
    use crate::types::{ContentKind, ContentStatus};

    async fn admin(store: &MemoryStore) -> User {
        store
            .upsert_user_on_sign_in(NewUser {
                email: "admin@example.com".into(),
                name: None,
                image: None,
                role: UserRole::Admin,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn admins_cannot_demote_themselves() {
        let store = MemoryStore::new();
        let me = admin(&store).await;
        let err = set_role(&store, &me, me.id, UserRole::User).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let other = store
            .upsert_user_on_sign_in(NewUser {
                email: "editor@example.com".into(),
                name: None,
                image: None,
                role: UserRole::User,
            })
            .await
            .unwrap();
        let promoted = set_role(&store, &me, other.id, UserRole::Editor).await.unwrap();
        assert_eq!(promoted.role, UserRole::Editor);
    }

    #[tokio::test]
    async fn settings_update_is_partial() {
        let store = MemoryStore::new();
        let me = admin(&store).await;
        update_settings(&store, &me, SettingsUpdate { maintenance_mode: Some(true), allowlist_enabled: None })
            .await
            .unwrap();
        let saved = update_settings(&store, &me, SettingsUpdate { maintenance_mode: None, allowlist_enabled: Some(true) })
            .await
            .unwrap();
        assert!(saved.maintenance_mode);
        assert!(saved.allowlist_enabled);
    }

    #[tokio::test]
    async fn allowlist_normalizes_emails() {
        let store = MemoryStore::new();
        let me = admin(&store).await;
        add_to_allowlist(&store, &me, " Kai@Example.com ", None).await.unwrap();
        assert!(store.is_allowlisted("kai@example.com").await.unwrap());
        assert_eq!(
            add_to_allowlist(&store, &me, "nope", None).await.unwrap_err().status_code(),
            400
        );
        remove_from_allowlist(&store, &me, "KAI@example.com").await.unwrap();
        assert!(!store.is_allowlisted("kai@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn dashboard_scores_and_sorts() {
        let store = MemoryStore::new();
        for title in ["Catchment tanks", "Ohia flooring"] {
            create_content(
                &store,
                Uuid::new_v4(),
                ContentInput {
                    slug: None,
                    kind: ContentKind::Guide,
                    title: title.into(),
                    summary: None,
                    body: String::new(),
                    status: Some(ContentStatus::Published),
                    tags: vec![],
                },
            )
            .await
            .unwrap();
        }
        for helpful in [true, true, false] {
            submit_feedback(&store, "ohia-flooring", None, FeedbackInput { helpful, comment: Some("ok".into()) })
                .await
                .unwrap();
        }
        submit_feedback(&store, "catchment-tanks", None, FeedbackInput { helpful: false, comment: None })
            .await
            .unwrap();

        let dashboard = feedback_dashboard(&store).await.unwrap();
        assert_eq!(dashboard[0].slug, "ohia-flooring");
        assert_eq!(dashboard[0].helpful, 2);
        assert!((dashboard[0].score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(dashboard[0].recent_comments.len(), 3);
        assert_eq!(dashboard[1].score, 0.0);
    }
}
