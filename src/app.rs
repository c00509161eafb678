//! Shared request state and router assembly.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::identity::IdentityProvider;
use crate::config::AppConfig;
use crate::database::Store;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{authenticate, load_user, require_admin, require_staff};

/// Everything a handler needs, injected once at startup
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, identity: Arc<dyn IdentityProvider>, config: AppConfig) -> Self {
        Self {
            store,
            identity,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .merge(staff_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/google", post(public::auth::google_sign_in))
        .route("/api/share/:token", get(public::share::share_get))
        .route("/api/content", get(public::content::content_list))
        .route("/api/content/:slug", get(public::content::content_get))
        .route("/api/content/:slug/feedback", post(public::content::feedback_post))
        .route("/api/tags", get(public::content::tags_list))
        .route("/api/collections", get(public::content::collections_list))
        .route("/api/collections/:slug", get(public::content::collection_get))
        .route("/api/idea-packs", get(public::content::idea_packs_list))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(protected::auth::whoami))
        .route("/api/auth/refresh", post(protected::auth::refresh))
        // Projects
        .route(
            "/api/projects",
            get(protected::projects::projects_list).post(protected::projects::project_create),
        )
        .route(
            "/api/projects/current",
            get(protected::projects::current_get).put(protected::projects::current_put),
        )
        .route(
            "/api/projects/:id",
            get(protected::projects::project_get).patch(protected::projects::project_update),
        )
        // Members
        .route("/api/projects/:id/members", get(protected::members::members_list))
        .route(
            "/api/projects/:id/members/:user_id",
            put(protected::members::member_update).delete(protected::members::member_remove),
        )
        // Invites
        .route(
            "/api/projects/:id/invites",
            get(protected::invites::invites_list).post(protected::invites::invite_create),
        )
        .route("/api/projects/:id/invites/:invite_id", delete(protected::invites::invite_revoke))
        .route("/api/invites/accept", post(protected::invites::invite_accept))
        // Tools
        .route(
            "/api/tools/:tool",
            get(protected::tools::tool_get).put(protected::tools::tool_put),
        )
        .route("/api/idea-packs/:slug/import", post(protected::tools::idea_pack_import))
        // Share links
        .route(
            "/api/tools/:tool/shares",
            get(protected::shares::shares_list).post(protected::shares::share_create),
        )
        .route("/api/shares/:id", delete(protected::shares::share_revoke))
        .route_layer(from_fn_with_state(state.clone(), load_user))
        .route_layer(from_fn_with_state(state, authenticate))
}

fn staff_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/content",
            get(elevated::content::content_list).post(elevated::content::content_create),
        )
        .route(
            "/api/admin/content/:id",
            get(elevated::content::content_get)
                .put(elevated::content::content_update)
                .delete(elevated::content::content_delete),
        )
        .route(
            "/api/admin/tags",
            get(elevated::taxonomy::tags_list).post(elevated::taxonomy::tag_create),
        )
        .route("/api/admin/tags/:slug", delete(elevated::taxonomy::tag_delete))
        .route(
            "/api/admin/collections",
            get(elevated::taxonomy::collections_list).post(elevated::taxonomy::collection_create),
        )
        .route(
            "/api/admin/collections/:id",
            put(elevated::taxonomy::collection_update).delete(elevated::taxonomy::collection_delete),
        )
        .route(
            "/api/admin/idea-packs",
            get(elevated::taxonomy::idea_packs_list).post(elevated::taxonomy::idea_pack_create),
        )
        .route(
            "/api/admin/idea-packs/:id",
            put(elevated::taxonomy::idea_pack_update).delete(elevated::taxonomy::idea_pack_delete),
        )
        .route("/api/admin/feedback", get(elevated::feedback::dashboard))
        .route("/api/admin/export", get(elevated::transfer::export))
        .route("/api/admin/import", post(elevated::transfer::import))
        .route_layer(axum::middleware::from_fn(require_staff))
        .route_layer(from_fn_with_state(state.clone(), load_user))
        .route_layer(from_fn_with_state(state, authenticate))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/settings",
            get(elevated::settings::settings_get).put(elevated::settings::settings_put),
        )
        .route(
            "/api/admin/allowlist",
            get(elevated::settings::allowlist_list).post(elevated::settings::allowlist_add),
        )
        .route("/api/admin/allowlist/:email", delete(elevated::settings::allowlist_remove))
        .route("/api/admin/users", get(elevated::users::users_list))
        .route("/api/admin/users/:id/role", put(elevated::users::user_role_put))
        .route_layer(axum::middleware::from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), load_user))
        .route_layer(from_fn_with_state(state, authenticate))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Hawaii Home Central API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": "/api/auth/google (public), /api/auth/whoami, /api/auth/refresh",
                "projects": "/api/projects[/:id[/members|/invites]], /api/invites/accept",
                "tools": "/api/tools/:tool[/shares]",
                "share": "/api/share/:token (public)",
                "content": "/api/content, /api/tags, /api/collections, /api/idea-packs (public)",
                "admin": "/api/admin/* (staff or admin)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": state.store.backend_name(),
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "store": state.store.backend_name(),
                    }
                })),
            )
        }
    }
}
