// handlers/protected/projects.rs - Project endpoints
//
// GET   /api/projects
// POST  /api/projects
// GET   /api/projects/current
// PUT   /api/projects/current
// GET   /api/projects/:id
// PATCH /api/projects/:id

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::projects::{ProjectService, ProjectView};
use crate::types::ProjectStatus;

#[derive(Debug, Deserialize)]
pub struct CreateProject {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SetCurrent {
    pub project_id: Uuid,
}

pub async fn projects_list(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<ProjectView>> {
    let service = ProjectService::new(&state);
    // A first-time user gets their default project here
    let current = service.resolve_current(&user).await?;
    let user = User {
        current_project_id: Some(current.id),
        ..user
    };
    Ok(ApiResponse::success(service.list(&user).await?))
}

pub async fn project_create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<CreateProject>, JsonRejection>,
) -> ApiResult<ProjectView> {
    let Json(body) = body?;
    let view = ProjectService::new(&state).create(&user, &body.name).await?;
    Ok(ApiResponse::created(view))
}

pub async fn current_get(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<ProjectView> {
    Ok(ApiResponse::success(ProjectService::new(&state).current_view(&user).await?))
}

pub async fn current_put(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<SetCurrent>, JsonRejection>,
) -> ApiResult<ProjectView> {
    let Json(body) = body?;
    let view = ProjectService::new(&state).set_current(&user, body.project_id).await?;
    Ok(ApiResponse::success(view))
}

pub async fn project_get(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProjectView> {
    Ok(ApiResponse::success(ProjectService::new(&state).get(&user, id).await?))
}

pub async fn project_update(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateProject>, JsonRejection>,
) -> ApiResult<ProjectView> {
    let Json(body) = body?;
    let view = ProjectService::new(&state)
        .update(&user, id, body.name, body.status)
        .await?;
    Ok(ApiResponse::success(view))
}
