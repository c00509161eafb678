use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::services::access::{self, Access, Capability};
use crate::services::projects::ProjectService;
use crate::tools::{self, mood_boards};
use crate::types::ToolKey;

/// Tool state as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct ToolView {
    pub project_id: Uuid,
    pub tool: ToolKey,
    pub capability: Capability,
    pub revision: i64,
    pub updated_at: Option<DateTime<Utc>>,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    #[serde(flatten)]
    pub view: ToolView,
    pub board_id: Option<String>,
    pub imported: usize,
}

pub async fn get_tool(
    state: &AppState,
    user: &User,
    tool: ToolKey,
    project_id: Option<Uuid>,
) -> Result<ToolView, ApiError> {
    let project_id = ProjectService::new(state).resolve_project_id(user, project_id).await?;
    let access = access::authorize(state.store.as_ref(), user.id, project_id, Some(tool), Capability::View).await?;
    current_view(state, &access, tool).await
}

/// Coerce and store a payload. A stale `base_revision` is rejected with the server's state.
pub async fn put_tool(
    state: &AppState,
    user: &User,
    tool: ToolKey,
    project_id: Option<Uuid>,
    payload: &Value,
    base_revision: Option<i64>,
) -> Result<ToolView, ApiError> {
    let project_id = ProjectService::new(state).resolve_project_id(user, project_id).await?;
    let access = access::authorize(state.store.as_ref(), user.id, project_id, Some(tool), Capability::Edit).await?;

    let coerced = tools::validate_and_coerce(tool, payload);
    if &coerced != payload {
        debug!("Coerced {} payload for project {}", tool.as_str(), project_id);
    }

    match state
        .store
        .save_tool(project_id, tool, coerced, user.id, base_revision)
        .await
    {
        Ok(saved) => Ok(ToolView {
            project_id,
            tool,
            capability: access.capability,
            revision: saved.revision,
            updated_at: Some(saved.updated_at),
            payload: saved.payload,
        }),
        Err(DatabaseError::Conflict(_)) => {
            let current = current_view(state, &access, tool).await?;
            info!(
                "Revision conflict on {} in project {}: base {:?}, current {}",
                tool.as_str(),
                project_id,
                base_revision,
                current.revision
            );
            let data = serde_json::to_value(&current)
                .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
            Err(ApiError::rule(
                StatusCode::CONFLICT,
                "REVISION_CONFLICT",
                "The tool was changed by someone else",
            )
            .with_data(data))
        }
        Err(e) => Err(e.into()),
    }
}

/// Pull a published idea pack into the caller's mood boards
pub async fn import_idea_pack(
    state: &AppState,
    user: &User,
    slug: &str,
    project_id: Option<Uuid>,
    board_id: Option<&str>,
) -> Result<ImportResult, ApiError> {
    let pack = state
        .store
        .find_idea_pack_by_slug(slug)
        .await?
        .filter(|p| p.published)
        .ok_or_else(|| ApiError::not_found("Idea pack not found"))?;

    let tool = ToolKey::MoodBoards;
    let project_id = ProjectService::new(state).resolve_project_id(user, project_id).await?;
    let access = access::authorize(state.store.as_ref(), user.id, project_id, Some(tool), Capability::Edit).await?;

    let existing = state.store.find_tool(project_id, tool).await?;
    let (raw, revision) = match &existing {
        Some(instance) => (instance.payload.clone(), instance.revision),
        None => (Value::Null, 0),
    };

    let ideas = mood_boards::coerce_ideas(pack.ideas.as_array().map(Vec::as_slice).unwrap_or(&[]), mood_boards::MAX_IDEAS);
    let outcome = mood_boards::import_ideas(&raw, &pack.title, &ideas, board_id);
    let payload = serde_json::to_value(&outcome.payload)
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;

    let saved = state
        .store
        .save_tool(project_id, tool, payload, user.id, Some(revision))
        .await?;
    info!(
        "Imported {} ideas from pack '{}' into project {}",
        outcome.imported, pack.slug, project_id
    );

    Ok(ImportResult {
        view: ToolView {
            project_id,
            tool,
            capability: access.capability,
            revision: saved.revision,
            updated_at: Some(saved.updated_at),
            payload: saved.payload,
        },
        board_id: outcome.board_id,
        imported: outcome.imported,
    })
}

async fn current_view(state: &AppState, access: &Access, tool: ToolKey) -> Result<ToolView, ApiError> {
    let project_id = access.project.id;
    let view = match state.store.find_tool(project_id, tool).await? {
        Some(instance) => ToolView {
            project_id,
            tool,
            capability: access.capability,
            revision: instance.revision,
            updated_at: Some(instance.updated_at),
            // Older rows may predate the current payload version
            payload: tools::validate_and_coerce(tool, &instance.payload),
        },
        None => ToolView {
            project_id,
            tool,
            capability: access.capability,
            revision: 0,
            updated_at: None,
            payload: tools::empty_payload(tool),
        },
    };
    Ok(view)
}
