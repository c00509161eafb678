// handlers/protected/mod.rs - Protected handlers (session JWT required)
//
// Middleware: authenticate → load_user. Handlers receive the stored user as
// `Extension<CurrentUser>`; project and tool permissions are checked in services.

pub mod auth;
pub mod invites;
pub mod members;
pub mod projects;
pub mod shares;
pub mod tools;

use serde::Deserialize;
use uuid::Uuid;

/// `?project_id=` on tool routes; defaults to the current project
#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub project_id: Option<Uuid>,
}

/// Unknown tool keys read as a missing route
pub fn parse_tool(raw: &str) -> Result<crate::types::ToolKey, crate::error::ApiError> {
    raw.parse()
        .map_err(|_| crate::error::ApiError::not_found(format!("Unknown tool '{}'", raw)))
}
