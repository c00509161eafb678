//! The one place that decides what a user may do inside a project.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{Project, ProjectMember};
use crate::database::Store;
use crate::error::ApiError;
use crate::types::{AccessLevel, MemberRole, ToolKey};

/// What a user can do with a project or one of its tools. Ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    None,
    View,
    Edit,
    Owner,
}

impl Capability {
    pub fn allows(self, required: Capability) -> bool {
        self >= required
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::None => "NONE",
            Capability::View => "VIEW",
            Capability::Edit => "EDIT",
            Capability::Owner => "OWNER",
        }
    }
}

/// Capability of a membership on the project (`tool` = None) or on one tool
pub fn capability(member: Option<&ProjectMember>, tool: Option<ToolKey>) -> Capability {
    let Some(member) = member else {
        return Capability::None;
    };
    match (member.role, tool) {
        (MemberRole::Owner, _) => Capability::Owner,
        (MemberRole::Member, None) => Capability::View,
        (MemberRole::Member, Some(tool)) => match member.tool_access.get(&tool) {
            Some(AccessLevel::Edit) => Capability::Edit,
            Some(AccessLevel::View) => Capability::View,
            None => Capability::None,
        },
    }
}

/// A granted request: the project, the caller's membership and what they may do
#[derive(Debug, Clone)]
pub struct Access {
    pub project: Project,
    pub member: ProjectMember,
    pub capability: Capability,
}

/// Missing projects and projects the user cannot see are indistinguishable (404).
/// Archived projects only admit VIEW.
pub fn check(
    project: Option<Project>,
    member: Option<ProjectMember>,
    tool: Option<ToolKey>,
    required: Capability,
) -> Result<Access, ApiError> {
    let not_found = || ApiError::not_found("Project not found");
    let project = project.ok_or_else(not_found)?;
    let granted = capability(member.as_ref(), tool);
    let member = match member {
        Some(m) if granted != Capability::None => m,
        _ => return Err(not_found()),
    };
    if !granted.allows(required) {
        return Err(ApiError::forbidden(format!(
            "{} access required",
            required.as_str().to_lowercase()
        )));
    }
    if !project.is_active() && required > Capability::View {
        return Err(ApiError::project_archived());
    }
    Ok(Access {
        project,
        member,
        capability: granted,
    })
}

pub async fn authorize(
    store: &dyn Store,
    user_id: Uuid,
    project_id: Uuid,
    tool: Option<ToolKey>,
    required: Capability,
) -> Result<Access, ApiError> {
    let project = store.find_project(project_id).await?;
    let member = match &project {
        Some(_) => store.find_member(project_id, user_id).await?,
        None => None,
    };
    let result = check(project, member, tool, required);
    if let Err(e) = &result {
        tracing::warn!(
            "Access denied: user {} project {} tool {:?} requires {}: {}",
            user_id,
            project_id,
            tool,
            required.as_str(),
            e
        );
    }
    result
}
