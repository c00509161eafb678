use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::types::{AccessLevel, MemberRole, ProjectStatus, ToolKey};

/// Per-tool grants of a member. Owners carry an empty map and bypass it.
pub type ToolAccess = BTreeMap<ToolKey, AccessLevel>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    #[serde(with = "tool_access_serde")]
    pub tool_access: ToolAccess,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInvite {
    pub id: Uuid,
    pub project_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    #[serde(with = "tool_access_serde")]
    pub tool_access: ToolAccess,
    pub invited_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<Uuid>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ProjectInvite {
    /// Pending means neither accepted, revoked nor expired
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.accepted_at.is_none() && self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Tool access maps travel as `{"mood_boards": "EDIT"}`. Unknown tool keys are ignored on read.
pub mod tool_access_serde {
    use super::ToolAccess;
    use crate::types::{AccessLevel, ToolKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(access: &ToolAccess, serializer: S) -> Result<S::Ok, S::Error> {
        access
            .iter()
            .map(|(tool, level)| (tool.as_str(), *level))
            .collect::<BTreeMap<&str, AccessLevel>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ToolAccess, D::Error> {
        let raw = BTreeMap::<String, AccessLevel>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(k, v)| k.parse::<ToolKey>().ok().map(|tool| (tool, v)))
            .collect())
    }

    /// Same conversion for values already held as JSON (database columns)
    pub fn from_value(value: &serde_json::Value) -> ToolAccess {
        let Some(obj) = value.as_object() else {
            return ToolAccess::new();
        };
        obj.iter()
            .filter_map(|(k, v)| {
                let tool = k.parse::<ToolKey>().ok()?;
                let level = v.as_str()?.parse::<AccessLevel>().ok()?;
                Some((tool, level))
            })
            .collect()
    }

    pub fn to_value(access: &ToolAccess) -> serde_json::Value {
        serde_json::Value::Object(
            access
                .iter()
                .map(|(tool, level)| (tool.as_str().to_string(), serde_json::Value::from(level.as_str())))
                .collect(),
        )
    }
}
