use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ToolKey;

/// Stored state of one tool inside one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInstance {
    pub project_id: Uuid,
    pub tool_key: ToolKey,
    pub payload: serde_json::Value,
    /// Starts at 1 and increments on every save
    pub revision: i64,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}
