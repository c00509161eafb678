use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    pub maintenance_mode: bool,
    pub allowlist_enabled: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            maintenance_mode: false,
            allowlist_enabled: false,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowListEntry {
    pub email: String,
    pub note: Option<String>,
    pub added_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
