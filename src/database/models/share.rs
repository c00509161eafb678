use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ToolKey;

/// What a public share link may reveal. Everything optional is hidden by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSettings {
    pub include_notes: bool,
    pub include_prices: bool,
    pub include_links: bool,
    pub include_comments: bool,
    pub include_assignees: bool,
    /// Board ids (mood boards) or room ids (finish decisions) to expose
    pub scope_ids: Option<Vec<String>>,
}

impl ShareSettings {
    pub fn in_scope(&self, id: &str) -> bool {
        match &self.scope_ids {
            Some(ids) => ids.iter().any(|s| s == id),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareToken {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    /// First characters of the raw token, for recognizing links in a list
    pub token_hint: String,
    pub project_id: Uuid,
    pub tool_key: ToolKey,
    pub settings: ShareSettings,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
}

impl ShareToken {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_default_to_private() {
        let settings: ShareSettings = serde_json::from_value(json!({"include_prices": true})).unwrap();
        assert!(settings.include_prices);
        assert!(!settings.include_notes);
        assert!(settings.in_scope("anything"));

        let scoped = ShareSettings {
            scope_ids: Some(vec!["kitchen".into()]),
            ..Default::default()
        };
        assert!(scoped.in_scope("kitchen"));
        assert!(!scoped.in_scope("lanai"));
    }
}
