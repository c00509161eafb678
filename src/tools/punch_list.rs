use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce::{self, IdSet, MAX_NAME_LEN, MAX_NOTES_LEN};

pub const VERSION: u32 = 1;
pub const MAX_ITEMS: usize = 1_000;
pub const MAX_PHOTOS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Open,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchList {
    pub version: u32,
    pub items: Vec<PunchItem>,
}

impl Default for PunchList {
    fn default() -> Self {
        Self {
            version: VERSION,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub notes: String,
    pub photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

pub fn coerce(raw: &Value) -> PunchList {
    let obj = coerce::object(raw);
    let mut ids = IdSet::new();
    let items = coerce::array(obj, "items")
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|o| {
            let title = coerce::opt_text(o, "title", MAX_NAME_LEN)?;
            let status = match coerce::text(o, "status", 20).to_ascii_lowercase().as_str() {
                "in_progress" => ItemStatus::InProgress,
                "done" => ItemStatus::Done,
                _ => ItemStatus::Open,
            };
            let completed_at = match status {
                ItemStatus::Done => coerce::opt_date(o, "completed_at"),
                _ => None,
            };
            Some(PunchItem {
                id: ids.claim(o),
                title,
                location: coerce::opt_text(o, "location", MAX_NAME_LEN),
                status,
                assignee: coerce::opt_text(o, "assignee", MAX_NAME_LEN),
                notes: coerce::text(o, "notes", MAX_NOTES_LEN),
                photos: coerce::array(o, "photos")
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(coerce::http_url)
                    .take(MAX_PHOTOS)
                    .collect(),
                created_at: coerce::opt_date(o, "created_at"),
                completed_at,
            })
        })
        .take(MAX_ITEMS)
        .collect();

    PunchList {
        version: VERSION,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn untitled_items_are_dropped() {
        let out = coerce(&json!({"items": [{"title": "  "}, {"notes": "no title"}, {"title": "Caulk tub"}]}));
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].title, "Caulk tub");
        assert_eq!(out.items[0].status, ItemStatus::Open);
    }

    #[test]
    fn completion_time_only_survives_when_done() {
        let out = coerce(&json!({"items": [
            {"title": "Touch up paint", "status": "in_progress", "completed_at": "2024-05-01T00:00:00Z"},
            {"title": "Replace outlet", "status": "done", "completed_at": "2024-05-02T00:00:00Z"}
        ]}));
        assert_eq!(out.items[0].status, ItemStatus::InProgress);
        assert_eq!(out.items[0].completed_at, None);
        assert_eq!(out.items[1].completed_at.as_deref(), Some("2024-05-02T00:00:00Z"));
    }

    #[test]
    fn photos_must_be_http_urls() {
        let out = coerce(&json!({"items": [{"title": "Door", "photos": ["https://p.example.com/1.jpg", "file:///etc/passwd", 3]}]}));
        assert_eq!(out.items[0].photos, vec!["https://p.example.com/1.jpg"]);
    }
}
