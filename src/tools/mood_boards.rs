use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::coerce::{self, IdSet, MAX_NAME_LEN, MAX_NOTES_LEN};

pub const VERSION: u32 = 1;
pub const MAX_BOARDS: usize = 50;
pub const MAX_IDEAS: usize = 500;
pub const MAX_IMAGES: usize = 20;
pub const MAX_COMMENTS: usize = 200;
pub const MAX_TAGS: usize = 20;
pub const MAX_REACTIONS: usize = 200;
const MAX_COMMENT_LEN: usize = 2_000;
const MAX_EMOJI_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodBoards {
    pub version: u32,
    pub boards: Vec<Board>,
}

impl Default for MoodBoards {
    fn default() -> Self {
        Self {
            version: VERSION,
            boards: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    pub ideas: Vec<Idea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    pub name: String,
    pub notes: String,
    pub images: Vec<IdeaImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub tags: Vec<String>,
    pub reactions: Vec<Reaction>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

pub fn coerce(raw: &Value) -> MoodBoards {
    let obj = coerce::object(raw);
    let mut ids = IdSet::new();
    let boards = coerce::array(obj, "boards")
        .iter()
        .filter_map(Value::as_object)
        .take(MAX_BOARDS)
        .map(|b| coerce_board(b, &mut ids))
        .collect();

    MoodBoards {
        version: VERSION,
        boards,
    }
}

fn coerce_board(obj: &Map<String, Value>, ids: &mut IdSet) -> Board {
    let name = coerce::opt_text(obj, "name", MAX_NAME_LEN).unwrap_or_else(|| "Untitled board".to_string());
    Board {
        id: ids.claim(obj),
        name,
        ideas: coerce_ideas(coerce::array(obj, "ideas"), MAX_IDEAS),
    }
}

/// Idea list as stored on a board or in an idea pack
pub fn coerce_ideas(raw: &[Value], limit: usize) -> Vec<Idea> {
    let mut ids = IdSet::new();
    raw.iter()
        .filter_map(Value::as_object)
        .take(limit)
        .map(|i| coerce_idea(i, &mut ids))
        .collect()
}

fn coerce_idea(obj: &Map<String, Value>, ids: &mut IdSet) -> Idea {
    Idea {
        id: ids.claim(obj),
        name: coerce::text(obj, "name", MAX_NAME_LEN),
        notes: coerce::text(obj, "notes", MAX_NOTES_LEN),
        images: coerce_images(coerce::array(obj, "images")),
        source_url: coerce::opt_url(obj, "source_url"),
        tags: coerce::string_list(obj, "tags", 40, MAX_TAGS),
        reactions: coerce_reactions(coerce::array(obj, "reactions")),
        comments: coerce_comments(coerce::array(obj, "comments")),
    }
}

fn coerce_images(raw: &[Value]) -> Vec<IdeaImage> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(IdeaImage {
                url: coerce::http_url(s)?,
                label: None,
            }),
            Value::Object(o) => Some(IdeaImage {
                url: coerce::opt_url(o, "url")?,
                label: coerce::opt_text(o, "label", MAX_NAME_LEN),
            }),
            _ => None,
        })
        .filter(|img| seen.insert(img.url.clone()))
        .take(MAX_IMAGES)
        .collect()
}

fn coerce_reactions(raw: &[Value]) -> Vec<Reaction> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(Value::as_object)
        .filter_map(|o| {
            let user_id = coerce::opt_text(o, "user_id", coerce::MAX_ID_LEN)?;
            let emoji = coerce::opt_text(o, "emoji", MAX_EMOJI_LEN)?;
            Some(Reaction { user_id, emoji })
        })
        .filter(|r| seen.insert((r.user_id.clone(), r.emoji.clone())))
        .take(MAX_REACTIONS)
        .collect()
}

fn coerce_comments(raw: &[Value]) -> Vec<Comment> {
    let mut ids = IdSet::new();
    raw.iter()
        .filter_map(Value::as_object)
        .filter_map(|o| {
            let body = coerce::opt_text(o, "body", MAX_COMMENT_LEN)?;
            Some(Comment {
                id: ids.claim(o),
                author_id: coerce::opt_text(o, "author_id", coerce::MAX_ID_LEN),
                author_name: coerce::opt_text(o, "author_name", MAX_NAME_LEN),
                body,
                created_at: coerce::opt_date(o, "created_at"),
            })
        })
        .take(MAX_COMMENTS)
        .collect()
}

/// Result of pulling an idea pack into a payload
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub payload: MoodBoards,
    pub board_id: Option<String>,
    pub imported: usize,
}

/// Append `ideas` (already coerced) to the board `board_id`, or to a board named `title`,
/// creating that board when missing. Every imported idea gets a fresh id.
pub fn import_ideas(
    raw_payload: &Value,
    title: &str,
    ideas: &[Idea],
    board_id: Option<&str>,
) -> ImportOutcome {
    let mut payload = coerce(raw_payload);
    let title = coerce::clamp(title, MAX_NAME_LEN);

    let existing = match board_id {
        Some(id) => payload.boards.iter().position(|b| b.id == id),
        None => payload
            .boards
            .iter()
            .position(|b| b.name.eq_ignore_ascii_case(&title)),
    };

    let index = match existing {
        Some(i) => i,
        None if payload.boards.len() >= MAX_BOARDS => {
            return ImportOutcome {
                payload,
                board_id: None,
                imported: 0,
            };
        }
        None => {
            let mut board_ids = IdSet::new();
            for b in &payload.boards {
                board_ids.claim_str(&b.id);
            }
            payload.boards.push(Board {
                id: board_ids.fresh(),
                name: if title.is_empty() { "Imported ideas".to_string() } else { title },
                ideas: Vec::new(),
            });
            payload.boards.len() - 1
        }
    };

    let board = &mut payload.boards[index];
    let room = MAX_IDEAS.saturating_sub(board.ideas.len());
    let mut imported = 0;
    for idea in ideas.iter().take(room) {
        board.ideas.push(Idea {
            id: uuid::Uuid::new_v4().to_string(),
            reactions: Vec::new(),
            comments: Vec::new(),
            ..idea.clone()
        });
        imported += 1;
    }
    let board_id = Some(board.id.clone());

    ImportOutcome {
        payload,
        board_id,
        imported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn garbage_becomes_empty_payload() {
        assert_eq!(coerce(&json!("nope")), MoodBoards::default());
        assert_eq!(coerce(&json!({"boards": "x"})).boards.len(), 0);
    }

    #[test]
    fn boards_and_ideas_are_cleaned() {
        let raw = json!({
            "version": 7,
            "boards": [
                {"id": "b1", "name": "  Lanai  ", "ideas": [
                    {"id": "i1", "name": "Koa bench", "images": [
                        "https://img.example.com/koa.jpg",
                        {"url": "javascript:alert(1)"},
                        {"url": "https://img.example.com/koa.jpg", "label": "dup"}
                    ],
                    "source_url": "not a url",
                    "tags": ["wood", "Wood"],
                    "reactions": [{"user_id": "u1", "emoji": "🌺"}, {"user_id": "u1", "emoji": "🌺"}],
                    "comments": [{"body": "  love it "}, {"body": ""}],
                    "secret": "dropped"}
                ]},
                {"id": "b1"},
                42
            ]
        });
        let out = coerce(&raw);
        assert_eq!(out.version, VERSION);
        assert_eq!(out.boards.len(), 2);
        assert_eq!(out.boards[0].name, "Lanai");
        assert_ne!(out.boards[1].id, "b1");
        assert_eq!(out.boards[1].name, "Untitled board");

        let idea = &out.boards[0].ideas[0];
        assert_eq!(idea.images.len(), 1);
        assert_eq!(idea.source_url, None);
        assert_eq!(idea.tags, vec!["wood"]);
        assert_eq!(idea.reactions.len(), 1);
        assert_eq!(idea.comments.len(), 1);
        assert_eq!(idea.comments[0].body, "love it");

        let value = serde_json::to_value(&out).unwrap();
        assert!(value["boards"][0]["ideas"][0].get("secret").is_none());
    }

    #[test]
    fn board_limit_applies() {
        let boards: Vec<Value> = (0..MAX_BOARDS + 5).map(|i| json!({"name": format!("b{}", i)})).collect();
        assert_eq!(coerce(&json!({"boards": boards})).boards.len(), MAX_BOARDS);
    }

    #[test]
    fn import_creates_board_named_after_pack() {
        let ideas = coerce_ideas(&[json!({"id": "x", "name": "Lava rock wall"})], MAX_IDEAS);
        let outcome = import_ideas(&json!({}), "Coastal Modern", &ideas, None);
        assert_eq!(outcome.imported, 1);
        assert_eq!(outcome.payload.boards.len(), 1);
        assert_eq!(outcome.payload.boards[0].name, "Coastal Modern");
        assert_ne!(outcome.payload.boards[0].ideas[0].id, "x");

        // Importing again lands on the same board
        let again = import_ideas(
            &serde_json::to_value(&outcome.payload).unwrap(),
            "coastal modern",
            &ideas,
            None,
        );
        assert_eq!(again.payload.boards.len(), 1);
        assert_eq!(again.payload.boards[0].ideas.len(), 2);
    }

    #[test]
    fn import_into_specific_board() {
        let raw = json!({"boards": [{"id": "kitchen", "name": "Kitchen", "ideas": []}]});
        let ideas = coerce_ideas(&[json!({"name": "Open shelving"})], MAX_IDEAS);
        let outcome = import_ideas(&raw, "Pack", &ideas, Some("kitchen"));
        assert_eq!(outcome.board_id.as_deref(), Some("kitchen"));
        assert_eq!(outcome.payload.boards[0].ideas.len(), 1);
    }
}
