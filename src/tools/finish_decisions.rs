//! Finish-decision tracker payloads and their migration chain.
//!
//! Stored payloads may be any of three versions. Each older version has its own typed
//! struct and a pure step to the next one; everything is read as v3 in the end.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::coerce::{self, IdSet, MAX_NAME_LEN, MAX_NOTES_LEN};
use crate::slug::slugify;

pub const VERSION: u32 = 3;
pub const MAX_ROOMS: usize = 50;
pub const MAX_DECISIONS: usize = 200;
pub const MAX_OPTIONS: usize = 30;
pub const MAX_LINKS: usize = 20;
pub const MAX_IMAGES: usize = 20;

const DEFAULT_ROOM: &str = "General";
const DEFAULT_ROOM_TYPE: &str = "other";
const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".avif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Deciding,
    Shortlist,
    Selected,
    Ordered,
    Done,
}

impl DecisionStatus {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "shortlist" => DecisionStatus::Shortlist,
            "selected" => DecisionStatus::Selected,
            "ordered" => DecisionStatus::Ordered,
            "done" => DecisionStatus::Done,
            _ => DecisionStatus::Deciding,
        }
    }
}

// ---- v3 (current) ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishDecisions {
    pub version: u32,
    pub rooms: Vec<Room>,
}

impl Default for FinishDecisions {
    fn default() -> Self {
        Self {
            version: VERSION,
            rooms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub room_type: String,
    pub decisions: Vec<Decision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub title: String,
    pub status: DecisionStatus,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub options: Vec<DecisionOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub id: String,
    pub name: String,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub links: Vec<Link>,
    pub images: Vec<String>,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// ---- v2 ----

#[derive(Debug, Clone, PartialEq)]
pub struct V2 {
    pub rooms: Vec<V2Room>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct V2Room {
    pub id: String,
    pub name: String,
    pub room_type: String,
    pub decisions: Vec<V2Decision>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct V2Decision {
    pub id: String,
    pub title: String,
    pub status: DecisionStatus,
    pub notes: String,
    pub options: Vec<V2Option>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct V2Option {
    pub id: String,
    pub name: String,
    pub notes: String,
    pub urls: Vec<String>,
    pub is_selected: bool,
}

// ---- v1 ----

#[derive(Debug, Clone, PartialEq)]
pub struct V1 {
    pub decisions: Vec<V1Decision>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V1Status {
    Todo,
    Deciding,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct V1Decision {
    pub id: String,
    pub room: String,
    pub title: String,
    pub selection: Option<String>,
    pub status: V1Status,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedVersion {
    V1,
    V2,
    V3,
}

pub fn detect_version(raw: &Value) -> DetectedVersion {
    let obj = coerce::object(raw);
    match obj.get("version").and_then(Value::as_u64) {
        Some(v) if v >= 3 => DetectedVersion::V3,
        Some(2) => DetectedVersion::V2,
        _ if obj.get("rooms").map_or(false, Value::is_array) => DetectedVersion::V2,
        _ => DetectedVersion::V1,
    }
}

/// Any stored version in, a clean v3 payload out
pub fn coerce(raw: &Value) -> FinishDecisions {
    match detect_version(raw) {
        DetectedVersion::V1 => normalize(migrate_v2_to_v3(migrate_v1_to_v2(parse_v1(raw)))),
        DetectedVersion::V2 => normalize(migrate_v2_to_v3(parse_v2(raw))),
        DetectedVersion::V3 => normalize(parse_v3(raw)),
    }
}

pub fn parse_v1(raw: &Value) -> V1 {
    let obj = coerce::object(raw);
    let mut ids = IdSet::new();
    let decisions = coerce::array(obj, "decisions")
        .iter()
        .filter_map(Value::as_object)
        .take(MAX_ROOMS * MAX_DECISIONS)
        .map(|d| V1Decision {
            id: ids.claim(d),
            room: coerce::text(d, "room", MAX_NAME_LEN),
            title: coerce::text(d, "title", MAX_NAME_LEN),
            selection: coerce::opt_text(d, "selection", MAX_NAME_LEN),
            status: match coerce::text(d, "status", 20).to_ascii_lowercase().as_str() {
                "deciding" => V1Status::Deciding,
                "done" => V1Status::Done,
                _ => V1Status::Todo,
            },
            notes: coerce::text(d, "notes", MAX_NOTES_LEN),
        })
        .collect();
    V1 { decisions }
}

pub fn parse_v2(raw: &Value) -> V2 {
    let obj = coerce::object(raw);
    let rooms = coerce::array(obj, "rooms")
        .iter()
        .filter_map(Value::as_object)
        .take(MAX_ROOMS)
        .map(|r| V2Room {
            id: coerce::text(r, "id", coerce::MAX_ID_LEN),
            name: coerce::text(r, "name", MAX_NAME_LEN),
            room_type: coerce::text(r, "type", 40),
            decisions: coerce::array(r, "decisions")
                .iter()
                .filter_map(Value::as_object)
                .take(MAX_DECISIONS)
                .map(|d| V2Decision {
                    id: coerce::text(d, "id", coerce::MAX_ID_LEN),
                    title: coerce::text(d, "title", MAX_NAME_LEN),
                    status: DecisionStatus::parse(&coerce::text(d, "status", 20)),
                    notes: coerce::text(d, "notes", MAX_NOTES_LEN),
                    options: coerce::array(d, "options")
                        .iter()
                        .filter_map(Value::as_object)
                        .take(MAX_OPTIONS)
                        .map(|o| V2Option {
                            id: coerce::text(o, "id", coerce::MAX_ID_LEN),
                            name: coerce::text(o, "name", MAX_NAME_LEN),
                            notes: coerce::text(o, "notes", MAX_NOTES_LEN),
                            urls: coerce::array(o, "urls")
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect(),
                            is_selected: coerce::boolean(o, "is_selected"),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    V2 { rooms }
}

fn parse_v3(raw: &Value) -> FinishDecisions {
    let obj = coerce::object(raw);
    let rooms = coerce::array(obj, "rooms")
        .iter()
        .filter_map(Value::as_object)
        .take(MAX_ROOMS)
        .map(|r| Room {
            id: coerce::text(r, "id", coerce::MAX_ID_LEN),
            name: coerce::text(r, "name", MAX_NAME_LEN),
            room_type: coerce::text(r, "room_type", 40),
            decisions: coerce::array(r, "decisions")
                .iter()
                .filter_map(Value::as_object)
                .take(MAX_DECISIONS)
                .map(parse_v3_decision)
                .collect(),
        })
        .collect();
    FinishDecisions {
        version: VERSION,
        rooms,
    }
}

fn parse_v3_decision(d: &Map<String, Value>) -> Decision {
    Decision {
        id: coerce::text(d, "id", coerce::MAX_ID_LEN),
        title: coerce::text(d, "title", MAX_NAME_LEN),
        status: DecisionStatus::parse(&coerce::text(d, "status", 20)),
        notes: coerce::text(d, "notes", MAX_NOTES_LEN),
        due_date: coerce::opt_date(d, "due_date"),
        options: coerce::array(d, "options")
            .iter()
            .filter_map(Value::as_object)
            .take(MAX_OPTIONS)
            .map(|o| DecisionOption {
                id: coerce::text(o, "id", coerce::MAX_ID_LEN),
                name: coerce::text(o, "name", MAX_NAME_LEN),
                notes: coerce::text(o, "notes", MAX_NOTES_LEN),
                price: coerce::amount(o, "price"),
                links: coerce::array(o, "links")
                    .iter()
                    .filter_map(|l| match l {
                        Value::String(s) => Some(Link { url: coerce::http_url(s)?, label: None }),
                        Value::Object(lo) => Some(Link {
                            url: coerce::opt_url(lo, "url")?,
                            label: coerce::opt_text(lo, "label", MAX_NAME_LEN),
                        }),
                        _ => None,
                    })
                    .collect(),
                images: coerce::array(o, "images")
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(coerce::http_url)
                    .collect(),
                is_selected: coerce::boolean(o, "is_selected"),
            })
            .collect(),
    }
}

/// Group flat v1 decisions into rooms and turn selections into selected options
pub fn migrate_v1_to_v2(v1: V1) -> V2 {
    let mut rooms: Vec<V2Room> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for d in v1.decisions {
        let room_name = if d.room.trim().is_empty() {
            DEFAULT_ROOM.to_string()
        } else {
            d.room.trim().to_string()
        };
        let key = room_name.to_lowercase();
        let slot = *index.entry(key).or_insert_with(|| {
            let slug = slugify(&room_name);
            rooms.push(V2Room {
                id: format!("room-{}", if slug.is_empty() { "general" } else { &slug }),
                name: room_name.clone(),
                room_type: DEFAULT_ROOM_TYPE.to_string(),
                decisions: Vec::new(),
            });
            rooms.len() - 1
        });

        let status = match (d.status, d.selection.is_some()) {
            (V1Status::Todo, _) => DecisionStatus::Deciding,
            (V1Status::Deciding, _) => DecisionStatus::Shortlist,
            (V1Status::Done, true) => DecisionStatus::Selected,
            (V1Status::Done, false) => DecisionStatus::Done,
        };
        let options = d
            .selection
            .map(|name| {
                vec![V2Option {
                    id: format!("{}-selection", d.id),
                    name,
                    notes: String::new(),
                    urls: Vec::new(),
                    is_selected: true,
                }]
            })
            .unwrap_or_default();

        rooms[slot].decisions.push(V2Decision {
            id: d.id,
            title: d.title,
            status,
            notes: d.notes,
            options,
        });
    }

    V2 { rooms }
}

fn is_image_url(url: &str) -> bool {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Split option urls into images and links, rename `type` to `room_type`
pub fn migrate_v2_to_v3(v2: V2) -> FinishDecisions {
    let rooms = v2
        .rooms
        .into_iter()
        .map(|r| Room {
            id: r.id,
            name: r.name,
            room_type: r.room_type,
            decisions: r
                .decisions
                .into_iter()
                .map(|d| Decision {
                    id: d.id,
                    title: d.title,
                    status: d.status,
                    notes: d.notes,
                    due_date: None,
                    options: d
                        .options
                        .into_iter()
                        .map(|o| {
                            let (images, links): (Vec<String>, Vec<String>) = o
                                .urls
                                .iter()
                                .filter_map(|u| coerce::http_url(u))
                                .partition(|u| is_image_url(u));
                            DecisionOption {
                                id: o.id,
                                name: o.name,
                                notes: o.notes,
                                price: None,
                                links: links.into_iter().map(|url| Link { url, label: None }).collect(),
                                images,
                                is_selected: o.is_selected,
                            }
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    FinishDecisions {
        version: VERSION,
        rooms,
    }
}

/// Enforce ids, defaults, limits and the single-selection rule on a v3 payload
pub fn normalize(mut payload: FinishDecisions) -> FinishDecisions {
    payload.version = VERSION;
    payload.rooms.truncate(MAX_ROOMS);

    let mut room_ids = IdSet::new();
    for room in &mut payload.rooms {
        room.id = room_ids.claim_str(&room.id);
        if room.name.is_empty() {
            room.name = DEFAULT_ROOM.to_string();
        }
        if room.room_type.is_empty() {
            room.room_type = DEFAULT_ROOM_TYPE.to_string();
        }
        room.decisions.truncate(MAX_DECISIONS);

        let mut decision_ids = IdSet::new();
        for decision in &mut room.decisions {
            decision.id = decision_ids.claim_str(&decision.id);
            if decision.title.is_empty() {
                decision.title = "Untitled decision".to_string();
            }
            decision.options.truncate(MAX_OPTIONS);

            let mut option_ids = IdSet::new();
            let mut selected_seen = false;
            for option in &mut decision.options {
                option.id = option_ids.claim_str(&option.id);
                if option.name.is_empty() {
                    option.name = "Untitled option".to_string();
                }
                option.links.truncate(MAX_LINKS);
                option.images.truncate(MAX_IMAGES);
                if option.is_selected {
                    option.is_selected = !selected_seen;
                    selected_seen = true;
                }
            }
        }
    }

    payload
}
