//! Allowlist projection of tool payloads for public share links.
//!
//! Output objects are built field by field from the typed payloads. Nothing from the
//! stored JSON is copied wholesale, so fields added to a payload later stay private
//! until they are listed here.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::database::models::ShareSettings;
use crate::tools::{bid_checklist, finish_decisions, mood_boards, punch_list};
use crate::types::ToolKey;

/// Re-coerce the stored payload and project it through the share settings
pub fn redact(tool: ToolKey, stored: &Value, settings: &ShareSettings) -> Value {
    match tool {
        ToolKey::MoodBoards => mood_boards_view(&mood_boards::coerce(stored), settings),
        ToolKey::FinishDecisions => finish_decisions_view(&finish_decisions::coerce(stored), settings),
        ToolKey::PunchList => punch_list_view(&punch_list::coerce(stored), settings),
        ToolKey::BidChecklist => bid_checklist_view(&bid_checklist::coerce(stored), settings),
    }
}

fn mood_boards_view(payload: &mood_boards::MoodBoards, settings: &ShareSettings) -> Value {
    let boards: Vec<Value> = payload
        .boards
        .iter()
        .filter(|b| settings.in_scope(&b.id))
        .map(|board| {
            let ideas: Vec<Value> = board
                .ideas
                .iter()
                .map(|idea| {
                    let mut reaction_counts: BTreeMap<&str, u64> = BTreeMap::new();
                    for r in &idea.reactions {
                        *reaction_counts.entry(r.emoji.as_str()).or_default() += 1;
                    }

                    let mut out = Map::new();
                    out.insert("id".into(), json!(idea.id));
                    out.insert("name".into(), json!(idea.name));
                    out.insert(
                        "images".into(),
                        json!(idea
                            .images
                            .iter()
                            .map(|i| json!({"url": i.url, "label": i.label}))
                            .collect::<Vec<_>>()),
                    );
                    out.insert("tags".into(), json!(idea.tags));
                    out.insert("reaction_counts".into(), json!(reaction_counts));
                    if settings.include_notes {
                        out.insert("notes".into(), json!(idea.notes));
                    }
                    if settings.include_links {
                        out.insert("source_url".into(), json!(idea.source_url));
                    }
                    if settings.include_comments {
                        out.insert(
                            "comments".into(),
                            json!(idea
                                .comments
                                .iter()
                                .map(|c| json!({
                                    "author_name": c.author_name,
                                    "body": c.body,
                                    "created_at": c.created_at,
                                }))
                                .collect::<Vec<_>>()),
                        );
                    }
                    Value::Object(out)
                })
                .collect();
            json!({"id": board.id, "name": board.name, "ideas": ideas})
        })
        .collect();

    json!({ "boards": boards })
}

fn finish_decisions_view(payload: &finish_decisions::FinishDecisions, settings: &ShareSettings) -> Value {
    let rooms: Vec<Value> = payload
        .rooms
        .iter()
        .filter(|r| settings.in_scope(&r.id))
        .map(|room| {
            let decisions: Vec<Value> = room
                .decisions
                .iter()
                .map(|d| {
                    let options: Vec<Value> = d
                        .options
                        .iter()
                        .map(|o| {
                            let mut out = Map::new();
                            out.insert("id".into(), json!(o.id));
                            out.insert("name".into(), json!(o.name));
                            out.insert("is_selected".into(), json!(o.is_selected));
                            out.insert("images".into(), json!(o.images));
                            if settings.include_notes {
                                out.insert("notes".into(), json!(o.notes));
                            }
                            if settings.include_prices {
                                out.insert("price".into(), json!(o.price));
                            }
                            if settings.include_links {
                                out.insert(
                                    "links".into(),
                                    json!(o
                                        .links
                                        .iter()
                                        .map(|l| json!({"url": l.url, "label": l.label}))
                                        .collect::<Vec<_>>()),
                                );
                            }
                            Value::Object(out)
                        })
                        .collect();

                    let mut out = Map::new();
                    out.insert("id".into(), json!(d.id));
                    out.insert("title".into(), json!(d.title));
                    out.insert("status".into(), json!(d.status));
                    out.insert("due_date".into(), json!(d.due_date));
                    if settings.include_notes {
                        out.insert("notes".into(), json!(d.notes));
                    }
                    out.insert("options".into(), Value::Array(options));
                    Value::Object(out)
                })
                .collect();
            json!({
                "id": room.id,
                "name": room.name,
                "room_type": room.room_type,
                "decisions": decisions,
            })
        })
        .collect();

    json!({ "rooms": rooms })
}

fn punch_list_view(payload: &punch_list::PunchList, settings: &ShareSettings) -> Value {
    let items: Vec<Value> = payload
        .items
        .iter()
        .map(|item| {
            let mut out = Map::new();
            out.insert("id".into(), json!(item.id));
            out.insert("title".into(), json!(item.title));
            out.insert("location".into(), json!(item.location));
            out.insert("status".into(), json!(item.status));
            out.insert("photos".into(), json!(item.photos));
            out.insert("created_at".into(), json!(item.created_at));
            out.insert("completed_at".into(), json!(item.completed_at));
            if settings.include_notes {
                out.insert("notes".into(), json!(item.notes));
            }
            if settings.include_assignees {
                out.insert("assignee".into(), json!(item.assignee));
            }
            Value::Object(out)
        })
        .collect();

    json!({ "items": items })
}

fn bid_checklist_view(payload: &bid_checklist::BidChecklist, settings: &ShareSettings) -> Value {
    let bids: Vec<Value> = payload
        .bids
        .iter()
        .map(|bid| {
            let mut out = Map::new();
            out.insert("id".into(), json!(bid.id));
            out.insert("contractor".into(), json!(bid.contractor));
            out.insert("trade".into(), json!(bid.trade));
            out.insert("status".into(), json!(bid.status));
            out.insert("received_at".into(), json!(bid.received_at));
            out.insert(
                "items".into(),
                json!(bid
                    .items
                    .iter()
                    .map(|i| json!({"label": i.label, "checked": i.checked}))
                    .collect::<Vec<_>>()),
            );
            if settings.include_notes {
                out.insert("notes".into(), json!(bid.notes));
            }
            if settings.include_prices {
                out.insert("amount".into(), json!(bid.amount));
            }
            Value::Object(out)
        })
        .collect();

    json!({ "bids": bids })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private() -> ShareSettings {
        ShareSettings::default()
    }

    #[test]
    fn mood_boards_hide_notes_links_and_comments_by_default() {
        let stored = json!({"version": 1, "boards": [{"id": "b", "name": "Lanai", "ideas": [{
            "id": "i", "name": "Koa", "notes": "private note", "source_url": "https://shop.example.com",
            "reactions": [{"user_id": "u1", "emoji": "🌺"}, {"user_id": "u2", "emoji": "🌺"}],
            "comments": [{"author_id": "u1", "author_name": "Kai", "body": "yes"}],
            "internal_cost": 900
        }]}]});
        let view = redact(ToolKey::MoodBoards, &stored, &private());
        let idea = &view["boards"][0]["ideas"][0];
        assert_eq!(idea["name"], "Koa");
        assert_eq!(idea["reaction_counts"]["🌺"], 2);
        for hidden in ["notes", "source_url", "comments", "reactions", "internal_cost"] {
            assert!(idea.get(hidden).is_none(), "{} leaked", hidden);
        }
    }

    #[test]
    fn comments_expose_only_name_body_and_time() {
        let stored = json!({"boards": [{"id": "b", "name": "B", "ideas": [{
            "name": "Idea", "comments": [{"author_id": "u1", "author_name": "Kai", "body": "yes"}]
        }]}]});
        let settings = ShareSettings { include_comments: true, ..private() };
        let view = redact(ToolKey::MoodBoards, &stored, &settings);
        let comment = &view["boards"][0]["ideas"][0]["comments"][0];
        assert_eq!(comment["author_name"], "Kai");
        assert!(comment.get("author_id").is_none());
        assert!(comment.get("id").is_none());
    }

    #[test]
    fn scope_limits_boards_and_rooms() {
        let boards = json!({"boards": [{"id": "a", "name": "A"}, {"id": "b", "name": "B"}]});
        let scoped = ShareSettings { scope_ids: Some(vec!["b".into()]), ..private() };
        let view = redact(ToolKey::MoodBoards, &boards, &scoped);
        assert_eq!(view["boards"].as_array().unwrap().len(), 1);
        assert_eq!(view["boards"][0]["id"], "b");

        let rooms = json!({"version": 3, "rooms": [{"id": "a", "name": "A"}, {"id": "b", "name": "B"}]});
        let view = redact(ToolKey::FinishDecisions, &rooms, &scoped);
        assert_eq!(view["rooms"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn prices_follow_the_flag() {
        let stored = json!({"version": 3, "rooms": [{"id": "k", "name": "Kitchen", "decisions": [{
            "id": "d", "title": "Faucet", "notes": "n",
            "options": [{"id": "o", "name": "Brass", "price": 410, "links": ["https://shop.example.com/x"]}]
        }]}]});
        let hidden = redact(ToolKey::FinishDecisions, &stored, &private());
        let option = &hidden["rooms"][0]["decisions"][0]["options"][0];
        assert!(option.get("price").is_none());
        assert!(option.get("links").is_none());
        assert!(hidden["rooms"][0]["decisions"][0].get("notes").is_none());

        let shown = redact(
            ToolKey::FinishDecisions,
            &stored,
            &ShareSettings { include_prices: true, include_links: true, ..private() },
        );
        let option = &shown["rooms"][0]["decisions"][0]["options"][0];
        assert_eq!(option["price"], 410.0);
        assert_eq!(option["links"][0]["url"], "https://shop.example.com/x");
    }

    #[test]
    fn punch_list_assignees_and_bid_amounts() {
        let items = json!({"items": [{"title": "Door", "assignee": "Kimo", "notes": "n"}]});
        let view = redact(ToolKey::PunchList, &items, &private());
        assert!(view["items"][0].get("assignee").is_none());
        let view = redact(ToolKey::PunchList, &items, &ShareSettings { include_assignees: true, ..private() });
        assert_eq!(view["items"][0]["assignee"], "Kimo");

        let bids = json!({"bids": [{"contractor": "A", "amount": 5000, "items": [{"id": "x", "label": "Insured"}]}]});
        let view = redact(ToolKey::BidChecklist, &bids, &private());
        assert!(view["bids"][0].get("amount").is_none());
        assert!(view["bids"][0]["items"][0].get("id").is_none());
    }
}
