//! Per-tool payload coercion. Whatever a client sends, storage only ever sees the
//! current shape of the tool's payload.

pub mod bid_checklist;
pub mod coerce;
pub mod finish_decisions;
pub mod mood_boards;
pub mod punch_list;

use serde::Serialize;
use serde_json::Value;

use crate::types::ToolKey;

/// Coerce `raw` into the tool's current payload shape. Never fails.
pub fn validate_and_coerce(tool: ToolKey, raw: &Value) -> Value {
    match tool {
        ToolKey::MoodBoards => to_value(&mood_boards::coerce(raw)),
        ToolKey::FinishDecisions => to_value(&finish_decisions::coerce(raw)),
        ToolKey::PunchList => to_value(&punch_list::coerce(raw)),
        ToolKey::BidChecklist => to_value(&bid_checklist::coerce(raw)),
    }
}

/// Payload of a tool nobody has written yet
pub fn empty_payload(tool: ToolKey) -> Value {
    validate_and_coerce(tool, &Value::Null)
}

pub fn current_version(tool: ToolKey) -> u32 {
    match tool {
        ToolKey::MoodBoards => mood_boards::VERSION,
        ToolKey::FinishDecisions => finish_decisions::VERSION,
        ToolKey::PunchList => punch_list::VERSION,
        ToolKey::BidChecklist => bid_checklist::VERSION,
    }
}

fn to_value<T: Serialize>(payload: &T) -> Value {
    // Payload structs hold only strings, numbers, bools and vectors
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_tool_has_a_versioned_empty_payload() {
        for tool in ToolKey::ALL {
            let empty = empty_payload(tool);
            assert_eq!(empty["version"], json!(current_version(tool)), "{}", tool);
        }
    }

    #[test]
    fn coercion_is_idempotent() {
        let raw = json!({"items": [{"title": "Grout", "status": "done", "completed_at": "2024-01-02"}]});
        let once = validate_and_coerce(ToolKey::PunchList, &raw);
        let twice = validate_and_coerce(ToolKey::PunchList, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn non_object_payloads_do_not_fail() {
        for tool in ToolKey::ALL {
            for raw in [json!(null), json!([1, 2]), json!("x"), json!(5)] {
                assert!(validate_and_coerce(tool, &raw).is_object());
            }
        }
    }
}
