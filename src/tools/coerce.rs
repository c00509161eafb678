//! Lenient field readers shared by the per-tool coercers.
//!
//! Every helper takes whatever JSON arrived and returns a usable value. Nothing here fails.

use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

pub const MAX_ID_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 10_000;
pub const MAX_URL_LEN: usize = 2_048;

static EMPTY: once_cell::sync::Lazy<Map<String, Value>> = once_cell::sync::Lazy::new(Map::new);

/// The object behind `value`, or an empty one
pub fn object(value: &Value) -> &Map<String, Value> {
    value.as_object().unwrap_or(&EMPTY)
}

/// Array entries under `key`, capped at `limit`. Non-arrays read as empty.
pub fn array<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    obj.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Trim and cut to `max` characters
pub fn clamp(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}

/// String field, trimmed and clamped; numbers are accepted as their text
pub fn text(obj: &Map<String, Value>, key: &str, max: usize) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => clamp(s, max),
        Some(Value::Number(n)) => clamp(&n.to_string(), max),
        _ => String::new(),
    }
}

/// Like `text`, but empty becomes `None`
pub fn opt_text(obj: &Map<String, Value>, key: &str, max: usize) -> Option<String> {
    Some(text(obj, key, max)).filter(|s| !s.is_empty())
}

pub fn boolean(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Absolute http(s) URL or nothing
pub fn http_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > MAX_URL_LEN {
        return None;
    }
    let parsed = url::Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed.into()),
        _ => None,
    }
}

pub fn opt_url(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).and_then(http_url)
}

/// String list entries, trimmed, deduplicated, empty ones dropped
pub fn string_list(obj: &Map<String, Value>, key: &str, max_len: usize, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    array(obj, key)
        .iter()
        .filter_map(Value::as_str)
        .map(|s| clamp(s, max_len))
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .take(limit)
        .collect()
}

/// Date-ish field kept as text when it parses as RFC 3339 or YYYY-MM-DD
pub fn opt_date(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let raw = obj.get(key)?.as_str()?.trim();
    if chrono::DateTime::parse_from_rfc3339(raw).is_ok()
        || chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
    {
        Some(raw.to_string())
    } else {
        None
    }
}

/// Non-negative finite amount from a number or text like "$12,500.00"
pub fn amount(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match obj.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Hands out ids unique within one list. Unusable or repeated ids are replaced with fresh UUIDs.
#[derive(Default)]
pub struct IdSet {
    seen: HashSet<String>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, obj: &Map<String, Value>) -> String {
        let candidate = match obj.get("id") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        self.claim_str(&candidate)
    }

    pub fn claim_str(&mut self, candidate: &str) -> String {
        if !candidate.is_empty()
            && candidate.chars().count() <= MAX_ID_LEN
            && self.seen.insert(candidate.to_string())
        {
            return candidate.to_string();
        }
        self.fresh()
    }

    pub fn fresh(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        self.seen.insert(id.clone());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_trims_clamps_and_tolerates_numbers() {
        let v = json!({"a": "  hello  ", "b": 42, "c": null, "d": "abcdef"});
        let obj = object(&v);
        assert_eq!(text(obj, "a", 100), "hello");
        assert_eq!(text(obj, "b", 100), "42");
        assert_eq!(text(obj, "c", 100), "");
        assert_eq!(text(obj, "d", 3), "abc");
        assert_eq!(opt_text(obj, "missing", 10), None);
    }

    #[test]
    fn urls_must_be_absolute_http() {
        assert_eq!(http_url(" https://example.com/a.png "), Some("https://example.com/a.png".into()));
        assert_eq!(http_url("javascript:alert(1)"), None);
        assert_eq!(http_url("/relative/path"), None);
        assert_eq!(http_url("ftp://example.com/file"), None);
    }

    #[test]
    fn amounts_accept_money_strings() {
        let v = json!({"a": "$12,500.00", "b": 300, "c": -5, "d": "lots", "e": true});
        let obj = object(&v);
        assert_eq!(amount(obj, "a"), Some(12_500.0));
        assert_eq!(amount(obj, "b"), Some(300.0));
        assert_eq!(amount(obj, "c"), None);
        assert_eq!(amount(obj, "d"), None);
        assert_eq!(amount(obj, "e"), None);
    }

    #[test]
    fn ids_are_kept_once_then_replaced() {
        let mut ids = IdSet::new();
        assert_eq!(ids.claim_str("kitchen"), "kitchen");
        let dup = ids.claim_str("kitchen");
        assert_ne!(dup, "kitchen");
        assert!(Uuid::parse_str(&dup).is_ok());
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert_ne!(ids.claim_str(&long), long);
        assert_eq!(ids.claim(object(&json!({"id": 7}))), "7");
    }

    #[test]
    fn string_lists_dedupe_case_insensitively() {
        let v = json!({"tags": ["Koa", "koa", " ", 5, "Lanai"]});
        assert_eq!(string_list(object(&v), "tags", 40, 10), vec!["Koa", "Lanai"]);
    }

    #[test]
    fn dates_accept_two_shapes() {
        let v = json!({"a": "2024-06-01", "b": "2024-06-01T10:00:00Z", "c": "June 1st"});
        let obj = object(&v);
        assert!(opt_date(obj, "a").is_some());
        assert!(opt_date(obj, "b").is_some());
        assert!(opt_date(obj, "c").is_none());
    }
}
