use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce::{self, IdSet, MAX_NAME_LEN, MAX_NOTES_LEN};

pub const VERSION: u32 = 1;
pub const MAX_BIDS: usize = 100;
pub const MAX_ITEMS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidChecklist {
    pub version: u32,
    pub bids: Vec<Bid>,
}

impl Default for BidChecklist {
    fn default() -> Self {
        Self {
            version: VERSION,
            bids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub contractor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub status: BidStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
    pub notes: String,
    pub items: Vec<CheckItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckItem {
    pub id: String,
    pub label: String,
    pub checked: bool,
}

pub fn coerce(raw: &Value) -> BidChecklist {
    let obj = coerce::object(raw);
    let mut ids = IdSet::new();
    let bids = coerce::array(obj, "bids")
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|o| {
            let contractor = coerce::opt_text(o, "contractor", MAX_NAME_LEN)?;
            let mut item_ids = IdSet::new();
            Some(Bid {
                id: ids.claim(o),
                contractor,
                trade: coerce::opt_text(o, "trade", MAX_NAME_LEN),
                amount: coerce::amount(o, "amount"),
                status: match coerce::text(o, "status", 20).to_ascii_lowercase().as_str() {
                    "accepted" => BidStatus::Accepted,
                    "declined" => BidStatus::Declined,
                    _ => BidStatus::Pending,
                },
                received_at: coerce::opt_date(o, "received_at"),
                notes: coerce::text(o, "notes", MAX_NOTES_LEN),
                items: coerce::array(o, "items")
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|i| {
                        let label = coerce::opt_text(i, "label", MAX_NAME_LEN)?;
                        Some(CheckItem {
                            id: item_ids.claim(i),
                            label,
                            checked: coerce::boolean(i, "checked"),
                        })
                    })
                    .take(MAX_ITEMS)
                    .collect(),
            })
        })
        .take(MAX_BIDS)
        .collect();

    BidChecklist {
        version: VERSION,
        bids,
    }
}
