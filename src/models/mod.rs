pub mod abstract_review;
pub mod abstract_submission;
pub mod conference;
pub mod conference_registration;
pub mod contact_message;
pub mod conversation;
pub mod conversation_participant;
pub mod ebooklet;
pub mod journal_watch;
pub mod membership;
pub mod membership_plan;
pub mod message;
pub mod message_reaction;
pub mod message_read_receipt;
pub mod newsletter_subscriber;
pub mod payment;
pub mod user;
pub mod webhook_event;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Author entry of an abstract, stored inside the `authors` JSON column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbstractAuthor {
    pub name: String,
    pub affiliation: Option<String>,
    pub email: Option<String>,
}

/// Decodes a JSON array column; malformed content reads as empty.
pub fn json_list<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub fn to_json_list<T: Serialize>(items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Trims entries, drops blanks and duplicates while keeping order.
pub fn clean_list(items: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !cleaned.iter().any(|existing| existing == item) {
            cleaned.push(item.to_string());
        }
    }
    cleaned
}
