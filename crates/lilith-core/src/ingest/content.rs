//! Message content classification and body extraction.
//!
//! A message's content object carries exactly one content field
//! (`conversation`, `imageMessage`, ...). Both functions here are total:
//! any JSON value, including `null` and non-objects, produces a result.

use lilith_types::message::MessageType;
use serde_json::{Map, Value};

/// Wrappers whose inner `message` holds the real content.
const WRAPPER_FIELDS: &[&str] = &[
    "viewOnceMessage",
    "viewOnceMessageV2",
    "viewOnceMessageV2Extension",
    "ephemeralMessage",
];

/// Content fields in priority order: text, then media, then specialised kinds.
const CONTENT_FIELDS: &[(&str, MessageType)] = &[
    ("conversation", MessageType::Text),
    ("extendedTextMessage", MessageType::Text),
    ("imageMessage", MessageType::Image),
    ("videoMessage", MessageType::Video),
    ("ptvMessage", MessageType::Video),
    ("audioMessage", MessageType::Audio),
    ("documentMessage", MessageType::Document),
    ("documentWithCaptionMessage", MessageType::Document),
    ("stickerMessage", MessageType::Sticker),
    ("contactMessage", MessageType::Contact),
    ("contactsArrayMessage", MessageType::Contact),
    ("locationMessage", MessageType::Location),
    ("liveLocationMessage", MessageType::Location),
    ("reactionMessage", MessageType::Reaction),
    ("pollCreationMessage", MessageType::Poll),
    ("pollCreationMessageV2", MessageType::Poll),
    ("pollCreationMessageV3", MessageType::Poll),
];

/// Text-bearing paths in priority order.
const BODY_PATHS: &[&[&str]] = &[
    &["conversation"],
    &["extendedTextMessage", "text"],
    &["imageMessage", "caption"],
    &["videoMessage", "caption"],
    &["documentMessage", "caption"],
    &["documentWithCaptionMessage", "message", "documentMessage", "caption"],
    &["reactionMessage", "text"],
    &["pollCreationMessage", "name"],
    &["locationMessage", "name"],
    &["contactMessage", "displayName"],
];

fn present<'a>(content: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    content.get(field).filter(|v| !v.is_null())
}

/// Inner content of a wrapper, if `content` is one.
fn wrapped(content: &Map<String, Value>) -> Option<Option<&Value>> {
    WRAPPER_FIELDS
        .iter()
        .find_map(|field| present(content, field))
        .map(|wrapper| wrapper.get("message"))
}

/// Classify a content object by its first present content field.
pub fn classify(payload: Option<&Value>) -> MessageType {
    let Some(Value::Object(content)) = payload else {
        return MessageType::Unknown;
    };

    if let Some(inner) = wrapped(content) {
        return classify(inner);
    }

    CONTENT_FIELDS
        .iter()
        .find(|(field, _)| present(content, field).is_some())
        .map(|(_, message_type)| *message_type)
        .unwrap_or(MessageType::Unknown)
}

/// Text of the first present text-bearing field.
///
/// Returns `None` when no field is present, or when the first present one is
/// not a string.
pub fn extract_body(payload: Option<&Value>) -> Option<String> {
    let Some(Value::Object(content)) = payload else {
        return None;
    };

    if let Some(inner) = wrapped(content) {
        return extract_body(inner);
    }

    BODY_PATHS
        .iter()
        .find_map(|path| lookup(content, path))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn lookup<'a>(content: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut value = present(content, first)?;
    for field in rest {
        value = value.as_object().and_then(|obj| present(obj, field))?;
    }
    Some(value)
}
