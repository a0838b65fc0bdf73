//! Message row, message classification, and stored-message lookup types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Closed set of message kinds recognised by the normalizer.
///
/// Stored as its lowercase string form in `messages.message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Contact,
    Location,
    Reaction,
    Poll,
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::Document => "document",
            MessageType::Sticker => "sticker",
            MessageType::Contact => "contact",
            MessageType::Location => "location",
            MessageType::Reaction => "reaction",
            MessageType::Poll => "poll",
            MessageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "video" => Ok(MessageType::Video),
            "audio" => Ok(MessageType::Audio),
            "document" => Ok(MessageType::Document),
            "sticker" => Ok(MessageType::Sticker),
            "contact" => Ok(MessageType::Contact),
            "location" => Ok(MessageType::Location),
            "reaction" => Ok(MessageType::Reaction),
            "poll" => Ok(MessageType::Poll),
            "unknown" => Ok(MessageType::Unknown),
            other => Err(format!("invalid message type: '{other}'")),
        }
    }
}

/// Addressing block of an upstream message.
///
/// `remote_key` is the conversation key; `participant` is the sender inside a
/// group. The `*_alt` fields carry the other address form (phone-linked vs
/// anonymized) when the transport knows it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageKey {
    pub remote_key: Option<String>,
    pub remote_key_alt: Option<String>,
    pub id: Option<String>,
    pub from_me: bool,
    pub participant: Option<String>,
    pub participant_alt: Option<String>,
}

/// A message as written to the `messages` table.
///
/// `(chat_id, external_message_id)` is the idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub chat_id: i64,
    pub external_message_id: String,
    pub conversation_key: String,
    pub conversation_alt_key: Option<String>,
    pub participant_key: Option<String>,
    pub participant_alt_key: Option<String>,
    pub is_outbound: bool,
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub body_text: Option<String>,
    /// Counterparty phone number (bare digits).
    pub phone_number: Option<String>,
    /// Shallow snapshot of the upstream content object.
    pub raw_payload: Option<serde_json::Value>,
}

/// What the store hands back when the transport asks for a message it
/// already delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub external_message_id: String,
    pub body_text: Option<String>,
    pub raw_payload: Option<serde_json::Value>,
}
