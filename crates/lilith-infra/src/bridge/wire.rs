//! Line protocol between Lilith and the bridge process.
//!
//! Every line in either direction is one JSON envelope:
//!
//! ```text
//! {"event": "<kind>", "data": <payload>}
//! ```
//!
//! Inbound kinds mirror the upstream library's event names. The only
//! outbound kind is `messages.get.result`, answering a `messages.get`.

use lilith_types::event::{
    ConnectionState, DisconnectReason, HistoryBatch, IdentityMapping, LookupReply, LookupRequest,
    RawRecord, TransportEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LOOKUP_RESULT_EVENT: &str = "messages.get.result";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("undecodable line: {0}")]
    Json(String),

    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: String, reason: String },
}

#[derive(Debug, Deserialize, Serialize)]
struct Envelope<T> {
    event: String,
    #[serde(default)]
    data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupResult<'a> {
    request_id: &'a str,
    found: bool,
    message: Option<&'a Value>,
    body: Option<&'a str>,
}

/// Decode one inbound line into zero or more transport events.
///
/// Blank lines and `connection.update` payloads without a `connection`
/// field (QR and progress notices) yield no events.
pub fn decode_line(line: &str) -> Result<Vec<TransportEvent>, WireError> {
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }

    let envelope: Envelope<Value> =
        serde_json::from_str(line).map_err(|e| WireError::Json(e.to_string()))?;
    let kind = envelope.event.as_str();
    let data = envelope.data;

    let event = match kind {
        "connection.update" => match decode_connection(&data) {
            Some(state) => TransportEvent::Connection(state),
            None => return Ok(Vec::new()),
        },
        "chats.upsert" | "chats.update" => TransportEvent::Chats(records(data)),
        "contacts.upsert" | "contacts.update" => TransportEvent::Contacts(records(data)),
        "messages.upsert" => {
            let messages = match data {
                Value::Object(mut body) => body.remove("messages").unwrap_or(Value::Null),
                other => other,
            };
            TransportEvent::Messages(records(messages))
        }
        "messaging-history.set" => TransportEvent::History(decode_history(data)),
        "lid-mapping.update" => {
            return Ok(decode_mappings(data)
                .into_iter()
                .map(TransportEvent::IdentityMapping)
                .collect());
        }
        "messages.get" => TransportEvent::MessageLookup(decode_lookup(&data)?),
        "creds.update" => TransportEvent::CredentialsChanged(data),
        other => return Err(WireError::UnknownKind(other.to_string())),
    };

    Ok(vec![event])
}

/// Encode a lookup reply as one outbound line, newline included.
pub fn encode_reply(reply: &LookupReply) -> Result<String, WireError> {
    let message = reply.message.as_ref();
    let envelope = Envelope {
        event: LOOKUP_RESULT_EVENT.to_string(),
        data: LookupResult {
            request_id: &reply.request_id,
            found: message.is_some(),
            message: message.and_then(|m| m.raw_payload.as_ref()),
            body: message.and_then(|m| m.body_text.as_deref()),
        },
    };

    let mut line = serde_json::to_string(&envelope).map_err(|e| WireError::Json(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

fn records(data: Value) -> Vec<RawRecord> {
    match data {
        Value::Array(items) => items.into_iter().filter_map(RawRecord::from_value).collect(),
        Value::Object(_) => RawRecord::from_value(data).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// `statusCode` may sit at the top level or in the upstream library's
/// `lastDisconnect.error.output.statusCode`.
fn decode_connection(data: &Value) -> Option<ConnectionState> {
    match data.get("connection")?.as_str()? {
        "connecting" => Some(ConnectionState::Connecting),
        "open" => Some(ConnectionState::Open),
        "close" => {
            let code = data
                .get("statusCode")
                .or_else(|| data.pointer("/lastDisconnect/error/output/statusCode"))
                .and_then(Value::as_i64);
            Some(ConnectionState::Close(DisconnectReason::from_status_code(code)))
        }
        _ => None,
    }
}

fn decode_history(data: Value) -> HistoryBatch {
    let Value::Object(mut body) = data else {
        return HistoryBatch::default();
    };
    let mut take = |field: &str| records(body.remove(field).unwrap_or(Value::Null));

    HistoryBatch {
        chats: take("chats"),
        contacts: take("contacts"),
        messages: take("messages"),
        is_latest: body.get("isLatest").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn decode_mappings(data: Value) -> Vec<IdentityMapping> {
    let mapping = |value: &Value| {
        let lid = value.get("lid")?.as_str()?;
        let pn = value.get("pn")?.as_str()?;
        Some(IdentityMapping {
            lid: lid.to_string(),
            pn: pn.to_string(),
        })
    };

    match &data {
        Value::Array(items) => items.iter().filter_map(mapping).collect(),
        other => mapping(other).into_iter().collect(),
    }
}

/// Only `requestId` is required. Missing keys decode as empty strings so the
/// request is still answered, as not found.
fn decode_lookup(data: &Value) -> Result<LookupRequest, WireError> {
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| data.get(*name).and_then(Value::as_str))
            .map(str::to_owned)
    };

    let request_id = field(&["requestId"]).ok_or_else(|| WireError::Malformed {
        kind: "messages.get".to_string(),
        reason: "missing requestId".to_string(),
    })?;

    Ok(LookupRequest {
        request_id,
        chat_key: field(&["remoteJid", "chatKey"]).unwrap_or_default(),
        message_id: field(&["id", "messageId"]).unwrap_or_default(),
    })
}
