//! Event shapes emitted by the messaging transport.
//!
//! Upstream payloads are not schema-validated: fields may be missing, null,
//! of the wrong type, or unexpected. Batches therefore carry [`RawRecord`]s,
//! a thin wrapper over a JSON object, and the normalizer in `lilith-core`
//! converts them into typed rows immediately. Nothing past the normalizer
//! sees a `RawRecord`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use std::fmt;

use crate::message::StoredMessage;

/// A weakly typed upstream record (a JSON object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    /// Wrap a JSON value. Anything other than an object yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Field value, treating an explicit `null` as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    /// Field value if it is a string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Field value if it is a non-empty string.
    pub fn text_field(&self, field: &str) -> Option<&str> {
        self.str_field(field).filter(|s| !s.trim().is_empty())
    }

    /// Field value if it is a boolean.
    pub fn bool_field(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// Nested object, if present.
    pub fn object(&self, field: &str) -> Option<RawRecord> {
        self.get(field).cloned().and_then(RawRecord::from_value)
    }
}

/// Why the transport closed the connection.
///
/// Built from the numeric status codes of the upstream protocol library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Credentials were revoked on the device. Unrecoverable.
    LoggedOut,
    /// Expected handshake step after pairing; reconnect immediately.
    RestartRequired,
    /// The socket dropped or timed out.
    ConnectionLost,
    Other(i64),
}

impl DisconnectReason {
    pub fn from_status_code(code: Option<i64>) -> Self {
        match code {
            Some(401) => DisconnectReason::LoggedOut,
            Some(515) => DisconnectReason::RestartRequired,
            Some(408) | Some(428) | None => DisconnectReason::ConnectionLost,
            Some(other) => DisconnectReason::Other(other),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DisconnectReason::LoggedOut)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::LoggedOut => write!(f, "logged out"),
            DisconnectReason::RestartRequired => write!(f, "restart required"),
            DisconnectReason::ConnectionLost => write!(f, "connection lost"),
            DisconnectReason::Other(code) => write!(f, "closed with status {code}"),
        }
    }
}

/// Connection state changes reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Close(DisconnectReason),
}

/// Links an anonymized identifier to its phone-linked key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMapping {
    pub lid: String,
    pub pn: String,
}

/// One history-sync delivery: chats, contacts, and messages together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryBatch {
    pub chats: Vec<RawRecord>,
    pub contacts: Vec<RawRecord>,
    pub messages: Vec<RawRecord>,
    /// Set by the transport on the last chunk of the initial sync.
    pub is_latest: bool,
}

/// The transport asking for a message it delivered earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub request_id: String,
    pub chat_key: String,
    pub message_id: String,
}

/// Answer to a [`LookupRequest`]. `message` is `None` when nothing is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupReply {
    pub request_id: String,
    pub message: Option<StoredMessage>,
}

/// Everything the transport can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connection(ConnectionState),
    Chats(Vec<RawRecord>),
    Contacts(Vec<RawRecord>),
    Messages(Vec<RawRecord>),
    History(HistoryBatch),
    IdentityMapping(IdentityMapping),
    MessageLookup(LookupRequest),
    /// Opaque credential blob to hand to whatever persists auth state.
    CredentialsChanged(Value),
}

impl TransportEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::Connection(_) => "connection",
            TransportEvent::Chats(_) => "chats",
            TransportEvent::Contacts(_) => "contacts",
            TransportEvent::Messages(_) => "messages",
            TransportEvent::History(_) => "history",
            TransportEvent::IdentityMapping(_) => "identity-mapping",
            TransportEvent::MessageLookup(_) => "message-lookup",
            TransportEvent::CredentialsChanged(_) => "credentials",
        }
    }
}
