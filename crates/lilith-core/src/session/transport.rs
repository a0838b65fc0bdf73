//! Transport and credential-sink ports.
//!
//! The transport owns the upstream protocol connection. Each `connect()`
//! yields a fresh event channel; a reconnect is simply dropping the old
//! connection and connecting again.

use lilith_types::error::TransportError;
use lilith_types::event::{LookupReply, TransportEvent};
use serde_json::Value;
use tokio::sync::mpsc;

/// One live connection to the upstream service.
#[derive(Debug)]
pub struct TransportConnection {
    /// Inbound events, in delivery order. Closing the channel without a
    /// close event is treated as a lost connection.
    pub events: mpsc::Receiver<TransportEvent>,
    /// Answers to message-lookup requests received on `events`.
    pub replies: mpsc::Sender<LookupReply>,
}

/// Source of transport events.
pub trait Transport: Send {
    fn connect(
        &mut self,
    ) -> impl std::future::Future<Output = Result<TransportConnection, TransportError>> + Send;
}

/// Destination for credential updates pushed by the transport.
pub trait CredentialSink: Send + Sync {
    fn save(
        &self,
        credentials: &Value,
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;
}
