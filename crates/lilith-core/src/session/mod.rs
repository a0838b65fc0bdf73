//! Connection lifecycle and event dispatch for one ingestion run.

pub mod controller;
pub mod transport;

pub use controller::{SessionController, SessionSettings};
pub use transport::{CredentialSink, Transport, TransportConnection};
