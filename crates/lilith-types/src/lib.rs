//! Shared domain types for Lilith.
//!
//! This crate contains the types passed between the ingestion layers:
//! canonical chat/contact/message rows, the weakly typed raw event shapes
//! emitted by the transport, session enums, configuration, and errors.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod consistency;
pub mod config;
pub mod contact;
pub mod error;
pub mod event;
pub mod message;
pub mod session;
