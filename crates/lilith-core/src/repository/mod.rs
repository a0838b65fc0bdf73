//! Repository trait definitions for the ingestion store.
//!
//! Implementations live in lilith-infra (e.g., `SqliteStore`). All traits use
//! native async fn in traits (RPITIT, Rust 2024 edition). Every upsert is its
//! own atomic write keyed on the row's uniqueness constraint; merge rules on
//! conflict come from [`crate::ingest::merge`].

pub mod chat;
pub mod contact;
pub mod message;

pub use chat::ChatRepository;
pub use contact::ContactRepository;
pub use message::MessageRepository;

/// Everything the session controller needs from the store.
pub trait IngestStore: ChatRepository + ContactRepository + MessageRepository {}

impl<T> IngestStore for T where T: ChatRepository + ContactRepository + MessageRepository {}
