//! Turning raw transport payloads into persisted rows.

pub mod cache;
pub mod content;
pub mod jid;
pub mod merge;
pub mod normalize;
