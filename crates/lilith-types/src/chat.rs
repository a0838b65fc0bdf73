//! Canonical chat row.

use serde::{Deserialize, Serialize};

/// A conversation endpoint as written to the `chats` table.
///
/// `external_key` is the upstream identifier (individual, group, or
/// anonymized form) and is never null; an unknown key is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRow {
    pub external_key: String,
    /// Phone-linked form of the key, when known.
    pub alt_key: Option<String>,
    pub name: Option<String>,
    pub is_group: bool,
}

impl ChatRow {
    /// Minimal row for a chat known only by its key.
    pub fn bare(external_key: impl Into<String>) -> Self {
        Self {
            external_key: external_key.into(),
            alt_key: None,
            name: None,
            is_group: false,
        }
    }
}
