//! Result type for read-only store consistency checks.

use serde::{Deserialize, Serialize};

/// Outcome of a single consistency check.
///
/// A check can pass with warnings (e.g. duplicate chats for one peer);
/// `error_count > 0` always means the data is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub details: Vec<String>,
}

impl CheckResult {
    /// A passing check with no findings.
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error_count: 0,
            warning_count: 0,
            details: Vec::new(),
        }
    }

    /// Whether the check counts as clean in a report (passed and no errors).
    pub fn is_clean(&self) -> bool {
        self.passed && self.error_count == 0
    }
}

/// A message whose conversation key differs from its chat's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisalignedMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub conversation_key: String,
    pub chat_key: String,
}

/// Key columns of a chat row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatKeys {
    pub chat_id: i64,
    pub external_key: String,
    pub alt_key: Option<String>,
}
