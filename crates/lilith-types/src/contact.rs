//! Canonical contact row.

use serde::{Deserialize, Serialize};

/// An address-book entry as written to the `contacts` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRow {
    /// Stable identity key (unique).
    pub identity_key: String,
    /// Bare digits, without any address suffix.
    pub phone_number: Option<String>,
    /// Anonymized identifier form (`...@lid`).
    pub anon_key: Option<String>,
    /// Saved name, else sender-supplied name, else verified business name.
    pub display_name: Option<String>,
}
