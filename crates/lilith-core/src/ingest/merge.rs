//! Per-field merge policy for upserts.
//!
//! Each entity declares, per mutable column, what happens when a row with the
//! same uniqueness key is written again. Columns not listed are immutable
//! after creation. The SQLite store builds its `ON CONFLICT` clause from
//! these tables, so the policy lives in one place.

/// How an incoming value combines with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Incoming value wins only when it is non-null.
    Coalesce,
    /// Incoming value always wins, null included.
    Overwrite,
}

impl MergeStrategy {
    pub fn merge<T>(self, existing: Option<T>, incoming: Option<T>) -> Option<T> {
        match self {
            MergeStrategy::Coalesce => incoming.or(existing),
            MergeStrategy::Overwrite => incoming,
        }
    }
}

/// Merge rule for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMerge {
    pub column: &'static str,
    pub strategy: MergeStrategy,
}

const fn coalesce(column: &'static str) -> FieldMerge {
    FieldMerge {
        column,
        strategy: MergeStrategy::Coalesce,
    }
}

const fn overwrite(column: &'static str) -> FieldMerge {
    FieldMerge {
        column,
        strategy: MergeStrategy::Overwrite,
    }
}

/// `chats`, keyed on `external_key`.
pub const CHAT_MERGE: &[FieldMerge] = &[
    coalesce("alt_key"),
    coalesce("name"),
    overwrite("is_group"),
];

/// `contacts`, keyed on `identity_key`.
pub const CONTACT_MERGE: &[FieldMerge] = &[
    coalesce("phone_number"),
    coalesce("anon_key"),
    coalesce("display_name"),
];

/// `messages`, keyed on `(chat_id, external_message_id)`.
///
/// Participant keys improve as identities resolve, so the latest observation
/// wins. Timestamp, type, and conversation key stay as first written.
pub const MESSAGE_MERGE: &[FieldMerge] = &[
    overwrite("participant_key"),
    overwrite("participant_alt_key"),
    overwrite("conversation_alt_key"),
    coalesce("body_text"),
    coalesce("phone_number"),
    coalesce("raw_payload"),
];

/// Strategy for `column`, or `None` if the column is immutable.
pub fn strategy_for(fields: &[FieldMerge], column: &str) -> Option<MergeStrategy> {
    fields
        .iter()
        .find(|field| field.column == column)
        .map(|field| field.strategy)
}

/// Merge one column using `fields`; immutable columns keep `existing`.
pub fn merge_column<T>(
    fields: &[FieldMerge],
    column: &str,
    existing: Option<T>,
    incoming: Option<T>,
) -> Option<T> {
    match strategy_for(fields, column) {
        Some(strategy) => strategy.merge(existing, incoming),
        None => existing,
    }
}
