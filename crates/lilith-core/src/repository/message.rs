//! MessageRepository trait definition.

use lilith_types::error::RepositoryError;
use lilith_types::message::{MessageRow, StoredMessage};

/// Persistence for message rows, keyed on `(chat_id, external_message_id)`.
pub trait MessageRepository: Send + Sync {
    /// Insert or merge a message. Redelivery never creates a second row.
    fn upsert_message(
        &self,
        row: &MessageRow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Stored content of a message, addressed by the chat's external key.
    ///
    /// `None` when either the chat or the message is unknown.
    fn lookup_message_by_key(
        &self,
        chat_key: &str,
        message_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<StoredMessage>, RepositoryError>> + Send;
}
