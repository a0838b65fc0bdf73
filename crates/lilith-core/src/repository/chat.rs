//! ChatRepository trait definition.

use lilith_types::chat::ChatRow;
use lilith_types::error::RepositoryError;

/// Persistence for chat rows, keyed on the external key.
pub trait ChatRepository: Send + Sync {
    /// Insert or merge a chat; returns its surrogate id (existing or new).
    fn upsert_chat(
        &self,
        row: &ChatRow,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Surrogate id for an external key, if the chat exists.
    fn lookup_chat_id_by_key(
        &self,
        external_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<i64>, RepositoryError>> + Send;

    /// Set the alternate key of an existing chat, but only while it is unset.
    ///
    /// Returns `true` if a row was changed.
    fn link_chat_alt_key(
        &self,
        external_key: &str,
        alt_key: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
