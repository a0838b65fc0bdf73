//! Read-only consistency queries for `lilith check`.

use lilith_core::consistency::{ConsistencyProbe, ContactProbe};
use lilith_types::consistency::{ChatKeys, MisalignedMessage};
use lilith_types::error::RepositoryError;
use sqlx::Row;

use super::{SqliteStore, query_error};

impl ConsistencyProbe for SqliteStore {
    async fn misaligned_messages(
        &self,
        limit: usize,
    ) -> Result<Vec<MisalignedMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT m.id AS message_id, m.chat_id, m.conversation_key, c.external_key AS chat_key
               FROM messages m
               JOIN chats c ON c.id = m.chat_id
               WHERE m.conversation_key IS NOT c.external_key
               ORDER BY m.id
               LIMIT ?"#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                Ok(MisalignedMessage {
                    message_id: row.try_get("message_id")?,
                    chat_id: row.try_get("chat_id")?,
                    conversation_key: row.try_get("conversation_key")?,
                    chat_key: row.try_get("chat_key")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(query_error)
    }

    async fn dm_conversation_keys(&self) -> Result<Vec<String>, RepositoryError> {
        sqlx::query_scalar(
            r#"SELECT DISTINCT conversation_key FROM messages
               WHERE conversation_key <> '' AND conversation_key NOT LIKE '%@g.us'
               ORDER BY conversation_key"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)
    }

    async fn dm_chats(&self) -> Result<Vec<ChatKeys>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, external_key, alt_key FROM chats WHERE external_key NOT LIKE '%@g.us' ORDER BY id",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                Ok(ChatKeys {
                    chat_id: row.try_get("id")?,
                    external_key: row.try_get("external_key")?,
                    alt_key: row.try_get("alt_key")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(query_error)
    }

    async fn contact_exists(&self, probe: &ContactProbe) -> Result<bool, RepositoryError> {
        let found: Option<i64> = match probe {
            ContactProbe::PhoneLinked { key, number } => sqlx::query_scalar(
                r#"SELECT 1 FROM contacts
                   WHERE identity_key = ? OR phone_number = ? OR phone_number = ?
                   LIMIT 1"#,
            )
            .bind(key)
            .bind(number)
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?,
            ContactProbe::Other { key } => sqlx::query_scalar(
                "SELECT 1 FROM contacts WHERE identity_key = ? OR anon_key = ? LIMIT 1",
            )
            .bind(key)
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?,
        };

        Ok(found.is_some())
    }
}
