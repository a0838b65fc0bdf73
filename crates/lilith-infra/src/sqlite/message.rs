//! SQLite message repository implementation.
//!
//! The raw content snapshot is stored as JSON text; the message type as its
//! lowercase name.

use std::sync::LazyLock;

use chrono::Utc;
use lilith_core::ingest::merge::MESSAGE_MERGE;
use lilith_core::repository::MessageRepository;
use lilith_types::error::RepositoryError;
use lilith_types::message::{MessageRow, StoredMessage};
use serde_json::Value;
use sqlx::Row;

use super::merge_sql::upsert_statement;
use super::{SqliteStore, format_datetime, query_error};

static UPSERT_MESSAGE: LazyLock<String> = LazyLock::new(|| {
    upsert_statement(
        "messages",
        &[
            "chat_id",
            "external_message_id",
            "conversation_key",
            "conversation_alt_key",
            "participant_key",
            "participant_alt_key",
            "is_outbound",
            "timestamp",
            "message_type",
            "body_text",
            "phone_number",
            "raw_payload",
            "updated_at",
        ],
        &["chat_id", "external_message_id"],
        MESSAGE_MERGE,
    )
});

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct StoredMessageRow {
    external_message_id: String,
    body_text: Option<String>,
    raw_payload: Option<String>,
}

impl StoredMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            external_message_id: row.try_get("external_message_id")?,
            body_text: row.try_get("body_text")?,
            raw_payload: row.try_get("raw_payload")?,
        })
    }

    fn into_stored(self) -> Result<StoredMessage, RepositoryError> {
        let raw_payload = self
            .raw_payload
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid raw_payload: {e}")))?;

        Ok(StoredMessage {
            external_message_id: self.external_message_id,
            body_text: self.body_text,
            raw_payload,
        })
    }
}

impl MessageRepository for SqliteStore {
    async fn upsert_message(&self, row: &MessageRow) -> Result<(), RepositoryError> {
        let raw_payload = row.raw_payload.as_ref().map(Value::to_string);

        sqlx::query_scalar::<_, i64>(UPSERT_MESSAGE.as_str())
            .bind(row.chat_id)
            .bind(&row.external_message_id)
            .bind(&row.conversation_key)
            .bind(&row.conversation_alt_key)
            .bind(&row.participant_key)
            .bind(&row.participant_alt_key)
            .bind(row.is_outbound)
            .bind(format_datetime(&row.timestamp))
            .bind(row.message_type.as_str())
            .bind(&row.body_text)
            .bind(&row.phone_number)
            .bind(raw_payload)
            .bind(format_datetime(&Utc::now()))
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn lookup_message_by_key(
        &self,
        chat_key: &str,
        message_id: &str,
    ) -> Result<Option<StoredMessage>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT m.external_message_id, m.body_text, m.raw_payload
               FROM messages m
               JOIN chats c ON c.id = m.chat_id
               WHERE c.external_key = ? AND m.external_message_id = ?"#,
        )
        .bind(chat_key)
        .bind(message_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        match row {
            Some(row) => {
                let stored = StoredMessageRow::from_row(&row).map_err(query_error)?;
                Ok(Some(stored.into_stored()?))
            }
            None => Ok(None),
        }
    }
}
