//! SQLite chat repository implementation.

use std::sync::LazyLock;

use chrono::Utc;
use lilith_core::ingest::merge::CHAT_MERGE;
use lilith_core::repository::ChatRepository;
use lilith_types::chat::ChatRow;
use lilith_types::error::RepositoryError;

use super::merge_sql::upsert_statement;
use super::{SqliteStore, format_datetime, query_error};

static UPSERT_CHAT: LazyLock<String> = LazyLock::new(|| {
    upsert_statement(
        "chats",
        &["external_key", "alt_key", "name", "is_group", "updated_at"],
        &["external_key"],
        CHAT_MERGE,
    )
});

impl ChatRepository for SqliteStore {
    async fn upsert_chat(&self, row: &ChatRow) -> Result<i64, RepositoryError> {
        sqlx::query_scalar(UPSERT_CHAT.as_str())
            .bind(&row.external_key)
            .bind(&row.alt_key)
            .bind(&row.name)
            .bind(row.is_group)
            .bind(format_datetime(&Utc::now()))
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_error)
    }

    async fn lookup_chat_id_by_key(
        &self,
        external_key: &str,
    ) -> Result<Option<i64>, RepositoryError> {
        sqlx::query_scalar("SELECT id FROM chats WHERE external_key = ?")
            .bind(external_key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)
    }

    async fn link_chat_alt_key(
        &self,
        external_key: &str,
        alt_key: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE chats SET alt_key = ?, updated_at = ? WHERE external_key = ? AND alt_key IS NULL",
        )
        .bind(alt_key)
        .bind(format_datetime(&Utc::now()))
        .bind(external_key)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }
}
