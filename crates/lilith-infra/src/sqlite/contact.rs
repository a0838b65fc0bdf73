//! SQLite contact repository implementation.

use std::sync::LazyLock;

use chrono::Utc;
use lilith_core::ingest::merge::CONTACT_MERGE;
use lilith_core::repository::ContactRepository;
use lilith_types::contact::ContactRow;
use lilith_types::error::RepositoryError;

use super::merge_sql::upsert_statement;
use super::{SqliteStore, format_datetime, query_error};

static UPSERT_CONTACT: LazyLock<String> = LazyLock::new(|| {
    upsert_statement(
        "contacts",
        &["identity_key", "phone_number", "anon_key", "display_name", "updated_at"],
        &["identity_key"],
        CONTACT_MERGE,
    )
});

impl ContactRepository for SqliteStore {
    async fn upsert_contact(&self, row: &ContactRow) -> Result<i64, RepositoryError> {
        sqlx::query_scalar(UPSERT_CONTACT.as_str())
            .bind(&row.identity_key)
            .bind(&row.phone_number)
            .bind(&row.anon_key)
            .bind(&row.display_name)
            .bind(format_datetime(&Utc::now()))
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_error)
    }
}
