//! Store summary for `lilith status`.

use chrono::{DateTime, Utc};
use lilith_types::error::RepositoryError;
use serde::Serialize;

use super::{SqliteStore, parse_datetime, query_error};

/// Row counts and the newest message time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub chats: i64,
    pub contacts: i64,
    pub messages: i64,
    pub latest_message_at: Option<DateTime<Utc>>,
}

impl SqliteStore {
    pub async fn summary(&self) -> Result<StoreSummary, RepositoryError> {
        let (chats, contacts, messages, latest): (i64, i64, i64, Option<String>) =
            sqlx::query_as(
                r#"SELECT
                     (SELECT COUNT(*) FROM chats),
                     (SELECT COUNT(*) FROM contacts),
                     (SELECT COUNT(*) FROM messages),
                     (SELECT MAX(timestamp) FROM messages)"#,
            )
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;

        Ok(StoreSummary {
            chats,
            contacts,
            messages,
            latest_message_at: latest.as_deref().map(parse_datetime).transpose()?,
        })
    }
}
