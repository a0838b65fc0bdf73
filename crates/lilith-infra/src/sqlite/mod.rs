//! SQLite storage layer.
//!
//! `SqliteStore` implements every repository trait from `lilith-core` over a
//! split reader/writer pool in WAL mode. Each upsert is a single statement,
//! so a failed batch leaves earlier rows committed.

pub mod chat;
pub mod consistency;
pub mod contact;
pub mod merge_sql;
pub mod message;
pub mod pool;
pub mod status;

use chrono::{DateTime, SecondsFormat, Utc};
use lilith_types::error::RepositoryError;

use pool::DatabasePool;

/// SQLite-backed ingest store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DatabasePool,
}

impl SqliteStore {
    /// Create a store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

/// Fixed-width UTC form so text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Pool and I/O failures mean the store is gone; anything else is a
/// rejected statement.
fn query_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            RepositoryError::Connection(e.to_string())
        }
        e => RepositoryError::Query(e.to_string()),
    }
}
