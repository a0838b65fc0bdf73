//! Session-scoped chat key → surrogate id cache.
//!
//! Saves a store round trip per message once a chat has been seen. The store
//! stays authoritative: a miss always falls through to an upsert, so a
//! message can be attached to its chat even when no chat event for that key
//! ever arrives.

use std::collections::HashMap;

use lilith_types::error::RepositoryError;

use crate::ingest::normalize::chat_row_for_key;
use crate::repository::ChatRepository;

/// Memoized chat id resolution. No eviction: bounded by distinct chats seen.
#[derive(Debug, Default)]
pub struct ChatIdCache {
    ids: HashMap<String, i64>,
}

impl ChatIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.ids.get(key).copied()
    }

    /// Record an id learned from an explicit chat upsert.
    pub fn remember(&mut self, key: impl Into<String>, id: i64) {
        self.ids.insert(key.into(), id);
    }

    /// Cached id for `key`, or upsert a minimal chat row and cache its id.
    pub async fn resolve<R: ChatRepository>(
        &mut self,
        repo: &R,
        key: &str,
    ) -> Result<i64, RepositoryError> {
        if let Some(id) = self.get(key) {
            return Ok(id);
        }

        let id = repo.upsert_chat(&chat_row_for_key(key)).await?;
        self.ids.insert(key.to_string(), id);
        Ok(id)
    }
}
