//! In-memory fakes shared by the core test modules.
//!
//! `MemoryStore` applies the same merge tables as the SQLite store, so
//! merge behaviour can be asserted without a database.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use lilith_types::chat::ChatRow;
use lilith_types::consistency::{ChatKeys, MisalignedMessage};
use lilith_types::contact::ContactRow;
use lilith_types::error::{RepositoryError, TransportError};
use lilith_types::event::{LookupReply, TransportEvent};
use lilith_types::message::{MessageRow, StoredMessage};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::consistency::{ConsistencyProbe, ContactProbe};
use crate::ingest::merge::{CHAT_MERGE, CONTACT_MERGE, MESSAGE_MERGE, merge_column};
use crate::repository::{ChatRepository, ContactRepository, MessageRepository};
use crate::session::{CredentialSink, Transport, TransportConnection};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoredChat {
    pub id: i64,
    pub row: ChatRow,
}

#[derive(Debug, Clone)]
pub struct StoredContact {
    pub id: i64,
    pub row: ContactRow,
}

#[derive(Debug, Default)]
struct Tables {
    chats: Vec<StoredChat>,
    contacts: Vec<StoredContact>,
    messages: Vec<(i64, MessageRow)>,
    next_id: i64,
    chat_writes: usize,
    fail_writes: bool,
    unavailable: bool,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Connection("pool closed".to_string()));
        }
        if self.fail_writes {
            return Err(RepositoryError::Query("database is locked".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes fail with a rejected-statement error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.tables.lock().unwrap().fail_writes = fail;
    }

    /// Writes fail as if the store had gone away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.tables.lock().unwrap().unavailable = unavailable;
    }

    pub fn chat(&self, key: &str) -> Option<StoredChat> {
        let tables = self.tables.lock().unwrap();
        tables.chats.iter().find(|c| c.row.external_key == key).cloned()
    }

    pub fn chats(&self) -> Vec<StoredChat> {
        self.tables.lock().unwrap().chats.clone()
    }

    pub fn contact(&self, key: &str) -> Option<StoredContact> {
        let tables = self.tables.lock().unwrap();
        tables.contacts.iter().find(|c| c.row.identity_key == key).cloned()
    }

    pub fn contacts(&self) -> Vec<StoredContact> {
        self.tables.lock().unwrap().contacts.clone()
    }

    pub fn message(&self, chat_id: i64, external_id: &str) -> Option<MessageRow> {
        let tables = self.tables.lock().unwrap();
        tables
            .messages
            .iter()
            .find(|(_, m)| m.chat_id == chat_id && m.external_message_id == external_id)
            .map(|(_, m)| m.clone())
    }

    pub fn messages(&self) -> Vec<MessageRow> {
        let tables = self.tables.lock().unwrap();
        tables.messages.iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn chat_writes(&self) -> usize {
        self.tables.lock().unwrap().chat_writes
    }

    /// Insert a message row verbatim, bypassing merge rules.
    pub fn insert_raw_message(&self, row: MessageRow) -> i64 {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        tables.messages.push((id, row));
        id
    }
}

fn merge_text(
    fields: &[crate::ingest::merge::FieldMerge],
    column: &str,
    existing: &Option<String>,
    incoming: &Option<String>,
) -> Option<String> {
    merge_column(fields, column, existing.clone(), incoming.clone())
}

impl ChatRepository for MemoryStore {
    async fn upsert_chat(&self, row: &ChatRow) -> Result<i64, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        tables.chat_writes += 1;

        if let Some(existing) = tables
            .chats
            .iter_mut()
            .find(|c| c.row.external_key == row.external_key)
        {
            let current = existing.row.clone();
            existing.row.alt_key = merge_text(CHAT_MERGE, "alt_key", &current.alt_key, &row.alt_key);
            existing.row.name = merge_text(CHAT_MERGE, "name", &current.name, &row.name);
            existing.row.is_group =
                merge_column(CHAT_MERGE, "is_group", Some(current.is_group), Some(row.is_group))
                    .unwrap_or(current.is_group);
            return Ok(existing.id);
        }

        let id = tables.next_id();
        tables.chats.push(StoredChat {
            id,
            row: row.clone(),
        });
        Ok(id)
    }

    async fn lookup_chat_id_by_key(&self, external_key: &str) -> Result<Option<i64>, RepositoryError> {
        Ok(self.chat(external_key).map(|c| c.id))
    }

    async fn link_chat_alt_key(&self, external_key: &str, alt_key: &str) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        match tables
            .chats
            .iter_mut()
            .find(|c| c.row.external_key == external_key && c.row.alt_key.is_none())
        {
            Some(chat) => {
                chat.row.alt_key = Some(alt_key.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl ContactRepository for MemoryStore {
    async fn upsert_contact(&self, row: &ContactRow) -> Result<i64, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;

        if let Some(existing) = tables
            .contacts
            .iter_mut()
            .find(|c| c.row.identity_key == row.identity_key)
        {
            let current = existing.row.clone();
            existing.row.phone_number =
                merge_text(CONTACT_MERGE, "phone_number", &current.phone_number, &row.phone_number);
            existing.row.anon_key =
                merge_text(CONTACT_MERGE, "anon_key", &current.anon_key, &row.anon_key);
            existing.row.display_name =
                merge_text(CONTACT_MERGE, "display_name", &current.display_name, &row.display_name);
            return Ok(existing.id);
        }

        let id = tables.next_id();
        tables.contacts.push(StoredContact {
            id,
            row: row.clone(),
        });
        Ok(id)
    }
}

impl MessageRepository for MemoryStore {
    async fn upsert_message(&self, row: &MessageRow) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;

        if let Some((_, existing)) = tables.messages.iter_mut().find(|(_, m)| {
            m.chat_id == row.chat_id && m.external_message_id == row.external_message_id
        }) {
            let current = existing.clone();
            let text = |column: &str, old: &Option<String>, new: &Option<String>| {
                merge_text(MESSAGE_MERGE, column, old, new)
            };
            existing.participant_key =
                text("participant_key", &current.participant_key, &row.participant_key);
            existing.participant_alt_key = text(
                "participant_alt_key",
                &current.participant_alt_key,
                &row.participant_alt_key,
            );
            existing.conversation_alt_key = text(
                "conversation_alt_key",
                &current.conversation_alt_key,
                &row.conversation_alt_key,
            );
            existing.body_text = text("body_text", &current.body_text, &row.body_text);
            existing.phone_number = text("phone_number", &current.phone_number, &row.phone_number);
            existing.raw_payload = merge_column(
                MESSAGE_MERGE,
                "raw_payload",
                current.raw_payload,
                row.raw_payload.clone(),
            );
            return Ok(());
        }

        let id = tables.next_id();
        tables.messages.push((id, row.clone()));
        Ok(())
    }

    async fn lookup_message_by_key(
        &self,
        chat_key: &str,
        message_id: &str,
    ) -> Result<Option<StoredMessage>, RepositoryError> {
        let Some(chat) = self.chat(chat_key) else {
            return Ok(None);
        };
        Ok(self.message(chat.id, message_id).map(|m| StoredMessage {
            external_message_id: m.external_message_id,
            body_text: m.body_text,
            raw_payload: m.raw_payload,
        }))
    }
}

impl ConsistencyProbe for MemoryStore {
    async fn misaligned_messages(&self, limit: usize) -> Result<Vec<MisalignedMessage>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        let mut found: Vec<MisalignedMessage> = tables
            .messages
            .iter()
            .filter_map(|(id, m)| {
                let chat = tables.chats.iter().find(|c| c.id == m.chat_id)?;
                (chat.row.external_key != m.conversation_key).then(|| MisalignedMessage {
                    message_id: *id,
                    chat_id: m.chat_id,
                    conversation_key: m.conversation_key.clone(),
                    chat_key: chat.row.external_key.clone(),
                })
            })
            .collect();
        found.sort_by_key(|m| m.message_id);
        found.truncate(limit);
        Ok(found)
    }

    async fn dm_conversation_keys(&self) -> Result<Vec<String>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        let mut keys: Vec<String> = tables
            .messages
            .iter()
            .map(|(_, m)| m.conversation_key.clone())
            .filter(|k| !crate::ingest::jid::is_group(k))
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn dm_chats(&self) -> Result<Vec<ChatKeys>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .chats
            .iter()
            .filter(|c| !crate::ingest::jid::is_group(&c.row.external_key))
            .map(|c| ChatKeys {
                chat_id: c.id,
                external_key: c.row.external_key.clone(),
                alt_key: c.row.alt_key.clone(),
            })
            .collect())
    }

    async fn contact_exists(&self, probe: &ContactProbe) -> Result<bool, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.contacts.iter().any(|c| match probe {
            ContactProbe::PhoneLinked { key, number } => {
                c.row.identity_key == *key
                    || c.row.phone_number.as_deref() == Some(number.as_str())
                    || c.row.phone_number.as_deref() == Some(key.as_str())
            }
            ContactProbe::Other { key } => {
                c.row.identity_key == *key || c.row.anon_key.as_deref() == Some(key.as_str())
            }
        }))
    }
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// One scripted connection: events are fed by the test through `feed`.
pub struct ScriptedConnection {
    pub feed: mpsc::Sender<TransportEvent>,
    pub replies: mpsc::Receiver<LookupReply>,
}

/// Transport whose connections are pre-built channel pairs.
///
/// Each `connect()` pops the next queued connection; an empty queue is a
/// connect failure.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    pending: Arc<Mutex<VecDeque<TransportConnection>>>,
    connects: Arc<Mutex<usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection and return the handles that drive it.
    pub fn queue_connection(&self) -> ScriptedConnection {
        let (feed, events) = mpsc::channel(64);
        let (replies_tx, replies) = mpsc::channel(64);
        self.pending.lock().unwrap().push_back(TransportConnection {
            events,
            replies: replies_tx,
        });
        ScriptedConnection { feed, replies }
    }

    /// Queue a connection whose events are all sent up front.
    ///
    /// The feed sender is returned so the stream stays open until dropped.
    pub fn queue_events(&self, events: Vec<TransportEvent>) -> ScriptedConnection {
        let connection = self.queue_connection();
        for event in events {
            connection.feed.try_send(event).unwrap();
        }
        connection
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }
}

impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<TransportConnection, TransportError> {
        *self.connects.lock().unwrap() += 1;
        self.pending
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Spawn("no scripted connection left".to_string()))
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingSink {
    saved: Arc<Mutex<Vec<Value>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<Value> {
        self.saved.lock().unwrap().clone()
    }
}

impl CredentialSink for RecordingSink {
    async fn save(&self, credentials: &Value) -> Result<(), std::io::Error> {
        self.saved.lock().unwrap().push(credentials.clone());
        Ok(())
    }
}
