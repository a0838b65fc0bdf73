//! Read-only consistency checks over the ingested store.
//!
//! Checks:
//! - every message's conversation key equals its chat's external key
//! - every DM conversation key has a matching contact
//! - every DM chat has a matching contact by key or alternate key
//! - no two DM chats refer to the same peer (warnings only)
//!
//! A contact matches a key by identity key or anonymized key, and for
//! phone-linked keys also by phone number.

use std::collections::BTreeMap;

use lilith_types::consistency::{ChatKeys, CheckResult, MisalignedMessage};
use lilith_types::error::RepositoryError;

use crate::ingest::jid;

pub const ALIGNMENT_CHECK: &str = "Message-chat key alignment";
pub const DM_MESSAGES_CHECK: &str = "DM messages have matching contact";
pub const DM_CHATS_CHECK: &str = "DM chats have matching contact";
pub const DUPLICATE_PEERS_CHECK: &str = "No duplicate chats for same peer";

const ALIGNMENT_CAP: usize = 500;
const DM_MESSAGES_CAP: usize = 100;
const DM_CHATS_CAP: usize = 50;
const DUPLICATE_GROUPS_CAP: usize = 20;

/// How to look up a contact for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactProbe {
    /// Match identity key, or phone number equal to `number` or to the key.
    PhoneLinked { key: String, number: String },
    /// Match identity key or anonymized key.
    Other { key: String },
}

impl ContactProbe {
    /// Probe for `key`, or `None` when the key needs no contact (empty or group).
    pub fn for_key(key: &str) -> Option<Self> {
        if key.is_empty() || jid::is_group(key) {
            return None;
        }
        if jid::is_phone_linked(key) {
            let number = jid::phone_number(key)
                .unwrap_or_else(|| key.trim_end_matches(jid::PHONE_SUFFIX).to_string());
            return Some(ContactProbe::PhoneLinked {
                key: key.to_string(),
                number,
            });
        }
        Some(ContactProbe::Other {
            key: key.to_string(),
        })
    }
}

/// Read access the checks need from the store.
pub trait ConsistencyProbe: Send + Sync {
    /// Messages whose conversation key differs from their chat's key, by id.
    fn misaligned_messages(
        &self,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<MisalignedMessage>, RepositoryError>> + Send;

    /// Distinct non-group conversation keys across all messages.
    fn dm_conversation_keys(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    /// Non-group chats, ordered by id.
    fn dm_chats(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ChatKeys>, RepositoryError>> + Send;

    fn contact_exists(
        &self,
        probe: &ContactProbe,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

async fn contact_matches<P: ConsistencyProbe>(probe: &P, key: &str) -> Result<bool, RepositoryError> {
    match ContactProbe::for_key(key) {
        Some(contact) => probe.contact_exists(&contact).await,
        None => Ok(true),
    }
}

/// Canonical peer for grouping DM chats: the phone-linked key when known.
pub fn normalize_peer(external_key: &str, alt_key: Option<&str>) -> Option<String> {
    if external_key.is_empty() {
        return None;
    }
    if jid::is_anonymized(external_key) {
        if let Some(alt) = alt_key.filter(|a| !a.is_empty()) {
            return Some(alt.to_string());
        }
    }
    Some(external_key.to_string())
}

async fn check_alignment<P: ConsistencyProbe>(probe: &P) -> Result<CheckResult, RepositoryError> {
    let rows = probe.misaligned_messages(ALIGNMENT_CAP).await?;
    if rows.is_empty() {
        return Ok(CheckResult::pass(ALIGNMENT_CHECK));
    }

    let mut details: Vec<String> = rows
        .iter()
        .map(|m| {
            format!(
                "  message_id={} chat_id={} message.conversation_key={:?} chat.external_key={:?}",
                m.message_id, m.chat_id, m.conversation_key, m.chat_key
            )
        })
        .collect();
    if rows.len() >= ALIGNMENT_CAP {
        details.push(format!("  ... and possibly more (capped at {ALIGNMENT_CAP})"));
    }

    Ok(CheckResult {
        name: ALIGNMENT_CHECK.to_string(),
        passed: false,
        error_count: rows.len(),
        warning_count: 0,
        details,
    })
}

async fn check_dm_messages<P: ConsistencyProbe>(probe: &P) -> Result<CheckResult, RepositoryError> {
    let mut missing = Vec::new();
    for key in probe.dm_conversation_keys().await? {
        if !contact_matches(probe, &key).await? {
            missing.push(key);
        }
    }
    if missing.is_empty() {
        return Ok(CheckResult::pass(DM_MESSAGES_CHECK));
    }

    missing.sort();
    let mut details: Vec<String> = missing
        .iter()
        .take(DM_MESSAGES_CAP)
        .map(|key| format!("  {key}"))
        .collect();
    if missing.len() > DM_MESSAGES_CAP {
        details.push(format!("  ... and {} more", missing.len() - DM_MESSAGES_CAP));
    }

    Ok(CheckResult {
        name: DM_MESSAGES_CHECK.to_string(),
        passed: false,
        error_count: missing.len(),
        warning_count: 0,
        details,
    })
}

async fn check_dm_chats<P: ConsistencyProbe>(probe: &P) -> Result<CheckResult, RepositoryError> {
    let mut missing = Vec::new();
    for chat in probe.dm_chats().await? {
        if contact_matches(probe, &chat.external_key).await? {
            continue;
        }
        if let Some(alt) = chat.alt_key.as_deref().filter(|a| !a.is_empty()) {
            if contact_matches(probe, alt).await? {
                continue;
            }
        }
        missing.push(chat);
    }
    if missing.is_empty() {
        return Ok(CheckResult::pass(DM_CHATS_CHECK));
    }

    let mut details: Vec<String> = missing
        .iter()
        .take(DM_CHATS_CAP)
        .map(|c| {
            format!(
                "  chat_id={} external_key={:?} alt_key={:?}",
                c.chat_id, c.external_key, c.alt_key
            )
        })
        .collect();
    if missing.len() > DM_CHATS_CAP {
        details.push(format!("  ... and {} more", missing.len() - DM_CHATS_CAP));
    }

    Ok(CheckResult {
        name: DM_CHATS_CHECK.to_string(),
        passed: false,
        error_count: missing.len(),
        warning_count: 0,
        details,
    })
}

async fn check_duplicate_peers<P: ConsistencyProbe>(
    probe: &P,
) -> Result<CheckResult, RepositoryError> {
    let mut by_peer: BTreeMap<String, Vec<ChatKeys>> = BTreeMap::new();
    for chat in probe.dm_chats().await? {
        if let Some(peer) = normalize_peer(&chat.external_key, chat.alt_key.as_deref()) {
            by_peer.entry(peer).or_default().push(chat);
        }
    }

    let mut duplicates: Vec<(String, Vec<ChatKeys>)> = by_peer
        .into_iter()
        .filter(|(_, chats)| chats.len() > 1)
        .collect();
    if duplicates.is_empty() {
        return Ok(CheckResult::pass(DUPLICATE_PEERS_CHECK));
    }
    // Report groups in order of their lowest chat id.
    duplicates.sort_by_key(|(_, chats)| chats[0].chat_id);

    let mut details: Vec<String> = duplicates
        .iter()
        .take(DUPLICATE_GROUPS_CAP)
        .map(|(peer, chats)| {
            let ids: Vec<i64> = chats.iter().map(|c| c.chat_id).collect();
            let keys: Vec<&str> = chats.iter().map(|c| c.external_key.as_str()).collect();
            format!("  peer {peer:?}: chat_ids={ids:?} keys={keys:?}")
        })
        .collect();
    if duplicates.len() > DUPLICATE_GROUPS_CAP {
        details.push(format!(
            "  ... and {} more duplicate groups",
            duplicates.len() - DUPLICATE_GROUPS_CAP
        ));
    }

    Ok(CheckResult {
        name: DUPLICATE_PEERS_CHECK.to_string(),
        passed: true,
        error_count: 0,
        warning_count: duplicates.iter().map(|(_, chats)| chats.len()).sum(),
        details,
    })
}

/// Run every check in order. Never writes.
pub async fn run_consistency_checks<P: ConsistencyProbe>(
    probe: &P,
) -> Result<Vec<CheckResult>, RepositoryError> {
    Ok(vec![
        check_alignment(probe).await?,
        check_dm_messages(probe).await?,
        check_dm_chats(probe).await?,
        check_duplicate_peers(probe).await?,
    ])
}
