//! Ingestion session modes, states, and outcomes.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::event::DisconnectReason;

/// Which termination policy a session follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Ingest full history, stop after a quiet period.
    Backfill,
    /// Ingest new events until shut down, reconnecting as needed.
    Live,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Backfill => write!(f, "backfill"),
            SyncMode::Live => write!(f, "live"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "backfill" => Ok(SyncMode::Backfill),
            "live" => Ok(SyncMode::Live),
            other => Err(format!("invalid sync mode: '{other}'")),
        }
    }
}

/// Session controller state machine.
///
/// `IdleComplete` and `Fatal` are terminal; `Closed` is reached only through
/// an external shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
    IdleComplete,
    Fatal,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::IdleComplete => write!(f, "idle_complete"),
            SessionState::Fatal => write!(f, "fatal"),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Backfill saw no batches for the idle window.
    IdleComplete,
    /// Credentials were revoked; re-pairing is required.
    LoggedOut,
    /// Backfill lost its connection before history was complete.
    Disconnected(DisconnectReason),
    /// Shutdown was requested from outside.
    Shutdown,
    /// The store became unreachable; later batches were not saved.
    StoreUnavailable,
}

impl SessionOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::IdleComplete | SessionOutcome::Shutdown => 0,
            SessionOutcome::LoggedOut
            | SessionOutcome::Disconnected(_)
            | SessionOutcome::StoreUnavailable => 1,
        }
    }
}

/// Running counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub chats: u64,
    pub contacts: u64,
    pub messages: u64,
    /// Messages dropped because they had no conversation key or id.
    pub skipped_messages: u64,
    pub identity_mappings: u64,
    pub lookups: u64,
    pub failed_batches: u64,
    pub reconnects: u64,
}
