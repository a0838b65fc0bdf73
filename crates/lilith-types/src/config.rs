//! Configuration types for Lilith.
//!
//! `IngestConfig` represents `config.toml` in the data directory. Every
//! field has a default, so an empty or missing file is valid.

use serde::{Deserialize, Serialize};

use std::path::PathBuf;
use std::time::Duration;

/// Top-level ingestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Store connection target. `None` means `{data_dir}/lilith.db`.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Credential storage directory handed to the transport.
    /// `None` means `{data_dir}/auth`.
    #[serde(default)]
    pub auth_dir: Option<PathBuf>,

    /// Command that runs the protocol bridge process.
    #[serde(default)]
    pub bridge: BridgeCommand,

    /// Delay before reconnecting after an ordinary disconnect (live mode).
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Quiet period after which a backfill is considered complete.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Capacity of the transport event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    256
}

impl IngestConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            auth_dir: None,
            bridge: BridgeCommand::default(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Program and arguments for the bridge process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeCommand {
    #[serde(default = "default_bridge_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_bridge_program() -> String {
    "lilith-bridge".to_string()
}

impl Default for BridgeCommand {
    fn default() -> Self {
        Self {
            program: default_bridge_program(),
            args: Vec::new(),
        }
    }
}
