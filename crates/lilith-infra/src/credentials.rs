//! Filesystem credential sink.
//!
//! Credential updates pushed by the bridge are written to
//! `{auth_dir}/creds.json`. The file is replaced atomically: written to a
//! temporary sibling, then renamed over the old one.

use std::path::PathBuf;

use lilith_core::session::CredentialSink;
use serde_json::Value;

pub const CREDENTIALS_FILE: &str = "creds.json";

/// Persists credentials as pretty-printed JSON in the auth directory.
#[derive(Debug, Clone)]
pub struct FileCredentialSink {
    auth_dir: PathBuf,
}

impl FileCredentialSink {
    pub fn new(auth_dir: impl Into<PathBuf>) -> Self {
        Self {
            auth_dir: auth_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.auth_dir.join(CREDENTIALS_FILE)
    }
}

impl CredentialSink for FileCredentialSink {
    async fn save(&self, credentials: &Value) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(&self.auth_dir).await?;

        let contents = serde_json::to_vec_pretty(credentials)?;
        let target = self.path();
        let staging = self.auth_dir.join(format!("{CREDENTIALS_FILE}.tmp"));
        tokio::fs::write(&staging, contents).await?;
        tokio::fs::rename(&staging, &target).await
    }
}
