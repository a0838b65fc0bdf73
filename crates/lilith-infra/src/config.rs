//! Configuration loader for Lilith.
//!
//! Reads `config.toml` from the data directory (`~/.lilith/` by default) and
//! deserializes it into [`IngestConfig`]. Falls back to defaults when the
//! file is missing or malformed. Command-line flags and their environment
//! variables are applied on top by the binary.

use std::path::{Path, PathBuf};

use lilith_types::config::IngestConfig;

use crate::sqlite::pool::default_database_url;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "LILITH_DATA_DIR";
/// Environment variable overriding the store connection target.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Environment variable overriding the credential directory. Also the
/// variable the bridge process reads.
pub const AUTH_DIR_ENV: &str = "LILITH_AUTH_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `LILITH_DATA_DIR` environment variable
/// 2. `~/.lilith`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".lilith");
    }

    // Last resort: current directory
    PathBuf::from(".lilith")
}

/// Load configuration from `{data_dir}/config.toml`.
pub async fn load_config(data_dir: &Path) -> IngestConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return IngestConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return IngestConfig::default();
        }
    };

    match toml::from_str::<IngestConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            IngestConfig::default()
        }
    }
}

/// Store target: explicit override, then config file, then the data dir default.
pub fn resolve_database_url(
    override_url: Option<&str>,
    config: &IngestConfig,
    data_dir: &Path,
) -> String {
    override_url
        .or(config.database_url.as_deref())
        .map(str::to_owned)
        .unwrap_or_else(|| default_database_url(data_dir))
}

/// Credential directory: explicit override, then config file, then `{data_dir}/auth`.
///
/// Relative paths from the config file are taken relative to the data dir.
pub fn resolve_auth_dir(
    override_dir: Option<&Path>,
    config: &IngestConfig,
    data_dir: &Path,
) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    match &config.auth_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => data_dir.join(dir),
        None => data_dir.join("auth"),
    }
}
