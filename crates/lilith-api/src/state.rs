//! Application state shared by the CLI commands.
//!
//! Resolves the data directory, configuration, store target and credential
//! directory once, then opens the store.

use std::path::{Path, PathBuf};

use anyhow::Context;
use lilith_infra::config::{load_config, resolve_auth_dir, resolve_data_dir, resolve_database_url};
use lilith_infra::sqlite::SqliteStore;
use lilith_infra::sqlite::pool::DatabasePool;
use lilith_types::config::IngestConfig;

pub struct AppState {
    pub data_dir: PathBuf,
    pub config: IngestConfig,
    pub database_url: String,
    pub auth_dir: PathBuf,
    pub store: SqliteStore,
}

impl AppState {
    /// Resolve locations (flag or env first, then `config.toml`, then the
    /// data dir defaults) and connect to the store, running migrations.
    pub async fn init(
        data_dir: Option<PathBuf>,
        database_url: Option<&str>,
        auth_dir: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("cannot create data dir {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        let database_url = resolve_database_url(database_url, &config, &data_dir);
        let auth_dir = resolve_auth_dir(auth_dir, &config, &data_dir);

        let pool = DatabasePool::new(&database_url)
            .await
            .with_context(|| format!("cannot open store at {database_url}"))?;
        tracing::debug!(%database_url, auth_dir = %auth_dir.display(), "store ready");

        Ok(Self {
            data_dir,
            config,
            database_url,
            auth_dir,
            store: SqliteStore::new(pool),
        })
    }

    pub async fn close(&self) {
        self.store.pool().close().await;
    }
}
