//! Infrastructure layer for Lilith.
//!
//! Implements the ports defined in `lilith-core`: the SQLite-backed ingest
//! store, the bridge-process transport, and the filesystem credential sink.
//! Also loads `config.toml` and resolves the data directory.

pub mod bridge;
pub mod config;
pub mod credentials;
pub mod sqlite;
