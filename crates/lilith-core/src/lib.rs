//! Ingestion pipeline and repository trait definitions for Lilith.
//!
//! This crate defines the "ports" (repository and transport traits) that the
//! infrastructure layer implements, plus everything between them: payload
//! normalization, merge policy, the chat id cache, and the session
//! controller. It depends only on `lilith-types` -- never on `lilith-infra`
//! or any database/IO crate.

pub mod consistency;
pub mod ingest;
pub mod repository;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
