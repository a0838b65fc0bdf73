use thiserror::Error;

/// Errors from repository operations (used by trait definitions in lilith-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The store cannot be reached. Every later write would fail too.
    #[error("store unavailable: {0}")]
    Connection(String),

    /// A single statement was rejected.
    #[error("query error: {0}")]
    Query(String),
}

impl RepositoryError {
    pub fn is_connection(&self) -> bool {
        matches!(self, RepositoryError::Connection(_))
    }
}

/// Errors raised while establishing or talking to the messaging transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to start transport: {0}")]
    Spawn(String),

    #[error("transport i/o error: {0}")]
    Io(String),
}
