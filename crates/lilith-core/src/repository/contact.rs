//! ContactRepository trait definition.

use lilith_types::contact::ContactRow;
use lilith_types::error::RepositoryError;

/// Persistence for contact rows, keyed on the identity key.
pub trait ContactRepository: Send + Sync {
    /// Insert or merge a contact; returns its surrogate id.
    fn upsert_contact(
        &self,
        row: &ContactRow,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
