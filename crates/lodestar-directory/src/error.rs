//! Directory service error types.

use lodestar_crypto::CredentialError;
use lodestar_model::ValidationError;
use lodestar_store::StorageError;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the directory services and relationship engine.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A field failed validation or was missing from a request.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Credential expansion failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A relationship-mirroring batch partially failed. The directory may
    /// be inconsistent and requires repair; already-written peers are not
    /// rolled back.
    #[error("relationship updates failed for {} peer record(s)", failed.len())]
    InconsistentRelationship {
        /// Peers whose mirrored update failed.
        failed: Vec<Uuid>,
    },
}

impl DirectoryError {
    /// Checks if this is a not-found storage error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(error) if error.is_not_found())
    }
}

/// Result type for directory service operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
