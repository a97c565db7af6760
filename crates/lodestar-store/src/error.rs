//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Document not found, of the wrong type, or soft-deleted.
    #[error("document not found: {id}")]
    NotFound {
        /// Document identifier.
        id: String,
    },

    /// A document with this identifier already exists.
    #[error("document already exists: {id}")]
    Conflict {
        /// Document identifier.
        id: String,
    },

    /// The presented revision token no longer matches the stored one.
    #[error("stale revision for document {id}")]
    StaleRevision {
        /// Document identifier.
        id: String,
    },

    /// A field mandated by the active representation was missing or had
    /// the wrong shape.
    #[error("cannot decode document {id}: {reason}")]
    Decode {
        /// Document identifier.
        id: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// The named index is not defined.
    #[error("unknown index '{name}'")]
    UnknownIndex {
        /// Index name.
        name: String,
    },

    /// A brief representation was handed to a write path.
    #[error("refusing to persist brief representation of {id}")]
    BriefWrite {
        /// Document identifier.
        id: String,
    },

    /// Internal storage error.
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    /// Creates a stale-revision error.
    #[must_use]
    pub fn stale_revision(id: impl Into<String>) -> Self {
        Self::StaleRevision { id: id.into() }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unknown-index error.
    #[must_use]
    pub fn unknown_index(name: impl Into<String>) -> Self {
        Self::UnknownIndex { name: name.into() }
    }

    /// Creates a brief-write error.
    #[must_use]
    pub fn brief_write(id: impl Into<String>) -> Self {
        Self::BriefWrite { id: id.into() }
    }

    /// Checks if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checks if this is a stale-revision error.
    #[must_use]
    pub const fn is_stale_revision(&self) -> bool {
        matches!(self, Self::StaleRevision { .. })
    }

    /// Checks if this is a create conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
