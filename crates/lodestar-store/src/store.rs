//! The document storage contract.

use async_trait::async_trait;

use crate::document::{Document, IndexQuery};
use crate::error::StorageResult;

/// Named indexes over the document collection.
///
/// Names mirror the views the backing store is expected to provide; the
/// in-memory store interprets them directly.
pub mod index {
    /// Every live user.
    pub const ALL_USERS: &str = "all_users";
    /// Every live group.
    pub const ALL_USERGROUPS: &str = "all_usergroups";
    /// Users keyed by shortname.
    pub const USER_BY_SHORTNAME: &str = "user_by_shortname";
    /// Users keyed by principal name.
    pub const USER_BY_PRINCIPAL_NAME: &str = "user_by_principal_name";
    /// Groups keyed by shortname.
    pub const USERGROUP_BY_SHORTNAME: &str = "usergroup_by_shortname";
}

/// Optimistic-concurrency CRUD over opaque documents.
///
/// Implementations must be thread-safe and support concurrent access.
/// No locks are held between a read and the write that presents its
/// revision token; a racing write simply loses with
/// [`crate::StorageError::StaleRevision`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Gets a document by identifier.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] when absent.
    async fn get(&self, id: &str) -> StorageResult<Document>;

    /// Creates a document under its embedded identifier.
    ///
    /// Returns the identifier and the first revision token.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::StorageError::Conflict`] when the identifier is
    /// already taken.
    async fn create(&self, document: Document) -> StorageResult<(String, String)>;

    /// Replaces a document, presenting the revision token from the read
    /// it was derived from. Returns the new revision token.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::StorageError::StaleRevision`] when the token no
    /// longer matches and [`crate::StorageError::NotFound`] when absent.
    async fn update(&self, id: &str, revision: &str, document: Document) -> StorageResult<String>;

    /// Lists documents from a named index.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::StorageError::UnknownIndex`] for undefined index
    /// names.
    async fn list_by_index(&self, index: &str, query: &IndexQuery) -> StorageResult<Vec<Document>>;
}
