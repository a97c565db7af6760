//! LDAP projection error types.

use lodestar_store::StorageError;
use thiserror::Error;

/// Errors raised by the directory tree, filter engine, and gateway.
///
/// A filter-evaluation error aborts the whole query; there are no partial
/// results.
#[derive(Debug, Error)]
pub enum LdapError {
    /// The filter tree had an unsupported or malformed shape.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// An extensible match named a matching rule this server does not
    /// implement.
    #[error("unknown matching rule '{0}'")]
    UnknownMatchingRule(String),

    /// An ordering filter addressed a field with no defined ordering.
    #[error("unsupported comparison on field '{field}'")]
    UnsupportedComparison {
        /// Field the filter addressed.
        field: String,
    },

    /// The requested search scope is not supported for the addressed
    /// base object.
    #[error("unsupported search scope {scope}")]
    UnsupportedScope {
        /// Wire value of the scope.
        scope: i32,
    },

    /// A distinguished name could not be parsed.
    #[error("invalid distinguished name '{0}'")]
    InvalidDn(String),

    /// A DN addressed records by a field other than `entryUUID`.
    #[error("dn lookup by field '{field}' is not supported")]
    DnFieldNotSupported {
        /// Field used in the DN.
        field: String,
    },

    /// The search base object does not name a record in the tree.
    #[error("unknown base object '{base}'")]
    UnknownBaseObject {
        /// The requested base object.
        base: String,
    },

    /// The relationship graph contradicts itself (e.g. a group nested
    /// inside itself).
    #[error("inconsistent directory data: {0}")]
    InconsistentData(String),

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for LDAP projection operations.
pub type LdapResult<T> = Result<T, LdapError>;
