//! Credential error types.

use thiserror::Error;

/// Errors that can occur while encoding or expanding credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The auth-method map was empty.
    #[error("no authentication methods provided")]
    MissingAuthMethods,

    /// A scheme tag was not recognized.
    #[error("unknown credential scheme '{0}'")]
    UnknownScheme(String),

    /// A modular crypt string did not have the expected shape.
    #[error("malformed modular crypt string")]
    Malformed,
}

/// Result type for credential operations.
pub type CredentialResult<T> = Result<T, CredentialError>;
