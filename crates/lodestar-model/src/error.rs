//! Model validation and credential-check errors.

use thiserror::Error;

/// Errors raised when mutating or interrogating a model record.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The shortname did not match the allowed pattern.
    #[error("invalid shortname '{0}'")]
    InvalidShortname(String),

    /// The principal name was not a valid mailbox-style name.
    #[error("invalid principal name '{0}'")]
    InvalidPrincipalName(String),

    /// The email address was not a valid mailbox-style name.
    #[error("invalid email address '{0}'")]
    InvalidEmail(String),

    /// A required field was missing from a request.
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// The operation requires a full representation.
    #[error("operation requires the full record representation")]
    PartialRepresentation,

    /// No usable authentication method is stored on the record.
    #[error("no appropriate authentication method found")]
    NoAuthMethod,
}

/// Result type for model operations.
pub type ValidationResult<T> = Result<T, ValidationError>;
