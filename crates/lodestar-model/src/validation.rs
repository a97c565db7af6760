//! Field validation patterns.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ValidationError, ValidationResult};

/// Shortname pattern: lowercase, starts with a letter or underscore,
/// at most 31 characters.
static SHORTNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z_][a-z0-9_-]{0,30}$").expect("SHORTNAME_REGEX is a valid regex pattern")
});

/// Mailbox pattern shared by principal names and email addresses.
static MAILBOX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9_.-]+@[A-Za-z0-9.-]+$").expect("MAILBOX_REGEX is a valid regex pattern")
});

/// Validates a shortname.
///
/// ## Errors
///
/// Returns [`ValidationError::InvalidShortname`] on pattern mismatch.
pub fn validate_shortname(value: &str) -> ValidationResult<()> {
    if SHORTNAME_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidShortname(value.to_string()))
    }
}

/// Validates a principal name.
///
/// ## Errors
///
/// Returns [`ValidationError::InvalidPrincipalName`] on pattern mismatch.
pub fn validate_principal_name(value: &str) -> ValidationResult<()> {
    if MAILBOX_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPrincipalName(value.to_string()))
    }
}

/// Validates an email address.
///
/// ## Errors
///
/// Returns [`ValidationError::InvalidEmail`] on pattern mismatch.
pub fn validate_email(value: &str) -> ValidationResult<()> {
    if MAILBOX_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortnames() {
        assert!(validate_shortname("alice").is_ok());
        assert!(validate_shortname("_svc-backup").is_ok());
        assert!(validate_shortname("a").is_ok());

        assert!(validate_shortname("").is_err());
        assert!(validate_shortname("Alice").is_err());
        assert!(validate_shortname("9lives").is_err());
        assert!(validate_shortname("way-too-long-for-a-shortname-way-too-long").is_err());
    }

    #[test]
    fn mailboxes() {
        assert!(validate_principal_name("alice@example.com").is_ok());
        assert!(validate_email("a.b-c_d@Example-Host.org").is_ok());

        assert!(validate_principal_name("alice").is_err());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("Alice@example.com").is_err());
    }
}
