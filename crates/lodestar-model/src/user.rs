//! User domain model.
//!
//! Users are the leaf identity records of the directory. They carry a map
//! of encoded authentication methods and the list of groups they belong
//! to; the inverse side of that relationship lives on
//! [`crate::group::ManagedUserGroup::members`] and is kept consistent by
//! the directory services.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lodestar_crypto::authmethods::PBKDF2_SCHEME;
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};
use crate::representation::Representation;
use crate::validation::{validate_email, validate_principal_name, validate_shortname};

/// A directory user.
///
/// A brief representation carries only uuid, numeric id, shortname,
/// principal name, and full name; every other field is left at its empty
/// default and the record must not be written back.
#[derive(Debug, Clone)]
pub struct ManagedUser {
    /// Unique identifier, immutable once assigned.
    pub uuid: Uuid,
    /// Opaque revision token from the store; changes on every write.
    pub revision: Option<String>,
    /// POSIX-style numeric identifier.
    pub numeric_id: i64,
    /// Unique login shortname.
    pub shortname: String,
    /// Principal name (`login@realm`).
    pub principal_name: String,
    /// Email address; always present on a full representation.
    pub email: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Surname.
    pub surname: Option<String>,
    /// Display name.
    pub full_name: String,
    /// Encoded credentials, keyed by scheme name.
    pub auth_methods: HashMap<String, String>,
    /// Groups this user is a direct member of.
    pub member_of: Vec<Uuid>,
    /// Soft-deletion marker.
    pub deleted: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub modified_at: DateTime<Utc>,
    /// Representation this record was decoded with.
    pub representation: Representation,
    /// Whether a setter changed the record since it was loaded.
    pub edited: bool,
}

impl PartialEq for ManagedUser {
    fn eq(&self, other: &Self) -> bool {
        self.representation.is_full() && other.representation.is_full() && self.uuid == other.uuid
    }
}

impl ManagedUser {
    /// Creates a new full user record.
    ///
    /// ## Errors
    ///
    /// Returns a [`ValidationError`] when the shortname, principal name, or
    /// email does not match its pattern.
    pub fn new(
        numeric_id: i64,
        shortname: impl Into<String>,
        principal_name: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
    ) -> ValidationResult<Self> {
        let shortname = shortname.into();
        let principal_name = principal_name.into();
        let email = email.into();
        validate_shortname(&shortname)?;
        validate_principal_name(&principal_name)?;
        validate_email(&email)?;

        let now = Utc::now();
        Ok(Self {
            uuid: Uuid::new_v4(),
            revision: None,
            numeric_id,
            shortname,
            principal_name,
            email: Some(email),
            given_name: None,
            surname: None,
            full_name: full_name.into(),
            auth_methods: HashMap::new(),
            member_of: Vec::new(),
            deleted: false,
            created_at: now,
            modified_at: now,
            representation: Representation::Full,
            edited: true,
        })
    }

    /// Sets the given name.
    #[must_use]
    pub fn with_given_name(mut self, value: impl Into<String>) -> Self {
        self.given_name = Some(value.into());
        self
    }

    /// Sets the surname.
    #[must_use]
    pub fn with_surname(mut self, value: impl Into<String>) -> Self {
        self.surname = Some(value.into());
        self
    }

    /// Sets the auth-method map.
    #[must_use]
    pub fn with_auth_methods(mut self, auth_methods: HashMap<String, String>) -> Self {
        self.auth_methods = auth_methods;
        self
    }

    /// Sets the direct group memberships.
    #[must_use]
    pub fn with_member_of(mut self, member_of: Vec<Uuid>) -> Self {
        self.member_of = member_of;
        self
    }

    /// Updates the shortname.
    ///
    /// ## Errors
    ///
    /// Returns [`ValidationError::InvalidShortname`] on pattern mismatch.
    pub fn set_shortname(&mut self, value: &str) -> ValidationResult<()> {
        if value == self.shortname {
            return Ok(());
        }
        validate_shortname(value)?;
        self.shortname = value.to_string();
        self.edited = true;
        Ok(())
    }

    /// Updates the principal name.
    ///
    /// ## Errors
    ///
    /// Returns [`ValidationError::InvalidPrincipalName`] on pattern
    /// mismatch.
    pub fn set_principal_name(&mut self, value: &str) -> ValidationResult<()> {
        if value == self.principal_name {
            return Ok(());
        }
        validate_principal_name(value)?;
        self.principal_name = value.to_string();
        self.edited = true;
        Ok(())
    }

    /// Updates the email address.
    ///
    /// ## Errors
    ///
    /// Returns [`ValidationError::InvalidEmail`] on pattern mismatch.
    pub fn set_email(&mut self, value: &str) -> ValidationResult<()> {
        if self.email.as_deref() == Some(value) {
            return Ok(());
        }
        validate_email(value)?;
        self.email = Some(value.to_string());
        self.edited = true;
        Ok(())
    }

    /// Updates the given name.
    pub fn set_given_name(&mut self, value: &str) {
        if self.given_name.as_deref() == Some(value) {
            return;
        }
        self.given_name = Some(value.to_string());
        self.edited = true;
    }

    /// Updates the surname.
    pub fn set_surname(&mut self, value: &str) {
        if self.surname.as_deref() == Some(value) {
            return;
        }
        self.surname = Some(value.to_string());
        self.edited = true;
    }

    /// Updates the display name.
    pub fn set_full_name(&mut self, value: &str) {
        if value == self.full_name {
            return;
        }
        self.full_name = value.to_string();
        self.edited = true;
    }

    /// Replaces the auth-method map.
    pub fn set_auth_methods(&mut self, auth_methods: HashMap<String, String>) {
        if auth_methods == self.auth_methods {
            return;
        }
        self.auth_methods = auth_methods;
        self.edited = true;
    }

    /// Replaces the direct group memberships.
    pub fn set_member_of(&mut self, member_of: Vec<Uuid>) {
        if member_of == self.member_of {
            return;
        }
        self.member_of = member_of;
        self.edited = true;
    }

    /// Validates a cleartext password against the stored `pbkdf2` method.
    ///
    /// ## Errors
    ///
    /// Returns [`ValidationError::PartialRepresentation`] on a brief
    /// record and [`ValidationError::NoAuthMethod`] when no `pbkdf2`
    /// method is stored.
    pub fn verify_password(&self, cleartext: &str) -> ValidationResult<bool> {
        if !self.representation.is_full() {
            return Err(ValidationError::PartialRepresentation);
        }
        match self.auth_methods.get(PBKDF2_SCHEME) {
            Some(modular) => Ok(lodestar_crypto::verify_password(cleartext, modular)),
            None => Err(ValidationError::NoAuthMethod),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_crypto::{Pbkdf2, PseudoRandomFunction};

    fn user() -> ManagedUser {
        ManagedUser::new(1000, "alice", "alice@example.com", "alice@example.com", "Alice").unwrap()
    }

    #[test]
    fn new_user_has_defaults() {
        let user = user();
        assert!(user.representation.is_full());
        assert!(user.edited);
        assert!(!user.deleted);
        assert!(user.member_of.is_empty());
        assert!(user.revision.is_none());
    }

    #[test]
    fn invalid_fields_are_rejected_on_creation() {
        assert!(ManagedUser::new(1, "Alice", "a@b.c", "a@b.c", "Alice").is_err());
        assert!(ManagedUser::new(1, "alice", "not-a-principal", "a@b.c", "Alice").is_err());
        assert!(ManagedUser::new(1, "alice", "a@b.c", "not-an-email", "Alice").is_err());
    }

    #[test]
    fn setters_track_edits_and_skip_no_ops() {
        let mut user = user();
        user.edited = false;

        user.set_shortname("alice").unwrap();
        assert!(!user.edited);

        user.set_shortname("bob").unwrap();
        assert!(user.edited);
        assert_eq!(user.shortname, "bob");

        user.edited = false;
        assert!(user.set_shortname("Bob!").is_err());
        assert!(!user.edited);
        assert_eq!(user.shortname, "bob");
    }

    #[test]
    fn verify_password_requires_full_representation() {
        let mut user = user();
        user.representation = Representation::Brief;
        assert!(matches!(
            user.verify_password("secret"),
            Err(ValidationError::PartialRepresentation)
        ));
    }

    #[test]
    fn verify_password_requires_pbkdf2_method() {
        let user = user();
        assert!(matches!(
            user.verify_password("secret"),
            Err(ValidationError::NoAuthMethod)
        ));
    }

    #[test]
    fn verify_password_checks_the_stored_method() {
        let generator = Pbkdf2::new(PseudoRandomFunction::Sha256, 100);
        let mut methods = HashMap::new();
        methods.insert("pbkdf2".to_string(), generator.generate_string("secret"));
        let user = user().with_auth_methods(methods);

        assert!(user.verify_password("secret").unwrap());
        assert!(!user.verify_password("wrong").unwrap());
    }

    #[test]
    fn equality_follows_uuid_on_full_records() {
        let a = user();
        let mut b = a.clone();
        b.shortname = "someone-else".to_string();
        assert_eq!(a, b);

        let mut brief = a.clone();
        brief.representation = Representation::Brief;
        assert_ne!(a, brief);
    }
}
