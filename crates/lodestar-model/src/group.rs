//! Group domain model.
//!
//! Groups own three relationship lists: the parent groups they belong to
//! (`member_of`), the groups nested inside them (`nested_groups`), and
//! their user members (`members`). Each list is mirrored on the records it
//! references; the directory services restore that symmetry after every
//! mutation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ValidationResult;
use crate::representation::Representation;
use crate::validation::{validate_email, validate_shortname};

/// A directory user group.
///
/// A brief representation carries uuid, numeric id, shortname, and common
/// name; relationship lists are left empty and the record must not be
/// written back.
#[derive(Debug, Clone)]
pub struct ManagedUserGroup {
    /// Unique identifier, immutable once assigned.
    pub uuid: Uuid,
    /// Opaque revision token from the store; changes on every write.
    pub revision: Option<String>,
    /// POSIX-style numeric identifier.
    pub numeric_id: i64,
    /// Unique group shortname.
    pub shortname: String,
    /// Display name.
    pub common_name: String,
    /// Optional delivery address for the group.
    pub email: Option<String>,
    /// Parent groups this group is nested inside.
    pub member_of: Vec<Uuid>,
    /// Groups nested inside this group.
    pub nested_groups: Vec<Uuid>,
    /// User members of this group.
    pub members: Vec<Uuid>,
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

impl PartialEq for ManagedUserGroup {
    fn eq(&self, other: &Self) -> bool {
        self.representation.is_full() && other.representation.is_full() && self.uuid == other.uuid
    }
}

impl ManagedUserGroup {
    /// Creates a new full group record.
    ///
    /// ## Errors
    ///
    /// Returns a [`crate::error::ValidationError`] when the shortname or
    /// email does not match its pattern.
    pub fn new(
        numeric_id: i64,
        shortname: impl Into<String>,
        common_name: impl Into<String>,
        email: Option<String>,
    ) -> ValidationResult<Self> {
        let shortname = shortname.into();
        validate_shortname(&shortname)?;
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let now = Utc::now();
        Ok(Self {
            uuid: Uuid::new_v4(),
            revision: None,
            numeric_id,
            shortname,
            common_name: common_name.into(),
            email,
            member_of: Vec::new(),
            nested_groups: Vec::new(),
            members: Vec::new(),
            deleted: false,
            created_at: now,
            modified_at: now,
            representation: Representation::Full,
            edited: true,
        })
    }

    /// Sets the relationship lists.
    #[must_use]
    pub fn with_relationships(
        mut self,
        member_of: Vec<Uuid>,
        nested_groups: Vec<Uuid>,
        members: Vec<Uuid>,
    ) -> Self {
        self.member_of = member_of;
        self.nested_groups = nested_groups;
        self.members = members;
        self
    }

    /// Updates the shortname.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::error::ValidationError::InvalidShortname`] on
    /// pattern mismatch.
    pub fn set_shortname(&mut self, value: &str) -> ValidationResult<()> {
        if value == self.shortname {
            return Ok(());
        }
        validate_shortname(value)?;
        self.shortname = value.to_string();
        self.edited = true;
        Ok(())
    }

    /// Updates the common name.
    pub fn set_common_name(&mut self, value: &str) {
        if value == self.common_name {
            return;
        }
        self.common_name = value.to_string();
        self.edited = true;
    }

    /// Updates the email address.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::error::ValidationError::InvalidEmail`] on pattern
    /// mismatch.
    pub fn set_email(&mut self, value: &str) -> ValidationResult<()> {
        if self.email.as_deref() == Some(value) {
            return Ok(());
        }
        validate_email(value)?;
        self.email = Some(value.to_string());
        self.edited = true;
        Ok(())
    }

    /// Clears the email address.
    pub fn clear_email(&mut self) {
        if self.email.is_none() {
            return;
        }
        self.email = None;
        self.edited = true;
    }

    /// Replaces the parent-group list.
    pub fn set_member_of(&mut self, member_of: Vec<Uuid>) {
        if member_of == self.member_of {
            return;
        }
        self.member_of = member_of;
        self.edited = true;
    }

    /// Replaces the nested-group list.
    pub fn set_nested_groups(&mut self, nested_groups: Vec<Uuid>) {
        if nested_groups == self.nested_groups {
            return;
        }
        self.nested_groups = nested_groups;
        self.edited = true;
    }

    /// Replaces the member list.
    pub fn set_members(&mut self, members: Vec<Uuid>) {
        if members == self.members {
            return;
        }
        self.members = members;
        self.edited = true;
    }
}
