//! Model ↔ document codecs.
//!
//! Field names are the persisted camelCase names; `_id`/`_rev` travel on
//! the [`Document`] itself. The decode strategy is caller-supplied: a
//! brief decode only requires its minimal field subset, a full decode
//! requires everything the model mandates. Encoding refuses brief
//! representations outright.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use lodestar_model::{ManagedUser, ManagedUserGroup, Representation};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::document::{Document, DELETED_FIELD, TYPE_FIELD};
use crate::error::{StorageError, StorageResult};

fn rfc3339(timestamp: chrono::DateTime<Utc>) -> Value {
    json!(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn uuid_strings(ids: &[Uuid]) -> Value {
    json!(ids.iter().map(Uuid::to_string).collect::<Vec<_>>())
}

fn parse_doc_uuid(document: &Document) -> StorageResult<Uuid> {
    Uuid::parse_str(&document.id)
        .map_err(|_| StorageError::decode(&document.id, "document id is not a uuid"))
}

/// A domain record that can be stored as a document.
pub trait StoredRecord: Sized + Send + Sync {
    /// Discriminator value for live documents of this type.
    const RECORD_TYPE: &'static str;

    /// The record's identifier.
    fn uuid(&self) -> Uuid;

    /// The revision token from the last read or write.
    fn revision(&self) -> Option<&str>;

    /// Stores the revision token returned by a write.
    fn set_revision(&mut self, revision: String);

    /// The representation this record was decoded with.
    fn representation(&self) -> Representation;

    /// Whether a setter changed the record since it was loaded.
    fn is_edited(&self) -> bool;

    /// Bumps the modification timestamp.
    fn touch(&mut self);

    /// Decodes a document under the given representation strategy.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::Decode`] when a field mandated by the
    /// strategy is absent or malformed.
    fn decode(document: &Document, representation: Representation) -> StorageResult<Self>;

    /// Encodes the record as a document.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::BriefWrite`] for brief representations.
    fn encode(&self) -> StorageResult<Document>;
}

impl StoredRecord for ManagedUser {
    const RECORD_TYPE: &'static str = "user";

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    fn set_revision(&mut self, revision: String) {
        self.revision = Some(revision);
    }

    fn representation(&self) -> Representation {
        self.representation
    }

    fn is_edited(&self) -> bool {
        self.edited
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    fn decode(document: &Document, representation: Representation) -> StorageResult<Self> {
        let uuid = parse_doc_uuid(document)?;
        let mut user = ManagedUser {
            uuid,
            revision: document.revision.clone(),
            numeric_id: document.require_i64("numericID")?,
            shortname: document.require_str("shortname")?.to_string(),
            principal_name: document.require_str("principalName")?.to_string(),
            email: None,
            given_name: None,
            surname: None,
            full_name: document.require_str("fullName")?.to_string(),
            auth_methods: HashMap::new(),
            member_of: Vec::new(),
            deleted: document.is_deleted(),
            created_at: document.datetime_or_epoch("creationDate"),
            modified_at: document.datetime_or_epoch("modificationDate"),
            representation,
            edited: false,
        };

        if representation.is_full() {
            user.email = Some(document.require_str("email")?.to_string());
            user.given_name = document.opt_str("givenName").map(ToString::to_string);
            user.surname = document.opt_str("surname").map(ToString::to_string);
            user.auth_methods = document.require_string_map("authMethods")?;
            user.member_of = document.uuid_list("memberOf")?;
            user.created_at = document.require_datetime("creationDate")?;
            user.modified_at = document.require_datetime("modificationDate")?;
        }
        Ok(user)
    }

    fn encode(&self) -> StorageResult<Document> {
        if !self.representation.is_full() {
            return Err(StorageError::brief_write(self.uuid.to_string()));
        }

        let mut body = Map::new();
        body.insert(TYPE_FIELD.to_string(), json!(Self::RECORD_TYPE));
        body.insert(DELETED_FIELD.to_string(), json!(self.deleted));
        body.insert("numericID".to_string(), json!(self.numeric_id));
        body.insert("shortname".to_string(), json!(self.shortname));
        body.insert("principalName".to_string(), json!(self.principal_name));
        if let Some(email) = &self.email {
            body.insert("email".to_string(), json!(email));
        }
        if let Some(given_name) = &self.given_name {
            body.insert("givenName".to_string(), json!(given_name));
        }
        if let Some(surname) = &self.surname {
            body.insert("surname".to_string(), json!(surname));
        }
        body.insert("fullName".to_string(), json!(self.full_name));
        body.insert("authMethods".to_string(), json!(self.auth_methods));
        body.insert("memberOf".to_string(), uuid_strings(&self.member_of));
        body.insert("creationDate".to_string(), rfc3339(self.created_at));
        body.insert("modificationDate".to_string(), rfc3339(self.modified_at));

        Ok(Document {
            id: self.uuid.to_string(),
            revision: self.revision.clone(),
            body,
        })
    }
}

impl StoredRecord for ManagedUserGroup {
    const RECORD_TYPE: &'static str = "usergroup";

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    fn set_revision(&mut self, revision: String) {
        self.revision = Some(revision);
    }

    fn representation(&self) -> Representation {
        self.representation
    }

    fn is_edited(&self) -> bool {
        self.edited
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    fn decode(document: &Document, representation: Representation) -> StorageResult<Self> {
        let uuid = parse_doc_uuid(document)?;
        let mut group = ManagedUserGroup {
            uuid,
            revision: document.revision.clone(),
            numeric_id: document.require_i64("numericID")?,
            shortname: document.require_str("shortname")?.to_string(),
            common_name: document.require_str("commonName")?.to_string(),
            email: None,
            member_of: Vec::new(),
            nested_groups: Vec::new(),
            members: Vec::new(),
            deleted: document.is_deleted(),
            created_at: document.datetime_or_epoch("creationDate"),
            modified_at: document.datetime_or_epoch("modificationDate"),
            representation,
            edited: false,
        };

        if representation.is_full() {
            group.email = document.opt_str("email").map(ToString::to_string);
            group.member_of = document.require_uuid_list("memberOf")?;
            group.nested_groups = document.require_uuid_list("nestedGroups")?;
            group.members = document.require_uuid_list("members")?;
            group.created_at = document.require_datetime("creationDate")?;
            group.modified_at = document.require_datetime("modificationDate")?;
        }
        Ok(group)
    }

    fn encode(&self) -> StorageResult<Document> {
        if !self.representation.is_full() {
            return Err(StorageError::brief_write(self.uuid.to_string()));
        }

        let mut body = Map::new();
        body.insert(TYPE_FIELD.to_string(), json!(Self::RECORD_TYPE));
        body.insert(DELETED_FIELD.to_string(), json!(self.deleted));
        body.insert("numericID".to_string(), json!(self.numeric_id));
        body.insert("shortname".to_string(), json!(self.shortname));
        body.insert("commonName".to_string(), json!(self.common_name));
        if let Some(email) = &self.email {
            body.insert("email".to_string(), json!(email));
        }
        body.insert("memberOf".to_string(), uuid_strings(&self.member_of));
        body.insert("nestedGroups".to_string(), uuid_strings(&self.nested_groups));
        body.insert("members".to_string(), uuid_strings(&self.members));
        body.insert("creationDate".to_string(), rfc3339(self.created_at));
        body.insert("modificationDate".to_string(), rfc3339(self.modified_at));

        Ok(Document {
            id: self.uuid.to_string(),
            revision: self.revision.clone(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> ManagedUser {
        ManagedUser::new(1000, "alice", "alice@example.com", "alice@example.com", "Alice")
            .unwrap()
            .with_given_name("Alice")
            .with_member_of(vec![Uuid::new_v4()])
    }

    #[test]
    fn user_round_trips_through_full_representation() {
        let user = user();
        let document = user.encode().unwrap();
        assert_eq!(document.record_type(), Some("user"));

        let decoded = ManagedUser::decode(&document, Representation::Full).unwrap();
        assert_eq!(decoded.uuid, user.uuid);
        assert_eq!(decoded.shortname, user.shortname);
        assert_eq!(decoded.email, user.email);
        assert_eq!(decoded.member_of, user.member_of);
        assert!(!decoded.edited);
    }

    #[test]
    fn brief_user_decode_ignores_full_only_fields() {
        let document = user().encode().unwrap();
        let brief = ManagedUser::decode(&document, Representation::Brief).unwrap();
        assert_eq!(brief.representation, Representation::Brief);
        assert!(brief.email.is_none());
        assert!(brief.auth_methods.is_empty());
        assert!(brief.member_of.is_empty());
    }

    #[test]
    fn full_user_decode_requires_email() {
        let mut document = user().encode().unwrap();
        document.body.remove("email");

        assert!(ManagedUser::decode(&document, Representation::Brief).is_ok());
        assert!(matches!(
            ManagedUser::decode(&document, Representation::Full),
            Err(StorageError::Decode { .. })
        ));
    }

    #[test]
    fn brief_records_never_encode() {
        let document = user().encode().unwrap();
        let brief = ManagedUser::decode(&document, Representation::Brief).unwrap();
        assert!(matches!(
            brief.encode(),
            Err(StorageError::BriefWrite { .. })
        ));
    }

    #[test]
    fn group_round_trips_with_relationships() {
        let member = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let group = ManagedUserGroup::new(1789, "staff", "All Staff", None)
            .unwrap()
            .with_relationships(vec![parent], vec![], vec![member]);

        let document = group.encode().unwrap();
        let decoded = ManagedUserGroup::decode(&document, Representation::Full).unwrap();
        assert_eq!(decoded.member_of, vec![parent]);
        assert_eq!(decoded.members, vec![member]);
        assert!(decoded.nested_groups.is_empty());
    }

    #[test]
    fn full_group_decode_requires_relationship_lists() {
        let group = ManagedUserGroup::new(1789, "staff", "All Staff", None).unwrap();
        let mut document = group.encode().unwrap();
        document.body.remove("members");

        assert!(ManagedUserGroup::decode(&document, Representation::Full).is_err());
        assert!(ManagedUserGroup::decode(&document, Representation::Brief).is_ok());
    }
}
