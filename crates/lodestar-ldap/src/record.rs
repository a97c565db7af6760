//! Directory records.
//!
//! A [`DirectoryRecord`] is the per-request, immutable projection of a
//! stored user or group (or one of the fixed structural nodes above them)
//! into the shape LDAP clients see: an entry uuid, object classes, a DN
//! derived from the parent chain, and a case-insensitively addressable
//! attribute set. Each concrete kind declares its own field table; fields
//! that require store access (relationship and flattened views) resolve
//! through [`crate::tree::DirectoryTree`].

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use lodestar_model::{ManagedUser, ManagedUserGroup};
use uuid::Uuid;

/// Attribute name used in leaf-record DNs.
pub const DN_FIELD: &str = "entryUUID";

/// Root DSE metadata advertised to clients probing the realm.
#[derive(Debug, Clone)]
pub(crate) struct RootDseEntry {
    pub naming_contexts: Vec<String>,
    pub subschema_subentry: Vec<String>,
    pub supported_ldap_version: Vec<String>,
    pub supported_sasl_mechanisms: Vec<String>,
    pub supported_extension: Vec<String>,
    pub supported_control: Vec<String>,
    pub supported_features: Vec<String>,
    pub vendor_name: Vec<String>,
    pub vendor_version: Vec<String>,
}

/// Leaf payload projected from a [`ManagedUser`].
#[derive(Debug, Clone)]
pub(crate) struct UserEntry {
    pub uid: String,
    pub user_principal_name: String,
    pub uid_number: i64,
    pub mail: Option<String>,
    pub given_name: Option<String>,
    pub sn: Option<String>,
    pub cn: String,
    pub member_of: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Leaf payload projected from a [`ManagedUserGroup`].
#[derive(Debug, Clone)]
pub(crate) struct GroupEntry {
    pub uid: String,
    pub uid_number: i64,
    pub mail: Option<String>,
    pub cn: String,
    pub member_of: Vec<Uuid>,
    pub nested_groups: Vec<Uuid>,
    pub members: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) enum RecordPayload {
    RootDse(RootDseEntry),
    Domain { dc: String },
    Container { cn: String },
    User(UserEntry),
    Group(GroupEntry),
}

/// The concrete kind of a directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// The DN-less root object of the tree.
    RootDse,
    /// A domain component node.
    Domain,
    /// A structural container (`cn=users`, `cn=groups`).
    Container,
    /// A user leaf record.
    User,
    /// A group leaf record.
    Group,
}

/// Relationship edge a record field walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelationEdge {
    /// Groups the record belongs to.
    MemberOf,
    /// Groups nested inside a group.
    NestedGroup,
    /// Users member of a group.
    Member,
}

/// How a relationship target is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelationOutput {
    Dn,
    Shortname,
}

/// A relationship-backed field, resolved through the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RelationField {
    pub edge: RelationEdge,
    pub output: RelationOutput,
    pub flatten: bool,
}

/// Outcome of a static field lookup on a record.
#[derive(Debug, Clone)]
pub(crate) enum FieldLookup {
    /// The field is known and has these values.
    Values(Vec<String>),
    /// The field is known to this kind but carries no value.
    Absent,
    /// The field is known but needs store access to resolve.
    Relation(RelationField),
    /// The field is unknown to this record kind.
    Unknown,
}

fn relation(edge: RelationEdge, output: RelationOutput, flatten: bool) -> FieldLookup {
    FieldLookup::Relation(RelationField {
        edge,
        output,
        flatten,
    })
}

fn opt_value(value: &Option<String>) -> FieldLookup {
    match value {
        Some(value) => FieldLookup::Values(vec![value.clone()]),
        None => FieldLookup::Absent,
    }
}

fn timestamp(value: DateTime<Utc>) -> FieldLookup {
    FieldLookup::Values(vec![value.to_rfc3339_opts(SecondsFormat::Millis, true)])
}

/// An immutable, attribute-addressable projection of a directory entry.
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    entry_uuid: Uuid,
    payload: RecordPayload,
    parent: Option<Arc<DirectoryRecord>>,
}

impl PartialEq for DirectoryRecord {
    fn eq(&self, other: &Self) -> bool {
        self.entry_uuid == other.entry_uuid
    }
}

impl DirectoryRecord {
    pub(crate) fn new(
        entry_uuid: Uuid,
        payload: RecordPayload,
        parent: Option<Arc<DirectoryRecord>>,
    ) -> Self {
        Self {
            entry_uuid,
            payload,
            parent,
        }
    }

    pub(crate) fn from_user(user: &ManagedUser, parent: Arc<DirectoryRecord>) -> Self {
        Self::new(
            user.uuid,
            RecordPayload::User(UserEntry {
                uid: user.shortname.clone(),
                user_principal_name: user.principal_name.clone(),
                uid_number: user.numeric_id,
                mail: user.email.clone(),
                given_name: user.given_name.clone(),
                sn: user.surname.clone(),
                cn: user.full_name.clone(),
                member_of: user.member_of.clone(),
                created_at: user.created_at,
                modified_at: user.modified_at,
            }),
            Some(parent),
        )
    }

    pub(crate) fn from_group(group: &ManagedUserGroup, parent: Arc<DirectoryRecord>) -> Self {
        Self::new(
            group.uuid,
            RecordPayload::Group(GroupEntry {
                uid: group.shortname.clone(),
                uid_number: group.numeric_id,
                mail: group.email.clone(),
                cn: group.common_name.clone(),
                member_of: group.member_of.clone(),
                nested_groups: group.nested_groups.clone(),
                members: group.members.clone(),
                created_at: group.created_at,
                modified_at: group.modified_at,
            }),
            Some(parent),
        )
    }

    /// The record's entry uuid.
    #[must_use]
    pub const fn entry_uuid(&self) -> Uuid {
        self.entry_uuid
    }

    /// The record's concrete kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match &self.payload {
            RecordPayload::RootDse(_) => RecordKind::RootDse,
            RecordPayload::Domain { .. } => RecordKind::Domain,
            RecordPayload::Container { .. } => RecordKind::Container,
            RecordPayload::User(_) => RecordKind::User,
            RecordPayload::Group(_) => RecordKind::Group,
        }
    }

    /// Object classes, fixed per kind.
    #[must_use]
    pub fn object_class(&self) -> Vec<String> {
        let classes: &[&str] = match self.kind() {
            RecordKind::RootDse => &["top"],
            RecordKind::Domain => &["domain", "top"],
            RecordKind::Container => &["container", "top"],
            RecordKind::User => &["inetOrgPerson", "lodestar-user"],
            RecordKind::Group => &["lodestar-group"],
        };
        classes.iter().map(ToString::to_string).collect()
    }

    /// Whether the record advertises children.
    #[must_use]
    pub const fn has_subordinates(&self) -> &'static str {
        match self.kind() {
            RecordKind::User | RecordKind::Group => "FALSE",
            _ => "TRUE",
        }
    }

    fn dn_component(&self) -> Option<(String, String)> {
        match &self.payload {
            RecordPayload::RootDse(_) => None,
            RecordPayload::Domain { dc } => Some(("dc".to_string(), dc.clone())),
            RecordPayload::Container { cn } => Some(("cn".to_string(), cn.clone())),
            RecordPayload::User(_) | RecordPayload::Group(_) => {
                Some((DN_FIELD.to_string(), self.entry_uuid.to_string()))
            }
        }
    }

    /// The record's distinguished name.
    ///
    /// The root DSE is the one DN-less entry; the topmost domain component
    /// has no trailing comma.
    #[must_use]
    pub fn dn(&self) -> String {
        let Some((field, value)) = self.dn_component() else {
            return String::new();
        };
        match &self.parent {
            Some(parent) => {
                let parent_dn = parent.dn();
                if parent_dn.is_empty() {
                    format!("{field}={value}")
                } else {
                    format!("{field}={value},{parent_dn}")
                }
            }
            None => format!("{field}={value}"),
        }
    }

    /// Attribute names serialized when a search requests no explicit
    /// attribute list.
    ///
    /// Relationship and flattened fields are deliberately not part of the
    /// default set; they fan out into store reads and are only computed on
    /// request.
    #[must_use]
    pub fn default_attributes(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            vec!["entryUUID", "objectClass", "hasSubordinates", "dn"];
        match self.kind() {
            RecordKind::RootDse => names.extend([
                "namingContexts",
                "subschemaSubentry",
                "supportedLDAPVersion",
                "supportedSASLMechanisms",
                "supportedExtension",
                "supportedControl",
                "supportedFeatures",
                "vendorName",
                "vendorVersion",
            ]),
            RecordKind::Domain => names.push("dc"),
            RecordKind::Container => names.push("cn"),
            RecordKind::User => names.extend([
                "uid",
                "userPrincipalName",
                "uidNumber",
                "mail",
                "givenName",
                "sn",
                "cn",
                "creationDate",
                "modificationDate",
            ]),
            RecordKind::Group => names.extend([
                "uid",
                "uidNumber",
                "mail",
                "cn",
                "creationDate",
                "modificationDate",
            ]),
        }
        names
    }

    /// Case-insensitive lookup in the record's static attribute table.
    pub(crate) fn lookup_field(&self, field: &str) -> FieldLookup {
        let name = field.to_ascii_lowercase();
        match &self.payload {
            RecordPayload::RootDse(entry) => match name.as_str() {
                "namingcontexts" => FieldLookup::Values(entry.naming_contexts.clone()),
                "subschemasubentry" => FieldLookup::Values(entry.subschema_subentry.clone()),
                "supportedldapversion" => FieldLookup::Values(entry.supported_ldap_version.clone()),
                "supportedsaslmechanisms" => {
                    FieldLookup::Values(entry.supported_sasl_mechanisms.clone())
                }
                "supportedextension" => FieldLookup::Values(entry.supported_extension.clone()),
                "supportedcontrol" => FieldLookup::Values(entry.supported_control.clone()),
                "supportedfeatures" => FieldLookup::Values(entry.supported_features.clone()),
                "vendorname" => FieldLookup::Values(entry.vendor_name.clone()),
                "vendorversion" => FieldLookup::Values(entry.vendor_version.clone()),
                _ => self.lookup_base_field(&name),
            },
            RecordPayload::Domain { dc } => match name.as_str() {
                "dc" => FieldLookup::Values(vec![dc.clone()]),
                _ => self.lookup_base_field(&name),
            },
            RecordPayload::Container { cn } => match name.as_str() {
                "cn" => FieldLookup::Values(vec![cn.clone()]),
                _ => self.lookup_base_field(&name),
            },
            RecordPayload::User(entry) => match name.as_str() {
                "uid" => FieldLookup::Values(vec![entry.uid.clone()]),
                "userprincipalname" => {
                    FieldLookup::Values(vec![entry.user_principal_name.clone()])
                }
                "uidnumber" => FieldLookup::Values(vec![entry.uid_number.to_string()]),
                "mail" => opt_value(&entry.mail),
                "givenname" => opt_value(&entry.given_name),
                "sn" => opt_value(&entry.sn),
                "cn" => FieldLookup::Values(vec![entry.cn.clone()]),
                "creationdate" => timestamp(entry.created_at),
                "modificationdate" => timestamp(entry.modified_at),
                "memberofbydn" => {
                    relation(RelationEdge::MemberOf, RelationOutput::Dn, false)
                }
                "memberofbyshortname" => {
                    relation(RelationEdge::MemberOf, RelationOutput::Shortname, false)
                }
                "flattenmemberofbydn" => {
                    relation(RelationEdge::MemberOf, RelationOutput::Dn, true)
                }
                "flattenmemberofbyshortname" => {
                    relation(RelationEdge::MemberOf, RelationOutput::Shortname, true)
                }
                _ => self.lookup_base_field(&name),
            },
            RecordPayload::Group(entry) => match name.as_str() {
                "uid" => FieldLookup::Values(vec![entry.uid.clone()]),
                "uidnumber" => FieldLookup::Values(vec![entry.uid_number.to_string()]),
                "mail" => opt_value(&entry.mail),
                "cn" => FieldLookup::Values(vec![entry.cn.clone()]),
                "creationdate" => timestamp(entry.created_at),
                "modificationdate" => timestamp(entry.modified_at),
                "memberofbydn" => {
                    relation(RelationEdge::MemberOf, RelationOutput::Dn, false)
                }
                "memberofbyshortname" => {
                    relation(RelationEdge::MemberOf, RelationOutput::Shortname, false)
                }
                "nestedgroupbydn" => {
                    relation(RelationEdge::NestedGroup, RelationOutput::Dn, false)
                }
                "nestedgroupbyshortname" => {
                    relation(RelationEdge::NestedGroup, RelationOutput::Shortname, false)
                }
                "memberbydn" => relation(RelationEdge::Member, RelationOutput::Dn, false),
                "memberbyshortname" => {
                    relation(RelationEdge::Member, RelationOutput::Shortname, false)
                }
                "flattenmemberofbydn" => {
                    relation(RelationEdge::MemberOf, RelationOutput::Dn, true)
                }
                "flattenmemberofbyshortname" => {
                    relation(RelationEdge::MemberOf, RelationOutput::Shortname, true)
                }
                "flattennestedgroupbydn" => {
                    relation(RelationEdge::NestedGroup, RelationOutput::Dn, true)
                }
                "flattennestedgroupbyshortname" => {
                    relation(RelationEdge::NestedGroup, RelationOutput::Shortname, true)
                }
                "flattenmemberbydn" => {
                    relation(RelationEdge::Member, RelationOutput::Dn, true)
                }
                "flattenmemberbyshortname" => {
                    relation(RelationEdge::Member, RelationOutput::Shortname, true)
                }
                _ => self.lookup_base_field(&name),
            },
        }
    }

    fn lookup_base_field(&self, name: &str) -> FieldLookup {
        match name {
            "entryuuid" => FieldLookup::Values(vec![self.entry_uuid.to_string()]),
            "objectclass" => FieldLookup::Values(self.object_class()),
            "hassubordinates" => FieldLookup::Values(vec![self.has_subordinates().to_string()]),
            "dn" => FieldLookup::Values(vec![self.dn()]),
            // Structural nodes are timeless; the field is known, valueless.
            "creationdate" | "modificationdate" => FieldLookup::Absent,
            _ => FieldLookup::Unknown,
        }
    }

    /// Seed identifiers for a relationship edge, when the edge applies to
    /// this record kind.
    pub(crate) fn relation_seeds(&self, edge: RelationEdge) -> Option<&[Uuid]> {
        match (&self.payload, edge) {
            (RecordPayload::User(entry), RelationEdge::MemberOf) => Some(&entry.member_of),
            (RecordPayload::Group(entry), RelationEdge::MemberOf) => Some(&entry.member_of),
            (RecordPayload::Group(entry), RelationEdge::NestedGroup) => {
                Some(&entry.nested_groups)
            }
            (RecordPayload::Group(entry), RelationEdge::Member) => Some(&entry.members),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_record() -> (ManagedUser, DirectoryRecord) {
        let domain = Arc::new(DirectoryRecord::new(
            Uuid::new_v4(),
            RecordPayload::Domain {
                dc: "local".to_string(),
            },
            None,
        ));
        let container = Arc::new(DirectoryRecord::new(
            Uuid::new_v4(),
            RecordPayload::Container {
                cn: "users".to_string(),
            },
            Some(domain),
        ));
        let user =
            ManagedUser::new(1000, "alice", "alice@example.com", "alice@example.com", "Alice")
                .unwrap()
                .with_given_name("Alice");
        let record = DirectoryRecord::from_user(&user, container);
        (user, record)
    }

    #[test]
    fn leaf_dn_walks_the_parent_chain() {
        let (user, record) = user_record();
        assert_eq!(
            record.dn(),
            format!("entryUUID={},cn=users,dc=local", user.uuid)
        );
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        let (_, record) = user_record();
        assert!(matches!(
            record.lookup_field("UID"),
            FieldLookup::Values(values) if values == vec!["alice".to_string()]
        ));
        assert!(matches!(
            record.lookup_field("UserPrincipalName"),
            FieldLookup::Values(_)
        ));
    }

    #[test]
    fn absent_optionals_differ_from_unknown_fields() {
        let (_, record) = user_record();
        assert!(matches!(record.lookup_field("sn"), FieldLookup::Absent));
        assert!(matches!(
            record.lookup_field("telephoneNumber"),
            FieldLookup::Unknown
        ));
    }

    #[test]
    fn relationship_fields_defer_to_the_tree() {
        let (_, record) = user_record();
        assert!(matches!(
            record.lookup_field("flattenMemberOfByDN"),
            FieldLookup::Relation(RelationField {
                edge: RelationEdge::MemberOf,
                output: RelationOutput::Dn,
                flatten: true,
            })
        ));
        // Groups expose member fields; users do not.
        assert!(matches!(
            record.lookup_field("memberByDN"),
            FieldLookup::Unknown
        ));
    }

    #[test]
    fn base_fields_are_shared_across_kinds() {
        let (user, record) = user_record();
        assert!(matches!(
            record.lookup_field("entryUUID"),
            FieldLookup::Values(values) if values == vec![user.uuid.to_string()]
        ));
        assert!(matches!(
            record.lookup_field("objectclass"),
            FieldLookup::Values(values) if values.contains(&"inetOrgPerson".to_string())
        ));
        assert_eq!(record.has_subordinates(), "FALSE");
    }
}
