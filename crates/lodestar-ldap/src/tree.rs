//! The directory tree projection.
//!
//! Built per request over a [`RecordProvider`] snapshot, the tree pins the
//! fixed topology (root DSE → domain chain → `cn=users`/`cn=groups`
//! containers) and projects stored users and groups as leaf records under
//! their containers. Structural nodes carry well-known uuids so repeated
//! builds stay comparable across requests.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lodestar_model::{ManagedUser, ManagedUserGroup, Representation};
use lodestar_store::{index, RecordProvider};
use uuid::Uuid;

use crate::error::{LdapError, LdapResult};
use crate::record::{
    DirectoryRecord, FieldLookup, RecordPayload, RelationEdge, RelationField, RelationOutput,
    RootDseEntry, DN_FIELD,
};

/// Entry uuid of the root DSE.
pub const ROOT_DSE_UUID: Uuid = Uuid::nil();

const USER_CONTAINER_UUID: &str = "20000000-0000-0000-0000-000000000001";
const GROUP_CONTAINER_UUID: &str = "20000000-0000-0000-0000-000000000002";

/// Search scope of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Only the addressed record.
    Base,
    /// The addressed record's immediate children.
    OneLevel,
}

impl SearchScope {
    /// Decodes the wire scope value.
    ///
    /// ## Errors
    ///
    /// Returns [`LdapError::UnsupportedScope`] for anything but `0`
    /// (base) and `1` (one-level); deeper scopes are rejected rather than
    /// silently misreported.
    pub const fn from_wire(scope: i32) -> LdapResult<Self> {
        match scope {
            0 => Ok(Self::Base),
            1 => Ok(Self::OneLevel),
            other => Err(LdapError::UnsupportedScope { scope: other }),
        }
    }
}

/// Splits a DN into `(attribute, value)` components.
///
/// Lodestar DN values are uuids and container names, so no RFC 4514
/// escaping is involved; components that do not contain `=` are reported
/// as invalid.
pub(crate) fn rdn_components(dn: &str) -> LdapResult<Vec<(String, String)>> {
    dn.split(',')
        .map(|component| {
            component
                .split_once('=')
                .map(|(attribute, value)| {
                    (attribute.trim().to_string(), value.trim().to_string())
                })
                .ok_or_else(|| LdapError::InvalidDn(dn.to_string()))
        })
        .collect()
}

/// The per-request directory tree.
pub struct DirectoryTree {
    provider: RecordProvider,
    root_dse: Arc<DirectoryRecord>,
    domain: Arc<DirectoryRecord>,
    user_container: Arc<DirectoryRecord>,
    group_container: Arc<DirectoryRecord>,
}

impl DirectoryTree {
    /// Builds the fixed topology for a base DN such as
    /// `dc=lodestar,dc=local`.
    ///
    /// ## Errors
    ///
    /// Returns [`LdapError::InvalidDn`] when the base DN is empty or has
    /// non-`dc` components.
    pub fn new(provider: RecordProvider, base_dn: &str) -> LdapResult<Self> {
        let components = rdn_components(base_dn)?;
        if components.is_empty() {
            return Err(LdapError::InvalidDn(base_dn.to_string()));
        }

        let root_dse = Arc::new(DirectoryRecord::new(
            ROOT_DSE_UUID,
            RecordPayload::RootDse(RootDseEntry {
                naming_contexts: vec![base_dn.to_string()],
                subschema_subentry: vec!["cn=schema".to_string()],
                supported_ldap_version: vec!["3".to_string()],
                supported_sasl_mechanisms: Vec::new(),
                supported_extension: Vec::new(),
                supported_control: Vec::new(),
                supported_features: Vec::new(),
                vendor_name: vec!["Lodestar".to_string()],
                vendor_version: vec!["1".to_string()],
            }),
            None,
        ));

        // Domain components chain from the rightmost (topmost) down.
        let mut domain: Option<Arc<DirectoryRecord>> = None;
        for (position, (attribute, value)) in components.iter().rev().enumerate() {
            if !attribute.eq_ignore_ascii_case("dc") {
                return Err(LdapError::InvalidDn(base_dn.to_string()));
            }
            let uuid = format!("10000000-0000-0000-0000-{position:012}");
            domain = Some(Arc::new(DirectoryRecord::new(
                Uuid::parse_str(&uuid).expect("domain uuids are well-formed"),
                RecordPayload::Domain { dc: value.clone() },
                domain,
            )));
        }
        let domain = domain.expect("at least one domain component");

        let user_container = Arc::new(DirectoryRecord::new(
            Uuid::parse_str(USER_CONTAINER_UUID).expect("container uuids are well-formed"),
            RecordPayload::Container {
                cn: "users".to_string(),
            },
            Some(Arc::clone(&domain)),
        ));
        let group_container = Arc::new(DirectoryRecord::new(
            Uuid::parse_str(GROUP_CONTAINER_UUID).expect("container uuids are well-formed"),
            RecordPayload::Container {
                cn: "groups".to_string(),
            },
            Some(Arc::clone(&domain)),
        ));

        Ok(Self {
            provider,
            root_dse,
            domain,
            user_container,
            group_container,
        })
    }

    /// The configured base DN.
    #[must_use]
    pub fn base_dn(&self) -> String {
        self.domain.dn()
    }

    /// The provider the tree resolves records through.
    #[must_use]
    pub const fn provider(&self) -> &RecordProvider {
        &self.provider
    }

    /// The user container's DN.
    #[must_use]
    pub fn user_container_dn(&self) -> String {
        self.user_container.dn()
    }

    /// The group container's DN.
    #[must_use]
    pub fn group_container_dn(&self) -> String {
        self.group_container.dn()
    }

    /// DN of a user leaf with the given uuid.
    #[must_use]
    pub fn user_dn(&self, uuid: Uuid) -> String {
        format!("{DN_FIELD}={uuid},{}", self.user_container_dn())
    }

    /// DN of a group leaf with the given uuid.
    #[must_use]
    pub fn group_dn(&self, uuid: Uuid) -> String {
        format!("{DN_FIELD}={uuid},{}", self.group_container_dn())
    }

    /// Projects a user snapshot as a leaf record.
    #[must_use]
    pub fn user_record(&self, user: &ManagedUser) -> DirectoryRecord {
        DirectoryRecord::from_user(user, Arc::clone(&self.user_container))
    }

    /// Projects a group snapshot as a leaf record.
    #[must_use]
    pub fn group_record(&self, group: &ManagedUserGroup) -> DirectoryRecord {
        DirectoryRecord::from_group(group, Arc::clone(&self.group_container))
    }

    /// Resolves a base object and scope to candidate records.
    ///
    /// `Base` addresses the named record itself; `OneLevel` its immediate
    /// children. Leaf records have no children, so `OneLevel` under a leaf
    /// is empty.
    ///
    /// ## Errors
    ///
    /// Returns [`LdapError::UnknownBaseObject`] when the base names
    /// nothing in the tree, [`LdapError::UnsupportedScope`] for scope
    /// combinations the tree does not answer, and DN errors for malformed
    /// leaf bases.
    pub async fn records_under(
        &self,
        base_object: &str,
        scope: SearchScope,
    ) -> LdapResult<Vec<DirectoryRecord>> {
        let base = base_object.trim();

        if base.is_empty() {
            return match scope {
                SearchScope::Base => Ok(vec![self.root_dse.as_ref().clone()]),
                SearchScope::OneLevel => Err(LdapError::UnsupportedScope { scope: 1 }),
            };
        }

        if base.eq_ignore_ascii_case(&self.base_dn()) {
            return match scope {
                SearchScope::Base => Ok(vec![self.domain.as_ref().clone()]),
                SearchScope::OneLevel => Ok(vec![
                    self.user_container.as_ref().clone(),
                    self.group_container.as_ref().clone(),
                ]),
            };
        }

        if base.eq_ignore_ascii_case(&self.user_container_dn()) {
            return match scope {
                SearchScope::Base => Ok(vec![self.user_container.as_ref().clone()]),
                SearchScope::OneLevel => {
                    let users: Vec<ManagedUser> =
                        self.provider.list_full(index::ALL_USERS).await?;
                    Ok(users.iter().map(|user| self.user_record(user)).collect())
                }
            };
        }

        if base.eq_ignore_ascii_case(&self.group_container_dn()) {
            return match scope {
                SearchScope::Base => Ok(vec![self.group_container.as_ref().clone()]),
                SearchScope::OneLevel => {
                    let groups: Vec<ManagedUserGroup> =
                        self.provider.list_full(index::ALL_USERGROUPS).await?;
                    Ok(groups
                        .iter()
                        .map(|group| self.group_record(group))
                        .collect())
                }
            };
        }

        if let Some(uuid) = self.leaf_uuid(base, &self.user_container_dn())? {
            let user: ManagedUser = self.provider.get(uuid, Representation::Full).await?;
            return match scope {
                SearchScope::Base => Ok(vec![self.user_record(&user)]),
                SearchScope::OneLevel => Ok(Vec::new()),
            };
        }
        if let Some(uuid) = self.leaf_uuid(base, &self.group_container_dn())? {
            let group: ManagedUserGroup = self.provider.get(uuid, Representation::Full).await?;
            return match scope {
                SearchScope::Base => Ok(vec![self.group_record(&group)]),
                SearchScope::OneLevel => Ok(Vec::new()),
            };
        }

        Err(LdapError::UnknownBaseObject {
            base: base.to_string(),
        })
    }

    /// Parses `<field>=<uuid>,<container dn>` when `dn` sits directly
    /// under the given container.
    fn leaf_uuid(&self, dn: &str, container_dn: &str) -> LdapResult<Option<Uuid>> {
        let suffix = format!(",{container_dn}").to_ascii_lowercase();
        let lowered = dn.to_ascii_lowercase();
        let Some(prefix_len) = lowered.strip_suffix(&suffix).map(str::len) else {
            return Ok(None);
        };
        let rdn = &dn[..prefix_len];
        if rdn.contains(',') {
            return Err(LdapError::InvalidDn(dn.to_string()));
        }
        let components = rdn_components(rdn)?;
        let (field, value) = &components[0];
        if !field.eq_ignore_ascii_case(DN_FIELD) {
            // Lookup by alternate DN fields is not supported.
            return Err(LdapError::DnFieldNotSupported {
                field: field.clone(),
            });
        }
        Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| LdapError::InvalidDn(dn.to_string()))
    }

    /// Resolves a field on a record, case-insensitively.
    ///
    /// `Ok(None)` means the field is unknown to the record kind or the
    /// optional attribute carries no value; filters treat both as a
    /// non-match.
    ///
    /// ## Errors
    ///
    /// Propagates store failures and reports membership cycles as
    /// [`LdapError::InconsistentData`].
    pub async fn values_for_field(
        &self,
        record: &DirectoryRecord,
        field: &str,
    ) -> LdapResult<Option<Vec<String>>> {
        match record.lookup_field(field) {
            FieldLookup::Values(values) => Ok(Some(values)),
            FieldLookup::Absent | FieldLookup::Unknown => Ok(None),
            FieldLookup::Relation(relation) => self.resolve_relation(record, relation).await,
        }
    }

    async fn resolve_relation(
        &self,
        record: &DirectoryRecord,
        relation: RelationField,
    ) -> LdapResult<Option<Vec<String>>> {
        let Some(seeds) = record.relation_seeds(relation.edge) else {
            return Ok(None);
        };

        let values = if relation.flatten {
            match relation.edge {
                RelationEdge::MemberOf | RelationEdge::NestedGroup => {
                    let groups = self
                        .walk_groups(record.entry_uuid(), seeds, relation.edge)
                        .await?;
                    groups
                        .iter()
                        .map(|group| self.render_group(group, relation.output))
                        .collect()
                }
                RelationEdge::Member => self.flatten_members(record, relation.output).await?,
            }
        } else {
            match relation.edge {
                RelationEdge::Member => {
                    let users = self.load_users(seeds).await;
                    users
                        .iter()
                        .map(|user| self.render_user(user, relation.output))
                        .collect()
                }
                _ => {
                    let groups = self.load_groups_brief(seeds).await;
                    groups
                        .iter()
                        .map(|group| self.render_group_brief(group, relation.output))
                        .collect()
                }
            }
        };
        Ok(Some(values))
    }

    fn render_group(&self, group: &ManagedUserGroup, output: RelationOutput) -> String {
        match output {
            RelationOutput::Dn => self.group_dn(group.uuid),
            RelationOutput::Shortname => group.shortname.clone(),
        }
    }

    fn render_group_brief(&self, group: &ManagedUserGroup, output: RelationOutput) -> String {
        self.render_group(group, output)
    }

    fn render_user(&self, user: &ManagedUser, output: RelationOutput) -> String {
        match output {
            RelationOutput::Dn => self.user_dn(user.uuid),
            RelationOutput::Shortname => user.shortname.clone(),
        }
    }

    async fn load_users(&self, ids: &[Uuid]) -> Vec<ManagedUser> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            match self.provider.get(*id, Representation::Brief).await {
                Ok(user) => users.push(user),
                Err(error) => {
                    tracing::warn!(uuid = %id, %error, "skipping unresolvable member");
                }
            }
        }
        users
    }

    async fn load_groups_brief(&self, ids: &[Uuid]) -> Vec<ManagedUserGroup> {
        let mut groups = Vec::with_capacity(ids.len());
        for id in ids {
            match self.provider.get(*id, Representation::Brief).await {
                Ok(group) => groups.push(group),
                Err(error) => {
                    tracing::warn!(uuid = %id, %error, "skipping unresolvable group");
                }
            }
        }
        groups
    }

    /// Walks the group graph transitively along one edge, re-resolving
    /// each hop through the store.
    ///
    /// A visited set bounds the walk; re-encountering the starting record
    /// means the graph contains it inside its own closure and is reported
    /// as inconsistent. Diamond-shaped sharing is traversed once per node.
    async fn walk_groups(
        &self,
        start: Uuid,
        seeds: &[Uuid],
        edge: RelationEdge,
    ) -> LdapResult<Vec<ManagedUserGroup>> {
        let mut queue: VecDeque<Uuid> = seeds.iter().copied().collect();
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut collected = Vec::new();

        while let Some(id) = queue.pop_front() {
            if id == start {
                return Err(LdapError::InconsistentData(format!(
                    "record {start} is contained in its own membership closure"
                )));
            }
            if !visited.insert(id) {
                continue;
            }
            let group: ManagedUserGroup =
                match self.provider.get(id, Representation::Full).await {
                    Ok(group) => group,
                    Err(error) if error.is_not_found() => {
                        tracing::warn!(uuid = %id, "skipping dangling group reference");
                        continue;
                    }
                    Err(error) => return Err(error.into()),
                };
            let next = match edge {
                RelationEdge::MemberOf => &group.member_of,
                RelationEdge::NestedGroup => &group.nested_groups,
                RelationEdge::Member => unreachable!("member edges never walk group graphs"),
            };
            queue.extend(next.iter().copied());
            collected.push(group);
        }
        Ok(collected)
    }

    /// Transitive members of a group: its direct members plus the members
    /// of every group in its nested closure.
    async fn flatten_members(
        &self,
        record: &DirectoryRecord,
        output: RelationOutput,
    ) -> LdapResult<Vec<String>> {
        let direct = record
            .relation_seeds(RelationEdge::Member)
            .unwrap_or_default();
        let nested_seeds = record
            .relation_seeds(RelationEdge::NestedGroup)
            .unwrap_or_default();
        let nested = self
            .walk_groups(record.entry_uuid(), nested_seeds, RelationEdge::NestedGroup)
            .await?;

        let mut member_ids: Vec<Uuid> = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::new();
        for id in direct.iter().chain(nested.iter().flat_map(|g| g.members.iter())) {
            if seen.insert(*id) {
                member_ids.push(*id);
            }
        }

        let users = self.load_users(&member_ids).await;
        Ok(users
            .iter()
            .map(|user| self.render_user(user, output))
            .collect())
    }

    /// Orders a record's field against a literal value.
    ///
    /// Defined for `uidNumber` (numeric), `creationDate` /
    /// `modificationDate` (RFC 3339), and `entryUUID` / `uid`
    /// (case-insensitive lexicographic).
    ///
    /// ## Errors
    ///
    /// Returns [`LdapError::UnsupportedComparison`] for any other field,
    /// for kinds that lack the field, and for unparseable literals.
    pub fn compare(
        &self,
        record: &DirectoryRecord,
        field: &str,
        value: &str,
    ) -> LdapResult<Ordering> {
        let unsupported = || LdapError::UnsupportedComparison {
            field: field.to_string(),
        };
        match field.to_ascii_lowercase().as_str() {
            "uidnumber" => {
                let FieldLookup::Values(values) = record.lookup_field("uidnumber") else {
                    return Err(unsupported());
                };
                let own: i64 = values[0].parse().map_err(|_| unsupported())?;
                let literal: i64 = value.parse().map_err(|_| unsupported())?;
                Ok(own.cmp(&literal))
            }
            "creationdate" | "modificationdate" => {
                let FieldLookup::Values(values) = record.lookup_field(field) else {
                    return Err(unsupported());
                };
                let own = DateTime::parse_from_rfc3339(&values[0])
                    .map_err(|_| unsupported())?
                    .with_timezone(&Utc);
                let literal = DateTime::parse_from_rfc3339(value)
                    .map_err(|_| unsupported())?
                    .with_timezone(&Utc);
                Ok(own.cmp(&literal))
            }
            "entryuuid" | "uid" => {
                let FieldLookup::Values(values) = record.lookup_field(field) else {
                    return Err(unsupported());
                };
                Ok(values[0]
                    .to_ascii_lowercase()
                    .cmp(&value.to_ascii_lowercase()))
            }
            _ => Err(unsupported()),
        }
    }
}
