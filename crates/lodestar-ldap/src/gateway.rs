//! The LDAP bridge gateway.
//!
//! The protocol bridge decodes LDAP PDUs into JSON requests and calls
//! these entry points; the gateway owns everything from there — candidate
//! resolution, filter evaluation, attribute serialization, and simple-bind
//! verdicts. It never touches a transport.

use std::collections::BTreeMap;

use lodestar_model::{ManagedUser, Representation};
use lodestar_store::RecordProvider;
use serde::{Deserialize, Serialize};

use crate::error::{LdapError, LdapResult};
use crate::filter::{FilterEngine, FilterNode};
use crate::record::{DirectoryRecord, DN_FIELD};
use crate::tree::{rdn_components, DirectoryTree, SearchScope};

/// A decoded simple-bind request.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    /// Authentication choice.
    pub authentication: Option<AuthScheme>,
    /// Bind name: a user DN or a login.
    pub name: Option<String>,
    /// LDAP protocol version.
    pub version: Option<i32>,
}

/// The authentication choice of a bind request.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthScheme {
    /// Cleartext password of a simple bind.
    pub simple: Option<String>,
}

/// Bind verdict returned to the bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthVerdict {
    /// Whether the bind succeeded.
    pub is_authenticated: bool,
    /// Optional diagnostic, kept generic to avoid user enumeration.
    pub message: Option<String>,
}

impl AuthVerdict {
    fn denied() -> Self {
        Self {
            is_authenticated: false,
            message: Some("authentication failed".to_string()),
        }
    }

    fn granted() -> Self {
        Self {
            is_authenticated: true,
            message: None,
        }
    }
}

/// A decoded search request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Filter tree; absent means "match everything under the base".
    pub filter: Option<FilterNode>,
    /// Base object DN.
    pub base_object: String,
    /// Wire scope value; absent defaults to base.
    pub scope: Option<i32>,
    /// Attributes to serialize; absent defaults to each record's static
    /// attribute set.
    pub attributes: Option<Vec<String>>,
}

/// One serialized search result entry.
#[derive(Debug, Clone, Serialize)]
pub struct SearchEntry {
    /// The entry's distinguished name.
    pub dn: String,
    /// Requested attributes that resolved to values.
    pub attributes: BTreeMap<String, Vec<String>>,
}

/// The bridge-facing API over one directory tree.
pub struct LdapGateway {
    tree: DirectoryTree,
}

impl LdapGateway {
    /// Creates a gateway for the given base DN.
    ///
    /// ## Errors
    ///
    /// Returns [`LdapError::InvalidDn`] when the base DN is malformed.
    pub fn new(provider: RecordProvider, base_dn: &str) -> LdapResult<Self> {
        Ok(Self {
            tree: DirectoryTree::new(provider, base_dn)?,
        })
    }

    /// The gateway's directory tree.
    #[must_use]
    pub const fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    /// Answers a search request.
    ///
    /// ## Errors
    ///
    /// Propagates scope, base-object, filter, and storage errors; a
    /// failing filter aborts the whole query.
    pub async fn search(&self, request: &SearchRequest) -> LdapResult<Vec<SearchEntry>> {
        let scope = SearchScope::from_wire(request.scope.unwrap_or(0))?;
        let candidates = self.tree.records_under(&request.base_object, scope).await?;

        let matched = match &request.filter {
            Some(node) => {
                let filter = node.clone().into_filter()?;
                FilterEngine::new(&self.tree)
                    .evaluate(&filter, &candidates)
                    .await?
            }
            None => candidates,
        };

        tracing::debug!(
            base = %request.base_object,
            results = matched.len(),
            "answering search"
        );

        let mut entries = Vec::with_capacity(matched.len());
        for record in &matched {
            entries.push(self.serialize(record, request.attributes.as_deref()).await?);
        }
        Ok(entries)
    }

    async fn serialize(
        &self,
        record: &DirectoryRecord,
        attributes: Option<&[String]>,
    ) -> LdapResult<SearchEntry> {
        let requested: Vec<String> = match attributes {
            Some(names) if !names.is_empty() => names.to_vec(),
            _ => record
                .default_attributes()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        };

        let mut resolved = BTreeMap::new();
        for name in requested {
            if let Some(values) = self.tree.values_for_field(record, &name).await? {
                resolved.insert(name, values);
            }
        }
        Ok(SearchEntry {
            dn: record.dn(),
            attributes: resolved,
        })
    }

    /// Answers a simple-bind request.
    ///
    /// Missing names, unknown users, malformed bind DNs, absent or wrong
    /// credentials all yield the same denied verdict; only infrastructure
    /// failures surface as errors.
    ///
    /// ## Errors
    ///
    /// Propagates storage failures other than not-found.
    pub async fn authenticate(&self, request: &AuthRequest) -> LdapResult<AuthVerdict> {
        let Some(name) = request.name.as_deref() else {
            return Ok(AuthVerdict::denied());
        };
        let Some(simple) = request
            .authentication
            .as_ref()
            .and_then(|scheme| scheme.simple.as_deref())
        else {
            return Ok(AuthVerdict::denied());
        };

        let user = match self.user_for_name(name).await {
            Ok(Some(user)) => user,
            Ok(None) => return Ok(AuthVerdict::denied()),
            Err(
                LdapError::InvalidDn(_)
                | LdapError::DnFieldNotSupported { .. }
                | LdapError::Storage(lodestar_store::StorageError::NotFound { .. }),
            ) => return Ok(AuthVerdict::denied()),
            Err(error) => return Err(error),
        };

        match user.verify_password(simple) {
            Ok(true) => Ok(AuthVerdict::granted()),
            Ok(false) => Ok(AuthVerdict::denied()),
            Err(error) => {
                tracing::debug!(user = %user.uuid, %error, "bind rejected");
                Ok(AuthVerdict::denied())
            }
        }
    }

    /// Resolves a bind name to a full user record.
    ///
    /// A name ending in the user container's DN is treated as a user DN
    /// keyed by `entryUUID`; anything else is a login — principal name
    /// when it contains `@`, shortname otherwise.
    async fn user_for_name(&self, name: &str) -> LdapResult<Option<ManagedUser>> {
        let suffix = format!(",{}", self.tree.user_container_dn()).to_ascii_lowercase();
        if name.to_ascii_lowercase().ends_with(&suffix) {
            let rdn = &name[..name.len() - suffix.len()];
            let components = rdn_components(rdn)?;
            if components.len() != 1 {
                return Err(LdapError::InvalidDn(name.to_string()));
            }
            let (field, value) = &components[0];
            if !field.eq_ignore_ascii_case(DN_FIELD) {
                return Err(LdapError::DnFieldNotSupported {
                    field: field.clone(),
                });
            }
            let uuid = uuid::Uuid::parse_str(value)
                .map_err(|_| LdapError::InvalidDn(name.to_string()))?;
            return Ok(Some(
                self.tree
                    .provider()
                    .get(uuid, Representation::Full)
                    .await?,
            ));
        }

        let Some(brief) = self.tree.provider().find_user_by_login(name).await? else {
            return Ok(None);
        };
        Ok(Some(
            self.tree
                .provider()
                .get(brief.uuid, Representation::Full)
                .await?,
        ))
    }
}
