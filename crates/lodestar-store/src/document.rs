//! Opaque JSON documents and index queries.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Name of the discriminator field every stored document carries.
pub const TYPE_FIELD: &str = "type";

/// Name of the soft-deletion marker field.
pub const DELETED_FIELD: &str = "deleted";

/// Suffix appended to the discriminator of soft-deleted documents.
pub const DELETED_TYPE_SUFFIX: &str = "_deleted";

/// A stored document: identifier, revision token, and JSON body.
#[derive(Debug, Clone)]
pub struct Document {
    /// Document identifier.
    pub id: String,
    /// Revision token; `None` before the first write.
    pub revision: Option<String>,
    /// JSON body, excluding identifier and revision.
    pub body: Map<String, Value>,
}

impl Document {
    /// Creates a document with no revision.
    #[must_use]
    pub fn new(id: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            revision: None,
            body,
        }
    }

    /// Returns the discriminator field value.
    #[must_use]
    pub fn record_type(&self) -> Option<&str> {
        self.body.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// Checks the soft-deletion marker and the deleted-type suffix.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        if self
            .body
            .get(DELETED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return true;
        }
        self.record_type()
            .is_some_and(|t| t.ends_with(DELETED_TYPE_SUFFIX))
    }

    /// Returns an optional string field; `null` reads as absent.
    #[must_use]
    pub fn opt_str(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(Value::as_str)
    }

    /// Returns a mandatory string field.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::Decode`] when the field is absent or not a
    /// string.
    pub fn require_str(&self, field: &str) -> StorageResult<&str> {
        self.opt_str(field)
            .ok_or_else(|| StorageError::decode(&self.id, format!("missing field '{field}'")))
    }

    /// Returns a mandatory integer field.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::Decode`] when the field is absent or not an
    /// integer.
    pub fn require_i64(&self, field: &str) -> StorageResult<i64> {
        self.body
            .get(field)
            .and_then(Value::as_i64)
            .ok_or_else(|| StorageError::decode(&self.id, format!("missing field '{field}'")))
    }

    /// Returns a mandatory RFC 3339 timestamp field.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::Decode`] when the field is absent or does
    /// not parse.
    pub fn require_datetime(&self, field: &str) -> StorageResult<DateTime<Utc>> {
        let raw = self.require_str(field)?;
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StorageError::decode(&self.id, format!("bad timestamp '{field}': {e}")))
    }

    /// Returns an RFC 3339 timestamp field, or a fixed default when the
    /// field is absent (used by brief decodes).
    #[must_use]
    pub fn datetime_or_epoch(&self, field: &str) -> DateTime<Utc> {
        self.require_datetime(field)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Returns a list of uuid strings; an absent field reads as empty.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::Decode`] when an element is not a valid
    /// uuid.
    pub fn uuid_list(&self, field: &str) -> StorageResult<Vec<Uuid>> {
        let Some(values) = self.body.get(field).and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        values
            .iter()
            .map(|value| {
                value
                    .as_str()
                    .and_then(|raw| Uuid::parse_str(raw).ok())
                    .ok_or_else(|| {
                        StorageError::decode(&self.id, format!("bad uuid in '{field}'"))
                    })
            })
            .collect()
    }

    /// Returns a mandatory list of uuid strings.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::Decode`] when the field is absent or an
    /// element is not a valid uuid.
    pub fn require_uuid_list(&self, field: &str) -> StorageResult<Vec<Uuid>> {
        if !self.body.contains_key(field) {
            return Err(StorageError::decode(
                &self.id,
                format!("missing field '{field}'"),
            ));
        }
        self.uuid_list(field)
    }

    /// Returns a mandatory string-to-string map field.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::Decode`] when the field is absent or an
    /// entry is not a string.
    pub fn require_string_map(
        &self,
        field: &str,
    ) -> StorageResult<std::collections::HashMap<String, String>> {
        let map = self
            .body
            .get(field)
            .and_then(Value::as_object)
            .ok_or_else(|| StorageError::decode(&self.id, format!("missing field '{field}'")))?;
        map.iter()
            .map(|(key, value)| {
                value
                    .as_str()
                    .map(|v| (key.clone(), v.to_string()))
                    .ok_or_else(|| {
                        StorageError::decode(&self.id, format!("bad entry in '{field}'"))
                    })
            })
            .collect()
    }
}

/// Parameters for an index query.
#[derive(Debug, Clone, Default)]
pub struct IndexQuery {
    /// Key values to select; empty selects every row.
    pub keys: Vec<String>,
}

impl IndexQuery {
    /// Creates an unconstrained query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to a single key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }
}
