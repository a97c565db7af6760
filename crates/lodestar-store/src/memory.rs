//! In-memory store implementation.
//!
//! Backs unit and integration tests, and single-process deployments that
//! do not need durability. Revision tokens follow the backing store's
//! `<sequence>-<opaque>` shape so token handling is exercised the same way
//! everywhere.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::document::{Document, IndexQuery};
use crate::error::{StorageError, StorageResult};
use crate::store::{index, RecordStore};

struct Entry {
    sequence: u64,
    revision: String,
    body: serde_json::Map<String, serde_json::Value>,
}

struct IndexSpec {
    record_type: &'static str,
    key_field: Option<&'static str>,
}

fn index_spec(name: &str) -> Option<IndexSpec> {
    match name {
        index::ALL_USERS => Some(IndexSpec {
            record_type: "user",
            key_field: None,
        }),
        index::ALL_USERGROUPS => Some(IndexSpec {
            record_type: "usergroup",
            key_field: None,
        }),
        index::USER_BY_SHORTNAME => Some(IndexSpec {
            record_type: "user",
            key_field: Some("shortname"),
        }),
        index::USER_BY_PRINCIPAL_NAME => Some(IndexSpec {
            record_type: "user",
            key_field: Some("principalName"),
        }),
        index::USERGROUP_BY_SHORTNAME => Some(IndexSpec {
            record_type: "usergroup",
            key_field: Some("shortname"),
        }),
        _ => None,
    }
}

fn next_revision(sequence: u64) -> String {
    format!("{sequence}-{}", Uuid::new_v4().simple())
}

/// Thread-safe in-memory [`RecordStore`].
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, id: &str) -> StorageResult<Document> {
        let documents = self.documents.read();
        let entry = documents.get(id).ok_or_else(|| StorageError::not_found(id))?;
        Ok(Document {
            id: id.to_string(),
            revision: Some(entry.revision.clone()),
            body: entry.body.clone(),
        })
    }

    async fn create(&self, document: Document) -> StorageResult<(String, String)> {
        let mut documents = self.documents.write();
        if documents.contains_key(&document.id) {
            return Err(StorageError::conflict(&document.id));
        }
        let revision = next_revision(1);
        documents.insert(
            document.id.clone(),
            Entry {
                sequence: 1,
                revision: revision.clone(),
                body: document.body,
            },
        );
        tracing::debug!(id = %document.id, "created document");
        Ok((document.id, revision))
    }

    async fn update(&self, id: &str, revision: &str, document: Document) -> StorageResult<String> {
        let mut documents = self.documents.write();
        let entry = documents
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(id))?;
        if entry.revision != revision {
            return Err(StorageError::stale_revision(id));
        }
        entry.sequence += 1;
        entry.revision = next_revision(entry.sequence);
        entry.body = document.body;
        tracing::debug!(id = %id, revision = %entry.revision, "updated document");
        Ok(entry.revision.clone())
    }

    async fn list_by_index(&self, name: &str, query: &IndexQuery) -> StorageResult<Vec<Document>> {
        let spec = index_spec(name).ok_or_else(|| StorageError::unknown_index(name))?;
        let documents = self.documents.read();

        let mut rows: Vec<Document> = documents
            .iter()
            .map(|(id, entry)| Document {
                id: id.clone(),
                revision: Some(entry.revision.clone()),
                body: entry.body.clone(),
            })
            .filter(|document| {
                document.record_type() == Some(spec.record_type) && !document.is_deleted()
            })
            .filter(|document| match spec.key_field {
                Some(field) if !query.keys.is_empty() => document
                    .opt_str(field)
                    .is_some_and(|value| query.keys.iter().any(|key| key == value)),
                _ => true,
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }
}
