//! Persistent numeric-id allocation.
//!
//! Counters live in the store as `$counter/<name>` documents of type
//! `counter` holding the next value to hand out. Allocation reads the
//! document, writes the successor with the read revision, and returns the
//! read value; losing an optimistic race just retries with fresh state.

use std::sync::Arc;

use serde_json::{json, Map};

use crate::document::Document;
use crate::error::{StorageError, StorageResult};
use crate::store::RecordStore;

const NEXT_FIELD: &str = "next";
const MAX_ATTEMPTS: usize = 10;

/// Sequential id allocator backed by a store document.
pub struct PersistentCounter {
    store: Arc<dyn RecordStore>,
    document_id: String,
    initial_value: i64,
}

impl PersistentCounter {
    /// Creates a counter named `name`, starting at `initial_value`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, name: &str, initial_value: i64) -> Self {
        Self {
            store,
            document_id: format!("$counter/{name}"),
            initial_value,
        }
    }

    fn document(&self, next: i64) -> Document {
        let mut body = Map::new();
        body.insert("type".to_string(), json!("counter"));
        body.insert(NEXT_FIELD.to_string(), json!(next));
        Document::new(self.document_id.clone(), body)
    }

    /// Allocates the next value.
    ///
    /// Creates the counter document on first use. Retries a bounded number
    /// of times when racing allocators collide.
    ///
    /// ## Errors
    ///
    /// Propagates store errors; reports contention as
    /// [`StorageError::Internal`] once the retry budget is exhausted.
    pub async fn next_value(&self) -> StorageResult<i64> {
        for _ in 0..MAX_ATTEMPTS {
            match self.store.get(&self.document_id).await {
                Ok(document) => {
                    let value = document.require_i64(NEXT_FIELD)?;
                    let revision = document.revision.clone().ok_or_else(|| {
                        StorageError::Internal(format!(
                            "counter {} has no revision",
                            self.document_id
                        ))
                    })?;
                    match self
                        .store
                        .update(&self.document_id, &revision, self.document(value + 1))
                        .await
                    {
                        Ok(_) => return Ok(value),
                        Err(error) if error.is_stale_revision() => {
                            tracing::debug!(counter = %self.document_id, "lost allocation race, retrying");
                        }
                        Err(error) => return Err(error),
                    }
                }
                Err(error) if error.is_not_found() => {
                    match self
                        .store
                        .create(self.document(self.initial_value + 1))
                        .await
                    {
                        Ok(_) => return Ok(self.initial_value),
                        Err(error) if error.is_conflict() => {
                            tracing::debug!(counter = %self.document_id, "lost creation race, retrying");
                        }
                        Err(error) => return Err(error),
                    }
                }
                Err(error) => return Err(error),
            }
        }
        Err(StorageError::Internal(format!(
            "counter {} contention exceeded {MAX_ATTEMPTS} attempts",
            self.document_id
        )))
    }
}
