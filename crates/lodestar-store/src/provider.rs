//! Typed record access over a [`RecordStore`].

use std::sync::Arc;

use futures::future::join_all;
use lodestar_model::{ManagedUser, Representation};
use uuid::Uuid;

use crate::codec::StoredRecord;
use crate::document::{IndexQuery, DELETED_FIELD, DELETED_TYPE_SUFFIX, TYPE_FIELD};
use crate::error::{StorageError, StorageResult};
use crate::store::{index, RecordStore};

/// Typed CRUD over domain records.
///
/// Wraps the document contract with discriminator/soft-deletion checks,
/// representation-aware decoding, and the brief-write guard.
#[derive(Clone)]
pub struct RecordProvider {
    store: Arc<dyn RecordStore>,
}

impl RecordProvider {
    /// Creates a provider over a store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// Loads a record by identifier.
    ///
    /// A document whose discriminator does not match `T`, or whose
    /// deletion marker is set, reads as [`StorageError::NotFound`].
    ///
    /// ## Errors
    ///
    /// Propagates store and decode errors.
    pub async fn get<T: StoredRecord>(
        &self,
        uuid: Uuid,
        representation: Representation,
    ) -> StorageResult<T> {
        let id = uuid.to_string();
        let document = self.store.get(&id).await?;
        if document.record_type() != Some(T::RECORD_TYPE) || document.is_deleted() {
            return Err(StorageError::not_found(id));
        }
        T::decode(&document, representation)
    }

    /// Inserts a new record and stores its first revision token on it.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::Conflict`] when the identifier is taken
    /// and [`StorageError::BriefWrite`] for brief representations.
    pub async fn insert<T: StoredRecord>(&self, record: &mut T) -> StorageResult<()> {
        let document = record.encode()?;
        let (_, revision) = self.store.create(document).await?;
        record.set_revision(revision);
        tracing::info!(uuid = %record.uuid(), record_type = T::RECORD_TYPE, "inserted record");
        Ok(())
    }

    /// Persists changes to an existing record, presenting its revision
    /// token, and stores the new token on it.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::StaleRevision`] when another write won the
    /// race, and [`StorageError::BriefWrite`] for brief representations.
    pub async fn update<T: StoredRecord>(&self, record: &mut T) -> StorageResult<()> {
        let id = record.uuid().to_string();
        let Some(revision) = record.revision().map(ToString::to_string) else {
            return Err(StorageError::stale_revision(id));
        };
        record.touch();
        let document = record.encode()?;
        let new_revision = self.store.update(&id, &revision, document).await?;
        record.set_revision(new_revision);
        tracing::info!(uuid = %record.uuid(), record_type = T::RECORD_TYPE, "updated record");
        Ok(())
    }

    /// Soft-deletes a record: rewrites the discriminator to
    /// `<type>_deleted` and sets the deletion marker.
    ///
    /// ## Errors
    ///
    /// Returns [`StorageError::NotFound`] when absent or already deleted.
    pub async fn delete<T: StoredRecord>(&self, uuid: Uuid) -> StorageResult<()> {
        let id = uuid.to_string();
        let mut document = self.store.get(&id).await?;
        if document.record_type() != Some(T::RECORD_TYPE) || document.is_deleted() {
            return Err(StorageError::not_found(id));
        }
        let revision = document
            .revision
            .clone()
            .ok_or_else(|| StorageError::Internal(format!("document {id} has no revision")))?;

        document.body.insert(
            TYPE_FIELD.to_string(),
            serde_json::json!(format!("{}{}", T::RECORD_TYPE, DELETED_TYPE_SUFFIX)),
        );
        document
            .body
            .insert(DELETED_FIELD.to_string(), serde_json::json!(true));
        self.store.update(&id, &revision, document).await?;
        tracing::info!(uuid = %uuid, record_type = T::RECORD_TYPE, "soft-deleted record");
        Ok(())
    }

    /// Lists every live record of a type in brief representation.
    ///
    /// ## Errors
    ///
    /// Propagates store and decode errors.
    pub async fn list<T: StoredRecord>(&self, index: &str) -> StorageResult<Vec<T>> {
        let documents = self.store.list_by_index(index, &IndexQuery::new()).await?;
        documents
            .iter()
            .map(|document| T::decode(document, Representation::Brief))
            .collect()
    }

    /// Lists every live record of a type in full representation, for
    /// callers that need relationship lists or credentials.
    ///
    /// ## Errors
    ///
    /// Propagates store and decode errors.
    pub async fn list_full<T: StoredRecord>(&self, index: &str) -> StorageResult<Vec<T>> {
        let documents = self.store.list_by_index(index, &IndexQuery::new()).await?;
        documents
            .iter()
            .map(|document| T::decode(document, Representation::Full))
            .collect()
    }

    /// Finds a user by login: principal name when the login contains `@`,
    /// shortname otherwise. Anything but exactly one match reads as no
    /// match.
    ///
    /// ## Errors
    ///
    /// Propagates store and decode errors.
    pub async fn find_user_by_login(&self, login: &str) -> StorageResult<Option<ManagedUser>> {
        let index_name = if login.contains('@') {
            index::USER_BY_PRINCIPAL_NAME
        } else {
            index::USER_BY_SHORTNAME
        };
        let rows = self
            .store
            .list_by_index(index_name, &IndexQuery::new().with_key(login))
            .await?;
        if rows.len() != 1 {
            return Ok(None);
        }
        Ok(Some(ManagedUser::decode(
            &rows[0],
            Representation::Brief,
        )?))
    }

    /// Filters a candidate identifier list down to records that resolve
    /// as live documents of type `T`. Unresolvable identifiers are
    /// dropped, not reported.
    pub async fn resolve_ids<T: StoredRecord>(&self, ids: &[Uuid]) -> Vec<Uuid> {
        let checks = ids.iter().map(|id| async move {
            match self.get::<T>(*id, Representation::Brief).await {
                Ok(_) => Some(*id),
                Err(error) => {
                    tracing::warn!(uuid = %id, %error, "dropping unresolvable identifier");
                    None
                }
            }
        });
        join_all(checks).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use lodestar_model::ManagedUserGroup;

    fn provider() -> RecordProvider {
        RecordProvider::new(Arc::new(MemoryStore::new()))
    }

    fn user(shortname: &str) -> ManagedUser {
        let mailbox = format!("{shortname}@example.com");
        ManagedUser::new(1000, shortname, mailbox.as_str(), mailbox.as_str(), shortname).unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_full_and_brief() {
        let provider = provider();
        let mut alice = user("alice");
        provider.insert(&mut alice).await.unwrap();
        assert!(alice.revision.is_some());

        let full: ManagedUser = provider
            .get(alice.uuid, Representation::Full)
            .await
            .unwrap();
        assert_eq!(full.email.as_deref(), Some("alice@example.com"));

        let brief: ManagedUser = provider
            .get(alice.uuid, Representation::Brief)
            .await
            .unwrap();
        assert!(brief.email.is_none());
    }

    #[tokio::test]
    async fn wrong_type_reads_as_not_found() {
        let provider = provider();
        let mut alice = user("alice");
        provider.insert(&mut alice).await.unwrap();

        let as_group: StorageResult<ManagedUserGroup> =
            provider.get(alice.uuid, Representation::Full).await;
        assert!(as_group.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn soft_delete_hides_the_record() {
        let provider = provider();
        let mut alice = user("alice");
        provider.insert(&mut alice).await.unwrap();

        provider.delete::<ManagedUser>(alice.uuid).await.unwrap();

        let gone: StorageResult<ManagedUser> =
            provider.get(alice.uuid, Representation::Full).await;
        assert!(gone.unwrap_err().is_not_found());

        // Deleting twice is not-found as well.
        assert!(provider
            .delete::<ManagedUser>(alice.uuid)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn stale_revision_write_is_rejected() {
        let provider = provider();
        let mut alice = user("alice");
        provider.insert(&mut alice).await.unwrap();

        let mut first: ManagedUser = provider
            .get(alice.uuid, Representation::Full)
            .await
            .unwrap();
        let mut second: ManagedUser = provider
            .get(alice.uuid, Representation::Full)
            .await
            .unwrap();

        first.set_full_name("Alice One");
        provider.update(&mut first).await.unwrap();

        second.set_full_name("Alice Two");
        assert!(provider
            .update(&mut second)
            .await
            .unwrap_err()
            .is_stale_revision());
    }

    #[tokio::test]
    async fn find_user_by_login_uses_the_right_index() {
        let provider = provider();
        let mut alice = user("alice");
        provider.insert(&mut alice).await.unwrap();

        let by_shortname = provider.find_user_by_login("alice").await.unwrap();
        assert_eq!(by_shortname.unwrap().uuid, alice.uuid);

        let by_principal = provider
            .find_user_by_login("alice@example.com")
            .await
            .unwrap();
        assert_eq!(by_principal.unwrap().uuid, alice.uuid);

        assert!(provider.find_user_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_ids_drops_dangling_references() {
        let provider = provider();
        let mut alice = user("alice");
        provider.insert(&mut alice).await.unwrap();

        let dangling = Uuid::new_v4();
        let resolved = provider
            .resolve_ids::<ManagedUser>(&[alice.uuid, dangling])
            .await;
        assert_eq!(resolved, vec![alice.uuid]);
    }
}
