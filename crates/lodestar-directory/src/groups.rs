//! Group lifecycle operations.

use std::sync::Arc;

use lodestar_model::{ManagedUser, ManagedUserGroup, Representation};
use lodestar_store::{index, PersistentCounter, RecordProvider, RecordStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DirectoryResult;
use crate::notify::ChangeNotifier;
use crate::relationship::RelationshipEngine;

/// First numeric id handed to groups.
const FIRST_GROUP_NUMERIC_ID: i64 = 1789;

/// A group creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    /// Group shortname.
    pub shortname: String,
    /// Display name.
    pub common_name: String,
    /// Delivery address.
    pub email: Option<String>,
    /// Requested parent groups; unresolvable ids are dropped.
    #[serde(default)]
    pub member_of: Vec<Uuid>,
    /// Requested nested groups; unresolvable ids are dropped.
    #[serde(default)]
    pub nested_groups: Vec<Uuid>,
    /// Requested user members; unresolvable ids are dropped.
    #[serde(default)]
    pub members: Vec<Uuid>,
}

/// A partial group update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    /// New shortname.
    pub shortname: Option<String>,
    /// New display name.
    pub common_name: Option<String>,
    /// New delivery address.
    pub email: Option<String>,
    /// Replacement parent groups; unresolvable ids are dropped.
    pub member_of: Option<Vec<Uuid>>,
    /// Replacement nested groups; unresolvable ids are dropped.
    pub nested_groups: Option<Vec<Uuid>>,
    /// Replacement user members; unresolvable ids are dropped.
    pub members: Option<Vec<Uuid>>,
}

/// Group service: validated lifecycle operations with relationship
/// mirroring and change notification.
pub struct GroupService {
    provider: RecordProvider,
    engine: RelationshipEngine,
    counter: PersistentCounter,
    notifier: Arc<dyn ChangeNotifier>,
}

impl GroupService {
    /// Creates the service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        let provider = RecordProvider::new(Arc::clone(&store));
        Self {
            engine: RelationshipEngine::new(provider.clone()),
            counter: PersistentCounter::new(
                store,
                "usergroups.numericID",
                FIRST_GROUP_NUMERIC_ID,
            ),
            provider,
            notifier,
        }
    }

    /// Creates a group and mirrors its requested relationships onto the
    /// referenced groups and users.
    ///
    /// ## Errors
    ///
    /// Propagates validation, storage, and relationship errors.
    pub async fn create(&self, request: CreateGroupRequest) -> DirectoryResult<ManagedUserGroup> {
        let numeric_id = self.counter.next_value().await?;
        let member_of = self
            .provider
            .resolve_ids::<ManagedUserGroup>(&request.member_of)
            .await;
        let nested_groups = self
            .provider
            .resolve_ids::<ManagedUserGroup>(&request.nested_groups)
            .await;
        let members = self.provider.resolve_ids::<ManagedUser>(&request.members).await;

        let mut group = ManagedUserGroup::new(
            numeric_id,
            request.shortname,
            request.common_name,
            request.email,
        )?
        .with_relationships(member_of, nested_groups, members);

        self.provider.insert(&mut group).await?;
        self.engine.apply_group_change(None, Some(&group)).await?;
        self.notifier.notify_all_clients().await;
        Ok(group)
    }

    /// Applies a partial update and mirrors relationship changes.
    ///
    /// ## Errors
    ///
    /// Propagates validation, storage (including stale-revision races on
    /// the group itself), and relationship errors.
    pub async fn update(
        &self,
        uuid: Uuid,
        request: UpdateGroupRequest,
    ) -> DirectoryResult<ManagedUserGroup> {
        let mut group: ManagedUserGroup = self.provider.get(uuid, Representation::Full).await?;
        let initial = group.clone();

        if let Some(value) = &request.shortname {
            group.set_shortname(value)?;
        }
        if let Some(value) = &request.common_name {
            group.set_common_name(value);
        }
        if let Some(value) = &request.email {
            group.set_email(value)?;
        }
        if let Some(ids) = &request.member_of {
            let resolved = self.provider.resolve_ids::<ManagedUserGroup>(ids).await;
            group.set_member_of(resolved);
        }
        if let Some(ids) = &request.nested_groups {
            let resolved = self.provider.resolve_ids::<ManagedUserGroup>(ids).await;
            group.set_nested_groups(resolved);
        }
        if let Some(ids) = &request.members {
            let resolved = self.provider.resolve_ids::<ManagedUser>(ids).await;
            group.set_members(resolved);
        }

        if group.edited {
            self.provider.update(&mut group).await?;
        }
        self.engine
            .apply_group_change(Some(&initial), Some(&group))
            .await?;
        self.notifier.notify_all_clients().await;
        Ok(group)
    }

    /// Deletes a group: detaches it from every parent, child, and member,
    /// then soft-deletes the record.
    ///
    /// ## Errors
    ///
    /// Propagates storage and relationship errors.
    pub async fn delete(&self, uuid: Uuid) -> DirectoryResult<()> {
        let group: ManagedUserGroup = self.provider.get(uuid, Representation::Full).await?;
        self.engine.apply_group_change(Some(&group), None).await?;
        self.provider.delete::<ManagedUserGroup>(uuid).await?;
        self.notifier.notify_all_clients().await;
        Ok(())
    }

    /// Loads a group in full representation.
    ///
    /// ## Errors
    ///
    /// Propagates storage errors; deleted groups read as not found.
    pub async fn get(&self, uuid: Uuid) -> DirectoryResult<ManagedUserGroup> {
        Ok(self.provider.get(uuid, Representation::Full).await?)
    }

    /// Lists every live group in brief representation.
    ///
    /// ## Errors
    ///
    /// Propagates storage errors.
    pub async fn list(&self) -> DirectoryResult<Vec<ManagedUserGroup>> {
        Ok(self.provider.list(index::ALL_USERGROUPS).await?)
    }
}
