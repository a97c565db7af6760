//! The relationship consistency engine.
//!
//! Given the before/after state of a record's relationship lists, the
//! engine computes the minimal set of mirrored updates on peer records and
//! applies them as one batch of independent optimistic writes. There is no
//! cross-document transaction and no rollback: a partial failure leaves
//! the directory inconsistent and is reported as one combined error the
//! caller must log as requiring repair.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use lodestar_model::{ManagedUser, ManagedUserGroup, Representation};
use lodestar_store::{RecordProvider, StoredRecord};
use uuid::Uuid;

use crate::diff::diff_ids;
use crate::error::{DirectoryError, DirectoryResult};

fn with_id(list: &[Uuid], id: Uuid) -> Vec<Uuid> {
    let mut list = list.to_vec();
    if !list.contains(&id) {
        list.push(id);
    }
    list
}

fn without_id(list: &[Uuid], id: Uuid) -> Vec<Uuid> {
    list.iter().copied().filter(|other| *other != id).collect()
}

fn owner_ids(group: Option<&ManagedUserGroup>) -> &[Uuid] {
    group.map_or(&[], |g| g.member_of.as_slice())
}

fn nested_ids(group: Option<&ManagedUserGroup>) -> &[Uuid] {
    group.map_or(&[], |g| g.nested_groups.as_slice())
}

fn member_ids(group: Option<&ManagedUserGroup>) -> &[Uuid] {
    group.map_or(&[], |g| g.members.as_slice())
}

/// Mirrors relationship edits onto the records they reference.
pub struct RelationshipEngine {
    provider: RecordProvider,
}

impl RelationshipEngine {
    /// Creates an engine over a provider.
    #[must_use]
    pub const fn new(provider: RecordProvider) -> Self {
        Self { provider }
    }

    /// Mirrors a user's `memberOf` changes onto the affected groups.
    ///
    /// `None` on one side denotes create (`initial`) or delete
    /// (`final_state`).
    ///
    /// ## Errors
    ///
    /// Returns [`DirectoryError::InconsistentRelationship`] when any peer
    /// write fails after best-effort application of the whole batch.
    pub async fn apply_user_change(
        &self,
        initial: Option<&ManagedUser>,
        final_state: Option<&ManagedUser>,
    ) -> DirectoryResult<()> {
        let Some(subject) = final_state.or(initial).map(|user| user.uuid) else {
            return Ok(());
        };
        let initial_owners = initial.map(|user| user.member_of.as_slice()).unwrap_or(&[]);
        let final_owners = final_state
            .map(|user| user.member_of.as_slice())
            .unwrap_or(&[]);
        let (added, removed) = diff_ids(initial_owners, final_owners);
        if added.is_empty() && removed.is_empty() {
            return Ok(());
        }

        let peer_ids: Vec<Uuid> = added.union(&removed).copied().collect();
        let mut groups = self.load_peers::<ManagedUserGroup>(&peer_ids).await?;

        for id in &added {
            if let Some(group) = groups.get_mut(id) {
                group.set_members(with_id(&group.members, subject));
            }
        }
        for id in &removed {
            if let Some(group) = groups.get_mut(id) {
                group.set_members(without_id(&group.members, subject));
            }
        }

        self.persist_batch(groups.into_values().collect(), Vec::new())
            .await
    }

    /// Mirrors a group's `memberOf`, `nestedGroups`, and `members`
    /// changes onto the affected groups and users.
    ///
    /// ## Errors
    ///
    /// Returns [`DirectoryError::InconsistentRelationship`] when any peer
    /// write fails after best-effort application of the whole batch.
    pub async fn apply_group_change(
        &self,
        initial: Option<&ManagedUserGroup>,
        final_state: Option<&ManagedUserGroup>,
    ) -> DirectoryResult<()> {
        let Some(subject) = final_state.or(initial).map(|group| group.uuid) else {
            return Ok(());
        };

        let (added_owners, removed_owners) =
            diff_ids(owner_ids(initial), owner_ids(final_state));
        let (added_nested, removed_nested) =
            diff_ids(nested_ids(initial), nested_ids(final_state));
        let (added_members, removed_members) =
            diff_ids(member_ids(initial), member_ids(final_state));

        let group_peer_ids: HashSet<Uuid> = added_owners
            .iter()
            .chain(&removed_owners)
            .chain(&added_nested)
            .chain(&removed_nested)
            .copied()
            .collect();
        let user_peer_ids: HashSet<Uuid> = added_members
            .iter()
            .chain(&removed_members)
            .copied()
            .collect();
        if group_peer_ids.is_empty() && user_peer_ids.is_empty() {
            return Ok(());
        }

        let group_peer_ids: Vec<Uuid> = group_peer_ids.into_iter().collect();
        let user_peer_ids: Vec<Uuid> = user_peer_ids.into_iter().collect();
        let mut groups = self.load_peers::<ManagedUserGroup>(&group_peer_ids).await?;
        let mut users = self.load_peers::<ManagedUser>(&user_peer_ids).await?;

        // An added parent gains this group among its nested groups; an
        // added child gains this group among its owners.
        for id in &added_owners {
            if let Some(group) = groups.get_mut(id) {
                group.set_nested_groups(with_id(&group.nested_groups, subject));
            }
        }
        for id in &removed_owners {
            if let Some(group) = groups.get_mut(id) {
                group.set_nested_groups(without_id(&group.nested_groups, subject));
            }
        }
        for id in &added_nested {
            if let Some(group) = groups.get_mut(id) {
                group.set_member_of(with_id(&group.member_of, subject));
            }
        }
        for id in &removed_nested {
            if let Some(group) = groups.get_mut(id) {
                group.set_member_of(without_id(&group.member_of, subject));
            }
        }
        for id in &added_members {
            if let Some(user) = users.get_mut(id) {
                user.set_member_of(with_id(&user.member_of, subject));
            }
        }
        for id in &removed_members {
            if let Some(user) = users.get_mut(id) {
                user.set_member_of(without_id(&user.member_of, subject));
            }
        }

        self.persist_batch(groups.into_values().collect(), users.into_values().collect())
            .await
    }

    /// Bulk-loads peers, one concurrent read each. Identifiers that no
    /// longer resolve are skipped; they were validated when the
    /// relationship was requested.
    async fn load_peers<T: StoredRecord>(
        &self,
        ids: &[Uuid],
    ) -> DirectoryResult<HashMap<Uuid, T>> {
        let loads = ids.iter().map(|id| async move {
            match self.provider.get::<T>(*id, Representation::Full).await {
                Ok(record) => Ok(Some((*id, record))),
                Err(error) if error.is_not_found() => {
                    tracing::warn!(uuid = %id, "skipping dangling relationship peer");
                    Ok(None)
                }
                Err(error) => Err(error),
            }
        });
        let mut peers = HashMap::new();
        for result in join_all(loads).await {
            if let Some((id, record)) = result? {
                peers.insert(id, record);
            }
        }
        Ok(peers)
    }

    /// Persists every edited peer as one batch of independent writes and
    /// combines failures into a single error.
    async fn persist_batch(
        &self,
        groups: Vec<ManagedUserGroup>,
        users: Vec<ManagedUser>,
    ) -> DirectoryResult<()> {
        let group_writes = groups
            .into_iter()
            .filter(|group| group.edited)
            .map(|mut group| async move {
                let uuid = group.uuid;
                self.provider.update(&mut group).await.map_err(|e| (uuid, e))
            });
        let user_writes = users
            .into_iter()
            .filter(|user| user.edited)
            .map(|mut user| async move {
                let uuid = user.uuid;
                self.provider.update(&mut user).await.map_err(|e| (uuid, e))
            });

        let mut failed = Vec::new();
        for result in join_all(group_writes).await {
            if let Err((uuid, error)) = result {
                tracing::error!(uuid = %uuid, %error, "mirrored group update failed");
                failed.push(uuid);
            }
        }
        for result in join_all(user_writes).await {
            if let Err((uuid, error)) = result {
                tracing::error!(uuid = %uuid, %error, "mirrored user update failed");
                failed.push(uuid);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            tracing::error!(
                peers = failed.len(),
                "directory may be inconsistent, manual repair required"
            );
            Err(DirectoryError::InconsistentRelationship { failed })
        }
    }
}
