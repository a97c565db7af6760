//! User lifecycle operations.

use std::collections::HashMap;
use std::sync::Arc;

use lodestar_crypto::AuthMethodGenerator;
use lodestar_model::{ManagedUser, ManagedUserGroup, Representation};
use lodestar_store::{index, PersistentCounter, RecordProvider, RecordStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DirectoryResult;
use crate::notify::ChangeNotifier;
use crate::relationship::RelationshipEngine;

/// First numeric id handed to users.
const FIRST_USER_NUMERIC_ID: i64 = 1000;

/// A user creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Login shortname.
    pub shortname: String,
    /// Principal name.
    pub principal_name: String,
    /// Email address.
    pub email: String,
    /// Given name.
    pub given_name: Option<String>,
    /// Surname.
    pub surname: Option<String>,
    /// Display name.
    pub full_name: String,
    /// Auth methods; a `cleartext` entry is expanded server-side.
    #[serde(default)]
    pub auth_methods: HashMap<String, String>,
    /// Requested group memberships; unresolvable ids are dropped.
    #[serde(default)]
    pub member_of: Vec<Uuid>,
}

/// A partial user update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    /// New shortname.
    pub shortname: Option<String>,
    /// New principal name.
    pub principal_name: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New given name.
    pub given_name: Option<String>,
    /// New surname.
    pub surname: Option<String>,
    /// New display name.
    pub full_name: Option<String>,
    /// Replacement auth methods; a `cleartext` entry is expanded.
    pub auth_methods: Option<HashMap<String, String>>,
    /// Replacement group memberships; unresolvable ids are dropped.
    pub member_of: Option<Vec<Uuid>>,
}

/// User service: validated lifecycle operations with relationship
/// mirroring and change notification.
pub struct UserService {
    provider: RecordProvider,
    engine: RelationshipEngine,
    counter: PersistentCounter,
    auth_generator: AuthMethodGenerator,
    notifier: Arc<dyn ChangeNotifier>,
}

impl UserService {
    /// Creates the service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        let provider = RecordProvider::new(Arc::clone(&store));
        Self {
            engine: RelationshipEngine::new(provider.clone()),
            counter: PersistentCounter::new(store, "users.numericID", FIRST_USER_NUMERIC_ID),
            auth_generator: AuthMethodGenerator::new(),
            provider,
            notifier,
        }
    }

    /// Creates a user: validates fields, expands auth methods, allocates
    /// a numeric id, and mirrors requested memberships onto the groups.
    ///
    /// ## Errors
    ///
    /// Propagates validation, credential, storage, and relationship
    /// errors.
    pub async fn create(&self, request: CreateUserRequest) -> DirectoryResult<ManagedUser> {
        let auth_methods = if request.auth_methods.is_empty() {
            HashMap::new()
        } else {
            self.auth_generator.generate(&request.auth_methods)?
        };

        let numeric_id = self.counter.next_value().await?;
        let mut user = ManagedUser::new(
            numeric_id,
            request.shortname,
            request.principal_name,
            request.email,
            request.full_name,
        )?
        .with_auth_methods(auth_methods);
        if let Some(given_name) = request.given_name {
            user = user.with_given_name(given_name);
        }
        if let Some(surname) = request.surname {
            user = user.with_surname(surname);
        }
        let member_of = self
            .provider
            .resolve_ids::<ManagedUserGroup>(&request.member_of)
            .await;
        user = user.with_member_of(member_of);

        self.provider.insert(&mut user).await?;
        self.engine.apply_user_change(None, Some(&user)).await?;
        self.notifier.notify_all_clients().await;
        Ok(user)
    }

    /// Applies a partial update and mirrors membership changes.
    ///
    /// ## Errors
    ///
    /// Propagates validation, storage (including stale-revision races on
    /// the user itself), and relationship errors.
    pub async fn update(
        &self,
        uuid: Uuid,
        request: UpdateUserRequest,
    ) -> DirectoryResult<ManagedUser> {
        let mut user: ManagedUser = self.provider.get(uuid, Representation::Full).await?;
        let initial = user.clone();

        if let Some(value) = &request.shortname {
            user.set_shortname(value)?;
        }
        if let Some(value) = &request.principal_name {
            user.set_principal_name(value)?;
        }
        if let Some(value) = &request.email {
            user.set_email(value)?;
        }
        if let Some(value) = &request.given_name {
            user.set_given_name(value);
        }
        if let Some(value) = &request.surname {
            user.set_surname(value);
        }
        if let Some(value) = &request.full_name {
            user.set_full_name(value);
        }
        if let Some(methods) = &request.auth_methods {
            user.set_auth_methods(self.auth_generator.generate(methods)?);
        }
        if let Some(ids) = &request.member_of {
            let resolved = self.provider.resolve_ids::<ManagedUserGroup>(ids).await;
            user.set_member_of(resolved);
        }

        if user.edited {
            self.provider.update(&mut user).await?;
        }
        self.engine
            .apply_user_change(Some(&initial), Some(&user))
            .await?;
        self.notifier.notify_all_clients().await;
        Ok(user)
    }

    /// Deletes a user: removes them from every group, then soft-deletes
    /// the record.
    ///
    /// ## Errors
    ///
    /// Propagates storage and relationship errors.
    pub async fn delete(&self, uuid: Uuid) -> DirectoryResult<()> {
        let user: ManagedUser = self.provider.get(uuid, Representation::Full).await?;
        self.engine.apply_user_change(Some(&user), None).await?;
        self.provider.delete::<ManagedUser>(uuid).await?;
        self.notifier.notify_all_clients().await;
        Ok(())
    }

    /// Loads a user in full representation.
    ///
    /// ## Errors
    ///
    /// Propagates storage errors; deleted users read as not found.
    pub async fn get(&self, uuid: Uuid) -> DirectoryResult<ManagedUser> {
        Ok(self.provider.get(uuid, Representation::Full).await?)
    }

    /// Lists every live user in brief representation.
    ///
    /// ## Errors
    ///
    /// Propagates storage errors.
    pub async fn list(&self) -> DirectoryResult<Vec<ManagedUser>> {
        Ok(self.provider.list(index::ALL_USERS).await?)
    }
}
