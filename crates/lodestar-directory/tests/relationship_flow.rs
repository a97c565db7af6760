//! End-to-end relationship consistency flows over an in-memory store.
//!
//! After every mutating operation the global symmetry invariant must
//! hold: `G ∈ U.memberOf ⟺ U ∈ G.members` for every user/group pair, and
//! `P ∈ C.memberOf ⟺ C ∈ P.nestedGroups` for every group pair.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lodestar_directory::{
    ChangeNotifier, CreateGroupRequest, CreateUserRequest, GroupService, UpdateGroupRequest,
    UpdateUserRequest, UserService,
};
use lodestar_model::{ManagedUser, ManagedUserGroup};
use lodestar_store::{index, MemoryStore, RecordProvider, RecordStore};
use serde_json::json;
use uuid::Uuid;

/// Notifier that counts signals, standing in for the websocket service.
#[derive(Default)]
struct CountingNotifier {
    signals: AtomicUsize,
}

#[async_trait]
impl ChangeNotifier for CountingNotifier {
    async fn notify_all_clients(&self) {
        self.signals.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    users: UserService,
    groups: GroupService,
    provider: RecordProvider,
    notifier: Arc<CountingNotifier>,
}

fn fixture() -> Fixture {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let notifier = Arc::new(CountingNotifier::default());
    Fixture {
        users: UserService::new(Arc::clone(&store), notifier.clone()),
        groups: GroupService::new(Arc::clone(&store), notifier.clone()),
        provider: RecordProvider::new(store),
        notifier,
    }
}

fn user_request(shortname: &str) -> CreateUserRequest {
    serde_json::from_value(json!({
        "shortname": shortname,
        "principalName": format!("{shortname}@example.com"),
        "email": format!("{shortname}@example.com"),
        "fullName": shortname,
        "authMethods": {"cleartext": format!("{shortname}-secret")}
    }))
    .unwrap()
}

async fn assert_symmetry(provider: &RecordProvider) {
    let users: Vec<ManagedUser> = provider.list_full(index::ALL_USERS).await.unwrap();
    let groups: Vec<ManagedUserGroup> =
        provider.list_full(index::ALL_USERGROUPS).await.unwrap();

    for user in &users {
        for group in &groups {
            assert_eq!(
                user.member_of.contains(&group.uuid),
                group.members.contains(&user.uuid),
                "user {} / group {} membership is asymmetric",
                user.shortname,
                group.shortname
            );
        }
    }
    for parent in &groups {
        for child in &groups {
            assert_eq!(
                child.member_of.contains(&parent.uuid),
                parent.nested_groups.contains(&child.uuid),
                "group {} / group {} nesting is asymmetric",
                parent.shortname,
                child.shortname
            );
        }
    }
}

#[tokio::test]
async fn group_creation_mirrors_membership_onto_users() {
    let fixture = fixture();
    let alice = fixture.users.create(user_request("alice")).await.unwrap();
    let bob = fixture.users.create(user_request("bob")).await.unwrap();
    assert_eq!(alice.numeric_id, 1000);
    assert_eq!(bob.numeric_id, 1001);

    let staff = fixture
        .groups
        .create(
            serde_json::from_value(json!({
                "shortname": "staff",
                "commonName": "All Staff",
                "members": [alice.uuid, bob.uuid]
            }))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(staff.numeric_id, 1789);

    let alice = fixture.users.get(alice.uuid).await.unwrap();
    assert_eq!(alice.member_of, vec![staff.uuid]);
    assert_symmetry(&fixture.provider).await;
}

#[tokio::test]
async fn group_update_adds_and_removes_members_symmetrically() {
    let fixture = fixture();
    let alice = fixture.users.create(user_request("alice")).await.unwrap();
    let bob = fixture.users.create(user_request("bob")).await.unwrap();
    let staff = fixture
        .groups
        .create(
            serde_json::from_value(json!({
                "shortname": "staff",
                "commonName": "All Staff",
                "members": [alice.uuid]
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    // Swap alice for bob.
    fixture
        .groups
        .update(
            staff.uuid,
            UpdateGroupRequest {
                members: Some(vec![bob.uuid]),
                ..UpdateGroupRequest::default()
            },
        )
        .await
        .unwrap();

    let alice = fixture.users.get(alice.uuid).await.unwrap();
    let bob = fixture.users.get(bob.uuid).await.unwrap();
    assert!(alice.member_of.is_empty());
    assert_eq!(bob.member_of, vec![staff.uuid]);
    assert_symmetry(&fixture.provider).await;
}

#[tokio::test]
async fn user_side_updates_mirror_onto_groups() {
    let fixture = fixture();
    let alice = fixture.users.create(user_request("alice")).await.unwrap();
    let staff = fixture
        .groups
        .create(
            serde_json::from_value(json!({"shortname": "staff", "commonName": "Staff"})).unwrap(),
        )
        .await
        .unwrap();
    let guests = fixture
        .groups
        .create(
            serde_json::from_value(json!({"shortname": "guests", "commonName": "Guests"}))
                .unwrap(),
        )
        .await
        .unwrap();

    fixture
        .users
        .update(
            alice.uuid,
            UpdateUserRequest {
                member_of: Some(vec![staff.uuid, guests.uuid]),
                ..UpdateUserRequest::default()
            },
        )
        .await
        .unwrap();
    assert_symmetry(&fixture.provider).await;

    let staff_loaded = fixture.groups.get(staff.uuid).await.unwrap();
    assert_eq!(staff_loaded.members, vec![alice.uuid]);

    fixture
        .users
        .update(
            alice.uuid,
            UpdateUserRequest {
                member_of: Some(vec![guests.uuid]),
                ..UpdateUserRequest::default()
            },
        )
        .await
        .unwrap();
    assert_symmetry(&fixture.provider).await;

    let staff_loaded = fixture.groups.get(staff.uuid).await.unwrap();
    assert!(staff_loaded.members.is_empty());
}

#[tokio::test]
async fn nesting_mirrors_between_parent_and_child() {
    let fixture = fixture();
    let staff = fixture
        .groups
        .create(
            serde_json::from_value(json!({"shortname": "staff", "commonName": "Staff"})).unwrap(),
        )
        .await
        .unwrap();
    let engineering = fixture
        .groups
        .create(
            serde_json::from_value(json!({
                "shortname": "engineering",
                "commonName": "Engineering",
                "memberOf": [staff.uuid]
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    let staff_loaded = fixture.groups.get(staff.uuid).await.unwrap();
    assert_eq!(staff_loaded.nested_groups, vec![engineering.uuid]);
    assert_symmetry(&fixture.provider).await;

    // Detach from the parent side.
    fixture
        .groups
        .update(
            staff.uuid,
            UpdateGroupRequest {
                nested_groups: Some(vec![]),
                ..UpdateGroupRequest::default()
            },
        )
        .await
        .unwrap();

    let engineering_loaded = fixture.groups.get(engineering.uuid).await.unwrap();
    assert!(engineering_loaded.member_of.is_empty());
    assert_symmetry(&fixture.provider).await;
}

#[tokio::test]
async fn deleting_a_user_detaches_it_from_every_group() {
    let fixture = fixture();
    let alice = fixture.users.create(user_request("alice")).await.unwrap();
    let staff = fixture
        .groups
        .create(
            serde_json::from_value(json!({
                "shortname": "staff",
                "commonName": "Staff",
                "members": [alice.uuid]
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    fixture.users.delete(alice.uuid).await.unwrap();

    assert!(fixture.users.get(alice.uuid).await.unwrap_err().is_not_found());
    let staff_loaded = fixture.groups.get(staff.uuid).await.unwrap();
    assert!(staff_loaded.members.is_empty());
    assert_symmetry(&fixture.provider).await;
}

#[tokio::test]
async fn deleting_a_group_detaches_parents_children_and_members() {
    let fixture = fixture();
    let alice = fixture.users.create(user_request("alice")).await.unwrap();
    let parent = fixture
        .groups
        .create(
            serde_json::from_value(json!({"shortname": "parent", "commonName": "Parent"}))
                .unwrap(),
        )
        .await
        .unwrap();
    let child = fixture
        .groups
        .create(
            serde_json::from_value(json!({"shortname": "child", "commonName": "Child"})).unwrap(),
        )
        .await
        .unwrap();
    let middle = fixture
        .groups
        .create(
            serde_json::from_value(json!({
                "shortname": "middle",
                "commonName": "Middle",
                "memberOf": [parent.uuid],
                "nestedGroups": [child.uuid],
                "members": [alice.uuid]
            }))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_symmetry(&fixture.provider).await;

    fixture.groups.delete(middle.uuid).await.unwrap();

    let parent_loaded = fixture.groups.get(parent.uuid).await.unwrap();
    let child_loaded = fixture.groups.get(child.uuid).await.unwrap();
    let alice_loaded = fixture.users.get(alice.uuid).await.unwrap();
    assert!(parent_loaded.nested_groups.is_empty());
    assert!(child_loaded.member_of.is_empty());
    assert!(alice_loaded.member_of.is_empty());
    assert_symmetry(&fixture.provider).await;
}

#[tokio::test]
async fn dangling_relationship_ids_are_dropped_at_request_time() {
    let fixture = fixture();
    let alice = fixture.users.create(user_request("alice")).await.unwrap();

    let group = fixture
        .groups
        .create(
            serde_json::from_value(json!({
                "shortname": "staff",
                "commonName": "Staff",
                "members": [alice.uuid, Uuid::new_v4()],
                "memberOf": [Uuid::new_v4()]
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(group.members, vec![alice.uuid]);
    assert!(group.member_of.is_empty());
    assert_symmetry(&fixture.provider).await;
}

#[tokio::test]
async fn cleartext_credentials_are_expanded_on_create() {
    let fixture = fixture();
    let alice = fixture.users.create(user_request("alice")).await.unwrap();

    assert!(!alice.auth_methods.contains_key("cleartext"));
    assert!(alice.auth_methods.contains_key("pbkdf2"));
    assert!(alice.verify_password("alice-secret").unwrap());
    assert!(!alice.verify_password("wrong").unwrap());
}

#[tokio::test]
async fn updates_touch_only_edited_records_and_notify() {
    let fixture = fixture();
    let alice = fixture.users.create(user_request("alice")).await.unwrap();
    let signals_after_create = fixture.notifier.signals.load(Ordering::SeqCst);
    assert_eq!(signals_after_create, 1);

    // A no-op update still notifies but does not bump the revision.
    let before = fixture.users.get(alice.uuid).await.unwrap();
    let updated = fixture
        .users
        .update(alice.uuid, UpdateUserRequest::default())
        .await
        .unwrap();
    assert_eq!(before.revision, updated.revision);
    assert_eq!(fixture.notifier.signals.load(Ordering::SeqCst), 2);

    let renamed = fixture
        .users
        .update(
            alice.uuid,
            UpdateUserRequest {
                full_name: Some("Alice Martin".to_string()),
                ..UpdateUserRequest::default()
            },
        )
        .await
        .unwrap();
    assert_ne!(before.revision, renamed.revision);
    assert_eq!(renamed.full_name, "Alice Martin");
}

#[tokio::test]
async fn listing_returns_brief_representations() {
    let fixture = fixture();
    fixture.users.create(user_request("alice")).await.unwrap();
    fixture.users.create(user_request("bob")).await.unwrap();

    let listed = fixture.users.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|user| !user.representation.is_full()));
    assert!(listed.iter().all(|user| user.auth_methods.is_empty()));
}
