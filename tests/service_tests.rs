use std::collections::BTreeSet;
use std::sync::Arc;

use user_registry::{
    InMemoryRepository, PasswordEncoder, RepositoryState, UserService,
    error::ServiceError,
    models::{ROLE_ADMIN, ROLE_USER, Role, User},
    repository::Repository,
};

// --- Helpers ---

/// Cheap argon2 parameters keep the suite fast; verification reads them from the hash.
fn test_encoder() -> PasswordEncoder {
    PasswordEncoder::with_params(1024, 1, 1).unwrap()
}

fn setup() -> (UserService, RepositoryState) {
    let repo: RepositoryState = Arc::new(InMemoryRepository::new());
    (UserService::new(repo.clone(), test_encoder()), repo)
}

fn candidate(username: &str, password: &str, roles: &[&str]) -> User {
    User {
        id: None,
        username: username.to_string(),
        surname: "Surname".to_string(),
        age: 30,
        email: format!("{username}@mail.ru"),
        password: password.to_string(),
        roles: roles.iter().map(|r| Role::named(*r)).collect(),
    }
}

fn role_names(user: &User) -> BTreeSet<String> {
    user.roles.iter().map(|r| r.name.clone()).collect()
}

// --- register ---

#[tokio::test]
async fn test_register_forces_role_user() {
    let (service, repo) = setup();
    let mut alice = candidate("alice", "secret", &[ROLE_ADMIN]);

    service.register(&mut alice).await.unwrap();

    let stored = repo.find_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(role_names(&stored), BTreeSet::from([ROLE_USER.to_string()]));
    assert_eq!(role_names(&alice), BTreeSet::from([ROLE_USER.to_string()]));
}

#[tokio::test]
async fn test_register_hashes_password_in_place() {
    let (service, repo) = setup();
    let mut alice = candidate("alice", "secret", &[]);

    service.register(&mut alice).await.unwrap();

    assert_ne!(alice.password, "secret");
    assert!(service.encoder().matches("secret", &alice.password));
    assert!(alice.id.is_some());

    let stored = repo.find_user_by_id(alice.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.password, alice.password);
}

#[tokio::test]
async fn test_register_duplicate_username_leaves_store_unchanged() {
    let (service, repo) = setup();
    service
        .register(&mut candidate("alice", "first", &[]))
        .await
        .unwrap();
    let before = repo.find_all_users().await.unwrap();

    let mut again = candidate("alice", "second", &[]);
    let result = service.register(&mut again).await;

    assert!(matches!(result, Err(ServiceError::DuplicateUsername(ref name)) if name == "alice"));
    assert_eq!(repo.find_all_users().await.unwrap(), before);
    // Nothing was hashed or persisted for the rejected candidate.
    assert_eq!(again.password, "second");
    assert!(again.id.is_none());
}

// --- admin_create_or_update ---

#[tokio::test]
async fn test_admin_create_keeps_chosen_roles() {
    let (service, _repo) = setup();
    let mut boss = candidate("boss", "pw", &[ROLE_ADMIN, ROLE_USER]);

    service.admin_create_or_update(&mut boss).await.unwrap();

    let stored = service.find_by_username("boss").await.unwrap().unwrap();
    assert!(stored.has_role(ROLE_ADMIN));
    assert!(stored.has_role(ROLE_USER));
    assert!(stored.roles.iter().all(|r| r.id.is_some()));
}

#[tokio::test]
async fn test_admin_create_hashes_with_fresh_salt() {
    let (service, _repo) = setup();
    let mut first = candidate("first", "same-plaintext", &[ROLE_USER]);
    let mut second = candidate("second", "same-plaintext", &[ROLE_USER]);

    service.admin_create_or_update(&mut first).await.unwrap();
    service.admin_create_or_update(&mut second).await.unwrap();

    assert_ne!(first.password, "same-plaintext");
    assert_ne!(second.password, "same-plaintext");
    assert_ne!(first.password, second.password);
    assert!(service.encoder().matches("same-plaintext", &first.password));
    assert!(service.encoder().matches("same-plaintext", &second.password));
}

#[tokio::test]
async fn test_admin_create_duplicate_username_is_rejected() {
    let (service, repo) = setup();
    service
        .admin_create_or_update(&mut candidate("user1", "pw", &[ROLE_USER]))
        .await
        .unwrap();

    let result = service
        .admin_create_or_update(&mut candidate("user1", "pw", &[ROLE_ADMIN]))
        .await;

    assert!(matches!(result, Err(ServiceError::DuplicateUsername(_))));
    assert_eq!(repo.find_all_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_edit_keeping_same_username_is_not_a_duplicate() {
    let (service, _repo) = setup();
    let mut user1 = candidate("user1", "password1", &[ROLE_USER]);
    service.admin_create_or_update(&mut user1).await.unwrap();

    let mut edited = user1.clone();
    edited.email = "changed@mail.ru".to_string();
    service.admin_create_or_update(&mut edited).await.unwrap();

    let stored = service.find_by_id(user1.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.email, "changed@mail.ru");
    assert_eq!(stored.username, "user1");
    assert_eq!(service.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_edit_taking_another_users_name_is_a_duplicate() {
    let (service, _repo) = setup();
    let mut user1 = candidate("user1", "pw", &[ROLE_USER]);
    let mut user2 = candidate("user2", "pw", &[ROLE_USER]);
    service.admin_create_or_update(&mut user1).await.unwrap();
    service.admin_create_or_update(&mut user2).await.unwrap();

    user2.username = "user1".to_string();
    let result = service.admin_create_or_update(&mut user2).await;

    assert!(matches!(result, Err(ServiceError::DuplicateUsername(_))));
}

#[tokio::test]
async fn test_edit_rehashes_the_submitted_value() {
    let (service, _repo) = setup();
    let mut user1 = candidate("user1", "password1", &[ROLE_USER]);
    service.admin_create_or_update(&mut user1).await.unwrap();
    let stored_hash = user1.password.clone();

    // The edit form carries the stored hash back unchanged.
    let mut edited = user1.clone();
    service.admin_create_or_update(&mut edited).await.unwrap();

    assert_ne!(edited.password, stored_hash);
    assert!(service.encoder().matches(&stored_hash, &edited.password));
    assert!(!service.encoder().matches("password1", &edited.password));
}

#[tokio::test]
async fn test_edit_of_missing_user_fails() {
    let (service, _repo) = setup();
    let mut ghost = candidate("ghost", "pw", &[ROLE_USER]);
    ghost.id = Some(42);

    let result = service.admin_create_or_update(&mut ghost).await;
    assert!(matches!(result, Err(ServiceError::Store(_))));
}

// --- delete & reads ---

#[tokio::test]
async fn test_delete_missing_id_is_a_noop() {
    let (service, repo) = setup();
    service
        .register(&mut candidate("alice", "pw", &[]))
        .await
        .unwrap();
    let before = repo.find_all_users().await.unwrap();

    service.delete(999).await.unwrap();

    assert_eq!(repo.find_all_users().await.unwrap(), before);
}

#[tokio::test]
async fn test_delete_removes_user() {
    let (service, _repo) = setup();
    let mut alice = candidate("alice", "pw", &[]);
    service.register(&mut alice).await.unwrap();

    service.delete(alice.id.unwrap()).await.unwrap();

    assert!(service.find_by_id(alice.id.unwrap()).await.unwrap().is_none());
    assert!(service.find_by_username("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_reads_return_none_for_misses() {
    let (service, _repo) = setup();
    assert!(service.find_by_id(1).await.unwrap().is_none());
    assert!(service.find_by_username("nobody").await.unwrap().is_none());
    assert!(service.list_all().await.unwrap().is_empty());
    assert!(service.list_all_roles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ensure_role_is_idempotent() {
    let (service, _repo) = setup();
    let first = service.ensure_role(ROLE_ADMIN).await.unwrap();
    let second = service.ensure_role(ROLE_ADMIN).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(service.list_all_roles().await.unwrap().len(), 1);
}

// --- authenticate ---

#[tokio::test]
async fn test_authenticate_outcomes() {
    let (service, _repo) = setup();
    service
        .register(&mut candidate("alice", "secret", &[]))
        .await
        .unwrap();

    let user = service.authenticate("alice", "secret").await.unwrap();
    assert_eq!(user.username, "alice");

    assert!(matches!(
        service.authenticate("alice", "wrong").await,
        Err(ServiceError::BadCredentials)
    ));
    assert!(matches!(
        service.authenticate("bob", "secret").await,
        Err(ServiceError::UserNotFound(ref name)) if name == "bob"
    ));
}
