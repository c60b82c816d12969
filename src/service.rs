use std::collections::BTreeSet;

use crate::error::ServiceError;
use crate::models::{ROLE_USER, Role, User};
use crate::password::PasswordEncoder;
use crate::repository::RepositoryState;

/// UserService
///
/// The provisioning workflow: check the username, hash the password, persist. Everything
/// that writes a `User` goes through here so that no plaintext password reaches the store.
///
/// Cloning is cheap; the repository is shared behind an `Arc`.
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
    encoder: PasswordEncoder,
}

impl UserService {
    pub fn new(repo: RepositoryState, encoder: PasswordEncoder) -> Self {
        Self { repo, encoder }
    }

    pub fn encoder(&self) -> &PasswordEncoder {
        &self.encoder
    }

    /// register
    ///
    /// Self-registration. Whatever roles the candidate carries are replaced by exactly
    /// `{ROLE_USER}`. On success the candidate's password holds the stored hash and its `id`
    /// the generated identifier.
    pub async fn register(&self, candidate: &mut User) -> Result<(), ServiceError> {
        candidate.roles = BTreeSet::from([Role::named(ROLE_USER)]);
        self.reject_duplicate_username(candidate).await?;
        self.hash_and_save(candidate).await?;
        tracing::info!(username = %candidate.username, user_id = ?candidate.id, "User registered");
        Ok(())
    }

    /// admin_create_or_update
    ///
    /// Admin creation (no id) or edit (id present). Keeping the username of the record being
    /// edited is not a conflict.
    ///
    /// The password is hashed unconditionally. The edit form is prefilled with the stored
    /// hash, so an edit that leaves the password untouched stores a hash of that hash.
    pub async fn admin_create_or_update(&self, candidate: &mut User) -> Result<(), ServiceError> {
        self.reject_duplicate_username(candidate).await?;
        let creating = candidate.id.is_none();
        self.hash_and_save(candidate).await?;
        if creating {
            tracing::info!(username = %candidate.username, user_id = ?candidate.id, "User created");
        } else {
            tracing::info!(username = %candidate.username, user_id = ?candidate.id, "User updated");
        }
        Ok(())
    }

    /// Deleting an id that does not exist succeeds without touching the store.
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        self.repo.delete_user(id).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.repo.find_user_by_username(username).await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
        Ok(self.repo.find_user_by_id(id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.repo.find_all_users().await?)
    }

    pub async fn list_all_roles(&self) -> Result<Vec<Role>, ServiceError> {
        Ok(self.repo.find_all_roles().await?)
    }

    /// Adds `name` to the role catalog if it is missing.
    pub async fn ensure_role(&self, name: &str) -> Result<Role, ServiceError> {
        Ok(self.repo.save_role(name).await?)
    }

    /// authenticate
    ///
    /// Resolves a login attempt. Unlike the read pass-throughs, an unknown username is a named
    /// failure here.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, ServiceError> {
        let user = self
            .repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound(username.to_string()))?;

        if !self.encoder.matches(password, &user.password) {
            return Err(ServiceError::BadCredentials);
        }
        Ok(user)
    }

    async fn reject_duplicate_username(&self, candidate: &User) -> Result<(), ServiceError> {
        let existing = self.repo.find_user_by_username(&candidate.username).await?;
        match existing {
            Some(existing) if candidate.id.is_none() || existing.id != candidate.id => {
                tracing::warn!(username = %candidate.username, "Rejected duplicate username");
                Err(ServiceError::DuplicateUsername(candidate.username.clone()))
            }
            _ => Ok(()),
        }
    }

    async fn hash_and_save(&self, candidate: &mut User) -> Result<(), ServiceError> {
        candidate.password = self.encoder.encode(&candidate.password)?;
        let saved = self.repo.save_user(candidate.clone()).await?;
        candidate.id = saved.id;
        candidate.roles = saved.roles;
        Ok(())
    }
}
