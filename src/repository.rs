use crate::error::StoreError;
use crate::models::{Role, User};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Repository Trait
///
/// The persistence contract for users and roles. Handlers and the `UserService` only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are interchangeable.
///
/// **Send + Sync + async_trait** are required to make the trait object shareable across
/// Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Inserts when `user.id` is `None`, updates otherwise. Role links are replaced by the
    /// given role set; unknown role names are added to the catalog.
    async fn save_user(&self, user: User) -> Result<User, StoreError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Ordered by id.
    async fn find_all_users(&self) -> Result<Vec<User>, StoreError>;
    /// Removing a missing id is not an error.
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;

    // --- Roles ---
    /// Ordered by id.
    async fn find_all_roles(&self) -> Result<Vec<Role>, StoreError>;
    /// Returns the catalog role with this name, creating it if needed.
    async fn save_role(&self, name: &str) -> Result<Role, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Flat `users` row; roles are loaded separately through `users_roles`.
#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    surname: String,
    age: i16,
    email: String,
    password: String,
}

impl UserRow {
    fn into_user(self, roles: BTreeSet<Role>) -> User {
        User {
            id: Some(self.id),
            username: self.username,
            surname: self.surname,
            age: self.age,
            email: self.email,
            password: self.password,
            roles,
        }
    }
}

#[derive(FromRow)]
struct UserRoleRow {
    user_id: i64,
    id: i64,
    name: String,
}

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Each save runs in its own transaction so a user and
/// its role links are written atomically.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_of(&self, user_id: i64) -> Result<BTreeSet<Role>, StoreError> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN users_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles.into_iter().collect())
    }

    async fn hydrate(&self, row: Option<UserRow>) -> Result<Option<User>, StoreError> {
        match row {
            Some(row) => {
                let roles = self.roles_of(row.id).await?;
                Ok(Some(row.into_user(roles)))
            }
            None => Ok(None),
        }
    }

    /// Replaces the role links of `user_id` inside the caller's transaction.
    async fn link_roles(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        roles: &BTreeSet<Role>,
    ) -> Result<BTreeSet<Role>, StoreError> {
        sqlx::query("DELETE FROM users_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        let mut linked = BTreeSet::new();
        for role in roles {
            // The no-op update makes RETURNING yield the id for existing names too.
            let stored = sqlx::query_as::<_, Role>(
                r#"
                INSERT INTO roles (name) VALUES ($1)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id, name
                "#,
            )
            .bind(&role.name)
            .fetch_one(&mut **tx)
            .await?;

            sqlx::query("INSERT INTO users_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(stored.id)
                .execute(&mut **tx)
                .await?;
            linked.insert(stored);
        }
        Ok(linked)
    }
}

/// Maps a unique-constraint hit on `users.username` to `StoreError::DuplicateUsername`.
fn map_unique_violation(err: sqlx::Error, username: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateUsername(username.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// save_user
    ///
    /// Insert-or-update decided solely by the presence of a generated id.
    async fn save_user(&self, user: User) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let id = match user.id {
            None => sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO users (username, surname, age, email, password)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(&user.username)
            .bind(&user.surname)
            .bind(user.age)
            .bind(&user.email)
            .bind(&user.password)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, &user.username))?,
            Some(id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE users
                    SET username = $2, surname = $3, age = $4, email = $5, password = $6
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&user.username)
                .bind(&user.surname)
                .bind(user.age)
                .bind(&user.email)
                .bind(&user.password)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_unique_violation(e, &user.username))?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::UserNotFound(id));
                }
                id
            }
        };

        let roles = Self::link_roles(&mut tx, id, &user.roles).await?;
        tx.commit().await?;

        Ok(User {
            id: Some(id),
            roles,
            ..user
        })
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, surname, age, email, password FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate(row).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, surname, age, email, password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate(row).await
    }

    /// find_all_users
    ///
    /// Two queries: the user rows, then every role link, grouped in memory.
    async fn find_all_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, surname, age, email, password FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let links = sqlx::query_as::<_, UserRoleRow>(
            r#"
            SELECT ur.user_id, r.id, r.name
            FROM users_roles ur
            JOIN roles r ON r.id = ur.role_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut roles_by_user: BTreeMap<i64, BTreeSet<Role>> = BTreeMap::new();
        for link in links {
            roles_by_user.entry(link.user_id).or_default().insert(Role {
                id: Some(link.id),
                name: link.name,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let roles = roles_by_user.remove(&row.id).unwrap_or_default();
                row.into_user(roles)
            })
            .collect())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            tracing::debug!(user_id = id, "delete_user: no such user");
        }
        Ok(())
    }

    async fn find_all_roles(&self) -> Result<Vec<Role>, StoreError> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn save_role(&self, name: &str) -> Result<Role, StoreError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(role)
    }
}

#[derive(Default)]
struct MemoryTables {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    next_user_id: i64,
    next_role_id: i64,
}

impl MemoryTables {
    fn role_by_name(&mut self, name: &str) -> Role {
        if let Some(role) = self.roles.values().find(|role| role.name == name) {
            return role.clone();
        }
        self.next_role_id += 1;
        let role = Role {
            id: Some(self.next_role_id),
            name: name.to_string(),
        };
        self.roles.insert(self.next_role_id, role.clone());
        role
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. It enforces the same username uniqueness
/// and insert/update rules as the Postgres schema. Used by the test suite and by local runs
/// without a configured database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<MemoryTables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save_user(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        let taken = tables
            .users
            .values()
            .any(|existing| existing.username == user.username && existing.id != user.id);
        if taken {
            return Err(StoreError::DuplicateUsername(user.username));
        }

        let id = match user.id {
            Some(id) if tables.users.contains_key(&id) => id,
            Some(id) => return Err(StoreError::UserNotFound(id)),
            None => {
                tables.next_user_id += 1;
                tables.next_user_id
            }
        };

        let roles = user
            .roles
            .iter()
            .map(|role| tables.role_by_name(&role.name))
            .collect();
        let stored = User {
            id: Some(id),
            roles,
            ..user
        };
        tables.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_all_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        self.tables.write().await.users.remove(&id);
        Ok(())
    }

    async fn find_all_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.tables.read().await.roles.values().cloned().collect())
    }

    async fn save_role(&self, name: &str) -> Result<Role, StoreError> {
        Ok(self.tables.write().await.role_by_name(name))
    }
}
