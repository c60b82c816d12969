use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

/// Authority granted to administrators.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
/// Authority granted to every self-registered account.
pub const ROLE_USER: &str = "ROLE_USER";

// --- Core Domain Records (Mapped to Database) ---

/// Role
///
/// A named permission label from the `roles` table. Two roles are the same role when their
/// names match; the generated `id` is `None` until the store has assigned one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: Option<i64>,
    pub name: String,
}

impl Role {
    /// A transient role referenced by name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Role {}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// User
///
/// The account record stored in the `users` table together with its `users_roles` links.
/// After a save through `UserService`, `password` always holds an argon2 PHC string.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: Option<i64>,
    pub username: String,
    pub surname: String,
    pub age: i16,
    pub email: String,
    pub password: String,
    pub roles: BTreeSet<Role>,
}

impl User {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }

    /// Role names in catalog order (alphabetical).
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|role| role.name.clone()).collect()
    }
}

// Password hashes stay out of logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("surname", &self.surname)
            .field("age", &self.age)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("roles", &self.role_names())
            .finish()
    }
}

// --- Request Payloads (Input Schemas) ---

/// UserForm
///
/// The bound form for registration (PUT /registration), admin creation (PUT /admin/users)
/// and admin edit (PATCH /admin/users/{id}). Missing fields default to empty values so that
/// validation, not deserialization, reports them.
///
/// `roles` is ignored on registration.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
#[serde(default)]
pub struct UserForm {
    pub id: Option<i64>,
    pub username: String,
    pub surname: String,
    /// Wider than the stored column so out-of-range input reaches validation.
    pub age: i64,
    pub email: String,
    pub password: String,
    pub roles: Vec<String>,
}

impl UserForm {
    /// Converts the bound form into a transient `User`. Role names become unsaved roles and are
    /// resolved against the catalog by the store.
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username.trim().to_string(),
            surname: self.surname.trim().to_string(),
            // Range-checked by validation before conversion; saturates otherwise.
            age: self.age.clamp(i16::MIN.into(), i16::MAX.into()) as i16,
            email: self.email.trim().to_string(),
            password: self.password,
            roles: self.roles.into_iter().map(Role::named).collect(),
        }
    }
}

/// Prefills the edit form from a stored record, including the stored password hash.
impl From<User> for UserForm {
    fn from(user: User) -> Self {
        let roles = user.role_names();
        Self {
            id: user.id,
            username: user.username,
            surname: user.surname,
            age: user.age.into(),
            email: user.email,
            password: user.password,
            roles,
        }
    }
}

/// LoginRequest
///
/// Credentials submitted to POST /login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// --- Page Models (Output Schemas) ---

/// UserView
///
/// Public projection of a `User` for listings and the profile page. Never carries the
/// password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub surname: String,
    pub age: i16,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        let roles = user.role_names();
        Self {
            id: user.id.unwrap_or_default(),
            username: user.username,
            surname: user.surname,
            age: user.age,
            email: user.email,
            roles,
        }
    }
}

/// UserFormPage
///
/// Page model for the admin new/edit forms: the form values plus the full role catalog to
/// choose from.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserFormPage {
    pub user: UserForm,
    pub all_roles: Vec<Role>,
}

/// IndexPage
///
/// Page model for the landing page (`/`, `/index`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct IndexPage {
    pub authenticated: bool,
    pub username: Option<String>,
}

/// LoginPage
///
/// Page model for the login prompt. `error` is set after a rejected login (`/login?error`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginPage {
    pub error: bool,
}

/// AdminPage
///
/// Page model for the admin landing page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminPage {
    pub username: String,
    pub total_users: usize,
}

/// FieldErrors
///
/// Field-level validation messages keyed by form field name, returned with 422 so the client
/// can redisplay the form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error on one field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// `Ok(())` when no field failed.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}
