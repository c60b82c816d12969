use std::collections::BTreeSet;

use crate::error::ServiceError;
use crate::models::{ROLE_ADMIN, ROLE_USER, Role, User};
use crate::service::UserService;

/// A fixture account created at startup when missing.
#[derive(Debug, Clone, Copy)]
pub struct SeedUser {
    pub username: &'static str,
    pub surname: &'static str,
    pub age: i16,
    pub email: &'static str,
    pub password: &'static str,
    pub roles: &'static [&'static str],
}

impl SeedUser {
    fn to_user(self) -> User {
        User {
            id: None,
            username: self.username.to_string(),
            surname: self.surname.to_string(),
            age: self.age,
            email: self.email.to_string(),
            password: self.password.to_string(),
            roles: self.roles.iter().map(|name| Role::named(*name)).collect::<BTreeSet<_>>(),
        }
    }
}

pub const SEED_USERS: [SeedUser; 6] = [
    SeedUser {
        username: "admin",
        surname: "SurnameAdmin",
        age: 100,
        email: "email_admin@mail.ru",
        password: "admin",
        roles: &[ROLE_ADMIN],
    },
    SeedUser {
        username: "user1",
        surname: "Surname1",
        age: 10,
        email: "email_1@mail.ru",
        password: "password1",
        roles: &[ROLE_USER],
    },
    SeedUser {
        username: "user2",
        surname: "Surname2",
        age: 20,
        email: "email_2@mail.ru",
        password: "password2",
        roles: &[ROLE_USER],
    },
    SeedUser {
        username: "user3",
        surname: "Surname3",
        age: 30,
        email: "email_3@mail.ru",
        password: "password3",
        roles: &[ROLE_USER],
    },
    SeedUser {
        username: "user4",
        surname: "Surname4",
        age: 40,
        email: "email_4@mail.ru",
        password: "password4",
        roles: &[ROLE_USER],
    },
    SeedUser {
        username: "user5",
        surname: "Surname5",
        age: 50,
        email: "email_5@mail.ru",
        password: "password5",
        roles: &[ROLE_ADMIN, ROLE_USER],
    },
];

/// Outcome of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// bootstrap
///
/// Creates the role catalog and every seed user whose username is not yet taken. Must finish
/// before the server accepts requests; callers treat an error as fatal.
pub async fn bootstrap(users: &UserService) -> Result<SeedReport, ServiceError> {
    users.ensure_role(ROLE_ADMIN).await?;
    users.ensure_role(ROLE_USER).await?;

    let mut report = SeedReport::default();
    for seed in SEED_USERS {
        if users.find_by_username(seed.username).await?.is_some() {
            report.skipped += 1;
            continue;
        }
        let mut user = seed.to_user();
        users.admin_create_or_update(&mut user).await?;
        report.inserted += 1;
    }

    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "Seed users bootstrapped"
    );
    Ok(report)
}
