//! Explicit form validation. Each check appends to a `FieldErrors` map instead of failing
//! fast, so the client gets every problem with the submitted form at once.

use crate::models::{FieldErrors, Role, UserForm};

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 100;
pub const SURNAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 255;
pub const AGE_MAX: i64 = 127;

/// Registration and admin creation: every field, password included.
pub fn validate_user_form(form: &UserForm) -> FieldErrors {
    let mut errors = validate_profile(form);
    if form.password.is_empty() {
        errors.add("password", "Password must not be empty");
    }
    errors
}

/// Admin edit. The password may be left empty; whatever is submitted is hashed as is.
pub fn validate_edit_form(form: &UserForm) -> FieldErrors {
    validate_profile(form)
}

fn validate_profile(form: &UserForm) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let username = form.username.trim();
    let username_len = username.chars().count();
    if username.is_empty() {
        errors.add("username", "Username must not be empty");
    } else if !(USERNAME_MIN..=USERNAME_MAX).contains(&username_len) {
        errors.add(
            "username",
            format!("Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"),
        );
    }
    if username.chars().any(char::is_whitespace) {
        errors.add("username", "Username must not contain whitespace");
    }

    let surname = form.surname.trim();
    if surname.is_empty() {
        errors.add("surname", "Surname must not be empty");
    } else if surname.chars().count() > SURNAME_MAX {
        errors.add(
            "surname",
            format!("Surname must be at most {SURNAME_MAX} characters"),
        );
    }

    if !(0..=AGE_MAX).contains(&form.age) {
        errors.add("age", format!("Age must be between 0 and {AGE_MAX}"));
    }

    let email = form.email.trim();
    if email.is_empty() {
        errors.add("email", "Email must not be empty");
    } else if email.len() > EMAIL_MAX || !is_plausible_email(email) {
        errors.add("email", "Email should be valid");
    }

    errors
}

/// Admin forms may only grant roles that exist in the catalog.
pub fn validate_roles(form: &UserForm, catalog: &[Role], errors: &mut FieldErrors) {
    for name in &form.roles {
        if !catalog.iter().any(|role| &role.name == name) {
            errors.add("roles", format!("Unknown role '{name}'"));
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}
