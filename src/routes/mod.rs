/// Router Module Index
///
/// Routes are grouped by the rule that guards them. Access control itself is not attached
/// per group: the `authorize` middleware evaluates the `RuleSet` for every request, so the
/// grouping only mirrors the policy.

/// Landing, registration, login and logout. Open to anonymous callers.
pub mod public;

/// Pages under `/user`, for holders of `ROLE_USER` or `ROLE_ADMIN`.
pub mod user;

/// Pages under `/admin`, for holders of `ROLE_ADMIN`.
pub mod admin;
