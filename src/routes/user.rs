use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// User Router Module
///
/// Pages for any account holding `ROLE_USER` or `ROLE_ADMIN`.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // GET /user
        // The logged-in user's own record.
        .route("/", get(handlers::current_user))
}
