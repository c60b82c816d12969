use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Admin Router Module
///
/// User administration, nested under `/admin`. Reachable only with `ROLE_ADMIN`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        .route("/", get(handlers::admin_home))
        // GET /admin/users, PUT /admin/users
        // List every user; create a user from the submitted form.
        .route(
            "/users",
            get(handlers::list_users).put(handlers::create_user),
        )
        // GET /admin/users/new
        // Empty form plus the role catalog.
        .route("/users/new", get(handlers::new_user_form))
        // GET /admin/users/{id}/edit
        // Prefilled form plus the role catalog.
        .route("/users/{id}/edit", get(handlers::edit_user_form))
        // PATCH/DELETE /admin/users/{id}
        .route(
            "/users/{id}",
            patch(handlers::update_user).delete(handlers::delete_user),
        )
}
