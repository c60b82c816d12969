use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints an anonymous caller can reach: the landing page, self-registration and the
/// login/logout flow. `/`, `/index` and `/registration` are only granted to callers who are
/// not logged in; a logged-in caller still reaches them through the catch-all rule.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET / and GET /index
        .route("/", get(handlers::index))
        .route("/index", get(handlers::index))
        // GET/PUT /registration
        // Form page and submission. Success redirects to /login.
        .route(
            "/registration",
            get(handlers::registration_form).put(handlers::register),
        )
        // GET/POST /login
        // Prompt and credential check. Success sets the SESSION cookie.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // POST/GET /logout
        .route("/logout", post(handlers::logout).get(handlers::logout))
}
