use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod security;
pub mod seed;
pub mod service;
pub mod validation;

// Routers grouped by access rule (public, user, admin).
pub mod routes;
use auth::CallerIdentity;
use routes::{admin, public, user};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use password::PasswordEncoder;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use security::{Decision, RuleSet};
pub use service::UserService;

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and `ToSchema` models.
/// Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index, handlers::registration_form, handlers::register,
        handlers::login_page, handlers::login, handlers::logout, handlers::current_user,
        handlers::admin_home, handlers::list_users, handlers::new_user_form,
        handlers::create_user, handlers::edit_user_form, handlers::update_user,
        handlers::delete_user
    ),
    components(
        schemas(
            models::Role, models::UserForm, models::UserView, models::UserFormPage,
            models::LoginRequest, models::LoginPage, models::IndexPage, models::AdminPage,
            models::FieldErrors,
        )
    ),
    tags(
        (name = "user-registry", description = "User registration and administration API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything a request may need. Shared by every route.
#[derive(Clone)]
pub struct AppState {
    /// Provisioning and lookup of users and roles.
    pub users: UserService,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Route authorization policy.
    pub rules: Arc<RuleSet>,
}

impl AppState {
    /// State with the application rule set.
    pub fn new(users: UserService, config: AppConfig) -> Self {
        Self {
            users,
            config,
            rules: Arc::new(RuleSet::application()),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for UserService {
    fn from_ref(app_state: &AppState) -> UserService {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Arc<RuleSet> {
    fn from_ref(app_state: &AppState) -> Arc<RuleSet> {
        app_state.rules.clone()
    }
}

/// authorize
///
/// Applies the `RuleSet` to every request before routing reaches a handler.
///
/// The resolved `CallerIdentity` is stored in the request extensions, so handlers that
/// extract it again get the same value without a second store lookup.
async fn authorize(
    State(rules): State<Arc<RuleSet>>,
    caller: CallerIdentity,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let decision = rules.evaluate(&path, &caller);
    tracing::debug!(
        path = %path,
        username = ?caller.username,
        decision = ?decision,
        "authorization decision"
    );

    match decision {
        Decision::Allow => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Decision::RedirectToLogin => Redirect::to(handlers::LOGIN_PATH).into_response(),
        Decision::Forbidden => StatusCode::FORBIDDEN.into_response(),
    }
}

/// create_router
///
/// Assembles the routes, the authorization middleware and the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/user", user::user_routes())
        .nest("/admin", admin::admin_routes())
        // Every route, docs included, passes the rule set.
        .layer(middleware::from_fn_with_state(state.clone(), authorize))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, uri and the `x-request-id`, so every log line of a
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
