use crate::{
    AppState,
    auth::{CallerIdentity, expired_session_cookie, issue_session_token, session_cookie},
    error::{ApiError, ServiceError},
    models::{
        AdminPage, FieldErrors, IndexPage, LoginPage, LoginRequest, ROLE_ADMIN, UserForm,
        UserFormPage, UserView,
    },
    validation::{validate_edit_form, validate_roles, validate_user_form},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use std::collections::HashMap;

pub const LOGIN_PATH: &str = "/login";
pub const LOGIN_ERROR_PATH: &str = "/login?error";
pub const USERS_PATH: &str = "/admin/users";
pub const USER_HOME_PATH: &str = "/user";

// --- Public Pages ---

/// index
///
/// [Public Route] Landing page. Reached at `/` and `/index`.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", body = IndexPage))
)]
pub async fn index(caller: CallerIdentity) -> Json<IndexPage> {
    Json(IndexPage {
        authenticated: caller.authenticated,
        username: caller.username,
    })
}

/// registration_form
///
/// [Public Route] The empty registration form.
#[utoipa::path(
    get,
    path = "/registration",
    responses((status = 200, description = "Empty registration form", body = UserForm))
)]
pub async fn registration_form() -> Json<UserForm> {
    Json(UserForm::default())
}

/// register
///
/// [Public Route] Self-registration. Submitted roles are ignored; the account always gets
/// `ROLE_USER`. On success the client is sent to the login prompt, otherwise the field errors
/// are returned for redisplay and nothing is stored.
#[utoipa::path(
    put,
    path = "/registration",
    request_body = UserForm,
    responses(
        (status = 303, description = "Registered, redirect to /login"),
        (status = 422, description = "Invalid form", body = FieldErrors)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<UserForm>,
) -> Result<Redirect, ApiError> {
    validate_user_form(&form).into_result()?;

    let mut candidate = form.into_user();
    candidate.id = None;
    state.users.register(&mut candidate).await?;

    Ok(Redirect::to(LOGIN_PATH))
}

/// login_page
///
/// [Public Route] The login prompt. `?error` marks a rejected attempt.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login prompt", body = LoginPage))
)]
pub async fn login_page(Query(params): Query<HashMap<String, String>>) -> Json<LoginPage> {
    Json(LoginPage {
        error: params.contains_key("error"),
    })
}

/// login
///
/// [Public Route] Checks the credentials and opens a session. Administrators land on the user
/// list, everyone else on their own profile.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 303, description = "Logged in (session cookie set) or redirected to /login?error")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = match state
        .users
        .authenticate(&request.username, &request.password)
        .await
    {
        Ok(user) => user,
        Err(ServiceError::UserNotFound(_) | ServiceError::BadCredentials) => {
            tracing::warn!(username = %request.username, "Login rejected");
            return Ok(Redirect::to(LOGIN_ERROR_PATH).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let token = issue_session_token(&user.username, &state.config)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;
    let destination = if user.has_role(ROLE_ADMIN) {
        USERS_PATH
    } else {
        USER_HOME_PATH
    };

    tracing::info!(username = %user.username, destination, "Login succeeded");
    Ok((
        [(header::SET_COOKIE, session_cookie(&token, &state.config))],
        Redirect::to(destination),
    )
        .into_response())
}

/// logout
///
/// [Public Route] Drops the session cookie and returns to the landing page.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 303, description = "Logged out, redirect to /"))
)]
pub async fn logout(caller: CallerIdentity) -> impl IntoResponse {
    if let Some(username) = caller.username {
        tracing::info!(username = %username, "Logout");
    }
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Redirect::to("/"),
    )
}

// --- User Pages ---

/// current_user
///
/// [User Route] The logged-in user's own record.
#[utoipa::path(
    get,
    path = "/user",
    responses((status = 200, description = "Current user", body = UserView))
)]
pub async fn current_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<UserView>, ApiError> {
    let username = caller
        .username
        .ok_or_else(|| ApiError::NotFound("current user".to_string()))?;
    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {username}")))?;
    Ok(Json(UserView::from(user)))
}

// --- Admin Pages ---

/// admin_home
///
/// [Admin Route] Admin landing page.
#[utoipa::path(
    get,
    path = "/admin",
    responses((status = 200, description = "Admin landing page", body = AdminPage))
)]
pub async fn admin_home(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<AdminPage>, ApiError> {
    let total_users = state.users.list_all().await?.len();
    Ok(Json(AdminPage {
        username: caller.username.unwrap_or_default(),
        total_users,
    }))
}

/// list_users
///
/// [Admin Route] Every stored user, ordered by id.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "All users", body = [UserView]))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = state.users.list_all().await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

/// new_user_form
///
/// [Admin Route] Empty form plus the role catalog to choose from.
#[utoipa::path(
    get,
    path = "/admin/users/new",
    responses((status = 200, description = "New user form", body = UserFormPage))
)]
pub async fn new_user_form(State(state): State<AppState>) -> Result<Json<UserFormPage>, ApiError> {
    Ok(Json(UserFormPage {
        user: UserForm::default(),
        all_roles: state.users.list_all_roles().await?,
    }))
}

/// create_user
///
/// [Admin Route] Creates a user with roles picked from the catalog.
#[utoipa::path(
    put,
    path = "/admin/users",
    request_body = UserForm,
    responses(
        (status = 303, description = "Created, redirect to /admin/users"),
        (status = 422, description = "Invalid form", body = FieldErrors)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(form): Json<UserForm>,
) -> Result<Redirect, ApiError> {
    let catalog = state.users.list_all_roles().await?;
    let mut errors = validate_user_form(&form);
    validate_roles(&form, &catalog, &mut errors);
    errors.into_result()?;

    let mut candidate = form.into_user();
    candidate.id = None;
    state.users.admin_create_or_update(&mut candidate).await?;

    Ok(Redirect::to(USERS_PATH))
}

/// edit_user_form
///
/// [Admin Route] The stored user (password field holding the stored hash) plus the role
/// catalog.
#[utoipa::path(
    get,
    path = "/admin/users/{id}/edit",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Edit form", body = UserFormPage),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_user_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserFormPage>, ApiError> {
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
    Ok(Json(UserFormPage {
        user: UserForm::from(user),
        all_roles: state.users.list_all_roles().await?,
    }))
}

/// update_user
///
/// [Admin Route] Applies an edit. The path id wins over any id in the body. An empty password
/// is accepted and hashed like any other value.
#[utoipa::path(
    patch,
    path = "/admin/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UserForm,
    responses(
        (status = 303, description = "Updated, redirect to /admin/users"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid form", body = FieldErrors)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<UserForm>,
) -> Result<Redirect, ApiError> {
    let catalog = state.users.list_all_roles().await?;
    let mut errors = validate_edit_form(&form);
    validate_roles(&form, &catalog, &mut errors);
    errors.into_result()?;

    let mut candidate = form.into_user();
    candidate.id = Some(id);
    state.users.admin_create_or_update(&mut candidate).await?;

    Ok(Redirect::to(USERS_PATH))
}

/// delete_user
///
/// [Admin Route] Removes a user. An unknown id is not an error.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses((status = 303, description = "Deleted, redirect to /admin/users"))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, ApiError> {
    state.users.delete(id).await?;
    Ok(Redirect::to(USERS_PATH))
}
