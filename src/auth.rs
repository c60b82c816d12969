use std::collections::BTreeSet;
use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    models::User,
    service::UserService,
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "SESSION";
/// Local-only header naming the user to act as.
pub const DEV_USERNAME_HEADER: &str = "x-username";

/// Claims
///
/// Payload of a session token, signed with the configured secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the username of the logged-in user.
    pub sub: String,
    /// Expiration Time (exp): the token is rejected after this instant.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// CallerIdentity
///
/// The actor behind a request: either an authenticated user with their current role set, or
/// anonymous. Passed explicitly to the rule set and to handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub username: Option<String>,
    pub roles: BTreeSet<String>,
    pub authenticated: bool,
}

impl CallerIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(username: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            username: Some(username.into()),
            roles: roles.iter().map(|role| role.to_string()).collect(),
            authenticated: true,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl From<&User> for CallerIdentity {
    fn from(user: &User) -> Self {
        Self {
            username: Some(user.username.clone()),
            roles: user.roles.iter().map(|role| role.name.clone()).collect(),
            authenticated: true,
        }
    }
}

/// Signs a session token for `username`, valid for the configured TTL.
pub fn issue_session_token(
    username: &str,
    config: &AppConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: username.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::seconds(config.session_ttl_secs)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str, config: &AppConfig) -> String {
    let secure = if config.env == Env::Production { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
        config.session_ttl_secs
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Token from `Authorization: Bearer ...`, else from the session cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Username from a valid, unexpired session token.
pub fn decode_session_token(token: &str, secret: &str) -> Option<String> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.sub)
    .ok()
}

/// CallerIdentity Extractor Implementation
///
/// Never rejects: a request without valid credentials yields `CallerIdentity::anonymous()`
/// and the rule set decides what an anonymous caller may reach.
///
/// Resolution order:
/// 1. An identity already stored in the request extensions by the `authorize` middleware.
/// 2. Local bypass: in `Env::Local`, the `x-username` header names an existing user.
/// 3. A session token (bearer header or `SESSION` cookie).
///
/// Roles always come from the store, so role changes and deletions take effect on the next
/// request even while a token is still valid.
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
    UserService: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<CallerIdentity>() {
            return Ok(identity.clone());
        }

        let users = UserService::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            if let Some(username) = parts
                .headers
                .get(DEV_USERNAME_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                if let Ok(Some(user)) = users.find_by_username(username).await {
                    return Ok(CallerIdentity::from(&user));
                }
            }
        }

        let Some(token) = session_token(&parts.headers) else {
            return Ok(CallerIdentity::anonymous());
        };
        let Some(username) = decode_session_token(&token, &config.jwt_secret) else {
            tracing::debug!("Ignoring invalid or expired session token");
            return Ok(CallerIdentity::anonymous());
        };

        match users.find_by_username(&username).await {
            Ok(Some(user)) => Ok(CallerIdentity::from(&user)),
            Ok(None) => Ok(CallerIdentity::anonymous()),
            Err(e) => {
                tracing::error!("identity lookup failed: {}", e);
                Ok(CallerIdentity::anonymous())
            }
        }
    }
}
