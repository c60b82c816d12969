use std::env;

/// Fallback secret for local runs; production refuses to start without a real one.
pub const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
/// Eight hours.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 8 * 60 * 60;

/// AppConfig
///
/// Holds the application's configuration. Immutable once loaded and pulled into handlers and
/// extractors through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. Optional locally: without it the in-memory store is used.
    pub db_url: Option<String>,
    // Socket address the HTTP listener binds to.
    pub bind_addr: String,
    // Runtime environment marker. Controls the dev identity bypass and log format.
    pub env: Env,
    // HMAC secret for signing and validating session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued session token.
    pub session_ttl_secs: i64,
}

/// Env
///
/// Runtime context: developer conveniences (`x-username` bypass, in-memory store, pretty
/// logs) in `Local`, hardened settings in `Production`.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            db_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables at startup.
    ///
    /// # Panics
    /// Panics in `Production` when `DATABASE_URL` or `SESSION_JWT_SECRET` is missing, and in
    /// any environment when `SESSION_TTL_SECS` is not a positive integer.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let session_ttl_secs = match env::var("SESSION_TTL_SECS") {
            Ok(raw) => match raw.parse::<i64>() {
                Ok(secs) if secs > 0 => secs,
                _ => panic!("FATAL: SESSION_TTL_SECS must be a positive integer, got '{raw}'"),
            },
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL").ok(),
                bind_addr,
                jwt_secret: env::var("SESSION_JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                session_ttl_secs,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                bind_addr,
                jwt_secret: env::var("SESSION_JWT_SECRET")
                    .expect("FATAL: SESSION_JWT_SECRET must be set in production."),
                session_ttl_secs,
            },
        }
    }
}
