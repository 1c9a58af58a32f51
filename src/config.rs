use std::env;
use std::net::SocketAddr;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Minimum length of the HMAC signing secret in bytes.
const MIN_JWT_SECRET_LEN: usize = 32;

/// Upper bound for every configured lifetime (ten years).
const MAX_TTL_SECS: i64 = 10 * 365 * 86400;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The HMAC secret used to sign access tokens.
    pub jwt_secret: Zeroizing<String>,
    /// Lifetime of an access token in seconds.
    pub access_token_ttl_secs: i64,
    /// Lifetime of a refresh token in seconds.
    pub refresh_token_ttl_secs: i64,
    /// Domain attribute of the token cookies. Empty means host-only.
    pub cookie_domain: String,
    /// Whether the token cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    /// Failed logins allowed per email inside the lockout window.
    pub login_max_attempts: u32,
    /// Length of the failed-login window in seconds.
    pub login_lockout_secs: u64,
    /// Maximum number of pooled PostgreSQL connections.
    pub db_pool_max_size: usize,
    /// Argon2 memory cost in KiB.
    pub argon2_memory_kib: u32,
    /// Argon2 iteration count.
    pub argon2_iterations: u32,
    /// Argon2 parallelism.
    pub argon2_parallelism: u32,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a `Config` from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = Zeroizing::new(
            lookup("JWT_SECRET")
                .context("JWT_SECRET must be set (generate with: openssl rand -base64 48)")?,
        );

        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} bytes", MIN_JWT_SECRET_LEN);
        }

        let access_token_ttl_secs: i64 = parse_or(&lookup, "ACCESS_TOKEN_TTL_SECS", 900)?;
        let refresh_token_ttl_secs: i64 = parse_or(&lookup, "REFRESH_TOKEN_TTL_SECS", 30 * 86400)?;

        if access_token_ttl_secs <= 0 || refresh_token_ttl_secs <= 0 {
            anyhow::bail!("Token TTLs must be positive");
        }

        if access_token_ttl_secs > MAX_TTL_SECS || refresh_token_ttl_secs > MAX_TTL_SECS {
            anyhow::bail!("Token TTLs must be at most {} seconds", MAX_TTL_SECS);
        }

        let login_lockout_secs: u64 = parse_or(&lookup, "LOGIN_LOCKOUT_SECS", 900)?;
        if login_lockout_secs == 0 || login_lockout_secs > MAX_TTL_SECS as u64 {
            anyhow::bail!(
                "LOGIN_LOCKOUT_SECS must be between 1 and {} seconds",
                MAX_TTL_SECS
            );
        }

        let allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: lookup("REDIS_URL")
                .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            bind_addr: lookup("BIND_ADDR")
                .unwrap_or_else(|| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            cookie_domain: lookup("COOKIE_DOMAIN")
                .unwrap_or_else(|| "localhost".to_string()),
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
            allowed_origins,
            login_max_attempts: parse_or(&lookup, "LOGIN_MAX_ATTEMPTS", 5)?,
            login_lockout_secs,
            db_pool_max_size: parse_or(&lookup, "DB_POOL_MAX_SIZE", 16)?,
            argon2_memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", 19 * 1024)?,
            argon2_iterations: parse_or(&lookup, "ARGON2_ITERATIONS", 3)?,
            argon2_parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", 1)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}
